use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesSourceError {
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rule file {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("rule #{index} has an empty pattern")]
    EmptyPattern { index: usize },

    #[error("rule #{index} uses the reserved pattern `{pattern}`; use a [default] section instead")]
    ReservedPattern { index: usize, pattern: String },

    #[error("pattern `{pattern}` is declared more than once")]
    DuplicatePattern { pattern: String },
}
