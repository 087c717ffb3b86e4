use scriptbridge_core::api::ConfigError;
use scriptbridge_plugins::RulesSourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Rules(#[from] RulesSourceError),

    #[error("invalid --args: {0}")]
    Arguments(String),

    #[error("failed to start events_out: {0}")]
    EventsOut(#[source] std::io::Error),

    #[error("cannot determine working directory: {0}")]
    WorkingDir(#[source] std::io::Error),

    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
