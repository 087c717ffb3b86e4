use std::path::Path;

use scriptbridge_core::api::LoggingConfig;
use scriptbridge_core::config::expand_path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;

const LOG_FILE_PREFIX: &str = "scriptbridge.log";

/// Install the global subscriber. Logs go to stderr, or to a daily rolling
/// file under `[logging].dir`; stdout stays free for events_out records.
///
/// Keep the returned guard alive until exit so buffered file output is flushed.
pub fn init(cfg: &LoggingConfig, level_override: Option<&str>) -> Result<Option<WorkerGuard>, CliError> {
    let level = level_override.unwrap_or(&cfg.level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| CliError::Logging(format!("invalid log filter `{level}`: {e}")))?;

    match cfg.dir.as_deref() {
        Some(dir) => {
            let dir = expand_path(dir);
            ensure_dir(&dir)?;
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|e| CliError::Logging(e.to_string()))?;
            tracing::debug!(target: "scriptbridge.cli", dir = %dir.display(), "file logging enabled");
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| CliError::Logging(e.to_string()))?;
            Ok(None)
        }
    }
}

fn ensure_dir(dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| CliError::Logging(format!("cannot create log dir {}: {e}", dir.display())))
}
