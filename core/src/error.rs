use thiserror::Error;

/// The interpreter could not be constructed or wired.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("interpreter not found: {program}")]
    NotFound { program: String },

    #[error("failed to spawn interpreter: {program}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("interpreter stdio not captured: {stream}")]
    MissingStdio { stream: &'static str },

    #[error("invalid script path: {0}")]
    InvalidScript(String),

    #[error("cannot resolve working directory: {path}")]
    WorkingDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Faults reported by a running interpreter.
#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("io error while reading {stream}")]
    StreamIo {
        stream: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{exception}")]
    Logic { exception: String, traceback: String },

    #[error("failed to write to interpreter stdin")]
    Send(#[source] std::io::Error),

    #[error("interpreter exited before reporting an outcome: code={code}")]
    UnexpectedExit { code: i32 },

    #[error("{0}")]
    Reported(String),
}

/// Raised while closing stdin and waiting for a natural exit.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("waiting for interpreter exit failed")]
    Wait(#[source] std::io::Error),

    #[error("interpreter exited with code {code}")]
    NonZeroExit { code: i32, stderr_tail: String },

    #[error("interpreter did not exit within {grace_ms}ms")]
    Timeout { grace_ms: u64 },
}

#[derive(Debug, Error)]
#[error("response rule failed on message {message:?}")]
pub struct CallbackError {
    pub message: String,
    #[source]
    pub source: anyhow::Error,
}

/// Terminal failure of a single run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("spawn error: {0}")]
    Spawn(#[from] SpawnError),

    #[error("interpreter error: {0}")]
    Interpreter(#[from] InterpreterError),

    #[error("graceful shutdown error: {0}")]
    GracefulShutdown(#[from] ShutdownError),

    #[error(transparent)]
    Callback(#[from] CallbackError),

    #[error("run rejected: {reason}")]
    Rejected { reason: String },

    #[error("run cancelled")]
    Cancelled,
}

impl RunError {
    /// Short machine-readable tag, used in `run.end` records.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::Spawn(_) => "spawn",
            RunError::Interpreter(_) => "interpreter",
            RunError::GracefulShutdown(_) => "graceful_shutdown",
            RunError::Callback(_) => "callback",
            RunError::Rejected { .. } => "rejected",
            RunError::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("config io error: {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {path}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("config validation error: {0}")]
    Validation(String),
}
