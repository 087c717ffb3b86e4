//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `scriptbridge_core::api` instead of reaching into internal modules.

pub use crate::communicator::{Communicator, RunReport, ScriptRequest, SessionState};
pub use crate::config::{AppConfig, ControlConfig, EventsOutConfig, InterpreterConfig, LoggingConfig};
pub use crate::context::{ArgumentMap, Hooks, Outcome, RunContext};
pub use crate::error::{
    CallbackError, ConfigError, InterpreterError, RunError, ShutdownError, SpawnError,
};
pub use crate::events_out::{start_events_out, EventRecord, EventsOut, EventsOutTx};
pub use crate::interpreter::{
    InterpreterEvent, InterpreterFactory, InterpreterHandle, InterpreterOptions,
    ProcessInterpreterFactory, ScriptSpec,
};
pub use crate::notify::{ChannelNotifier, TracingNotifier, UiEvent, UiNotifier};
pub use crate::responder::{
    Pattern, Responder, ResponseCallback, RuleTable, DEFAULT_RULE_KEY, EXITING_SENTINEL,
};
pub use crate::runner::Runner;
