//! Per-run state shared between the communicator and the responder.

use std::sync::Arc;

use serde_json::Value;

use crate::error::RunError;
use crate::notify::UiNotifier;

/// Caller-supplied named arguments, immutable for the run.
pub type ArgumentMap = serde_json::Map<String, Value>;

#[derive(Debug)]
pub enum Outcome {
    Success(Option<Value>),
    Failure(RunError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

pub struct RunContext {
    history: Vec<String>,
    args: Arc<ArgumentMap>,
    outcome: Option<Outcome>,
    outbox: Vec<String>,
}

impl RunContext {
    pub fn new(args: Arc<ArgumentMap>) -> Self {
        Self {
            history: Vec::new(),
            args,
            outcome: None,
            outbox: Vec::new(),
        }
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn args(&self) -> &ArgumentMap {
        &self.args
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn has_outcome(&self) -> bool {
        self.outcome.is_some()
    }

    /// Single assignment: returns false (and keeps the first outcome) when an
    /// outcome was already recorded.
    pub fn record(&mut self, outcome: Outcome) -> bool {
        if let Some(existing) = &self.outcome {
            tracing::debug!(
                target: "scriptbridge.context",
                existing_success = existing.is_success(),
                ignored = ?outcome,
                "outcome already recorded, ignoring"
            );
            return false;
        }
        self.outcome = Some(outcome);
        true
    }

    pub fn record_success(&mut self, value: Option<Value>) -> bool {
        self.record(Outcome::Success(value))
    }

    pub fn record_failure(&mut self, err: RunError) -> bool {
        self.record(Outcome::Failure(err))
    }

    pub(crate) fn push_history(&mut self, message: &str) {
        self.history.push(message.to_string());
    }

    pub(crate) fn queue_send(&mut self, message: String) {
        self.outbox.push(message);
    }

    /// Messages queued by callbacks since the last drain, in call order.
    pub fn drain_outbox(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outbox)
    }

    pub fn into_parts(self) -> (Vec<String>, Option<Outcome>) {
        (self.history, self.outcome)
    }
}

/// What a response callback may do. Every effect goes through here.
pub struct Hooks<'a> {
    ctx: &'a mut RunContext,
    notifier: &'a dyn UiNotifier,
}

impl<'a> Hooks<'a> {
    pub fn new(ctx: &'a mut RunContext, notifier: &'a dyn UiNotifier) -> Self {
        Self { ctx, notifier }
    }

    /// Queue a line for the interpreter's stdin. Written after the current
    /// message has been dispatched.
    pub fn send(&mut self, message: impl Into<String>) {
        self.ctx.queue_send(message.into());
    }

    pub fn args(&self) -> &ArgumentMap {
        self.ctx.args()
    }

    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.ctx.args().get(name)
    }

    /// Messages received before the current one.
    pub fn history(&self) -> &[String] {
        self.ctx.history()
    }

    pub fn notify(&self, channel: &str, args: &[Value]) {
        self.notifier.notify(channel, args);
    }

    pub fn resolve(&mut self, value: Option<Value>) {
        self.ctx.record_success(value);
    }

    pub fn reject(&mut self, reason: impl Into<String>) {
        self.ctx.record_failure(RunError::Rejected {
            reason: reason.into(),
        });
    }
}
