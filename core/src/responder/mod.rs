//! Message dispatch against the rule table.

mod rule;

use std::sync::Arc;

use crate::context::{Hooks, RunContext};
use crate::error::CallbackError;
use crate::notify::UiNotifier;

pub use rule::{Pattern, ResponseCallback, ResponseRule, RuleTable, DEFAULT_RULE_KEY};

/// Printed by a script that is shutting down on its own.
pub const EXITING_SENTINEL: &str = "__EXITING__";

/// How a single line was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sentinel,
    Matched(usize),
    Default,
    Unhandled,
}

pub struct Responder {
    rules: Arc<RuleTable>,
    notifier: Arc<dyn UiNotifier>,
}

impl Responder {
    pub fn new(rules: Arc<RuleTable>, notifier: Arc<dyn UiNotifier>) -> Self {
        Self { rules, notifier }
    }

    /// Dispatch one decoded message.
    ///
    /// A message that still holds line breaks after trimming is handled line
    /// by line. Every line ends up in the history, even when a callback fails.
    pub fn respond_to_message(
        &self,
        message: &str,
        ctx: &mut RunContext,
    ) -> Result<(), CallbackError> {
        let trimmed = message.trim();
        if trimmed.contains('\n') {
            for line in trimmed.lines() {
                self.respond_to_message(line, ctx)?;
            }
            return Ok(());
        }

        let result = self.dispatch(message, trimmed, ctx);
        ctx.push_history(message);
        match &result {
            Ok(kind) => tracing::trace!(
                target: "scriptbridge.responder",
                message,
                dispatch = ?kind,
                "message dispatched"
            ),
            Err(e) => tracing::warn!(
                target: "scriptbridge.responder",
                message,
                error = %e.source,
                "response rule failed"
            ),
        }
        result.map(|_| ())
    }

    fn dispatch(
        &self,
        message: &str,
        trimmed: &str,
        ctx: &mut RunContext,
    ) -> Result<Dispatch, CallbackError> {
        if trimmed == EXITING_SENTINEL {
            ctx.record_success(None);
            return Ok(Dispatch::Sentinel);
        }

        // Fan-out: every matching rule fires, in registration order.
        let mut matched = 0usize;
        for rule in self.rules.rules() {
            if rule.pattern.matches(message) {
                matched += 1;
                self.invoke(&rule.callback, message, ctx)?;
            }
        }
        if matched > 0 {
            return Ok(Dispatch::Matched(matched));
        }

        match self.rules.default_rule() {
            Some(callback) => {
                self.invoke(callback, message, ctx)?;
                Ok(Dispatch::Default)
            }
            None => Ok(Dispatch::Unhandled),
        }
    }

    fn invoke(
        &self,
        callback: &rule::ResponseCallback,
        message: &str,
        ctx: &mut RunContext,
    ) -> Result<(), CallbackError> {
        let mut hooks = Hooks::new(ctx, self.notifier.as_ref());
        callback(message, &mut hooks).map_err(|source| CallbackError {
            message: message.to_string(),
            source,
        })
    }
}
