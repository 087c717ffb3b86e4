use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::context::Hooks;

/// Reserved key of the fallback rule.
pub const DEFAULT_RULE_KEY: &str = "_default";

/// Invoked with the raw message and the run's hooks. Effects only go through
/// the hooks; an `Err` fails the run.
pub type ResponseCallback = Arc<dyn Fn(&str, &mut Hooks<'_>) -> anyhow::Result<()> + Send + Sync>;

/// A pattern matches when its regex matches the untrimmed message, or when
/// the trimmed message equals the pattern text.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Option<Regex>,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let regex = match Regex::new(&source) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(
                    target: "scriptbridge.responder",
                    pattern = %source,
                    error = %e,
                    "pattern is not a valid regex, matching literally"
                );
                None
            }
        };
        Self { source, regex }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_regex(&self) -> bool {
        self.regex.is_some()
    }

    pub fn matches(&self, message: &str) -> bool {
        if let Some(re) = &self.regex {
            if re.is_match(message) {
                return true;
            }
        }
        message.trim() == self.source
    }
}

#[derive(Clone)]
pub struct ResponseRule {
    pub pattern: Pattern,
    pub callback: ResponseCallback,
}

/// Pattern → callback table. Read-only once built; share it with `Arc`.
#[derive(Clone, Default)]
pub struct RuleTable {
    rules: Vec<ResponseRule>,
    default: Option<ResponseCallback>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `key`, replacing a previous rule with the
    /// same key. `_default` registers the fallback.
    pub fn insert<F>(&mut self, key: impl Into<String>, callback: F)
    where
        F: Fn(&str, &mut Hooks<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.insert_callback(key, Arc::new(callback));
    }

    pub fn insert_callback(&mut self, key: impl Into<String>, callback: ResponseCallback) {
        let key = key.into();
        if key == DEFAULT_RULE_KEY {
            self.default = Some(callback);
            return;
        }
        if let Some(existing) = self.rules.iter_mut().find(|r| r.pattern.as_str() == key) {
            existing.callback = callback;
            return;
        }
        self.rules.push(ResponseRule {
            pattern: Pattern::new(key),
            callback,
        });
    }

    pub fn with<F>(mut self, key: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&str, &mut Hooks<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.insert(key, callback);
        self
    }

    /// Non-default rules in registration order.
    pub fn rules(&self) -> &[ResponseRule] {
        &self.rules
    }

    pub fn default_rule(&self) -> Option<&ResponseCallback> {
        self.default.as_ref()
    }

    pub fn len(&self) -> usize {
        self.rules.len() + usize::from(self.default.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleTable")
            .field(
                "patterns",
                &self.rules.iter().map(|r| r.pattern.as_str()).collect::<Vec<_>>(),
            )
            .field("has_default", &self.default.is_some())
            .finish()
    }
}
