//! Response rules declared in a TOML file.
//!
//! ```toml
//! [[rule]]
//! pattern = "^READY$"
//! actions = [{ type = "send", text = "GO {args.user}" }]
//!
//! [[rule]]
//! pattern = "^progress "
//! actions = [{ type = "notify", channel = "progress", args = ["{trimmed}"] }]
//!
//! [default]
//! actions = [{ type = "log", level = "debug" }]
//! ```

mod template;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use scriptbridge_core::api::{Hooks, RuleTable, DEFAULT_RULE_KEY};

use crate::error::RulesSourceError;

pub use template::TemplateScope;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RuleFile {
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleSpec>,

    #[serde(default)]
    pub default: Option<DefaultSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub pattern: String,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultSpec {
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Send {
        text: String,
    },
    Notify {
        channel: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    Resolve {
        #[serde(default)]
        value: Option<Value>,
    },
    Reject {
        reason: String,
    },
    Log {
        #[serde(default)]
        level: LogLevel,
        #[serde(default = "default_log_text")]
        text: String,
    },
}

fn default_log_text() -> String {
    "{message}".to_string()
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

pub fn load_rule_file(path: &Path) -> Result<RuleTable, RulesSourceError> {
    let raw = std::fs::read_to_string(path).map_err(|source| RulesSourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = parse_rules(&raw, &path.display().to_string())?;
    tracing::info!(
        target: "scriptbridge.rules",
        path = %path.display(),
        rules = table.len(),
        has_default = table.default_rule().is_some(),
        "rule file loaded"
    );
    Ok(table)
}

pub fn parse_rules(src: &str, origin: &str) -> Result<RuleTable, RulesSourceError> {
    let file: RuleFile = toml::from_str(src).map_err(|source| RulesSourceError::Parse {
        origin: origin.to_string(),
        source,
    })?;
    compile(file)
}

/// Turns declared rules into callbacks, keeping file order.
pub fn compile(file: RuleFile) -> Result<RuleTable, RulesSourceError> {
    let mut table = RuleTable::new();
    let mut seen = HashSet::new();

    for (index, rule) in file.rules.into_iter().enumerate() {
        if rule.pattern.is_empty() {
            return Err(RulesSourceError::EmptyPattern { index });
        }
        if rule.pattern == DEFAULT_RULE_KEY {
            return Err(RulesSourceError::ReservedPattern {
                index,
                pattern: rule.pattern,
            });
        }
        if !seen.insert(rule.pattern.clone()) {
            return Err(RulesSourceError::DuplicatePattern {
                pattern: rule.pattern,
            });
        }
        table.insert(rule.pattern, run_actions(rule.actions));
    }

    if let Some(default) = file.default {
        table.insert(DEFAULT_RULE_KEY, run_actions(default.actions));
    }
    Ok(table)
}

fn run_actions(
    actions: Vec<Action>,
) -> impl Fn(&str, &mut Hooks<'_>) -> anyhow::Result<()> + Send + Sync + 'static {
    let actions = Arc::new(actions);
    move |message: &str, hooks: &mut Hooks<'_>| {
        let args = hooks.args().clone();
        let scope = TemplateScope {
            message,
            args: &args,
        };
        for action in actions.iter() {
            apply(action, &scope, hooks);
        }
        Ok(())
    }
}

fn apply(action: &Action, scope: &TemplateScope<'_>, hooks: &mut Hooks<'_>) {
    match action {
        Action::Send { text } => hooks.send(scope.render(text)),
        Action::Notify { channel, args } => {
            let rendered: Vec<Value> = args.iter().map(|v| scope.render_value(v)).collect();
            hooks.notify(channel, &rendered);
        }
        Action::Resolve { value } => hooks.resolve(value.as_ref().map(|v| scope.render_value(v))),
        Action::Reject { reason } => hooks.reject(scope.render(reason)),
        Action::Log { level, text } => {
            let text = scope.render(text);
            match level {
                LogLevel::Trace => tracing::trace!(target: "scriptbridge.script", "{text}"),
                LogLevel::Debug => tracing::debug!(target: "scriptbridge.script", "{text}"),
                LogLevel::Info => tracing::info!(target: "scriptbridge.script", "{text}"),
                LogLevel::Warn => tracing::warn!(target: "scriptbridge.script", "{text}"),
                LogLevel::Error => tracing::error!(target: "scriptbridge.script", "{text}"),
            }
        }
    }
}
