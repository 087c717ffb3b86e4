//! `{message}`, `{trimmed}` and `{args.NAME}` substitution for rule actions.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

use scriptbridge_core::api::ArgumentMap;

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{(message|trimmed|args\.[A-Za-z0-9_\-]+)\}").expect("placeholder regex")
    })
}

pub struct TemplateScope<'a> {
    pub message: &'a str,
    pub args: &'a ArgumentMap,
}

impl TemplateScope<'_> {
    pub fn render(&self, template: &str) -> String {
        placeholder()
            .replace_all(template, |caps: &Captures<'_>| self.lookup(&caps[1]))
            .into_owned()
    }

    /// Renders every string inside a JSON value; other values pass through.
    pub fn render_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.render(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.render_value(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.render_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn lookup(&self, key: &str) -> String {
        match key {
            "message" => self.message.to_string(),
            "trimmed" => self.message.trim().to_string(),
            _ => {
                let name = key.trim_start_matches("args.");
                match self.args.get(name) {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => {
                        tracing::debug!(
                            target: "scriptbridge.rules",
                            argument = name,
                            "template references a missing argument"
                        );
                        String::new()
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn args() -> ArgumentMap {
        let mut m = ArgumentMap::new();
        m.insert("user".into(), json!("ada"));
        m.insert("retries".into(), json!(3));
        m
    }

    #[test]
    fn substitutes_message_and_arguments() {
        let args = args();
        let scope = TemplateScope {
            message: "  ping ",
            args: &args,
        };
        assert_eq!(scope.render("[{message}]"), "[  ping ]");
        assert_eq!(scope.render("{trimmed} from {args.user}"), "ping from ada");
        assert_eq!(scope.render("retry={args.retries}"), "retry=3");
        assert_eq!(scope.render("{args.missing}|{unknown}"), "|{unknown}");
    }

    #[test]
    fn renders_nested_json_strings() {
        let args = args();
        let scope = TemplateScope {
            message: "50",
            args: &args,
        };
        let rendered = scope.render_value(&json!({"pct": "{trimmed}", "list": ["{args.user}", 1]}));
        assert_eq!(rendered, json!({"pct": "50", "list": ["ada", 1]}));
    }
}
