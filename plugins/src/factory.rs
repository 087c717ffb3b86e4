use std::path::Path;
use std::sync::Arc;

use scriptbridge_core::api::{
    AppConfig, InterpreterConfig, InterpreterFactory, ProcessInterpreterFactory, RuleTable,
};
use scriptbridge_core::config::expand_path;

use crate::error::RulesSourceError;
use crate::rules::load_rule_file;

pub fn build_interpreter_factory() -> Arc<dyn InterpreterFactory> {
    Arc::new(ProcessInterpreterFactory)
}

/// Rule table for a run. `override_path` (from the command line) wins over
/// `[rules].path`; with neither, the table is empty and only the exit
/// sentinel is recognised.
pub fn build_rules(
    cfg: &AppConfig,
    override_path: Option<&str>,
) -> Result<RuleTable, RulesSourceError> {
    match override_path.or(cfg.rules.path.as_deref()) {
        Some(raw) => load_rule_file(&expand_path(raw)),
        None => {
            tracing::warn!(
                target: "scriptbridge.rules",
                "no rule file configured, messages are only recorded"
            );
            Ok(RuleTable::new())
        }
    }
}

/// Pick an interpreter that exists on `PATH`.
///
/// Only the stock `python3` name falls back to `python`; explicit paths and
/// any other name are left for the spawn to report.
pub fn resolve_interpreter(mut cfg: InterpreterConfig) -> InterpreterConfig {
    let has_dir = Path::new(&cfg.path).components().count() > 1;
    if has_dir || which::which(&cfg.path).is_ok() {
        return cfg;
    }
    if cfg.path == "python3" && which::which("python").is_ok() {
        tracing::info!(
            target: "scriptbridge.interpreter",
            "python3 not found on PATH, using python"
        );
        cfg.path = "python".to_string();
    } else {
        tracing::warn!(
            target: "scriptbridge.interpreter",
            interpreter = %cfg.path,
            "interpreter not found on PATH"
        );
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_rule_source_gives_empty_table() {
        let cfg = AppConfig::default();
        let table = build_rules(&cfg, None).unwrap();
        assert!(table.is_empty());
        assert!(table.default_rule().is_none());
    }

    #[test]
    fn override_path_wins_over_config() {
        let dir = tempfile::tempdir().unwrap();
        let from_cfg = dir.path().join("cfg.toml");
        let from_cli = dir.path().join("cli.toml");
        std::fs::write(&from_cfg, "[[rule]]\npattern = \"cfg\"\n").unwrap();
        std::fs::write(&from_cli, "[[rule]]\npattern = \"cli\"\n[[rule]]\npattern = \"two\"\n")
            .unwrap();

        let mut cfg = AppConfig::default();
        cfg.rules.path = Some(from_cfg.display().to_string());
        assert_eq!(build_rules(&cfg, None).unwrap().len(), 1);

        let table = build_rules(&cfg, Some(&from_cli.display().to_string())).unwrap();
        assert_eq!(table.rules()[0].pattern.as_str(), "cli");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn explicit_interpreter_paths_are_kept() {
        let cfg = InterpreterConfig {
            path: "venv/bin/python".into(),
            ..InterpreterConfig::default()
        };
        assert_eq!(resolve_interpreter(cfg).path, "venv/bin/python");

        let missing = InterpreterConfig {
            path: "scriptbridge-no-such-python".into(),
            ..InterpreterConfig::default()
        };
        assert_eq!(resolve_interpreter(missing).path, "scriptbridge-no-such-python");
    }
}
