use std::path::PathBuf;
use std::sync::Arc;

use scriptbridge_core::api::{
    start_events_out, AppConfig, ArgumentMap, Runner, ScriptRequest, TracingNotifier, UiNotifier,
};
use scriptbridge_core::config::expand_path;
use scriptbridge_plugins::{build_interpreter_factory, build_rules, load_rule_file, resolve_interpreter};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::commands::cli::{CheckRulesArgs, RunArgs};
use crate::error::CliError;

pub async fn run_app(mut cfg: AppConfig, run_args: RunArgs) -> Result<i32, CliError> {
    let script_args = parse_arguments(run_args.args.as_deref())?;
    let rules = Arc::new(build_rules(&cfg, run_args.rules.as_deref())?);
    cfg.interpreter = resolve_interpreter(cfg.interpreter);
    let factory = build_interpreter_factory();

    let events_out = start_events_out(&cfg.events_out)
        .await
        .map_err(CliError::EventsOut)?;
    let notifier: Arc<dyn UiNotifier> = match &events_out {
        Some(out) => Arc::new(out.tx()),
        None => Arc::new(TracingNotifier),
    };

    let cwd = match run_args.cwd.as_deref() {
        Some(dir) => expand_path(dir),
        None => std::env::current_dir().map_err(CliError::WorkingDir)?,
    };
    let request = ScriptRequest {
        script: PathBuf::from(run_args.script),
        cwd,
        argv: run_args.argv,
    };

    let mut runner = Runner::new(cfg, rules, factory, notifier);
    if let Some(out) = &events_out {
        runner = runner.with_events_out(out.tx());
    }

    let (cancel_tx, cancel_rx) = oneshot::channel();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(target: "scriptbridge.cli", "interrupt received, cancelling run");
            let _ = cancel_tx.send(());
        }
    });

    let report = runner.run_script_with_cancel(request, script_args, cancel_rx).await;
    ctrl_c.abort();
    // Release every events_out sender before waiting on the writer.
    drop(runner);
    let printed_by_events_out = events_out.is_some();
    if let Some(out) = events_out {
        let dropped = out.tx().dropped_count();
        if dropped > 0 {
            tracing::warn!(target: "scriptbridge.cli", dropped, "events_out dropped records");
        }
        out.close().await;
    }

    match report.result {
        Ok(value) => {
            tracing::info!(
                target: "scriptbridge.cli",
                run_id = %report.run_id,
                messages = report.history.len(),
                "script finished"
            );
            if !printed_by_events_out {
                if let Some(value) = value {
                    println!("{value}");
                }
            }
            Ok(0)
        }
        Err(err) => {
            tracing::error!(
                target: "scriptbridge.cli",
                run_id = %report.run_id,
                kind = err.kind(),
                error = %err,
                "script failed"
            );
            eprintln!("scriptbridge: {err}");
            Ok(1)
        }
    }
}

pub fn check_rules(args: CheckRulesArgs) -> Result<i32, CliError> {
    let table = load_rule_file(&expand_path(&args.path))?;
    for rule in table.rules() {
        let kind = if rule.pattern.is_regex() { "regex" } else { "literal" };
        println!("{kind:<8} {}", rule.pattern.as_str());
    }
    if table.default_rule().is_some() {
        println!("default  (fallback)");
    }
    println!("{} rule(s) ok", table.len());
    Ok(0)
}

fn parse_arguments(raw: Option<&str>) -> Result<ArgumentMap, CliError> {
    let Some(raw) = raw else {
        return Ok(ArgumentMap::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CliError::Arguments(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(CliError::Arguments(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arguments_must_be_an_object() {
        assert!(parse_arguments(None).unwrap().is_empty());
        let map = parse_arguments(Some(r#"{"user":"ada","n":2}"#)).unwrap();
        assert_eq!(map.get("n"), Some(&json!(2)));
        assert!(matches!(
            parse_arguments(Some("[1,2]")),
            Err(CliError::Arguments(_))
        ));
        assert!(matches!(
            parse_arguments(Some("{not json")),
            Err(CliError::Arguments(_))
        ));
    }
}
