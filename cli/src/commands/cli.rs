use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Drive long-running logic scripts over stdio")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file; defaults to ./scriptbridge.toml, then ~/.scriptbridge/config.toml.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log filter used when RUST_LOG is not set (overrides `[logging].level`).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Script to run, relative to `--cwd`.
    #[arg(long)]
    pub script: String,

    /// Working directory for the interpreter (defaults to the current one).
    #[arg(long)]
    pub cwd: Option<String>,

    /// Arguments visible to rule callbacks, as a JSON object.
    #[arg(long)]
    pub args: Option<String>,

    /// Rule file; overrides `[rules].path`.
    #[arg(long)]
    pub rules: Option<String>,

    /// Positional arguments passed to the script after `--`.
    #[arg(last = true)]
    pub argv: Vec<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CheckRulesArgs {
    pub path: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    Run(RunArgs),
    /// Compile a rule file and list its patterns.
    CheckRules(CheckRulesArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_collects_trailing_script_arguments() {
        let args = Args::try_parse_from([
            "scriptbridge",
            "run",
            "--script",
            "logic/main.py",
            "--args",
            r#"{"user":"ada"}"#,
            "--",
            "--mode",
            "fast",
        ])
        .unwrap();
        let Commands::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.script, "logic/main.py");
        assert_eq!(run.args.as_deref(), Some(r#"{"user":"ada"}"#));
        assert_eq!(run.argv, vec!["--mode", "fast"]);
        assert!(run.cwd.is_none());
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let args =
            Args::try_parse_from(["scriptbridge", "check-rules", "rules.toml", "--config", "c.toml"])
                .unwrap();
        assert_eq!(args.config.as_deref(), Some("c.toml"));
        assert!(matches!(args.command, Commands::CheckRules(ref c) if c.path == "rules.toml"));
    }

    #[test]
    fn script_is_required() {
        assert!(Args::try_parse_from(["scriptbridge", "run"]).is_err());
    }
}
