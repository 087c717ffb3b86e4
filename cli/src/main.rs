use clap::Parser;
mod app;
mod commands;
mod error;
mod logging;
use commands::cli;
use scriptbridge_core::config;

#[tokio::main]
async fn main() -> Result<(), error::CliError> {
    let args = cli::Args::parse();
    let cfg = config::load(args.config.as_deref())?;
    let log_guard = logging::init(&cfg.logging, args.log_level.as_deref())?;

    let exit = match args.command {
        cli::Commands::Run(run_args) => app::run_app(cfg, run_args).await?,
        cli::Commands::CheckRules(check_args) => app::check_rules(check_args)?,
    };
    drop(log_guard);
    std::process::exit(exit);
}
