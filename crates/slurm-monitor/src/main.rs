//! slurm-monitor: resilient, read-only Slurm cluster monitor.

mod app;
mod doctor;
mod dry_run;
mod preflight;

use clap::{CommandFactory, Parser};
use miette::{IntoDiagnostic, Result};
use slurm_monitor_cli::{Action, Cli, CliCommand};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(CliCommand::Completions { shell }) = &cli.command {
        clap_complete::generate(
            *shell,
            &mut Cli::command(),
            "slurm-monitor",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    init_tracing();

    let config = cli
        .into_config()
        .into_diagnostic()?
        .expect("completions handled above");

    match config.action {
        Action::Doctor => {
            doctor::run(&config, &mut std::io::stdout(), &doctor::SystemEnv)
                .await
                .into_diagnostic()?;
        }
        Action::DryRun => {
            dry_run::run(&config, &mut std::io::stdout()).into_diagnostic()?;
        }
        Action::Monitor => {
            app::run(config).await?;
        }
    }
    Ok(())
}

/// Logs go to stderr so they never mix with dashboard or report output.
/// `SLURM_MONITOR_LOG` overrides the default `warn` filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("SLURM_MONITOR_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
