//! Subcommand handlers.

use crate::cli::{Cli, Commands, ReportArgs};
use crate::output;
use anyhow::{Context, Result};
use tracing::{info, warn};
use vigil::probes::{default_registry, DEFAULT_PROBE_ORDER};
use vigil::{Config, ConnectivityMode, Orchestrator};
use vigil_shared::VigilError;

pub async fn dispatch(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Report(args) => report(config, &args).await,
        Commands::Probes => probes(&config),
        Commands::Matrix { mode } => matrix(config, mode).await,
        Commands::Config => show_config(&config),
    }
}

/// Exit code for a failed command
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<VigilError>()
        .map(|e| e.exit_code())
        .unwrap_or(1) as u8
}

/// Cancel the run on Ctrl-C; running probes finish and cleanup runs
fn cancel_on_interrupt(orchestrator: &Orchestrator) {
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, waiting for running probes and cleaning up");
            cancel.cancel();
        }
    });
}

pub async fn report(mut config: Config, args: &ReportArgs) -> Result<()> {
    args.apply(&mut config);
    let orchestrator = Orchestrator::from_config(config)?;
    info!(
        "Probes: {}",
        orchestrator.registry().names().join(", ")
    );
    cancel_on_interrupt(&orchestrator);

    let summary = orchestrator.run().await?;
    output::print_summary(&summary);
    Ok(())
}

pub fn probes(config: &Config) -> Result<()> {
    let mut catalog = config.clone();
    catalog.probes.enabled = DEFAULT_PROBE_ORDER.iter().map(|s| s.to_string()).collect();
    let registry = default_registry(&catalog)?;
    print!(
        "{}",
        output::probe_list(&registry.entries(), &config.probes.enabled)
    );
    Ok(())
}

pub async fn matrix(config: Config, mode: Option<ConnectivityMode>) -> Result<()> {
    let mode = mode.unwrap_or(config.connectivity.mode);
    let orchestrator = Orchestrator::from_config(config)?;
    cancel_on_interrupt(&orchestrator);

    let (matrix, cleanup) = orchestrator.connectivity_matrix(mode).await?;
    println!("{}", matrix.grid());
    let unreachable: Vec<_> = matrix.unreachable().map(|e| e.label()).collect();
    if unreachable.is_empty() {
        println!("All {} edge(s) reachable", matrix.edges().len());
    } else {
        println!("Unreachable: {}", unreachable.join(", "));
    }
    if !matrix.is_complete() {
        println!(
            "{} of {} edge(s) not tested: run cancelled",
            matrix.untested(),
            matrix.planned()
        );
    }
    output::print_cleanup(&cleanup);
    Ok(())
}

pub fn show_config(config: &Config) -> Result<()> {
    let text = config.to_toml().context("cannot serialize configuration")?;
    print!("{}", text);
    Ok(())
}
