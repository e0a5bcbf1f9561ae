//! vigilctl - run cluster health probes and write the diagnostic report.

use clap::Parser;
use owo_colors::OwoColorize;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vigilctl::cli::Cli;
use vigilctl::commands;

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // stdout carries listings and TOML
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match commands::dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            ExitCode::from(commands::exit_code(&e))
        }
    }
}
