//! Command line definition.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use vigil::{Config, ConnectivityMode};

#[derive(Parser, Debug)]
#[command(name = "vigilctl")]
#[command(about = "Vigil - cluster health checks and diagnostic reports", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: $VIGIL_CONFIG, /etc/vigil/config.toml, user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the probes and write the report
    Report(ReportArgs),

    /// List the probes in report order
    Probes,

    /// Test node-to-node connectivity and print the grid
    Matrix {
        /// all-pairs or role-partitioned (default from config)
        #[arg(long)]
        mode: Option<ConnectivityMode>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug, Default)]
pub struct ReportArgs {
    /// Comma separated probe names; report order stays the catalog order
    #[arg(long, value_delimiter = ',')]
    pub probes: Vec<String>,

    /// Probes running at once (1 = sequential)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Per-command timeout
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory the report is written to
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Stop starting probes after this long; cleanup still runs
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Also write the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl ReportArgs {
    /// Flags override the config file
    pub fn apply(&self, config: &mut Config) {
        if !self.probes.is_empty() {
            config.probes.enabled = self.probes.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.run.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.run.command_timeout_secs = timeout;
        }
        if let Some(dir) = &self.output_dir {
            config.run.output_dir = dir.clone();
        }
        if let Some(deadline) = self.deadline {
            config.run.deadline_secs = Some(deadline);
        }
        if self.json {
            config.run.write_json = true;
        }
    }
}
