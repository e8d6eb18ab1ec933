//! Command-line argument definitions using Clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::models::Subsystem;

/// sysmark - whole-system benchmark
#[derive(Parser, Debug)]
#[command(name = "sysmark")]
#[command(version, about = "Benchmark CPU, GPU, RAM, SSD and neural workloads")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (defaults to the standard location)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run benchmarks in the console (default when no command given)
    Run(RunArgs),

    /// Open the interactive terminal UI
    Tui,

    /// Show saved results
    History(HistoryArgs),

    /// Show or initialise the configuration file
    Config(ConfigArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Only run these subsystems, in the order given (e.g. cpu,ram)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<Subsystem>,

    /// Use small parameters that finish in seconds
    #[arg(long)]
    pub quick: bool,

    /// Do not append results to the history file
    #[arg(long)]
    pub no_save: bool,
}

impl RunArgs {
    /// Subsystems to run, all of them when none were selected
    pub fn subsystems(&self) -> Vec<Subsystem> {
        if self.only.is_empty() {
            Subsystem::ALL.to_vec()
        } else {
            let mut selected = Vec::new();
            for &subsystem in &self.only {
                if !selected.contains(&subsystem) {
                    selected.push(subsystem);
                }
            }
            selected
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Number of most recent results to show
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,

    /// Only show results of this subsystem
    #[arg(long)]
    pub subsystem: Option<Subsystem>,

    /// Delete every saved result
    #[arg(long, conflicts_with_all = ["limit", "subsystem"])]
    pub clear: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Write the default configuration if no file exists yet
    #[arg(long)]
    pub init: bool,
}
