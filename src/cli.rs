use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long)] // default handled in main.rs
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run one fetch, load and transform cycle now
    Run,
    /// Run on the configured cron schedule until Ctrl-C
    Daemon,
    /// Fetch the latest quote and print the row as JSON without loading it
    Fetch,
    /// Fetch and load the quote, skipping the transform step
    Load,
    /// Run only the transform step
    Transform,
    /// Print the next fire times of the schedule
    Schedule {
        /// Number of fire times to print
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },
}
