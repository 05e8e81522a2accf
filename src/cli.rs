// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the subcommands and global options.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quickcd")]
#[command(about = "Continuous deployment driven by a GitHub repository's event feed")]
#[command(version)]
pub struct Cli {
    /// Path to the config file (default: discover quickcd.yml in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a quickcd.yml template in the current directory
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Run the control loop until interrupted
    Run,

    /// Run a single fetch cycle
    Fetch,

    /// Dispatch pending events until nothing is runnable
    Drain,
}
