// ABOUTME: Entry point for the quickcd CLI application.
// ABOUTME: Parses arguments, sets up logging and drives the control loop.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use quickcd::config::{self, Config};
use quickcd::control::ControlLoop;
use quickcd::error::{Error, Result};
use quickcd::shutdown::{Shutdown, listen_for_signals};
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Init { force } = cli.command {
        let cwd = env::current_dir()?;
        config::init_config(&cwd, force)?;
        println!("Wrote {}", cwd.join(config::CONFIG_FILENAME).display());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let shutdown = Shutdown::new();
    let mut control = ControlLoop::from_config(&config, shutdown.clone())?;

    match cli.command {
        Commands::Run => {
            listen_for_signals(shutdown)?;
            println!(
                "Watching {}/{} for {} ({} handler(s))",
                config.github.org,
                config.github.repo,
                config.cluster_id(),
                control.registry().len()
            );
            control.run().await?;
            println!("Clean exit.");
        }
        Commands::Fetch => {
            let changed = control.fetch_cycle().await?;
            println!(
                "{}",
                if changed {
                    "Persisted new events."
                } else {
                    "No new events."
                }
            );
        }
        Commands::Drain => {
            if control.registry().is_empty() {
                return Err(Error::NoHandlers);
            }
            control.start().await?;
            listen_for_signals(shutdown)?;
            let steps = control.drain().await?;
            println!("Dispatched {steps} step(s).");
        }
        Commands::Init { .. } => {}
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::discover(&env::current_dir()?),
    }
}
