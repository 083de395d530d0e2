#![doc = include_str!("../README.md")]

mod cli;

use clap::Parser;
use cli::commands::execute;
use cli::config::{CliArgs, RunConfig};
use cli::telemetry::init_telemetry;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    init_telemetry()?;

    #[cfg(feature = "tracing")]
    tracing::debug!(?config, "starting");

    let output = execute(&config)?;
    println!("{output}");
    Ok(())
}
