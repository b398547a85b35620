//! Parse command - print the steps of a build response.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::info;

use forge_core::{parse_build_steps, BuildStep};

use crate::ExitCodes;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(Args)]
pub struct ParseArgs {
    /// Response file to parse (`-` for stdin)
    file: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

pub async fn execute(args: ParseArgs) -> Result<u8> {
    let response = super::read_input(&args.file)?;
    let steps = parse_build_steps(&response);
    info!("Parsed {} step(s) from {:?}", steps.len(), args.file);

    println!("{}", render(&steps, args.format)?);
    Ok(ExitCodes::SUCCESS)
}

fn render(steps: &[BuildStep], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(steps).context("Failed to serialize steps"),
        OutputFormat::Yaml => serde_yaml::to_string(steps).context("Failed to serialize steps"),
    }
}
