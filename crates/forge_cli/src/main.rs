//! SiteForge CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Configuration error
//! - 4: Template error
//! - 5: Generation error
//! - 130: Build cancelled

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use forge_session::ForgeConfig;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CONFIG_ERROR: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
    pub const GENERATION_ERROR: u8 = 5;
    pub const CANCELLED: u8 = 130;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ForgeConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(ExitCodes::CONFIG_ERROR);
        }
    };

    if config.features.enable_logging && !cli.quiet {
        init_logging(cli.verbose);
    }

    let result = match cli.command {
        Commands::Parse(args) => commands::parse::execute(args).await,
        Commands::Tree(args) => commands::tree::execute(args).await,
        Commands::Build(args) => commands::build::execute(args, config).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "forge=debug" } else { "forge=info" };
    let mut filter = EnvFilter::from_default_env();
    for directive in [default, "warn"] {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }

    // Ignore the error if a subscriber is already installed
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init();
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let msg = e.to_string().to_lowercase();

    if msg.contains("configuration") {
        ExitCodes::CONFIG_ERROR
    } else if msg.contains("template") {
        ExitCodes::TEMPLATE_ERROR
    } else if msg.contains("generate") {
        ExitCodes::GENERATION_ERROR
    } else if msg.contains("argument") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_error() {
        let e = anyhow::anyhow!("Failed to fetch template: Bad Gateway");
        assert_eq!(categorize_error(&e), ExitCodes::TEMPLATE_ERROR);

        let e = anyhow::anyhow!("Failed to generate build steps: timeout");
        assert_eq!(categorize_error(&e), ExitCodes::GENERATION_ERROR);

        let e = anyhow::anyhow!("disk full");
        assert_eq!(categorize_error(&e), ExitCodes::GENERAL_ERROR);
    }
}
