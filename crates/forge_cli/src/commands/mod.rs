//! CLI command definitions.
//!
//! Each subcommand maps to one stage of the build pipeline: parsing a
//! response, materializing a file tree, or running a full build session.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod build;
pub mod parse;
pub mod tree;

/// SiteForge - prompt-to-project build pipeline
#[derive(Parser)]
#[command(name = "forge")]
#[command(version, about = "SiteForge - prompt-to-project build pipeline")]
#[command(long_about = r#"
SiteForge turns a natural-language prompt into a project file tree by
classifying the prompt against a template, generating the remaining files,
and folding every file action into a virtual tree.

COMMANDS:
  parse   → Parse a build response into ordered steps
  tree    → Merge a build response into a file tree
  build   → Run a full build session against the API

EXIT CODES:
  0   - Success
  1   - General error
  2   - Invalid arguments
  3   - Configuration error
  4   - Template error
  5   - Generation error
  130 - Build cancelled
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "FORGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a build response into steps
    Parse(parse::ParseArgs),

    /// Merge a build response into a file tree
    Tree(tree::TreeArgs),

    /// Run a build session for a prompt
    Build(build::BuildArgs),
}

/// Read a response file, or stdin when the path is `-`.
pub fn read_input(path: &std::path::Path) -> anyhow::Result<String> {
    use anyhow::Context;
    use std::io::Read;

    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Response file not found: {:?}", path))
}
