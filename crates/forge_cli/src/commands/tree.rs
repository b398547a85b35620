//! Tree command - merge a build response into a file tree.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use forge_core::{apply_pending_steps, parse_build_steps, to_mount_tree, write_to_dir, FileItem};

use crate::ExitCodes;

#[derive(Args)]
pub struct TreeArgs {
    /// Response file to merge (`-` for stdin)
    file: PathBuf,

    /// Write the tree to this directory
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Print the sandbox mount structure instead of the tree listing
    #[arg(long)]
    mount: bool,
}

pub async fn execute(args: TreeArgs) -> Result<u8> {
    let response = super::read_input(&args.file)?;
    let steps = parse_build_steps(&response);

    let files = match apply_pending_steps(&steps, &[]) {
        Some(outcome) => {
            info!("Merged {} of {} step(s)", outcome.applied, steps.len());
            outcome.files
        }
        None => {
            warn!("No file actions found in {:?}", args.file);
            Vec::new()
        }
    };

    if args.mount {
        let mount = to_mount_tree(&files);
        println!(
            "{}",
            serde_json::to_string_pretty(&mount).context("Failed to serialize mount tree")?
        );
    } else {
        print!("{}", listing(&files));
    }

    if let Some(out) = args.out {
        let written = write_to_dir(&files, &out)
            .with_context(|| format!("Failed to write tree to {:?}", out))?;
        println!("Wrote {} file(s) to {}", written.len(), out.display());
    }

    Ok(ExitCodes::SUCCESS)
}

fn listing(files: &[FileItem]) -> String {
    let mut out = String::new();
    push_level(files, 0, &mut out);
    out
}

fn push_level(files: &[FileItem], depth: usize, out: &mut String) {
    for node in files {
        let suffix = if node.is_folder() { "/" } else { "" };
        out.push_str(&format!("{}{}{}\n", "  ".repeat(depth), node.name, suffix));
        push_level(node.children(), depth + 1, out);
    }
}
