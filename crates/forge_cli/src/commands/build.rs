//! Build command - run a full build session against the API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::watch;
use tracing::{info, warn};

use forge_client::HttpBackend;
use forge_core::{file_count, write_to_dir, SessionStatus};
use forge_session::{BuildState, ForgeConfig, Orchestrator, Services};

use crate::ExitCodes;

#[derive(Args)]
pub struct BuildArgs {
    /// What to build
    #[arg(short, long)]
    prompt: String,

    /// Write the generated tree to this directory
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Chat retries after a failed generation
    #[arg(long, default_value_t = 1)]
    retries: u32,
}

pub async fn execute(args: BuildArgs, mut config: ForgeConfig) -> Result<u8> {
    if let Some(url) = args.api_url {
        config = config.base_url(url);
    }
    config.validate()?;

    let backend = HttpBackend::with_timeout(&config.api.base_url, config.api.timeout())
        .context("Failed to create HTTP client")?;
    let services = Services::from_features(&config.features);
    let orchestrator =
        Orchestrator::from_config(args.prompt, Arc::new(backend), services.clone(), &config);

    info!("Building against {}", config.api.base_url);

    let machine = orchestrator.machine().clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling build");
            machine.cancel_session();
        }
    });

    let mut rx = orchestrator.subscribe();
    let mut printer = ProgressPrinter::default();

    orchestrator.run().await;
    let mut state = wait_until_settled(&mut rx, &mut printer).await;

    let mut retries = args.retries;
    while retries > 0 && state.status() == Some(SessionStatus::Building) && state.error.is_some() {
        retries -= 1;
        warn!("Generation failed, retrying ({} left)", retries);
        orchestrator.retry().await?;
        state = wait_until_settled(&mut rx, &mut printer).await;
    }

    ctrl_c.abort();
    orchestrator.machine().shutdown();
    services.shutdown();

    let Some(session) = state.session else {
        anyhow::bail!("Build produced no session");
    };

    match session.status {
        SessionStatus::Completed => {
            println!(
                "Build completed: {} step(s), {} file(s)",
                session.steps.len(),
                file_count(&session.files)
            );
            if let Some(out) = args.out {
                let written = write_to_dir(&session.files, &out)
                    .with_context(|| format!("Failed to write tree to {:?}", out))?;
                println!("Wrote {} file(s) to {}", written.len(), out.display());
            }
            Ok(ExitCodes::SUCCESS)
        }
        SessionStatus::Cancelled => {
            println!("Build cancelled");
            Ok(ExitCodes::CANCELLED)
        }
        _ => {
            let message = state
                .error
                .unwrap_or_else(|| format!("Build ended in state {}", session.status));
            anyhow::bail!(message)
        }
    }
}

/// Wait for a terminal state, or for a routed error once nothing is running.
async fn wait_until_settled(
    rx: &mut watch::Receiver<BuildState>,
    printer: &mut ProgressPrinter,
) -> BuildState {
    loop {
        {
            let state = rx.borrow_and_update();
            printer.print(&state);
            if is_settled(&state) {
                return state.clone();
            }
        }
        if rx.changed().await.is_err() {
            return rx.borrow().clone();
        }
    }
}

fn is_settled(state: &BuildState) -> bool {
    match state.status() {
        Some(status) if status.is_terminal() => true,
        Some(_) => state.error.is_some() && !state.is_building && !state.chat_loading,
        None => false,
    }
}

/// Prints one line per visible change.
#[derive(Default)]
struct ProgressPrinter {
    last: Option<String>,
}

impl ProgressPrinter {
    fn print(&mut self, state: &BuildState) {
        let Some(line) = progress_line(state) else {
            return;
        };
        if self.last.as_ref() != Some(&line) {
            println!("{}", line);
            self.last = Some(line);
        }
    }
}

fn progress_line(state: &BuildState) -> Option<String> {
    let status = state.status()?;
    let mut line = format!("[{}] {:>3}%", status, state.build_progress);
    if state.chat_loading {
        line.push_str(&format!(" | generating ({}s left)", state.remaining_seconds));
    } else if state.chat_timed_out {
        line.push_str(" | generation is taking longer than expected");
    }
    Some(line)
}
