//! Consensus group membership changes.

use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::MembershipError;

/// How peers are added to and removed from the consensus group.
#[derive(Debug, Clone)]
pub enum MembershipBackend {
    /// Wait `delay` and log the change.
    Simulated { delay: Duration },
    /// Run an admin tool, e.g. `raft-cli add-peer {address}`. `{address}` in
    /// any argument is replaced with the peer address.
    Command { join: Vec<String>, leave: Vec<String> },
}

impl MembershipBackend {
    pub async fn join(&self, address: &str) -> Result<(), MembershipError> {
        info!(%address, "adding peer to consensus group");
        match self {
            MembershipBackend::Simulated { delay } => simulate(*delay).await,
            MembershipBackend::Command { join, .. } => run(join, address).await?,
        }
        info!(%address, "peer joined");
        Ok(())
    }

    pub async fn leave(&self, address: &str) -> Result<(), MembershipError> {
        info!(%address, "removing peer from consensus group");
        match self {
            MembershipBackend::Simulated { delay } => simulate(*delay).await,
            MembershipBackend::Command { leave, .. } => run(leave, address).await?,
        }
        info!(%address, "peer removed");
        Ok(())
    }
}

async fn simulate(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

async fn run(argv: &[String], address: &str) -> Result<(), MembershipError> {
    let args: Vec<String> = argv.iter().map(|a| a.replace("{address}", address)).collect();
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| MembershipError::Rejected("empty membership command".into()))?;
    let command = args.join(" ");

    debug!(%command, "running membership command");
    let output = Command::new(program)
        .args(rest)
        .output()
        .await
        .map_err(|source| MembershipError::Spawn {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(MembershipError::CommandFailed {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}
