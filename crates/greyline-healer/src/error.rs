//! Remediation port error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("provisioning failed: {0}")]
    Failed(String),

    #[error("provisioner quota exhausted: {0}")]
    QuotaExhausted(String),
}

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("membership change rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("alert delivery failed: {0}")]
    Delivery(String),
}
