use crate::{PortProtocol, WorkloadKey};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures that prevent an evaluation from proceeding.
///
/// Per-job port resolution failures are not errors: they are collected in [`crate::Jobs`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid probe configuration: {0}")]
    InvalidProbeConfig(String),

    #[error("invalid network policy {policy}: {reason}")]
    InvalidPolicy { policy: String, reason: String },

    #[error("workload {0} has no IP address")]
    MissingIp(WorkloadKey),

    #[error("namespace {0} already exists")]
    DuplicateNamespace(String),

    #[error("namespace {0} does not exist")]
    UnknownNamespace(String),

    #[error("workload {0} already exists")]
    DuplicateWorkload(WorkloadKey),

    #[error("workload {0} does not exist")]
    UnknownWorkload(WorkloadKey),

    #[error("no expected outcome for {from} -> {to} on {port}")]
    MissingExpectation {
        from: WorkloadKey,
        to: WorkloadKey,
        port: PortProtocol,
    },
}

impl Error {
    pub(crate) fn invalid_policy(policy: impl ToString, reason: impl ToString) -> Self {
        Self::InvalidPolicy {
            policy: policy.to_string(),
            reason: reason.to_string(),
        }
    }
}
