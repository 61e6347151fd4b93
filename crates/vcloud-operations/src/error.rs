use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use vcloud_config::OperationClass;
use vcloud_core::{LinkRel, TaskStatus};
use vcloud_saga::{SagaError, StateError, Transient};

#[derive(Debug, Error)]
pub enum CloudError {
    #[error(transparent)]
    Config(#[from] vcloud_config::ConfigError),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("vApp '{name}' is suspended")]
    VAppSuspended { name: String },

    #[error("VM '{name}' is suspended")]
    VmSuspended { name: String },

    #[error("remote API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {}s waiting for {target} ({class})", limit.as_secs())]
    Timeout {
        target: String,
        class: OperationClass,
        limit: Duration,
    },

    #[error("task '{operation}' on {target} ended as {status}: {message}")]
    TaskFailed {
        target: String,
        operation: String,
        status: TaskStatus,
        message: String,
    },

    #[error("invalid number of VMs in vApp '{vapp}': expected 1, found {count}")]
    InvalidVmCount { vapp: String, count: usize },

    #[error("expected exactly one new disk on VM '{vm}', found {found}")]
    UnexpectedDiskCount { vm: String, found: usize },

    #[error("VM '{vm}' has no system disk")]
    MissingSystemDisk { vm: String },

    #[error("'{entity}' does not offer a {rel:?} link")]
    MissingLink { entity: String, rel: LinkRel },

    #[error("configured network '{network}' is not accessible to VDC '{vdc}'")]
    NetworkNotAccessible { network: String, vdc: String },

    #[error("workflow state error")]
    State(#[from] StateError),

    #[error("invalid stemcell at '{path}': {reason}")]
    InvalidStemcell { path: PathBuf, reason: String },

    #[error("invalid agent environment")]
    AgentEnv(#[from] serde_json::Error),

    #[error("failed to build configuration image: {0}")]
    IsoBuild(String),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("client session lock poisoned")]
    SessionPoisoned,

    #[error("{0} is not supported")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, CloudError>;

impl CloudError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::VAppSuspended { .. } | Self::VmSuspended { .. })
    }
}

impl Transient for CloudError {
    fn is_transient(&self) -> bool {
        match self {
            Self::VAppSuspended { .. }
            | Self::VmSuspended { .. }
            | Self::Transport(_)
            | Self::Timeout { .. }
            | Self::TaskFailed { .. } => true,
            Self::Api { status, .. } => *status >= 500 || *status == 409,
            _ => false,
        }
    }
}

/// Rollback failures have been logged by the transaction; callers only see
/// the error that triggered the rollback.
impl From<SagaError<CloudError>> for CloudError {
    fn from(err: SagaError<CloudError>) -> Self {
        err.into_source()
    }
}
