use std::fmt;

use serde::{Deserialize, Serialize};

/// Power and deployment status reported for vApps, VMs, templates and media.
///
/// The numeric codes are the ones the vCloud Director API reports in the
/// `status` attribute of a resource entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    FailedCreation,
    Unresolved,
    Resolved,
    Deployed,
    Suspended,
    PoweredOn,
    WaitingForInput,
    Unknown,
    Unrecognized,
    PoweredOff,
    InconsistentState,
    Mixed,
}

impl EntityStatus {
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        let status = match code {
            -1 => Self::FailedCreation,
            0 => Self::Unresolved,
            1 => Self::Resolved,
            2 => Self::Deployed,
            3 => Self::Suspended,
            4 => Self::PoweredOn,
            5 => Self::WaitingForInput,
            6 => Self::Unknown,
            7 => Self::Unrecognized,
            8 => Self::PoweredOff,
            9 => Self::InconsistentState,
            10 => Self::Mixed,
            _ => return None,
        };
        Some(status)
    }

    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::FailedCreation => -1,
            Self::Unresolved => 0,
            Self::Resolved => 1,
            Self::Deployed => 2,
            Self::Suspended => 3,
            Self::PoweredOn => 4,
            Self::WaitingForInput => 5,
            Self::Unknown => 6,
            Self::Unrecognized => 7,
            Self::PoweredOff => 8,
            Self::InconsistentState => 9,
            Self::Mixed => 10,
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FailedCreation => "failed creation",
            Self::Unresolved => "unresolved",
            Self::Resolved => "resolved",
            Self::Deployed => "deployed",
            Self::Suspended => "suspended",
            Self::PoweredOn => "powered on",
            Self::WaitingForInput => "waiting for input",
            Self::Unknown => "unknown",
            Self::Unrecognized => "unrecognized",
            Self::PoweredOff => "powered off",
            Self::InconsistentState => "inconsistent state",
            Self::Mixed => "mixed",
        };
        write!(f, "{s}")
    }
}

/// Status of a remote task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Queued,
    PreRunning,
    Running,
    Success,
    Error,
    Canceled,
    Aborted,
}

impl TaskStatus {
    /// Whether the task will not change status any more.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Error | Self::Canceled | Self::Aborted
        )
    }

    /// Whether the task ended without doing its work.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Error | Self::Canceled | Self::Aborted)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::PreRunning => "preRunning",
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
            Self::Canceled => "canceled",
            Self::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}
