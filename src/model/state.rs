//! Remote agent state lattice.

use serde::{Deserialize, Serialize};

/// State of a remote agent run, mirrored onto the owning job.
///
/// A job's status re-enters the active set only through a new launch
/// (e.g. a fallback re-launch), never as a side effect of polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Remote agent is being provisioned.
    Creating,
    /// Remote agent is working.
    Running,
    /// Remote agent finished successfully.
    Finished,
    /// Remote agent (or a dispatch on its behalf) failed.
    Error,
    /// Remote agent timed out on the remote side.
    Expired,
}

impl AgentState {
    /// Check if the run is still progressing.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Creating | Self::Running)
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Check if the run ended successfully.
    pub fn is_successful(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Check if the run ended in failure.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Error | Self::Expired)
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Creating => "creating",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Error => "error",
            Self::Expired => "expired",
        };
        write!(f, "{s}")
    }
}
