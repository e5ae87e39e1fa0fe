//! Container lifecycle state machine
//!
//! Created -> Running -> Stopped -> Removed. A created container may also be
//! discarded without ever running. The daemon reports richer statuses; they
//! are folded onto these four states.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerState {
    Created,
    Running,
    Stopped,
    Removed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Invalid container transition: {from} -> {to}")]
    InvalidTransition {
        from: ContainerState,
        to: ContainerState,
    },
}

impl ContainerState {
    /// Whether the runtime may move a container from `self` to `next`
    pub fn can_transition_to(self, next: ContainerState) -> bool {
        use ContainerState::*;
        matches!(
            (self, next),
            (Created, Running) | (Running, Stopped) | (Stopped, Removed) | (Created, Removed)
        )
    }

    /// Validate and perform a transition
    pub fn transition(self, next: ContainerState) -> Result<ContainerState, LifecycleError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(LifecycleError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Map a daemon status string; `None` means the container is gone
    pub fn from_docker_status(status: Option<&str>) -> ContainerState {
        match status.map(str::to_lowercase).as_deref() {
            None => ContainerState::Removed,
            Some("created") => ContainerState::Created,
            Some("running" | "paused" | "restarting") => ContainerState::Running,
            Some("exited" | "dead" | "removing") => ContainerState::Stopped,
            Some(_) => ContainerState::Stopped,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Stopped => "stopped",
            ContainerState::Removed => "removed",
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
