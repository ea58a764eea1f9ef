use chrono::{DateTime, Utc};
use serde::Serialize;

/// Sandbox lifecycle: `Created -> Running -> Stopped -> Deleted`.
///
/// `Created -> Stopped` is also legal (a sandbox stopped before it ever ran).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxState {
    Created,
    Running,
    Stopped,
    Deleted,
}

impl std::fmt::Display for SandboxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Running => f.write_str("running"),
            Self::Stopped => f.write_str("stopped"),
            Self::Deleted => f.write_str("deleted"),
        }
    }
}

/// Container lifecycle: `Created -> Running -> Stopped -> Removed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Stopped,
    Removed,
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Running => f.write_str("running"),
            Self::Stopped => f.write_str("stopped"),
            Self::Removed => f.write_str("removed"),
        }
    }
}

/// Point-in-time view of a sandbox, returned by `status` and written to
/// `status.json` by backends that persist lifecycle metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SandboxStatus {
    pub id: String,
    pub state: SandboxState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    /// Sorted by container id.
    pub containers: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerStatus {
    pub id: String,
    pub state: ContainerState,
    pub created_at: DateTime<Utc>,
}
