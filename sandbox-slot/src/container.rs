use chrono::{DateTime, Utc};
use sandbox::{Container, ContainerData, ContainerState, ContainerStatus, Result, SandboxError};
use tracing::debug;

use crate::resource::{ResourceProfile, extract};

/// A container that only records what it asked for.
#[derive(Debug)]
pub struct SlotContainer {
    id: String,
    sandbox_id: String,
    data: ContainerData,
    state: ContainerState,
    resource_profile: ResourceProfile,
    created_at: DateTime<Utc>,
}

impl SlotContainer {
    pub(crate) fn new(id: &str, sandbox_id: &str, data: ContainerData) -> Self {
        let resource_profile = extract(&data);
        debug!(id, sandbox_id, ?resource_profile, "container resource profile");
        Self {
            id: id.to_owned(),
            sandbox_id: sandbox_id.to_owned(),
            data,
            state: ContainerState::Created,
            resource_profile,
            created_at: Utc::now(),
        }
    }

    pub fn resource_profile(&self) -> &ResourceProfile {
        &self.resource_profile
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn status(&self) -> ContainerStatus {
        ContainerStatus {
            id: self.id.clone(),
            state: self.state,
            created_at: self.created_at,
        }
    }

    /// Replace data and profile; the lifecycle state is left alone.
    pub(crate) fn update(&mut self, data: ContainerData) {
        self.resource_profile = extract(&data);
        self.data = data;
        debug!(id = %self.id, resource_profile = ?self.resource_profile, "container resource profile updated");
    }

    pub(crate) fn start(&mut self) -> Result<()> {
        if self.state != ContainerState::Created {
            return Err(SandboxError::invalid_state(&self.id, "start", self.state));
        }
        self.state = ContainerState::Running;
        Ok(())
    }

    /// Stopping a stopped container succeeds.
    pub(crate) fn stop(&mut self) -> Result<()> {
        match self.state {
            ContainerState::Created | ContainerState::Running => {
                self.state = ContainerState::Stopped;
                Ok(())
            }
            ContainerState::Stopped => Ok(()),
            ContainerState::Removed => Err(SandboxError::invalid_state(&self.id, "stop", self.state)),
        }
    }

    pub(crate) fn mark_removed(&mut self) {
        self.state = ContainerState::Removed;
    }
}

impl Container for SlotContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn sandbox_id(&self) -> &str {
        &self.sandbox_id
    }

    fn state(&self) -> ContainerState {
        self.state
    }

    fn data(&self) -> &ContainerData {
        &self.data
    }
}
