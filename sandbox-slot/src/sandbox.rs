use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sandbox::{
    Container, ContainerData, ContainerState, ExitSignal, Result, Sandbox, SandboxData,
    SandboxError, SandboxState, SandboxStatus,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::container::SlotContainer;
use crate::persist::ArtifactLog;
use crate::resource::{ResourceProfile, extract};

/// A sandbox that tracks its declared resources and lifecycle without
/// allocating anything.
#[derive(Debug)]
pub struct SlotSandbox {
    id: String,
    data: SandboxData,
    state: SandboxState,
    resource_profile: ResourceProfile,
    containers: HashMap<String, SlotContainer>,
    exit_signal: Arc<ExitSignal>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    artifacts: Arc<Mutex<ArtifactLog>>,
}

impl SlotSandbox {
    pub(crate) fn new(id: &str, data: SandboxData) -> Self {
        let resource_profile = extract(&data);
        debug!(id, ?resource_profile, "sandbox resource profile");
        Self {
            id: id.to_owned(),
            data,
            state: SandboxState::Created,
            resource_profile,
            containers: HashMap::new(),
            exit_signal: Arc::new(ExitSignal::new()),
            created_at: Utc::now(),
            started_at: None,
            stopped_at: None,
            artifacts: Arc::default(),
        }
    }

    pub fn resource_profile(&self) -> &ResourceProfile {
        &self.resource_profile
    }

    /// Most recent failed artifact write, kept for diagnostics only.
    pub async fn last_persist_error(&self) -> Option<String> {
        self.artifacts.lock().await.last_error().map(str::to_owned)
    }

    /// Take the artifact write slot. Call with the sandbox lock held so writes
    /// queue up in transition order.
    pub(crate) async fn lock_artifacts(&self) -> OwnedMutexGuard<ArtifactLog> {
        Arc::clone(&self.artifacts).lock_owned().await
    }

    fn ensure_not_deleted(&self, op: &'static str) -> Result<()> {
        if self.state == SandboxState::Deleted {
            return Err(SandboxError::invalid_state(&self.id, op, self.state));
        }
        Ok(())
    }

    fn container_mut(&mut self, id: &str) -> Result<&mut SlotContainer> {
        self.containers
            .get_mut(id)
            .ok_or_else(|| SandboxError::NotFound(id.to_owned()))
    }

    pub(crate) fn start(&mut self) -> Result<()> {
        if self.state != SandboxState::Created {
            return Err(SandboxError::invalid_state(&self.id, "start", self.state));
        }
        self.state = SandboxState::Running;
        self.started_at = Some(Utc::now());

        let profile = &self.resource_profile;
        info!(
            id = %self.id,
            cpu_limit = ?profile.cpu_limit_cores(),
            memory_limit = ?profile.memory_limit_bytes(),
            pid_limit = ?profile.pid_limit(),
            "simulated resource reservation"
        );
        Ok(())
    }

    /// Replace the request payload and re-derive the profile.
    pub(crate) fn update(&mut self, data: SandboxData) -> Result<()> {
        self.ensure_not_deleted("update")?;
        self.resource_profile = extract(&data);
        self.data = data;
        debug!(id = %self.id, resource_profile = ?self.resource_profile, "sandbox resource profile updated");
        Ok(())
    }

    /// Returns `false` when the sandbox was already stopped (or deleted).
    pub(crate) fn stop(&mut self, force: bool) -> Result<bool> {
        match self.state {
            SandboxState::Stopped | SandboxState::Deleted => return Ok(false),
            SandboxState::Created | SandboxState::Running => {}
        }

        if !force {
            let running = self
                .containers
                .values()
                .filter(|c| c.state() == ContainerState::Running)
                .count();
            if running > 0 {
                return Err(SandboxError::invalid_state(
                    &self.id,
                    "stop",
                    format!("{} with {running} running container(s)", self.state),
                ));
            }
        }

        self.state = SandboxState::Stopped;
        self.stopped_at = Some(Utc::now());
        Ok(true)
    }

    /// Move to `Deleted`. Without `force` only a stopped sandbox may go.
    ///
    /// Does not fire the exit signal: the registry fires it once the record is
    /// out of the map.
    pub(crate) fn mark_deleted(&mut self, force: bool) -> Result<()> {
        self.ensure_not_deleted("delete")?;
        if !force && self.state != SandboxState::Stopped {
            return Err(SandboxError::invalid_state(&self.id, "delete", self.state));
        }
        if self.stopped_at.is_none() {
            self.stopped_at = Some(Utc::now());
        }
        self.state = SandboxState::Deleted;
        Ok(())
    }
}

#[async_trait]
impl Sandbox for SlotSandbox {
    type Container = SlotContainer;

    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> SandboxState {
        self.state
    }

    fn data(&self) -> &SandboxData {
        &self.data
    }

    fn status(&self) -> Result<SandboxStatus> {
        let mut containers: Vec<_> = self.containers.values().map(SlotContainer::status).collect();
        containers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(SandboxStatus {
            id: self.id.clone(),
            state: self.state,
            created_at: self.created_at,
            started_at: self.started_at,
            stopped_at: self.stopped_at,
            containers,
        })
    }

    async fn ping(&self) -> Result<()> {
        // Nothing to probe: a live record is a healthy sandbox.
        self.ensure_not_deleted("ping")
    }

    fn exit_signal(&self) -> Arc<ExitSignal> {
        Arc::clone(&self.exit_signal)
    }

    fn container(&self, id: &str) -> Result<&SlotContainer> {
        self.containers
            .get(id)
            .ok_or_else(|| SandboxError::NotFound(id.to_owned()))
    }

    fn append_container(&mut self, id: &str, data: ContainerData) -> Result<()> {
        self.ensure_not_deleted("append container to")?;
        if self.containers.contains_key(id) {
            return Err(SandboxError::DuplicateId(id.to_owned()));
        }
        let container = SlotContainer::new(id, &self.id, data);
        self.containers.insert(id.to_owned(), container);
        info!(id = %self.id, container = id, "container appended");
        Ok(())
    }

    fn update_container(&mut self, id: &str, data: ContainerData) -> Result<()> {
        self.ensure_not_deleted("update container in")?;
        self.container_mut(id)?.update(data);
        Ok(())
    }

    fn remove_container(&mut self, id: &str) -> Result<SlotContainer> {
        self.ensure_not_deleted("remove container from")?;
        let mut container = self
            .containers
            .remove(id)
            .ok_or_else(|| SandboxError::NotFound(id.to_owned()))?;
        container.mark_removed();
        info!(id = %self.id, container = id, "container removed");
        Ok(container)
    }

    fn start_container(&mut self, id: &str) -> Result<()> {
        self.ensure_not_deleted("start container in")?;
        self.container_mut(id)?.start()?;
        info!(id = %self.id, container = id, "container started");
        Ok(())
    }

    fn stop_container(&mut self, id: &str) -> Result<()> {
        self.ensure_not_deleted("stop container in")?;
        self.container_mut(id)?.stop()?;
        info!(id = %self.id, container = id, "container stopped");
        Ok(())
    }
}
