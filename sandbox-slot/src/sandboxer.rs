use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use sandbox::{
    Container, ContainerData, Result, Sandbox, SandboxData, SandboxError, SandboxHandle,
    SandboxState, SandboxStatus, Sandboxer,
};
use tokio::sync::{OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::info;

use crate::config::SlotConfig;
use crate::persist::{ArtifactLog, Persister};
use crate::resource::ResourceProfile;
use crate::sandbox::SlotSandbox;

type ArtifactGuard = OwnedMutexGuard<ArtifactLog>;

/// In-memory sandboxer that records resource requests instead of fulfilling
/// them.
///
/// The map lock is held only to look up, insert or remove an entry; state
/// transitions run under the per-sandbox lock, so unrelated sandboxes never
/// wait on each other. Each operation takes the sandbox's artifact slot before
/// it lets go of the sandbox lock and writes after, so artifact writes stay in
/// transition order without blocking readers. They never fail an operation.
pub struct SlotSandboxer {
    sandboxes: RwLock<HashMap<String, SandboxHandle<SlotSandbox>>>,
    persister: Persister,
}

impl SlotSandboxer {
    pub fn new(config: &SlotConfig) -> Self {
        info!(base_dir = %config.base_dir.display(), "resource-slot sandboxer ready");
        Self {
            sandboxes: RwLock::new(HashMap::new()),
            persister: Persister::new(config),
        }
    }

    pub fn persister(&self) -> &Persister {
        &self.persister
    }

    async fn lookup(&self, id: &str) -> Result<SandboxHandle<SlotSandbox>> {
        self.sandboxes
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SandboxError::NotFound(id.to_owned()))
    }

    /// Write-lock a live sandbox. A record that was deleted while we waited
    /// for its lock is reported as missing, same as after its removal.
    async fn lock(
        &self,
        id: &str,
    ) -> Result<(SandboxHandle<SlotSandbox>, OwnedRwLockWriteGuard<SlotSandbox>)> {
        let handle = self.lookup(id).await?;
        let guard = Arc::clone(&handle).write_owned().await;
        if guard.state() == SandboxState::Deleted {
            return Err(SandboxError::NotFound(id.to_owned()));
        }
        Ok((handle, guard))
    }

    async fn read(&self, id: &str) -> Result<OwnedRwLockReadGuard<SlotSandbox>> {
        let guard = self.lookup(id).await?.read_owned().await;
        if guard.state() == SandboxState::Deleted {
            return Err(SandboxError::NotFound(id.to_owned()));
        }
        Ok(guard)
    }

    async fn persist_status(&self, log: &mut ArtifactLog, status: &SandboxStatus) {
        if log.is_closed() {
            return;
        }
        let result = self.persister.status(status).await;
        log.record(&status.id, "status", result);
    }

    async fn persist_sandbox(
        &self,
        mut log: ArtifactGuard,
        profile: ResourceProfile,
        status: SandboxStatus,
    ) {
        if log.is_closed() {
            return;
        }
        let result = self.persister.sandbox_profile(&status.id, &profile).await;
        log.record(&status.id, "resource info", result);
        self.persist_status(&mut log, &status).await;
    }

    async fn persist_container(
        &self,
        mut log: ArtifactGuard,
        cid: &str,
        profile: ResourceProfile,
        status: SandboxStatus,
    ) {
        if log.is_closed() {
            return;
        }
        let result = self
            .persister
            .container_profile(&status.id, cid, &profile)
            .await;
        log.record(&status.id, "container resource info", result);
        self.persist_status(&mut log, &status).await;
    }

    /// Run a container operation under the sandbox lock, then rewrite the
    /// status artifact.
    async fn with_container<F>(&self, id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut SlotSandbox) -> Result<()> + Send,
    {
        let (_, mut sandbox) = self.lock(id).await?;
        f(&mut *sandbox)?;
        let status = sandbox.status()?;
        let mut log = sandbox.lock_artifacts().await;
        drop(sandbox);

        self.persist_status(&mut log, &status).await;
        Ok(())
    }
}

#[async_trait]
impl Sandboxer for SlotSandboxer {
    type Sandbox = SlotSandbox;

    async fn create(&self, id: &str, data: SandboxData) -> Result<SandboxHandle<SlotSandbox>> {
        // Extraction is pure, so do it before taking the map lock.
        let sandbox = SlotSandbox::new(id, data);
        let profile = *sandbox.resource_profile();
        let status = sandbox.status()?;
        // Held before the record is visible, so the first write is ours.
        let log = sandbox.lock_artifacts().await;
        let handle = Arc::new(RwLock::new(sandbox));

        match self.sandboxes.write().await.entry(id.to_owned()) {
            Entry::Occupied(_) => return Err(SandboxError::DuplicateId(id.to_owned())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&handle));
            }
        }
        info!(id, "sandbox created");

        self.persist_sandbox(log, profile, status).await;
        Ok(handle)
    }

    async fn start(&self, id: &str) -> Result<()> {
        let (_, mut sandbox) = self.lock(id).await?;
        sandbox.start()?;
        let status = sandbox.status()?;
        let mut log = sandbox.lock_artifacts().await;
        drop(sandbox);
        info!(id, "sandbox started");

        self.persist_status(&mut log, &status).await;
        Ok(())
    }

    async fn update(&self, id: &str, data: SandboxData) -> Result<()> {
        let (_, mut sandbox) = self.lock(id).await?;
        sandbox.update(data)?;
        let profile = *sandbox.resource_profile();
        let status = sandbox.status()?;
        let log = sandbox.lock_artifacts().await;
        drop(sandbox);
        info!(id, "sandbox updated");

        self.persist_sandbox(log, profile, status).await;
        Ok(())
    }

    async fn stop(&self, id: &str, force: bool) -> Result<()> {
        let (_, mut sandbox) = self.lock(id).await?;
        if !sandbox.stop(force)? {
            info!(id, "sandbox already stopped");
            return Ok(());
        }
        let status = sandbox.status()?;
        let mut log = sandbox.lock_artifacts().await;
        drop(sandbox);
        info!(id, force, "sandbox stopped");

        self.persist_status(&mut log, &status).await;
        Ok(())
    }

    async fn delete(&self, id: &str, force: bool) -> Result<()> {
        let (handle, mut sandbox) = self.lock(id).await?;
        sandbox.mark_deleted(force)?;

        // Waits out in-flight writes. Cleanup finishes before the id is free
        // again.
        let mut log = sandbox.lock_artifacts().await;
        log.close();
        let result = self.persister.remove_sandbox(id).await;
        log.record(id, "artifact cleanup", result);
        drop(log);

        // Still holding the sandbox lock: nobody can observe it half-deleted.
        {
            let mut sandboxes = self.sandboxes.write().await;
            if sandboxes
                .get(id)
                .is_some_and(|current| Arc::ptr_eq(current, &handle))
            {
                sandboxes.remove(id);
            }
        }
        sandbox.exit_signal().signal();
        drop(sandbox);
        info!(id, force, "sandbox deleted");
        Ok(())
    }

    async fn sandbox(&self, id: &str) -> Result<SandboxHandle<SlotSandbox>> {
        self.lookup(id).await
    }

    async fn status(&self, id: &str) -> Result<SandboxStatus> {
        self.read(id).await?.status()
    }

    async fn ping(&self, id: &str) -> Result<()> {
        self.read(id).await?.ping().await
    }

    async fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sandboxes.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn append_container(&self, id: &str, cid: &str, data: ContainerData) -> Result<()> {
        let (_, mut sandbox) = self.lock(id).await?;
        sandbox.append_container(cid, data)?;
        let profile = *sandbox.container(cid)?.resource_profile();
        let status = sandbox.status()?;
        let log = sandbox.lock_artifacts().await;
        drop(sandbox);

        self.persist_container(log, cid, profile, status).await;
        Ok(())
    }

    async fn update_container(&self, id: &str, cid: &str, data: ContainerData) -> Result<()> {
        let (_, mut sandbox) = self.lock(id).await?;
        sandbox.update_container(cid, data)?;
        let profile = *sandbox.container(cid)?.resource_profile();
        let status = sandbox.status()?;
        let log = sandbox.lock_artifacts().await;
        drop(sandbox);
        info!(id, container = cid, "container updated");

        self.persist_container(log, cid, profile, status).await;
        Ok(())
    }

    async fn remove_container(&self, id: &str, cid: &str) -> Result<()> {
        let (_, mut sandbox) = self.lock(id).await?;
        let removed = sandbox.remove_container(cid)?;
        let status = sandbox.status()?;
        let mut log = sandbox.lock_artifacts().await;
        drop(sandbox);

        if !log.is_closed() {
            let result = self.persister.remove_container(id, removed.id()).await;
            log.record(id, "container removal", result);
        }
        self.persist_status(&mut log, &status).await;
        Ok(())
    }

    async fn start_container(&self, id: &str, cid: &str) -> Result<()> {
        self.with_container(id, |sandbox| sandbox.start_container(cid))
            .await
    }

    async fn stop_container(&self, id: &str, cid: &str) -> Result<()> {
        self.with_container(id, |sandbox| sandbox.stop_container(cid))
            .await
    }
}
