use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use sandbox::{Result, SandboxError, SandboxStatus};
use serde::Serialize;
use tracing::warn;

use crate::config::SlotConfig;
use crate::paths::ArtifactPaths;
use crate::resource::ResourceProfile;

/// Write `profile` as pretty JSON to `path`, replacing any existing file.
pub async fn persist(path: &Path, profile: &ResourceProfile) -> Result<()> {
    write_json(path, profile).await
}

/// Writes the diagnostic artifacts of the slot backend.
///
/// Artifacts are never read back; a failed write leaves the in-memory state
/// as it is and is only reported to the caller.
#[derive(Debug, Clone)]
pub struct Persister {
    paths: ArtifactPaths,
    persist_containers: bool,
    cleanup_on_delete: bool,
}

impl Persister {
    pub fn new(config: &SlotConfig) -> Self {
        Self {
            paths: ArtifactPaths::new(config.base_dir.clone()),
            persist_containers: config.persist_containers,
            cleanup_on_delete: config.cleanup_on_delete,
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    pub async fn sandbox_profile(&self, id: &str, profile: &ResourceProfile) -> Result<()> {
        let path = self.paths.resource_info(id).ok_or_else(|| unsafe_id(id))?;
        persist(&path, profile).await
    }

    /// No-op unless container persistence is enabled.
    pub async fn container_profile(
        &self,
        id: &str,
        cid: &str,
        profile: &ResourceProfile,
    ) -> Result<()> {
        if !self.persist_containers {
            return Ok(());
        }
        let path = self
            .paths
            .container_resource_info(id, cid)
            .ok_or_else(|| unsafe_id(&format!("{id}/{cid}")))?;
        persist(&path, profile).await
    }

    pub async fn status(&self, status: &SandboxStatus) -> Result<()> {
        let path = self.paths.status(&status.id).ok_or_else(|| unsafe_id(&status.id))?;
        write_json(&path, status).await
    }

    pub async fn remove_container(&self, id: &str, cid: &str) -> Result<()> {
        if !self.persist_containers {
            return Ok(());
        }
        let dir = self
            .paths
            .container_dir(id, cid)
            .ok_or_else(|| unsafe_id(&format!("{id}/{cid}")))?;
        remove_dir(&dir).await
    }

    /// No-op unless cleanup on delete is enabled.
    pub async fn remove_sandbox(&self, id: &str) -> Result<()> {
        if !self.cleanup_on_delete {
            return Ok(());
        }
        let dir = self.paths.sandbox_dir(id).ok_or_else(|| unsafe_id(id))?;
        remove_dir(&dir).await
    }
}

/// Per-sandbox write slot for artifacts.
///
/// A sandbox operation locks it before releasing the sandbox lock and holds it
/// across its writes, so artifacts land in the order of the state changes they
/// describe. Once closed by delete, every later write is skipped.
#[derive(Debug, Default)]
pub(crate) struct ArtifactLog {
    last_error: Option<String>,
    closed: bool,
}

impl ArtifactLog {
    pub(crate) fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    /// Log a failed write and remember it for diagnostics.
    pub(crate) fn record(&mut self, id: &str, what: &str, result: Result<()>) {
        if let Err(e) = result {
            warn!(id, error = %e, "failed to persist {what}");
            self.last_error = Some(e.to_string());
        }
    }
}

fn unsafe_id(id: &str) -> SandboxError {
    SandboxError::PersistenceFailure(format!("id {id:?} is not a safe path component"))
}

/// Distinguishes temp files of concurrent writes to the same artifact.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Atomic write: write to a temp file in the same directory, then rename.
async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        SandboxError::PersistenceFailure(format!("serialize {}: {e}", path.display()))
    })?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            SandboxError::PersistenceFailure(format!("mkdir {}: {e}", parent.display()))
        })?;
    }

    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("{seq}.tmp"));
    tokio::fs::write(&tmp, json.as_bytes()).await.map_err(|e| {
        SandboxError::PersistenceFailure(format!("write {}: {e}", tmp.display()))
    })?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| {
        SandboxError::PersistenceFailure(format!("rename {}: {e}", path.display()))
    })
}

async fn remove_dir(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SandboxError::PersistenceFailure(format!(
            "remove {}: {e}",
            dir.display()
        ))),
    }
}
