use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::data::{ContainerData, SandboxData};
use crate::error::Result;
use crate::signal::ExitSignal;
use crate::types::{ContainerState, SandboxState, SandboxStatus};

/// Shared handle to a registered sandbox. Readers (`status`, `ping`) take the
/// read lock; every state transition takes the write lock.
pub type SandboxHandle<S> = Arc<RwLock<S>>;

/// Registry of sandboxes: the surface a CRI shim drives.
///
/// All operations are keyed by sandbox id (and container id for container
/// operations) and are safe to call concurrently.
#[async_trait]
pub trait Sandboxer: Send + Sync {
    type Sandbox: Sandbox + 'static;

    // -- sandbox lifecycle --
    async fn create(&self, id: &str, data: SandboxData) -> Result<SandboxHandle<Self::Sandbox>>;
    async fn start(&self, id: &str) -> Result<()>;
    /// Replace the sandbox's request payload without touching its state.
    async fn update(&self, id: &str, data: SandboxData) -> Result<()>;
    /// Stop the sandbox. Stopping an already stopped sandbox succeeds.
    /// `force` skips the check that no container is still running.
    async fn stop(&self, id: &str, force: bool) -> Result<()>;
    /// Delete a stopped sandbox (any state with `force`), fire its exit
    /// signal and release its id.
    async fn delete(&self, id: &str, force: bool) -> Result<()>;

    // -- lookup --
    async fn sandbox(&self, id: &str) -> Result<SandboxHandle<Self::Sandbox>>;
    async fn status(&self, id: &str) -> Result<SandboxStatus>;
    async fn ping(&self, id: &str) -> Result<()>;
    /// Ids of all registered sandboxes, sorted.
    async fn list(&self) -> Vec<String>;

    async fn exit_signal(&self, id: &str) -> Result<Arc<ExitSignal>> {
        let sandbox = self.sandbox(id).await?;
        let sandbox = sandbox.read().await;
        Ok(sandbox.exit_signal())
    }

    // -- containers --
    async fn append_container(&self, id: &str, cid: &str, data: ContainerData) -> Result<()>;
    async fn update_container(&self, id: &str, cid: &str, data: ContainerData) -> Result<()>;
    async fn remove_container(&self, id: &str, cid: &str) -> Result<()>;
    async fn start_container(&self, id: &str, cid: &str) -> Result<()>;
    async fn stop_container(&self, id: &str, cid: &str) -> Result<()>;
}

/// A single sandbox record and the containers it owns.
#[async_trait]
pub trait Sandbox: Send + Sync {
    type Container: Container;

    // -- identity --
    fn id(&self) -> &str;
    fn state(&self) -> SandboxState;
    fn data(&self) -> &SandboxData;

    // -- health --
    fn status(&self) -> Result<SandboxStatus>;
    async fn ping(&self) -> Result<()>;
    fn exit_signal(&self) -> Arc<ExitSignal>;

    // -- containers --
    fn container(&self, id: &str) -> Result<&Self::Container>;
    fn append_container(&mut self, id: &str, data: ContainerData) -> Result<()>;
    fn update_container(&mut self, id: &str, data: ContainerData) -> Result<()>;
    /// Detach the container and hand it back in its `Removed` state.
    fn remove_container(&mut self, id: &str) -> Result<Self::Container>;
    fn start_container(&mut self, id: &str) -> Result<()>;
    fn stop_container(&mut self, id: &str) -> Result<()>;
}

pub trait Container: Send + Sync {
    fn id(&self) -> &str;
    /// Id of the owning sandbox. Lookup only; the sandbox owns the container.
    fn sandbox_id(&self) -> &str;
    fn state(&self) -> ContainerState;
    fn data(&self) -> &ContainerData;
}
