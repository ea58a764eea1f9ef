pub mod config;
mod container;
mod paths;
mod persist;
pub mod resource;
mod sandbox;
mod sandboxer;

pub use config::SlotConfig;
pub use container::SlotContainer;
pub use paths::ArtifactPaths;
pub use persist::{Persister, persist};
pub use resource::{ResourceProfile, ResourceSource, extract};
pub use crate::sandbox::SlotSandbox;
pub use sandboxer::SlotSandboxer;
