mod data;
mod error;
mod sandbox;
mod signal;
mod types;

pub use data::{ContainerData, SandboxData};
pub use error::{Result, SandboxError};
pub use sandbox::{Container, Sandbox, SandboxHandle, Sandboxer};
pub use signal::ExitSignal;
pub use types::{ContainerState, ContainerStatus, SandboxState, SandboxStatus};
