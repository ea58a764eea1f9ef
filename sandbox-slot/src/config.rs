use std::path::{Path, PathBuf};

use sandbox::{Result, SandboxError};
use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_BASE_DIR: &str = "/var/lib/resource-slot";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    /// Root of the per-sandbox artifact directories.
    pub base_dir: PathBuf,
    /// Also write `resource_info.json` for every container.
    pub persist_containers: bool,
    /// Remove `<base_dir>/<sandbox_id>` once the sandbox is deleted.
    pub cleanup_on_delete: bool,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            persist_containers: true,
            cleanup_on_delete: true,
        }
    }
}

impl SlotConfig {
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    fn resolve_relative_paths(&mut self, config_dir: &Path) {
        if self.base_dir.is_relative() {
            self.base_dir = config_dir.join(&self.base_dir);
        }
    }
}

/// Load a slot config from a YAML file. Missing keys take their defaults.
///
/// A relative `base_dir` is resolved against the config file's parent directory.
pub async fn load(path: &Path) -> Result<SlotConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SandboxError::InvalidConfig(format!("read {}: {e}", path.display())))?;
    let mut config: SlotConfig = serde_yaml_ng::from_str(&content)
        .map_err(|e| SandboxError::InvalidConfig(format!("parse {}: {e}", path.display())))?;
    if let Some(config_dir) = path.parent() {
        config.resolve_relative_paths(config_dir);
    }
    Ok(config)
}
