use std::path::{Component, Path, PathBuf};

const RESOURCE_INFO: &str = "resource_info.json";
const STATUS: &str = "status.json";

/// Artifact layout under the configured base directory:
///
/// ```text
/// <base_dir>/<sandbox_id>/resource_info.json
/// <base_dir>/<sandbox_id>/status.json
/// <base_dir>/<sandbox_id>/containers/<container_id>/resource_info.json
/// ```
///
/// Every accessor returns `None` for an id that is not a single plain path
/// component, so no id can point outside `base_dir`.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    base_dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn sandbox_dir(&self, id: &str) -> Option<PathBuf> {
        is_plain_component(id).then(|| self.base_dir.join(id))
    }

    pub fn resource_info(&self, id: &str) -> Option<PathBuf> {
        self.sandbox_dir(id).map(|dir| dir.join(RESOURCE_INFO))
    }

    pub fn status(&self, id: &str) -> Option<PathBuf> {
        self.sandbox_dir(id).map(|dir| dir.join(STATUS))
    }

    pub fn container_dir(&self, id: &str, cid: &str) -> Option<PathBuf> {
        let sandbox_dir = self.sandbox_dir(id)?;
        is_plain_component(cid).then(|| sandbox_dir.join("containers").join(cid))
    }

    pub fn container_resource_info(&self, id: &str, cid: &str) -> Option<PathBuf> {
        self.container_dir(id, cid).map(|dir| dir.join(RESOURCE_INFO))
    }
}

fn is_plain_component(id: &str) -> bool {
    let mut components = Path::new(id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == id
    )
}
