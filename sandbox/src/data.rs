use std::collections::HashMap;

use oci_spec::runtime::Spec;

/// Sandbox request payload as handed over by the CRI shim.
#[derive(Debug, Clone, Default)]
pub struct SandboxData {
    pub id: String,
    /// OCI runtime spec of the sandbox (pause) container, if the shim sent one.
    pub spec: Option<Spec>,
    /// CRI-level annotations from the pod sandbox config.
    pub annotations: HashMap<String, String>,
    pub labels: HashMap<String, String>,
}

/// Container request payload as handed over by the CRI shim.
#[derive(Debug, Clone, Default)]
pub struct ContainerData {
    pub id: String,
    pub sandbox_id: String,
    pub spec: Option<Spec>,
    /// CRI-level annotations from the container config.
    pub annotations: HashMap<String, String>,
    pub labels: HashMap<String, String>,
}
