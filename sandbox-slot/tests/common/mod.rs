#![allow(dead_code)]

use std::collections::HashMap;

use oci_spec::runtime::Spec;
use sandbox::{ContainerData, SandboxData};
use sandbox_slot::{SlotConfig, SlotSandboxer};
use tempfile::TempDir;

/// Sandboxer writing its artifacts into a fresh temp dir.
///
/// Keep the `TempDir` alive for as long as the sandboxer is in use.
pub fn sandboxer() -> (TempDir, SlotSandboxer) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir().unwrap();
    let sandboxer = SlotSandboxer::new(&SlotConfig::with_base_dir(dir.path()));
    (dir, sandboxer)
}

pub fn annotations(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

/// OCI spec with the given `linux.resources` object.
pub fn spec(linux_resources: serde_json::Value) -> Spec {
    serde_json::from_value(serde_json::json!({
        "ociVersion": "1.0.2",
        "linux": { "resources": linux_resources },
    }))
    .unwrap()
}

pub fn sandbox_data(id: &str, pairs: &[(&str, &str)]) -> SandboxData {
    SandboxData {
        id: id.to_owned(),
        annotations: annotations(pairs),
        ..SandboxData::default()
    }
}

pub fn container_data(id: &str, sandbox_id: &str, pairs: &[(&str, &str)]) -> ContainerData {
    ContainerData {
        id: id.to_owned(),
        sandbox_id: sandbox_id.to_owned(),
        annotations: annotations(pairs),
        ..ContainerData::default()
    }
}
