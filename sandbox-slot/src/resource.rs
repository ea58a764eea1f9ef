//! Resource declarations extracted from sandbox and container requests.
//!
//! Nothing here enforces anything: the profile only records what the request
//! asked for, normalized into cores and bytes.

use oci_spec::runtime::{LinuxCpu, LinuxResources};
use sandbox::{ContainerData, SandboxData};
use serde::Serialize;
use tracing::warn;

/// CRI annotation keys read by [`extract`].
pub mod annotations {
    pub const CPU_LIMIT: &str = "resources.limits.cpu";
    pub const CPU_REQUEST: &str = "resources.requests.cpu";
    pub const MEMORY_LIMIT: &str = "resources.limits.memory";
    pub const MEMORY_REQUEST: &str = "resources.requests.memory";
    pub const PID_LIMIT: &str = "resources.limits.pid";
    pub const STORAGE_LIMIT: &str = "resources.limits.ephemeral-storage";
    pub const NETWORK_BANDWIDTH: &str = "resources.limits.network-bandwidth";
}

/// cgroup v1 weight of one full CPU.
const SHARES_PER_CORE: f64 = 1024.0;

/// Normalized resource declaration. `None` means "not declared".
///
/// Serializes to the `resource_info.json` artifact format; field order is part
/// of that format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceProfile {
    #[serde(rename = "cpu_limit")]
    cpu_limit_cores: Option<f64>,
    #[serde(rename = "cpu_request")]
    cpu_request_cores: Option<f64>,
    #[serde(rename = "memory_limit")]
    memory_limit_bytes: Option<u64>,
    #[serde(rename = "memory_request")]
    memory_request_bytes: Option<u64>,
    pid_limit: Option<u64>,
    #[serde(rename = "storage_limit")]
    storage_limit_bytes: Option<u64>,
    network_bandwidth: Option<u64>,
}

impl ResourceProfile {
    pub fn cpu_limit_cores(&self) -> Option<f64> {
        self.cpu_limit_cores
    }

    pub fn cpu_request_cores(&self) -> Option<f64> {
        self.cpu_request_cores
    }

    pub fn memory_limit_bytes(&self) -> Option<u64> {
        self.memory_limit_bytes
    }

    pub fn memory_request_bytes(&self) -> Option<u64> {
        self.memory_request_bytes
    }

    pub fn pid_limit(&self) -> Option<u64> {
        self.pid_limit
    }

    pub fn storage_limit_bytes(&self) -> Option<u64> {
        self.storage_limit_bytes
    }

    pub fn network_bandwidth(&self) -> Option<u64> {
        self.network_bandwidth
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A request payload the extractor can read from.
pub trait ResourceSource {
    /// Annotation value for `key`, if any.
    fn annotation(&self, key: &str) -> Option<&str>;
    /// `linux.resources` of the OCI spec, if any.
    fn linux_resources(&self) -> Option<&LinuxResources>;
}

impl ResourceSource for SandboxData {
    fn annotation(&self, key: &str) -> Option<&str> {
        spec_annotation(self.spec.as_ref(), key)
            .or_else(|| self.annotations.get(key).map(String::as_str))
    }

    fn linux_resources(&self) -> Option<&LinuxResources> {
        spec_resources(self.spec.as_ref())
    }
}

impl ResourceSource for ContainerData {
    fn annotation(&self, key: &str) -> Option<&str> {
        spec_annotation(self.spec.as_ref(), key)
            .or_else(|| self.annotations.get(key).map(String::as_str))
    }

    fn linux_resources(&self) -> Option<&LinuxResources> {
        spec_resources(self.spec.as_ref())
    }
}

fn spec_annotation<'a>(spec: Option<&'a oci_spec::runtime::Spec>, key: &str) -> Option<&'a str> {
    spec?.annotations().as_ref()?.get(key).map(String::as_str)
}

fn spec_resources(spec: Option<&oci_spec::runtime::Spec>) -> Option<&LinuxResources> {
    spec?.linux().as_ref()?.resources().as_ref()
}

/// Derive a [`ResourceProfile`] from a request.
///
/// Per field, an OCI `linux.resources` value wins over the matching
/// annotation; a field with neither stays `None`. Values that cannot be used
/// (unparseable, negative, a zero CPU period, OCI "unlimited") count as not
/// provided by that source. Never fails.
pub fn extract(source: &impl ResourceSource) -> ResourceProfile {
    use annotations::*;

    let resources = source.linux_resources();
    let cpu = resources.and_then(|r| r.cpu().as_ref());
    let memory = resources.and_then(|r| r.memory().as_ref());
    let pids = resources.and_then(|r| r.pids().as_ref());

    ResourceProfile {
        cpu_limit_cores: cpu
            .and_then(cores_from_quota)
            .or_else(|| annotation_cores(source, CPU_LIMIT)),
        cpu_request_cores: cpu
            .and_then(LinuxCpu::shares)
            .filter(|&shares| shares > 0)
            .map(|shares| shares as f64 / SHARES_PER_CORE)
            .or_else(|| annotation_cores(source, CPU_REQUEST)),
        memory_limit_bytes: memory
            .and_then(|m| m.limit())
            .and_then(positive)
            .or_else(|| annotation_integer(source, MEMORY_LIMIT)),
        memory_request_bytes: memory
            .and_then(|m| m.reservation())
            .and_then(positive)
            .or_else(|| annotation_integer(source, MEMORY_REQUEST)),
        pid_limit: pids
            .and_then(|p| positive(p.limit()))
            .or_else(|| annotation_integer(source, PID_LIMIT)),
        storage_limit_bytes: annotation_integer(source, STORAGE_LIMIT),
        network_bandwidth: annotation_integer(source, NETWORK_BANDWIDTH),
    }
}

/// `quota / period` in cores. A non-positive quota is OCI's "unlimited"; a
/// zero period yields nothing rather than dividing by zero.
fn cores_from_quota(cpu: &LinuxCpu) -> Option<f64> {
    let quota = cpu.quota().filter(|&q| q > 0)?;
    let period = cpu.period().filter(|&p| p > 0)?;
    Some(quota as f64 / period as f64)
}

/// OCI uses `<= 0` for "unlimited", which is not a declared limit.
fn positive(value: i64) -> Option<u64> {
    u64::try_from(value).ok().filter(|&v| v > 0)
}

fn annotation_cores(source: &impl ResourceSource, key: &str) -> Option<f64> {
    let raw = source.annotation(key)?;
    match raw.trim().parse::<f64>() {
        Ok(cores) if cores.is_finite() && cores >= 0.0 => Some(cores),
        _ => {
            warn!(key, value = raw, "ignoring malformed resource annotation");
            None
        }
    }
}

fn annotation_integer(source: &impl ResourceSource, key: &str) -> Option<u64> {
    let raw = source.annotation(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, value = raw, error = %e, "ignoring malformed resource annotation");
            None
        }
    }
}
