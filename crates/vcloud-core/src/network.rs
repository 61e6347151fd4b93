use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Cloud-specific network settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkCloudProperties {
    /// Name of the organization network the NIC connects to.
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One network requested for a VM, keyed by its logical name in [`Networks`].
///
/// Fields other than `ip` and `cloud_properties` (netmask, gateway, dns,
/// default, type) are carried through to the agent environment untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub cloud_properties: NetworkCloudProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NetworkSpec {
    /// Name of the organization network this spec refers to.
    #[must_use]
    pub fn cloud_network(&self) -> &str {
        &self.cloud_properties.name
    }
}

/// Requested networks in the order the caller listed them.
pub type Networks = IndexMap<String, NetworkSpec>;

/// Distinct organization network names referenced by `networks`, in first-seen order.
#[must_use]
pub fn network_names(networks: &Networks) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for spec in networks.values() {
        let name = spec.cloud_network();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Compute and storage sizing for a new VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub cpu: u32,
    /// Memory in MB.
    pub ram: u64,
    /// Ephemeral disk size in MB.
    pub disk: u64,
    /// Storage profile the VM is moved to after instantiation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_profile: Option<String>,
}
