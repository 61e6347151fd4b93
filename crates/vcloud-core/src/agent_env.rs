//! The per-VM document the in-guest agent reads at boot.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::network::NetworkSpec;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmIdentity {
    pub name: String,
    /// URN of the VM.
    pub id: String,
}

/// A requested network together with the MAC address of the NIC serving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEnv {
    #[serde(flatten)]
    pub spec: NetworkSpec,
    pub mac: String,
}

/// Hardware disk ids of the VM's disks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskEnv {
    pub system: String,
    pub ephemeral: String,
    /// Independent disk URN to hardware disk id.
    #[serde(default)]
    pub persistent: IndexMap<String, String>,
}

/// Agent environment, stored as VM metadata and mirrored into an ISO image.
///
/// Agent properties from the cloud configuration are merged in at the top
/// level and preserved across rewrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEnv {
    pub vm: VmIdentity,
    pub agent_id: String,
    #[serde(default)]
    pub networks: IndexMap<String, NetworkEnv>,
    pub disks: DiskEnv,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Value>,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl AgentEnv {
    /// Parse an environment previously stored in VM metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid agent environment document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// # Errors
    ///
    /// Returns an error if a flattened property cannot be serialized.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn attach_persistent_disk(&mut self, disk_id: impl Into<String>, hardware_disk_id: impl Into<String>) {
        self.disks
            .persistent
            .insert(disk_id.into(), hardware_disk_id.into());
    }

    /// Remove a persistent disk mapping, returning the hardware disk id it pointed to.
    pub fn detach_persistent_disk(&mut self, disk_id: &str) -> Option<String> {
        self.disks.persistent.shift_remove(disk_id)
    }
}
