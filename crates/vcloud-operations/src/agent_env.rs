use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};
use vcloud_config::CloudConfig;
use vcloud_core::{AgentEnv, DiskEnv, HardDisk, NetworkEnv, Networks, Nic, VmIdentity, Vm};

use crate::Result;
use crate::error::CloudError;

/// Network section of the agent environment: each requested network with the
/// MAC address of the NIC connected to its organization network.
pub(crate) fn network_env(nics: &[Nic], networks: &Networks) -> IndexMap<String, NetworkEnv> {
    let mut env = IndexMap::new();
    for (name, spec) in networks {
        let Some(nic) = nics.iter().find(|nic| nic.network == spec.cloud_network()) else {
            warn!(network = %spec.cloud_network(), "no NIC connected, not generating network env");
            continue;
        };
        env.insert(
            name.clone(),
            NetworkEnv {
                spec: spec.clone(),
                mac: nic.mac_address.clone(),
            },
        );
    }
    env
}

pub(crate) fn disk_env(system: &HardDisk, ephemeral: &HardDisk) -> DiskEnv {
    DiskEnv {
        system: system.disk_id.clone(),
        ephemeral: ephemeral.disk_id.clone(),
        persistent: IndexMap::new(),
    }
}

/// The one disk present in `current` but not in `previous`.
pub(crate) fn newly_added_disk(
    vm: &str,
    previous: &[HardDisk],
    current: &[HardDisk],
) -> Result<HardDisk> {
    let before: HashSet<&HardDisk> = previous.iter().collect();
    let added: Vec<&HardDisk> = current.iter().filter(|d| !before.contains(d)).collect();

    match added.as_slice() {
        [disk] => {
            info!(vm, disk_id = %disk.disk_id, "found newly added disk");
            Ok((*disk).clone())
        }
        _ => {
            debug!(vm, ?previous, ?current, "unexpected disk set after change");
            Err(CloudError::UnexpectedDiskCount {
                vm: vm.to_string(),
                found: added.len(),
            })
        }
    }
}

pub(crate) fn build_agent_env(
    config: &CloudConfig,
    vm: &Vm,
    agent_id: &str,
    networks: IndexMap<String, NetworkEnv>,
    disks: DiskEnv,
    environment: Option<&Value>,
) -> AgentEnv {
    AgentEnv {
        vm: VmIdentity {
            name: vm.name.clone(),
            id: vm.urn.clone(),
        },
        agent_id: agent_id.to_string(),
        networks,
        disks,
        env: environment.cloned(),
        properties: config.agent_properties().clone(),
    }
}
