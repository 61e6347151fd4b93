//! Keys of the values workflow steps share through the state bag.

use std::path::PathBuf;

use vcloud_core::{AgentEnv, CatalogItem, HardDisk, Media, VApp, VAppTemplate, Vm};
use vcloud_saga::StateKey;

use crate::steps::Target;
use crate::traits::IsoImage;

/// The vApp the workflow operates on. After recomposition this is the container.
pub const VAPP: StateKey<VApp> = StateKey::new("vapp");
/// The vApp created by instantiation, kept after `VAPP` moves to a container.
pub const INSTANTIATED_VAPP: StateKey<VApp> = StateKey::new("instantiated_vapp");
pub const CONTAINER_VAPP: StateKey<VApp> = StateKey::new("container_vapp");
pub const VM: StateKey<Vm> = StateKey::new("vm");
pub const VAPP_TEMPLATE: StateKey<VAppTemplate> = StateKey::new("vapp_template");
pub const CATALOG_ITEM: StateKey<CatalogItem> = StateKey::new("catalog_item");
pub const MEDIA: StateKey<Media> = StateKey::new("media");
pub const ISO: StateKey<IsoImage> = StateKey::new("iso");
pub const AGENT_ENV: StateKey<AgentEnv> = StateKey::new("agent_env");
/// Hard disks of the VM before reconfiguration.
pub const DISKS: StateKey<Vec<HardDisk>> = StateKey::new("disks");
/// vApp networks added by this workflow, removed again on rollback.
pub const ADDED_NETWORKS: StateKey<Vec<String>> = StateKey::new("added_networks");
pub const POWERON_TARGET: StateKey<Target> = StateKey::new("poweron_target");
pub const STEMCELL_DIR: StateKey<PathBuf> = StateKey::new("stemcell_dir");
pub const STEMCELL_OVF: StateKey<String> = StateKey::new("stemcell_ovf");
