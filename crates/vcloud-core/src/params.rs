//! Request payloads handed to the client facade.

use crate::entity::StorageProfile;

/// Placeholder for a template whose files are uploaded afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTemplateParams {
    pub name: String,
    pub description: String,
    pub storage_profile: Option<StorageProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantiateParams {
    pub name: String,
    pub description: String,
    /// Href of the template to instantiate.
    pub source: String,
    pub linked_clone: bool,
    /// Hrefs of independent disks the new vApp must be able to reach.
    pub disk_locality: Vec<String>,
    pub all_eulas_accepted: bool,
}

/// Append-only recompose: every source item is added to the target vApp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecomposeParams {
    pub name: String,
    pub all_eulas_accepted: bool,
    /// Hrefs of the VMs to move into the target vApp.
    pub source_items: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpAddressingMode {
    None,
    Manual,
    Dhcp,
    Pool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NicSpec {
    pub index: u32,
    pub network: String,
    pub addressing_mode: IpAddressingMode,
    pub ip: Option<String>,
    pub connected: bool,
}

/// Hardware changes applied to a VM in one reconfigure call.
///
/// NIC removals are applied before additions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmReconfiguration {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cpus: Option<u32>,
    pub memory_mb: Option<u64>,
    /// Sizes in MB of hard disks to add.
    pub add_disks_mb: Vec<u64>,
    /// Indexes of NICs to remove.
    pub remove_nics: Vec<u32>,
    pub add_nics: Vec<NicSpec>,
}

impl VmReconfiguration {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaParams {
    pub name: String,
    pub image_type: String,
    pub size: u64,
    pub storage_profile: Option<StorageProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskParams {
    pub name: String,
    pub size_mb: u64,
    /// Href of a VM the disk should be placed close to.
    pub locality: Option<String>,
}
