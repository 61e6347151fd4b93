//! Point-in-time snapshots of remote entities.
//!
//! Handles are produced by the client facade and never cached beyond a single
//! transaction: after any mutating call the caller reloads the handle.

use serde::{Deserialize, Serialize};

use crate::status::{EntityStatus, TaskStatus};

/// Relation of a link advertised by a remote entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRel {
    PowerOn,
    PowerOff,
    Reboot,
    Undeploy,
    DiscardState,
    Remove,
    Cancel,
    Edit,
    Recompose,
    Reconfigure,
    Upload,
    InsertMedia,
    EjectMedia,
    AttachDisk,
    DetachDisk,
    Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub rel: LinkRel,
    pub href: String,
}

impl Link {
    #[must_use]
    pub fn new(rel: LinkRel, href: impl Into<String>) -> Self {
        Self {
            rel,
            href: href.into(),
        }
    }
}

/// Common view over every remote entity with an identity, links and tasks.
pub trait Resource {
    fn urn(&self) -> &str;
    fn name(&self) -> &str;
    fn href(&self) -> &str;
    fn links(&self) -> &[Link];

    fn tasks(&self) -> &[Task] {
        &[]
    }

    fn link(&self, rel: LinkRel) -> Option<&Link> {
        self.links().iter().find(|link| link.rel == rel)
    }

    /// Tasks that have not reached a terminal status yet.
    fn running_tasks(&self) -> Vec<&Task> {
        self.tasks()
            .iter()
            .filter(|task| !task.status.is_terminal())
            .collect()
    }
}

macro_rules! impl_resource {
    ($ty:ty) => {
        impl Resource for $ty {
            fn urn(&self) -> &str {
                &self.urn
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn href(&self) -> &str {
                &self.href
            }

            fn links(&self) -> &[Link] {
                &self.links
            }

            fn tasks(&self) -> &[Task] {
                &self.tasks
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub urn: String,
    pub name: String,
    pub href: String,
    pub operation: String,
    pub status: TaskStatus,
    pub error_message: Option<String>,
    pub links: Vec<Link>,
}

impl Resource for Task {
    fn urn(&self) -> &str {
        &self.urn
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn href(&self) -> &str {
        &self.href
    }

    fn links(&self) -> &[Link] {
        &self.links
    }
}

/// A virtual disk as seen in a VM's hardware section.
///
/// `disk_id` is the hypervisor-level id the in-guest agent uses to find the
/// device; it is what the agent environment records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HardDisk {
    pub instance_id: String,
    pub disk_id: String,
    pub capacity_mb: u64,
    /// Href of the independent disk backing this device, if any.
    pub host_resource: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nic {
    pub index: u32,
    pub network: String,
    pub mac_address: String,
    pub ip_address: Option<String>,
    pub connected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualHardware {
    pub cpus: u32,
    pub memory_mb: u64,
    pub hard_disks: Vec<HardDisk>,
    pub nics: Vec<Nic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vm {
    pub urn: String,
    pub name: String,
    pub href: String,
    pub status: EntityStatus,
    pub deployed: bool,
    pub hardware: VirtualHardware,
    pub storage_profile: Option<String>,
    pub links: Vec<Link>,
    pub tasks: Vec<Task>,
}

impl_resource!(Vm);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VApp {
    pub urn: String,
    pub name: String,
    pub href: String,
    pub status: EntityStatus,
    pub deployed: bool,
    pub vms: Vec<Vm>,
    /// Names of the networks configured at the vApp level.
    pub networks: Vec<String>,
    pub links: Vec<Link>,
    pub tasks: Vec<Task>,
}

impl_resource!(VApp);

impl VApp {
    /// Link used to recompose this vApp.
    ///
    /// The recompose link is not advertised while the vApp is running or in
    /// transition, so with `force` it is built from the vApp href instead of
    /// being read from the advertised links.
    #[must_use]
    pub fn recompose_link(&self, force: bool) -> Option<Link> {
        if force {
            return Some(Link::new(
                LinkRel::Recompose,
                format!("{}/action/recomposeVApp", self.href),
            ));
        }
        self.link(LinkRel::Recompose).cloned()
    }
}

/// A file belonging to a template or media upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    pub name: String,
    pub size: u64,
    pub bytes_transferred: u64,
    pub upload_link: Option<Link>,
}

impl TemplateFile {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.size > 0 && self.bytes_transferred >= self.size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VAppTemplate {
    pub urn: String,
    pub name: String,
    pub href: String,
    pub status: EntityStatus,
    pub files: Vec<TemplateFile>,
    pub links: Vec<Link>,
    pub tasks: Vec<Task>,
}

impl_resource!(VAppTemplate);

impl VAppTemplate {
    /// Files the platform still expects to receive.
    #[must_use]
    pub fn incomplete_files(&self) -> Vec<&TemplateFile> {
        self.files.iter().filter(|f| !f.is_complete()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub urn: String,
    pub name: String,
    pub href: String,
    pub status: EntityStatus,
    pub files: Vec<TemplateFile>,
    pub links: Vec<Link>,
    pub tasks: Vec<Task>,
}

impl_resource!(Media);

/// An independent disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    pub urn: String,
    pub name: String,
    pub href: String,
    pub size_mb: u64,
    pub links: Vec<Link>,
    pub tasks: Vec<Task>,
}

impl_resource!(Disk);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogItemKind {
    VAppTemplate,
    Media,
}

/// A catalog entry pointing at a template or a media image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub urn: String,
    pub name: String,
    pub href: String,
    pub kind: CatalogItemKind,
    pub entity_href: String,
    pub links: Vec<Link>,
}

impl Resource for CatalogItem {
    fn urn(&self) -> &str {
        &self.urn
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn href(&self) -> &str {
        &self.href
    }

    fn links(&self) -> &[Link] {
        &self.links
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrgNetwork {
    pub name: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageProfile {
    pub name: String,
    pub href: String,
}

/// The virtual data center backing the configured resource pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vdc {
    pub name: String,
    pub href: String,
    pub available_networks: Vec<OrgNetwork>,
    pub storage_profiles: Vec<StorageProfile>,
}

impl Vdc {
    #[must_use]
    pub fn network(&self, name: &str) -> Option<&OrgNetwork> {
        self.available_networks.iter().find(|n| n.name == name)
    }

    #[must_use]
    pub fn storage_profile(&self, name: &str) -> Option<&StorageProfile> {
        self.storage_profiles.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vapp(links: Vec<Link>) -> VApp {
        VApp {
            urn: "urn:vcloud:vapp:1".to_string(),
            name: "container".to_string(),
            href: "https://vcd/api/vApp/vapp-1".to_string(),
            status: EntityStatus::PoweredOn,
            deployed: true,
            vms: Vec::new(),
            networks: Vec::new(),
            links,
            tasks: Vec::new(),
        }
    }

    fn task(status: TaskStatus) -> Task {
        Task {
            urn: "urn:vcloud:task:1".to_string(),
            name: "task".to_string(),
            href: "https://vcd/api/task/1".to_string(),
            operation: "deploy".to_string(),
            status,
            error_message: None,
            links: Vec::new(),
        }
    }

    #[test]
    fn forced_recompose_link_is_built_from_href() {
        let vapp = vapp(Vec::new());

        let link = vapp.recompose_link(true).expect("forced link");

        assert_eq!(link.rel, LinkRel::Recompose);
        assert_eq!(link.href, "https://vcd/api/vApp/vapp-1/action/recomposeVApp");
    }

    #[test]
    fn unforced_recompose_link_requires_advertisement() {
        assert_eq!(vapp(Vec::new()).recompose_link(false), None);

        let advertised = Link::new(LinkRel::Recompose, "https://vcd/advertised");
        let vapp = vapp(vec![advertised.clone()]);
        assert_eq!(vapp.recompose_link(false), Some(advertised));
    }

    #[test]
    fn link_lookup_by_rel() {
        let vapp = vapp(vec![
            Link::new(LinkRel::PowerOn, "on"),
            Link::new(LinkRel::PowerOff, "off"),
        ]);

        assert_eq!(vapp.link(LinkRel::PowerOff).map(|l| l.href.as_str()), Some("off"));
        assert!(vapp.link(LinkRel::Reboot).is_none());
    }

    #[test]
    fn running_tasks_skip_terminal_ones() {
        let mut vapp = vapp(Vec::new());
        vapp.tasks = vec![task(TaskStatus::Success), task(TaskStatus::Running)];

        let running = vapp.running_tasks();

        assert_eq!(running.len(), 1);
        assert_eq!(running[0].status, TaskStatus::Running);
    }

    #[test]
    fn incomplete_files_include_empty_and_partial_uploads() {
        let file = |name: &str, size, transferred| TemplateFile {
            name: name.to_string(),
            size,
            bytes_transferred: transferred,
            upload_link: None,
        };
        let template = VAppTemplate {
            urn: "urn:vcloud:vapptemplate:1".to_string(),
            name: "sc-1".to_string(),
            href: "https://vcd/api/vAppTemplate/1".to_string(),
            status: EntityStatus::Unresolved,
            files: vec![
                file("image.ovf", 100, 100),
                file("image-disk1.vmdk", 0, 0),
                file("image-disk2.vmdk", 500, 10),
            ],
            links: Vec::new(),
            tasks: Vec::new(),
        };

        let names: Vec<_> = template
            .incomplete_files()
            .into_iter()
            .map(|f| f.name.as_str())
            .collect();

        assert_eq!(names, vec!["image-disk1.vmdk", "image-disk2.vmdk"]);
    }

    #[test]
    fn vdc_lookups() {
        let vdc = Vdc {
            name: "vdc".to_string(),
            href: "https://vcd/api/vdc/1".to_string(),
            available_networks: vec![OrgNetwork {
                name: "public".to_string(),
                href: "https://vcd/api/network/1".to_string(),
            }],
            storage_profiles: vec![StorageProfile {
                name: "gold".to_string(),
                href: "https://vcd/api/sp/1".to_string(),
            }],
        };

        assert!(vdc.network("public").is_some());
        assert!(vdc.network("private").is_none());
        assert!(vdc.storage_profile("gold").is_some());
        assert!(vdc.storage_profile("silver").is_none());
    }
}
