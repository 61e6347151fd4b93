use std::path::Path;

use vcloud_config::VcdConfig;
use vcloud_core::{
    CatalogItem, CatalogItemKind, Disk, DiskParams, InstantiateParams, Link, Media, MediaParams,
    OrgNetwork, RecomposeParams, StorageProfile, Task, UploadTemplateParams, VApp, VAppTemplate,
    Vdc, Vm, VmReconfiguration,
};

use crate::Result;

/// Facade over the vCloud Director REST API.
///
/// Lookups return `CloudError::NotFound` when the entity does not exist.
/// Mutations return the remote task; callers wait on it with a
/// [`TaskWaiter`](crate::TaskWaiter). A single client is shared by every
/// lifecycle call in the process and used concurrently without locking, so
/// implementations must tolerate concurrent requests.
pub trait VcdClient: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the configured VDC cannot be read.
    fn vdc(&self) -> Result<Vdc>;

    /// # Errors
    ///
    /// Returns `NotFound` if no vApp has this URN.
    fn resolve_vapp(&self, urn: &str) -> Result<VApp>;

    /// # Errors
    ///
    /// Returns `NotFound` if no VM has this URN.
    fn resolve_vm(&self, urn: &str) -> Result<Vm>;

    /// # Errors
    ///
    /// Returns `NotFound` if no independent disk has this URN.
    fn resolve_disk(&self, urn: &str) -> Result<Disk>;

    /// # Errors
    ///
    /// Returns `NotFound` if no catalog item has this URN.
    fn resolve_catalog_item(&self, urn: &str) -> Result<CatalogItem>;

    /// # Errors
    ///
    /// Returns `NotFound` if the VDC has no vApp with this name.
    fn vapp_by_name(&self, name: &str) -> Result<VApp>;

    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read. A missing item is `Ok(None)`.
    fn find_catalog_item(
        &self,
        catalog: &str,
        name: &str,
        kind: CatalogItemKind,
    ) -> Result<Option<CatalogItem>>;

    /// # Errors
    ///
    /// Returns `NotFound` if the item's template no longer exists.
    fn template_of(&self, item: &CatalogItem) -> Result<VAppTemplate>;

    /// # Errors
    ///
    /// Returns `NotFound` if the item's media no longer exists.
    fn media_of(&self, item: &CatalogItem) -> Result<Media>;

    /// # Errors
    ///
    /// Returns `NotFound` if the vApp was deleted.
    fn reload_vapp(&self, vapp: &VApp) -> Result<VApp>;

    /// # Errors
    ///
    /// Returns `NotFound` if the VM was deleted.
    fn reload_vm(&self, vm: &Vm) -> Result<Vm>;

    /// # Errors
    ///
    /// Returns `NotFound` if the template was deleted.
    fn reload_template(&self, template: &VAppTemplate) -> Result<VAppTemplate>;

    /// # Errors
    ///
    /// Returns `NotFound` if the media was deleted.
    fn reload_media(&self, media: &Media) -> Result<Media>;

    /// # Errors
    ///
    /// Returns an error if the task cannot be read.
    fn reload_task(&self, task: &Task) -> Result<Task>;

    /// # Errors
    ///
    /// Returns an error if the placeholder cannot be created.
    fn create_upload_template(
        &self,
        vdc: &Vdc,
        params: &UploadTemplateParams,
    ) -> Result<VAppTemplate>;

    /// Stream a local file to an upload link.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the upload is rejected.
    fn upload_file(&self, link: &Link, path: &Path, size: u64) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the template cannot be instantiated.
    fn instantiate_template(&self, vdc: &Vdc, params: &InstantiateParams) -> Result<VApp>;

    /// # Errors
    ///
    /// Returns an error if the recompose request is rejected.
    fn recompose(&self, link: &Link, params: &RecomposeParams) -> Result<Task>;

    /// # Errors
    ///
    /// Returns an error if the item cannot be added to the catalog.
    fn add_catalog_item(
        &self,
        catalog: &str,
        name: &str,
        entity_href: &str,
        kind: CatalogItemKind,
    ) -> Result<CatalogItem>;

    /// Create a media placeholder whose file is uploaded afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the placeholder cannot be created.
    fn create_media(&self, vdc: &Vdc, params: &MediaParams) -> Result<Media>;

    /// Invoke an action link (power on/off, reboot, undeploy, discard state, cancel).
    ///
    /// # Errors
    ///
    /// Returns `VAppSuspended`/`VmSuspended` if the entity is suspended and the
    /// action is not allowed in that state.
    fn post(&self, link: &Link) -> Result<Task>;

    /// # Errors
    ///
    /// Returns `NotFound` if the entity behind the link is gone.
    fn delete(&self, link: &Link) -> Result<Task>;

    /// # Errors
    ///
    /// Returns an error if the VM rejects the new hardware configuration.
    fn reconfigure_vm(&self, vm: &Vm, change: &VmReconfiguration) -> Result<Task>;

    /// # Errors
    ///
    /// Returns an error if the VM cannot be moved to the storage profile.
    fn set_vm_storage_profile(&self, vm: &Vm, profile: &StorageProfile) -> Result<Task>;

    /// # Errors
    ///
    /// Returns an error if the network cannot be added.
    fn add_vapp_network(&self, vapp: &VApp, network: &OrgNetwork) -> Result<Task>;

    /// # Errors
    ///
    /// Returns an error if the network cannot be removed.
    fn remove_vapp_network(&self, vapp: &VApp, name: &str) -> Result<Task>;

    /// # Errors
    ///
    /// Returns an error if the media cannot be inserted.
    fn insert_media(&self, vm: &Vm, media: &Media) -> Result<Task>;

    /// # Errors
    ///
    /// Returns `NotFound` if the media is not inserted.
    fn eject_media(&self, vm: &Vm, media: &Media) -> Result<Task>;

    /// # Errors
    ///
    /// Returns an error if the disk cannot be attached.
    fn attach_disk(&self, vm: &Vm, disk: &Disk) -> Result<Task>;

    /// # Errors
    ///
    /// Returns `VmSuspended` if the VM is suspended.
    fn detach_disk(&self, vm: &Vm, disk: &Disk) -> Result<Task>;

    /// # Errors
    ///
    /// Returns an error if the disk cannot be created.
    fn create_disk(&self, vdc: &Vdc, params: &DiskParams) -> Result<Disk>;

    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read. A missing key is `Ok(None)`.
    fn get_metadata(&self, vm: &Vm, key: &str) -> Result<Option<String>>;

    /// # Errors
    ///
    /// Returns an error if the metadata cannot be written.
    fn set_metadata(&self, vm: &Vm, key: &str, value: &str) -> Result<Task>;
}

/// Establishes authenticated sessions against vCloud Director.
pub trait ClientFactory: Send + Sync {
    type Client: VcdClient;

    /// # Errors
    ///
    /// Returns an error if the endpoint is unreachable or login fails.
    fn connect(&self, config: &VcdConfig) -> Result<Self::Client>;
}
