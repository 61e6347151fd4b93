use tracing::info;
use uuid::Uuid;
use vcloud_config::OperationClass;
use vcloud_core::{DiskParams, LinkRel};

use super::Cloud;
use crate::Result;
use crate::agent_env::newly_added_disk;
use crate::remote::{
    delete_and_wait, get_agent_env, require_link, set_agent_env, vapp_and_vm,
    with_suspend_recovery,
};
use crate::traits::{ClientFactory, IsoImageBuilder, VcdClient};

impl<F, I> Cloud<F, I>
where
    F: ClientFactory,
    I: IsoImageBuilder,
{
    /// Attach an independent disk to a VM and record it in the agent environment.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedDiskCount` if the VM does not show exactly one new
    /// disk afterwards, or the last error once the CPI retry policy is exhausted.
    pub fn attach_disk(&self, vapp_id: &str, disk_id: &str) -> Result<()> {
        self.with_retries("attach_disk", |ctx| {
            info!(disk_id, vapp_id, "attaching disk");
            let (_, vm) = vapp_and_vm(ctx, vapp_id)?;
            let previous = vm.hardware.hard_disks.clone();

            let disk = ctx.client().resolve_disk(disk_id)?;
            let task = ctx.client().attach_disk(&vm, &disk)?;
            ctx.waiter().wait_task(&task, OperationClass::Default, false)?;

            let (_, vm) = vapp_and_vm(ctx, vapp_id)?;
            let attached = newly_added_disk(&vm.name, &previous, &vm.hardware.hard_disks)?;

            let mut env = get_agent_env(ctx, &vm)?;
            env.attach_persistent_disk(disk_id, attached.disk_id);
            set_agent_env(ctx, &vm, &env)?;
            info!(disk_id, vapp_id, "attached disk");
            Ok(())
        })
    }

    /// Detach an independent disk from a VM and drop it from the agent environment.
    ///
    /// # Errors
    ///
    /// Returns the last error once the CPI retry policy is exhausted.
    pub fn detach_disk(&self, vapp_id: &str, disk_id: &str) -> Result<()> {
        self.with_retries("detach_disk", |ctx| {
            info!(disk_id, vapp_id, "detaching disk");
            let (vapp, vm) = vapp_and_vm(ctx, vapp_id)?;
            let disk = ctx.client().resolve_disk(disk_id)?;

            with_suspend_recovery(ctx, &vapp, || {
                let task = ctx.client().detach_disk(&vm, &disk)?;
                ctx.waiter().wait_task(&task, OperationClass::Default, false)
            })?;

            let mut env = get_agent_env(ctx, &vm)?;
            env.detach_persistent_disk(disk_id);
            set_agent_env(ctx, &vm, &env)?;
            info!(disk_id, vapp_id, "detached disk");
            Ok(())
        })
    }

    /// Create an independent disk, optionally placed near the VM of `vm_locality`
    /// (a vApp id). Returns the disk's URN.
    ///
    /// # Errors
    ///
    /// Returns the last error once the CPI retry policy is exhausted.
    pub fn create_disk(&self, size_mb: u64, vm_locality: Option<&str>) -> Result<String> {
        self.with_retries("create_disk", |ctx| {
            let name = Uuid::new_v4().to_string();
            let locality = match vm_locality {
                Some(vapp_id) => Some(vapp_and_vm(ctx, vapp_id)?.1),
                None => None,
            };
            info!(
                disk = %name,
                size_mb,
                vm = locality.as_ref().map(|vm| vm.name.as_str()),
                "creating disk"
            );

            let params = DiskParams {
                name,
                size_mb,
                locality: locality.map(|vm| vm.href),
            };
            let vdc = ctx.client().vdc()?;
            let disk = ctx.client().create_disk(&vdc, &params)?;
            let disk = ctx
                .waiter()
                .wait_entity(&disk, OperationClass::Default, false, |d| {
                    ctx.client().resolve_disk(&d.urn)
                })?;
            info!(disk = %disk.name, urn = %disk.urn, size_mb, "created disk");
            Ok(disk.urn)
        })
    }

    /// # Errors
    ///
    /// Returns the last error once the CPI retry policy is exhausted.
    pub fn delete_disk(&self, disk_id: &str) -> Result<()> {
        self.with_retries("delete_disk", |ctx| {
            info!(disk_id, "deleting disk");
            let disk = ctx.client().resolve_disk(disk_id)?;
            delete_and_wait(ctx, &require_link(&disk, LinkRel::Remove)?, OperationClass::Default)?;
            info!(disk_id, "deleted disk");
            Ok(())
        })
    }

    /// # Errors
    ///
    /// Returns the last error once the CPI retry policy is exhausted.
    pub fn get_disk_size_mb(&self, disk_id: &str) -> Result<u64> {
        self.with_retries("get_disk_size_mb", |ctx| {
            let disk = ctx.client().resolve_disk(disk_id)?;
            info!(disk_id, size_mb = disk.size_mb, "disk size");
            Ok(disk.size_mb)
        })
    }
}
