use std::marker::PhantomData;

use tracing::{debug, info, warn};
use vcloud_config::OperationClass;
use vcloud_core::{Networks, ResourcePool, VmReconfiguration};
use vcloud_saga::{StateBag, Step};

use crate::context::CloudContext;
use crate::error::CloudError;
use crate::remote::nic_specs;
use crate::state::VM;
use crate::traits::{IsoImageBuilder, VcdClient};

/// Rename the VM after its agent, size it, add the ephemeral disk and replace
/// its NICs with one per requested network.
pub struct ReconfigureVm<C, I> {
    agent_id: String,
    description: String,
    resource_pool: ResourcePool,
    networks: Networks,
    _marker: PhantomData<(C, I)>,
}

impl<C, I> ReconfigureVm<C, I> {
    #[must_use]
    pub fn new(
        agent_id: impl Into<String>,
        description: impl Into<String>,
        resource_pool: ResourcePool,
        networks: Networks,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            description: description.into(),
            resource_pool,
            networks,
            _marker: PhantomData,
        }
    }
}

impl<C, I> Step for ReconfigureVm<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "reconfigure_vm"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![VM.name()]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let vm = ctx.client().reload_vm(state.require(VM)?)?;

        let change = VmReconfiguration {
            name: Some(self.agent_id.clone()),
            description: Some(self.description.clone()),
            cpus: Some(self.resource_pool.cpu),
            memory_mb: Some(self.resource_pool.ram),
            add_disks_mb: vec![self.resource_pool.disk],
            remove_nics: vm.hardware.nics.iter().map(|nic| nic.index).collect(),
            add_nics: nic_specs(&self.networks),
        };
        debug!(vm = %vm.name, ?change, "reconfiguring VM");

        let task = ctx.client().reconfigure_vm(&vm, &change)?;
        ctx.waiter().wait_task(&task, OperationClass::Default, false)?;
        info!(
            vm = %vm.name,
            agent_id = %self.agent_id,
            cpus = self.resource_pool.cpu,
            memory_mb = self.resource_pool.ram,
            nics = change.add_nics.len(),
            "reconfigured VM"
        );

        state.insert(VM, ctx.client().reload_vm(&vm)?);
        Ok(())
    }
}

/// Move the VM to another storage profile.
///
/// Settings that the reconfigure call cannot change go through the VM's edit link.
pub struct EditVm<C, I> {
    storage_profile: String,
    _marker: PhantomData<(C, I)>,
}

impl<C, I> EditVm<C, I> {
    #[must_use]
    pub fn new(storage_profile: impl Into<String>) -> Self {
        Self {
            storage_profile: storage_profile.into(),
            _marker: PhantomData,
        }
    }
}

impl<C, I> Step for EditVm<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "edit_vm"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![VM.name()]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let vm = ctx.client().reload_vm(state.require(VM)?)?;
        let vdc = ctx.client().vdc()?;

        let Some(profile) = vdc.storage_profile(&self.storage_profile) else {
            warn!(
                vm = %vm.name,
                profile = %self.storage_profile,
                vdc = %vdc.name,
                "storage profile not found, leaving VM where it is"
            );
            return Ok(());
        };
        if vm.storage_profile.as_deref() == Some(profile.name.as_str()) {
            debug!(vm = %vm.name, profile = %profile.name, "VM already on storage profile");
            return Ok(());
        }

        let task = ctx.client().set_vm_storage_profile(&vm, profile)?;
        ctx.waiter().wait_task(&task, OperationClass::Default, false)?;
        info!(vm = %vm.name, profile = %profile.name, "moved VM to storage profile");

        state.insert(VM, ctx.client().reload_vm(&vm)?);
        Ok(())
    }
}
