use std::marker::PhantomData;

use tracing::{debug, info};
use vcloud_config::OperationClass;
use vcloud_core::{EntityStatus, LinkRel, Resource, VApp, Vm};
use vcloud_saga::{StateBag, StateKey, Step};

use super::Target;
use crate::context::CloudContext;
use crate::error::CloudError;
use crate::remote::{discard_suspended_state, post_and_wait, require_link};
use crate::state::{CONTAINER_VAPP, POWERON_TARGET, VAPP, VM};
use crate::traits::{IsoImageBuilder, VcdClient};

/// Entities with a power state.
trait Powerable: Resource + Clone + Send + 'static {
    fn status(&self) -> EntityStatus;

    fn reload<C: VcdClient>(&self, client: &C) -> crate::Result<Self>;
}

impl Powerable for VApp {
    fn status(&self) -> EntityStatus {
        self.status
    }

    fn reload<C: VcdClient>(&self, client: &C) -> crate::Result<Self> {
        client.reload_vapp(self)
    }
}

impl Powerable for Vm {
    fn status(&self) -> EntityStatus {
        self.status
    }

    fn reload<C: VcdClient>(&self, client: &C) -> crate::Result<Self> {
        client.reload_vm(self)
    }
}

/// Power on the vApp or VM under `target`. An entity that is already on is
/// left alone and not powered off on rollback.
pub struct PowerOn<C, I> {
    target: Target,
    _marker: PhantomData<(C, I)>,
}

impl<C, I> PowerOn<C, I> {
    #[must_use]
    pub fn new(target: Target) -> Self {
        Self {
            target,
            _marker: PhantomData,
        }
    }
}

impl<C, I> PowerOn<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    fn power_on<E: Powerable>(
        &self,
        ctx: &CloudContext<C, I>,
        state: &mut StateBag,
        key: StateKey<E>,
    ) -> crate::Result<()> {
        let entity = state.require(key)?.reload(ctx.client())?;
        if entity.status() == EntityStatus::PoweredOn {
            debug!(entity = %entity.name(), "already powered on");
            return Ok(());
        }

        let link = require_link(&entity, LinkRel::PowerOn)?;
        post_and_wait(ctx, &link, OperationClass::PowerOn)?;
        info!(entity = %entity.name(), "powered on");

        state.insert(POWERON_TARGET, self.target);
        state.insert(key, entity.reload(ctx.client())?);
        Ok(())
    }

    fn power_off<E: Powerable>(
        ctx: &CloudContext<C, I>,
        state: &StateBag,
        key: StateKey<E>,
    ) -> crate::Result<()> {
        let entity = state.require(key)?.reload(ctx.client())?;
        if entity.status() == EntityStatus::PoweredOff {
            debug!(entity = %entity.name(), "already powered off");
            return Ok(());
        }
        let link = require_link(&entity, LinkRel::PowerOff)?;
        post_and_wait(ctx, &link, OperationClass::PowerOff)
    }
}

impl<C, I> Step for PowerOn<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "power_on"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![self.target.key_name()]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        match self.target {
            Target::Vm => self.power_on(ctx, state, VM),
            Target::VApp => self.power_on(ctx, state, VAPP),
            Target::ContainerVApp => self.power_on(ctx, state, CONTAINER_VAPP),
            Target::Template | Target::Media => Err(CloudError::Unsupported(
                "powering on templates or media",
            )),
        }
    }

    fn rollback(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let Some(&target) = state.get(POWERON_TARGET) else {
            return Ok(());
        };
        let result = match target {
            Target::Vm => Self::power_off(ctx, state, VM),
            Target::VApp => Self::power_off(ctx, state, VAPP),
            Target::ContainerVApp => Self::power_off(ctx, state, CONTAINER_VAPP),
            Target::Template | Target::Media => Ok(()),
        };
        if let Err(err) = result {
            debug!(error = %err, "power off during rollback failed, ignoring");
        }
        Ok(())
    }

    fn rollback_description(&self) -> String {
        "power off".to_string()
    }
}

/// Reboot the VM under `VM`.
pub struct RebootVm<C, I> {
    _marker: PhantomData<(C, I)>,
}

impl<C, I> RebootVm<C, I> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<C, I> Default for RebootVm<C, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, I> Step for RebootVm<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "reboot_vm"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![VM.name()]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let vm = ctx.client().reload_vm(state.require(VM)?)?;
        let link = require_link(&vm, LinkRel::Reboot)?;
        post_and_wait(ctx, &link, OperationClass::Default)?;
        info!(vm = %vm.name, "rebooted");

        state.insert(VM, ctx.client().reload_vm(&vm)?);
        Ok(())
    }
}

/// Discard the suspended state of the VM under `VM`.
pub struct DiscardSuspendedState<C, I> {
    _marker: PhantomData<(C, I)>,
}

impl<C, I> DiscardSuspendedState<C, I> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<C, I> Default for DiscardSuspendedState<C, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, I> Step for DiscardSuspendedState<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "discard_suspended_state"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![VM.name()]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let vm = state.require(VM)?.clone();
        discard_suspended_state(ctx, &vm)?;
        info!(vm = %vm.name, "discarded suspended state");

        state.insert(VM, ctx.client().reload_vm(&vm)?);
        Ok(())
    }
}
