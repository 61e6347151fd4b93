use std::marker::PhantomData;

use tracing::debug;
use vcloud_config::OperationClass;
use vcloud_core::Resource;
use vcloud_saga::{StateBag, StateKey, Step};

use super::Target;
use crate::context::CloudContext;
use crate::error::CloudError;
use crate::state::{CONTAINER_VAPP, MEDIA, VAPP, VAPP_TEMPLATE, VM};
use crate::traits::{IsoImageBuilder, VcdClient};

/// Wait for every task of the entity under `target` to finish, then store
/// the refreshed handle.
pub struct WaitTasks<C, I> {
    target: Target,
    class: OperationClass,
    accept_failures: bool,
    _marker: PhantomData<(C, I)>,
}

impl<C, I> WaitTasks<C, I> {
    #[must_use]
    pub fn new(target: Target, class: OperationClass) -> Self {
        Self {
            target,
            class,
            accept_failures: false,
            _marker: PhantomData,
        }
    }

    /// Log failed tasks instead of failing the step.
    #[must_use]
    pub fn accept_failures(mut self) -> Self {
        self.accept_failures = true;
        self
    }
}

impl<C, I> WaitTasks<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    fn wait<E>(
        &self,
        ctx: &CloudContext<C, I>,
        state: &mut StateBag,
        key: StateKey<E>,
        reload: impl Fn(&E) -> crate::Result<E>,
    ) -> crate::Result<()>
    where
        E: Resource + Clone + Send + 'static,
    {
        let entity = state.require(key)?.clone();
        debug!(entity = %entity.name(), class = %self.class, "waiting for tasks");
        let refreshed = ctx
            .waiter()
            .wait_entity(&entity, self.class, self.accept_failures, reload)?;
        state.insert(key, refreshed);
        Ok(())
    }
}

impl<C, I> Step for WaitTasks<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "wait_tasks"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![self.target.key_name()]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let client = ctx.client();
        match self.target {
            Target::VApp => self.wait(ctx, state, VAPP, |v| client.reload_vapp(v)),
            Target::ContainerVApp => {
                self.wait(ctx, state, CONTAINER_VAPP, |v| client.reload_vapp(v))
            }
            Target::Vm => self.wait(ctx, state, VM, |v| client.reload_vm(v)),
            Target::Template => self.wait(ctx, state, VAPP_TEMPLATE, |t| {
                client.reload_template(t)
            }),
            Target::Media => self.wait(ctx, state, MEDIA, |m| client.reload_media(m)),
        }
    }
}
