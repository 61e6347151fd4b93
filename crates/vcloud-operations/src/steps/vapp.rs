use std::marker::PhantomData;

use tracing::{debug, info, warn};
use vcloud_config::OperationClass;
use vcloud_core::{InstantiateParams, LinkRel, RecomposeParams, VApp};
use vcloud_saga::{StateBag, Step};

use crate::context::CloudContext;
use crate::error::CloudError;
use crate::remote::{delete_vapp, power_off_vapp};
use crate::state::{CONTAINER_VAPP, INSTANTIATED_VAPP, VAPP, VM};
use crate::traits::{IsoImageBuilder, VcdClient};

/// Instantiate a new vApp from the template behind a catalog item.
pub struct InstantiateVApp<C, I> {
    catalog_item_id: String,
    name: String,
    disk_locality: Vec<String>,
    _marker: PhantomData<(C, I)>,
}

impl<C, I> InstantiateVApp<C, I> {
    /// `disk_locality` holds hrefs of independent disks the vApp must reach.
    #[must_use]
    pub fn new(
        catalog_item_id: impl Into<String>,
        name: impl Into<String>,
        disk_locality: Vec<String>,
    ) -> Self {
        Self {
            catalog_item_id: catalog_item_id.into(),
            name: name.into(),
            disk_locality,
            _marker: PhantomData,
        }
    }
}

impl<C, I> InstantiateVApp<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    fn discard(ctx: &CloudContext<C, I>, vapp: &VApp) -> crate::Result<()> {
        let vapp = ctx.waiter().wait_entity(
            vapp,
            OperationClass::InstantiateVAppTemplate,
            true,
            |v| ctx.client().reload_vapp(v),
        )?;
        if let Err(err) = power_off_vapp(ctx, &vapp) {
            debug!(vapp = %vapp.name, error = %err, "power off before delete failed");
        }
        delete_vapp(ctx, &vapp)
    }
}

impl<C, I> Step for InstantiateVApp<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "instantiate_vapp"
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let client = ctx.client();
        let item = client.resolve_catalog_item(&self.catalog_item_id)?;
        let template = client.template_of(&item)?;
        let vdc = client.vdc()?;

        let params = InstantiateParams {
            name: self.name.clone(),
            description: ctx.entities().description.clone(),
            source: template.href,
            linked_clone: false,
            disk_locality: self.disk_locality.clone(),
            all_eulas_accepted: true,
        };
        let vapp = client.instantiate_template(&vdc, &params)?;
        info!(vapp = %vapp.name, urn = %vapp.urn, template = %template.name, "instantiated vApp");

        state.insert(INSTANTIATED_VAPP, vapp.clone());
        state.insert(VAPP, vapp);
        Ok(())
    }

    fn rollback(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let Some(vapp) = state.get(INSTANTIATED_VAPP) else {
            return Ok(());
        };
        match Self::discard(ctx, vapp) {
            Err(err) if err.is_not_found() => {
                debug!(vapp = %self.name, "instantiated vApp already gone");
                Ok(())
            }
            result => result,
        }
    }

    fn rollback_description(&self) -> String {
        format!("delete vApp '{}'", self.name)
    }
}

/// Move the freshly created VM into the container vApp.
pub struct RecomposeVApp<C, I> {
    _marker: PhantomData<(C, I)>,
}

impl<C, I> RecomposeVApp<C, I> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<C, I> Default for RecomposeVApp<C, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, I> Step for RecomposeVApp<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "recompose_vapp"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![CONTAINER_VAPP.name(), VM.name()]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let container = state.require(CONTAINER_VAPP)?.clone();
        let vm = state.require(VM)?;

        // The recompose link is not advertised while the vApp is busy.
        let link = container
            .recompose_link(true)
            .ok_or_else(|| CloudError::MissingLink {
                entity: container.name.clone(),
                rel: LinkRel::Recompose,
            })?;
        let params = RecomposeParams {
            name: container.name.clone(),
            all_eulas_accepted: true,
            source_items: vec![vm.href.clone()],
        };
        debug!(container = %container.name, vm = %vm.name, "recomposing");

        let task = ctx.client().recompose(&link, &params)?;
        ctx.waiter().wait_task(&task, OperationClass::Default, false)?;
        info!(container = %container.name, vm = %vm.name, "moved VM into container vApp");

        let container = ctx.client().reload_vapp(&container)?;
        state.insert(CONTAINER_VAPP, container);
        Ok(())
    }
}

/// Delete the vApp under `VAPP`, undeploying it first if needed.
pub struct DeleteVApp<C, I> {
    _marker: PhantomData<(C, I)>,
}

impl<C, I> DeleteVApp<C, I> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<C, I> Default for DeleteVApp<C, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, I> Step for DeleteVApp<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "delete_vapp"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![VAPP.name()]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let vapp = state.require(VAPP)?.clone();
        if !vapp.vms.is_empty() {
            warn!(vapp = %vapp.name, vms = vapp.vms.len(), "deleting vApp that still has VMs");
        }
        delete_vapp(ctx, &vapp)?;
        state.remove(VAPP);
        Ok(())
    }
}
