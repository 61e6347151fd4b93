use std::marker::PhantomData;

use tracing::info;
use vcloud_saga::{StateBag, Step};

use crate::context::CloudContext;
use crate::error::CloudError;
use crate::remote::{accessible_networks, add_vapp_networks, delete_unused_networks, remove_vapp_networks};
use crate::state::{ADDED_NETWORKS, VAPP};
use crate::traits::{IsoImageBuilder, VcdClient};

/// Connect the vApp to the named organization networks.
///
/// Every name is checked against the VDC before the first network is added.
pub struct AddNetworks<C, I> {
    names: Vec<String>,
    _marker: PhantomData<(C, I)>,
}

impl<C, I> AddNetworks<C, I> {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            _marker: PhantomData,
        }
    }
}

impl<C, I> Step for AddNetworks<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "add_networks"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![VAPP.name()]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let vdc = ctx.client().vdc()?;
        let networks = accessible_networks(&vdc, &self.names)?;

        let vapp = ctx.client().reload_vapp(state.require(VAPP)?)?;
        let added = add_vapp_networks(ctx, &vapp, &networks)?;
        info!(vapp = %vapp.name, ?added, "added vApp networks");

        state.insert(ADDED_NETWORKS, added);
        state.insert(VAPP, ctx.client().reload_vapp(&vapp)?);
        Ok(())
    }

    fn rollback(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let (Some(vapp), Some(added)) = (state.get(VAPP), state.get(ADDED_NETWORKS)) else {
            return Ok(());
        };
        remove_vapp_networks(ctx, vapp, added);
        Ok(())
    }

    fn rollback_description(&self) -> String {
        "remove added vApp networks".to_string()
    }
}

/// Remove vApp networks that none of the requested networks refer to.
pub struct DeleteUnusedNetworks<C, I> {
    keep: Vec<String>,
    _marker: PhantomData<(C, I)>,
}

impl<C, I> DeleteUnusedNetworks<C, I> {
    #[must_use]
    pub fn new(keep: Vec<String>) -> Self {
        Self {
            keep,
            _marker: PhantomData,
        }
    }
}

impl<C, I> Step for DeleteUnusedNetworks<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "delete_unused_networks"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![VAPP.name()]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let vapp = state.require(VAPP)?.clone();
        delete_unused_networks(ctx, &vapp, &self.keep)?;
        state.insert(VAPP, ctx.client().reload_vapp(&vapp)?);
        Ok(())
    }
}
