use std::marker::PhantomData;

use serde_json::Value;
use tracing::{debug, info};
use vcloud_config::OperationClass;
use vcloud_core::{LinkRel, Networks};
use vcloud_saga::{StateBag, Step};

use crate::agent_env::{build_agent_env, disk_env, network_env, newly_added_disk};
use crate::context::CloudContext;
use crate::error::CloudError;
use crate::remote::{
    delete_and_wait, delete_catalog_media, eject_catalog_media, insert_media, require_link,
    save_agent_env_metadata, upload_media,
};
use crate::state::{AGENT_ENV, DISKS, ISO, MEDIA, VM};
use crate::traits::{IsoImageBuilder, VcdClient};

/// Build the agent environment of a new VM, store it as metadata and pack it
/// into a configuration image.
///
/// The ephemeral disk is the one disk that appeared since `DISKS` was
/// recorded; the system disk is the first disk of that snapshot.
pub struct SaveAgentEnv<C, I> {
    agent_id: String,
    networks: Networks,
    environment: Option<Value>,
    _marker: PhantomData<(C, I)>,
}

impl<C, I> SaveAgentEnv<C, I> {
    #[must_use]
    pub fn new(agent_id: impl Into<String>, networks: Networks, environment: Option<Value>) -> Self {
        Self {
            agent_id: agent_id.into(),
            networks,
            environment,
            _marker: PhantomData,
        }
    }
}

impl<C, I> Step for SaveAgentEnv<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "save_agent_env"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![VM.name(), DISKS.name()]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let vm = ctx.client().reload_vm(state.require(VM)?)?;
        let previous = state.require(DISKS)?;

        let system = previous
            .first()
            .cloned()
            .ok_or_else(|| CloudError::MissingSystemDisk {
                vm: vm.name.clone(),
            })?;
        let ephemeral = newly_added_disk(&vm.name, previous, &vm.hardware.hard_disks)?;

        let env = build_agent_env(
            ctx.config(),
            &vm,
            &self.agent_id,
            network_env(&vm.hardware.nics, &self.networks),
            disk_env(&system, &ephemeral),
            self.environment.as_ref(),
        );
        let json = save_agent_env_metadata(ctx, &vm, &env)?;
        let iso = ctx.iso_builder().build(&json)?;
        info!(vm = %vm.name, iso = %iso.path().display(), "generated agent env image");

        state.insert(ISO, iso);
        state.insert(AGENT_ENV, env);
        state.insert(VM, vm);
        Ok(())
    }
}

/// Eject the configuration media named after the VM, if one is inserted.
pub struct EjectCatalogMedia<C, I> {
    _marker: PhantomData<(C, I)>,
}

impl<C, I> EjectCatalogMedia<C, I> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<C, I> Default for EjectCatalogMedia<C, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, I> Step for EjectCatalogMedia<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "eject_catalog_media"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![VM.name()]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let vm = state.require(VM)?;
        eject_catalog_media(ctx, vm, &vm.name)
    }
}

/// Delete the configuration media named after the VM, if it exists.
pub struct DeleteCatalogMedia<C, I> {
    _marker: PhantomData<(C, I)>,
}

impl<C, I> DeleteCatalogMedia<C, I> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<C, I> Default for DeleteCatalogMedia<C, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, I> Step for DeleteCatalogMedia<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "delete_catalog_media"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![VM.name()]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        delete_catalog_media(ctx, &state.require(VM)?.name)
    }
}

/// Upload the configuration image under `ISO` as media named after the VM.
pub struct UploadCatalogMedia<C, I> {
    _marker: PhantomData<(C, I)>,
}

impl<C, I> UploadCatalogMedia<C, I> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<C, I> Default for UploadCatalogMedia<C, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, I> Step for UploadCatalogMedia<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "upload_catalog_media"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![VM.name(), ISO.name()]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let name = state.require(VM)?.name.clone();
        let media = upload_media(ctx, &name, state.require(ISO)?)?;
        state.insert(MEDIA, media);
        Ok(())
    }

    fn rollback(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let Some(media) = state.get(MEDIA) else {
            return Ok(());
        };
        let result = require_link(media, LinkRel::Remove)
            .and_then(|link| delete_and_wait(ctx, &link, OperationClass::DeleteMedia));
        match result {
            Err(err) if err.is_not_found() => {
                debug!(media = %media.name, "media already gone");
                Ok(())
            }
            result => result,
        }
    }

    fn rollback_description(&self) -> String {
        "delete uploaded media".to_string()
    }
}

/// Insert the media under `MEDIA` into the VM.
pub struct InsertCatalogMedia<C, I> {
    _marker: PhantomData<(C, I)>,
}

impl<C, I> InsertCatalogMedia<C, I> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<C, I> Default for InsertCatalogMedia<C, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, I> Step for InsertCatalogMedia<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "insert_catalog_media"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![VM.name(), MEDIA.name()]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        insert_media(ctx, state.require(VM)?, state.require(MEDIA)?)
    }

    fn rollback(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let (Some(vm), Some(media)) = (state.get(VM), state.get(MEDIA)) else {
            return Ok(());
        };
        let result = ctx
            .client()
            .eject_media(vm, media)
            .and_then(|task| ctx.waiter().wait_task(&task, OperationClass::Default, false));
        match result {
            Err(err) if err.is_not_found() => {
                debug!(vm = %vm.name, media = %media.name, "media not inserted");
                Ok(())
            }
            result => result.map(drop),
        }
    }

    fn rollback_description(&self) -> String {
        "eject inserted media".to_string()
    }
}
