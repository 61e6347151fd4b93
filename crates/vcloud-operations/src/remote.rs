//! Remote call sequences shared by workflow steps and lifecycle operations.

use tracing::{debug, info, warn};
use vcloud_config::OperationClass;
use vcloud_core::{
    AgentEnv, CatalogItem, CatalogItemKind, EntityStatus, IpAddressingMode, Link, LinkRel, Media,
    MediaParams, NicSpec, Networks, OrgNetwork, Resource, VApp, Vdc, Vm,
};
use vcloud_saga::retry_operation;

use crate::{Result, VM_NIC_LIMIT};
use crate::context::CloudContext;
use crate::error::CloudError;
use crate::traits::{IsoImage, IsoImageBuilder, VcdClient};

const MEDIA_IMAGE_TYPE: &str = "iso";

pub(crate) fn require_link<E: Resource>(entity: &E, rel: LinkRel) -> Result<Link> {
    entity
        .link(rel)
        .cloned()
        .ok_or_else(|| CloudError::MissingLink {
            entity: entity.name().to_string(),
            rel,
        })
}

/// Invoke an action link and wait for the resulting task.
pub(crate) fn post_and_wait<C, I>(
    ctx: &CloudContext<C, I>,
    link: &Link,
    class: OperationClass,
) -> Result<()>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let task = ctx.client().post(link)?;
    ctx.waiter().wait_task(&task, class, false)?;
    Ok(())
}

pub(crate) fn delete_and_wait<C, I>(
    ctx: &CloudContext<C, I>,
    link: &Link,
    class: OperationClass,
) -> Result<()>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let task = ctx.client().delete(link)?;
    ctx.waiter().wait_task(&task, class, false)?;
    Ok(())
}

/// The single VM of a vApp.
pub(crate) fn single_vm(vapp: &VApp) -> Result<Vm> {
    match vapp.vms.as_slice() {
        [vm] => Ok(vm.clone()),
        vms => Err(CloudError::InvalidVmCount {
            vapp: vapp.name.clone(),
            count: vms.len(),
        }),
    }
}

pub(crate) fn vapp_and_vm<C, I>(ctx: &CloudContext<C, I>, vapp_id: &str) -> Result<(VApp, Vm)>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let vapp = ctx.client().resolve_vapp(vapp_id)?;
    let vm = single_vm(&vapp)?;
    Ok((vapp, vm))
}

/// Run `op`; if it fails because the vApp is suspended, discard the suspended
/// state and run it once more.
pub(crate) fn with_suspend_recovery<C, I, T>(
    ctx: &CloudContext<C, I>,
    vapp: &VApp,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    match op() {
        Err(err) if err.is_suspended() => {
            warn!(vapp = %vapp.name, error = %err, "entity suspended, discarding suspended state");
            discard_suspended_state(ctx, vapp)?;
            op()
        }
        result => result,
    }
}

pub(crate) fn discard_suspended_state<C, I, E>(ctx: &CloudContext<C, I>, entity: &E) -> Result<()>
where
    C: VcdClient,
    I: IsoImageBuilder,
    E: Resource,
{
    let link = require_link(entity, LinkRel::DiscardState)?;
    debug!(entity = %entity.name(), "discarding suspended state");
    post_and_wait(ctx, &link, OperationClass::Default)
}

/// Power off a vApp. A vApp that is already off is left alone.
pub(crate) fn power_off_vapp<C, I>(ctx: &CloudContext<C, I>, vapp: &VApp) -> Result<()>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let vapp = ctx.client().reload_vapp(vapp)?;
    if vapp.status == EntityStatus::PoweredOff {
        debug!(vapp = %vapp.name, "already powered off");
        return Ok(());
    }
    if vapp.status == EntityStatus::Suspended {
        return Err(CloudError::VAppSuspended { name: vapp.name });
    }
    let link = require_link(&vapp, LinkRel::PowerOff)?;
    debug!(vapp = %vapp.name, "powering off");
    post_and_wait(ctx, &link, OperationClass::PowerOff)
}

pub(crate) fn power_on_vapp<C, I>(ctx: &CloudContext<C, I>, vapp: &VApp) -> Result<()>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let vapp = ctx.client().reload_vapp(vapp)?;
    if vapp.status == EntityStatus::PoweredOn {
        debug!(vapp = %vapp.name, "already powered on");
        return Ok(());
    }
    let link = require_link(&vapp, LinkRel::PowerOn)?;
    debug!(vapp = %vapp.name, "powering on");
    post_and_wait(ctx, &link, OperationClass::PowerOn)
}

/// Undeploy (when deployed) and delete a vApp.
pub(crate) fn delete_vapp<C, I>(ctx: &CloudContext<C, I>, vapp: &VApp) -> Result<()>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let vapp = ctx.client().reload_vapp(vapp)?;
    if vapp.deployed {
        let link = require_link(&vapp, LinkRel::Undeploy)?;
        debug!(vapp = %vapp.name, "undeploying");
        post_and_wait(ctx, &link, OperationClass::Undeploy)?;
    }
    let vapp = ctx.client().reload_vapp(&vapp)?;
    let link = require_link(&vapp, LinkRel::Remove)?;
    info!(vapp = %vapp.name, "deleting vApp");
    delete_and_wait(ctx, &link, OperationClass::DeleteVApp)
}

/// Media catalog item and media named `name`, if present.
pub(crate) fn find_media<C, I>(
    ctx: &CloudContext<C, I>,
    name: &str,
) -> Result<Option<(CatalogItem, Media)>>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let catalog = &ctx.entities().media_catalog;
    let Some(item) = ctx
        .client()
        .find_catalog_item(catalog, name, CatalogItemKind::Media)?
    else {
        return Ok(None);
    };
    let media = ctx.client().media_of(&item)?;
    Ok(Some((item, media)))
}

/// Eject the media named `name` from `vm`. Missing media is not an error.
pub(crate) fn eject_catalog_media<C, I>(ctx: &CloudContext<C, I>, vm: &Vm, name: &str) -> Result<()>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let Some((_, media)) = find_media(ctx, name)? else {
        debug!(media = name, "no media to eject");
        return Ok(());
    };
    match ctx.client().eject_media(vm, &media) {
        Ok(task) => {
            ctx.waiter().wait_task(&task, OperationClass::Default, false)?;
            info!(vm = %vm.name, media = name, "ejected media");
            Ok(())
        }
        Err(err) if err.is_not_found() => {
            debug!(vm = %vm.name, media = name, "media not inserted");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Delete the media named `name` and its catalog item. Missing media is not an error.
pub(crate) fn delete_catalog_media<C, I>(ctx: &CloudContext<C, I>, name: &str) -> Result<()>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let Some((item, media)) = find_media(ctx, name)? else {
        debug!(media = name, "no media to delete");
        return Ok(());
    };
    let result = require_link(&media, LinkRel::Remove)
        .and_then(|link| delete_and_wait(ctx, &link, OperationClass::DeleteMedia))
        .and_then(|()| require_link(&item, LinkRel::Remove))
        .and_then(|link| ctx.client().delete(&link).map(drop));
    match result {
        Ok(()) => {
            info!(media = name, "deleted media");
            Ok(())
        }
        Err(err) if err.is_not_found() => {
            debug!(media = name, "media disappeared while deleting");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Upload `iso` as a new media named `name` and wait until the platform has it.
pub(crate) fn upload_media<C, I>(
    ctx: &CloudContext<C, I>,
    name: &str,
    iso: &IsoImage,
) -> Result<Media>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let vdc = ctx.client().vdc()?;
    let storage_profile = ctx
        .entities()
        .media_storage_profile
        .as_deref()
        .and_then(|profile| vdc.storage_profile(profile))
        .cloned();
    let params = MediaParams {
        name: name.to_string(),
        image_type: MEDIA_IMAGE_TYPE.to_string(),
        size: iso.size(),
        storage_profile,
    };
    let media = ctx.client().create_media(&vdc, &params)?;

    for file in media.files.iter().filter(|f| !f.is_complete()) {
        let link = file
            .upload_link
            .clone()
            .ok_or_else(|| CloudError::MissingLink {
                entity: file.name.clone(),
                rel: LinkRel::Upload,
            })?;
        retry_operation(
            &format!("upload media {name}"),
            &ctx.control().upload_retry_policy(),
            |_| ctx.client().upload_file(&link, iso.path(), iso.size()),
        )?;
    }

    info!(media = name, size = iso.size(), "uploaded media");
    ctx.waiter()
        .wait_entity(&media, OperationClass::Default, false, |m| {
            ctx.client().reload_media(m)
        })
}

pub(crate) fn insert_media<C, I>(ctx: &CloudContext<C, I>, vm: &Vm, media: &Media) -> Result<()>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let task = ctx.client().insert_media(vm, media)?;
    ctx.waiter().wait_task(&task, OperationClass::Default, false)?;
    info!(vm = %vm.name, media = %media.name, "inserted media");
    Ok(())
}

/// The agent environment stored on `vm`.
pub(crate) fn get_agent_env<C, I>(ctx: &CloudContext<C, I>, vm: &Vm) -> Result<AgentEnv>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let key = &ctx.entities().vm_metadata_key;
    let json = ctx
        .client()
        .get_metadata(vm, key)?
        .ok_or_else(|| CloudError::not_found("agent environment", vm.urn.clone()))?;
    debug!(vm = %vm.name, env = %json, "current agent env");
    Ok(AgentEnv::from_json(&json)?)
}

/// Store the agent environment as metadata and return the JSON written.
pub(crate) fn save_agent_env_metadata<C, I>(
    ctx: &CloudContext<C, I>,
    vm: &Vm,
    env: &AgentEnv,
) -> Result<String>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let json = env.to_json()?;
    let task = ctx
        .client()
        .set_metadata(vm, &ctx.entities().vm_metadata_key, &json)?;
    ctx.waiter().wait_task(&task, OperationClass::Default, false)?;
    debug!(vm = %vm.name, env = %json, "stored agent env");
    Ok(json)
}

/// Replace the agent environment of `vm`: metadata first, then the
/// configuration image named after the VM.
pub(crate) fn set_agent_env<C, I>(ctx: &CloudContext<C, I>, vm: &Vm, env: &AgentEnv) -> Result<()>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    eject_catalog_media(ctx, vm, &vm.name)?;
    delete_catalog_media(ctx, &vm.name)?;

    let json = save_agent_env_metadata(ctx, vm, env)?;
    let iso = ctx.iso_builder().build(&json)?;
    let media = upload_media(ctx, &vm.name, &iso)?;
    ctx.client().add_catalog_item(
        &ctx.entities().media_catalog,
        &vm.name,
        &media.href,
        CatalogItemKind::Media,
    )?;
    insert_media(ctx, vm, &media)
}

/// Organization networks for `names`, checked before anything is changed.
pub(crate) fn accessible_networks(vdc: &Vdc, names: &[String]) -> Result<Vec<OrgNetwork>> {
    names
        .iter()
        .map(|name| {
            vdc.network(name)
                .cloned()
                .ok_or_else(|| CloudError::NetworkNotAccessible {
                    network: name.clone(),
                    vdc: vdc.name.clone(),
                })
        })
        .collect()
}

/// Add the organization networks the vApp lacks and return the names added.
///
/// If one addition fails, the networks added so far are removed again.
pub(crate) fn add_vapp_networks<C, I>(
    ctx: &CloudContext<C, I>,
    vapp: &VApp,
    networks: &[OrgNetwork],
) -> Result<Vec<String>>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let mut added = Vec::new();
    for network in networks {
        if vapp.networks.contains(&network.name) {
            debug!(vapp = %vapp.name, network = %network.name, "network already present");
            continue;
        }
        let result = ctx
            .client()
            .add_vapp_network(vapp, network)
            .and_then(|task| ctx.waiter().wait_task(&task, OperationClass::Default, false));
        if let Err(err) = result {
            remove_vapp_networks(ctx, vapp, &added);
            return Err(err);
        }
        debug!(vapp = %vapp.name, network = %network.name, "added vApp network");
        added.push(network.name.clone());
    }
    Ok(added)
}

/// Best-effort removal of vApp networks.
pub(crate) fn remove_vapp_networks<C, I>(ctx: &CloudContext<C, I>, vapp: &VApp, names: &[String])
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    for name in names {
        let result = ctx
            .client()
            .remove_vapp_network(vapp, name)
            .and_then(|task| ctx.waiter().wait_task(&task, OperationClass::Default, false));
        if let Err(err) = result {
            warn!(vapp = %vapp.name, network = %name, error = %err, "failed to remove vApp network");
        }
    }
}

/// Remove every vApp network not named in `keep`.
pub(crate) fn delete_unused_networks<C, I>(
    ctx: &CloudContext<C, I>,
    vapp: &VApp,
    keep: &[String],
) -> Result<()>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let vapp = ctx.client().reload_vapp(vapp)?;
    for name in vapp.networks.iter().filter(|n| !keep.contains(n)) {
        let task = ctx.client().remove_vapp_network(&vapp, name)?;
        ctx.waiter().wait_task(&task, OperationClass::Default, false)?;
        debug!(vapp = %vapp.name, network = %name, "deleted unused vApp network");
    }
    Ok(())
}

/// One manually addressed NIC per requested network, in request order.
///
/// Networks that would exceed the per-VM NIC limit are dropped.
pub(crate) fn nic_specs(networks: &Networks) -> Vec<NicSpec> {
    let mut nics = Vec::new();
    for (index, spec) in (0..).zip(networks.values()) {
        if index + 1 >= VM_NIC_LIMIT {
            warn!(
                limit = VM_NIC_LIMIT,
                dropped = networks.len() - nics.len(),
                "max number of NICs reached"
            );
            break;
        }
        nics.push(NicSpec {
            index,
            network: spec.cloud_network().to_string(),
            addressing_mode: IpAddressingMode::Manual,
            ip: spec.ip.clone(),
            connected: true,
        });
    }
    nics
}
