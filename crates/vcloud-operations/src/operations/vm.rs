use serde_json::Value;
use tracing::{debug, info, info_span};
use uuid::Uuid;
use vcloud_config::OperationClass;
use vcloud_core::{
    CatalogItemKind, EntityStatus, Networks, ResourcePool, VApp, VmReconfiguration, network_names,
};
use vcloud_saga::{SagaAuditLog, SagaError, StateBag};

use super::{Cloud, CloudTransaction, transaction_failed};
use crate::Result;
use crate::agent_env::network_env;
use crate::context::CloudContext;
use crate::error::CloudError;
use crate::remote::{
    accessible_networks, add_vapp_networks, delete_catalog_media, delete_unused_networks,
    delete_vapp, get_agent_env, nic_specs, power_off_vapp, power_on_vapp, set_agent_env,
    single_vm, vapp_and_vm, with_suspend_recovery,
};
use crate::state::{CONTAINER_VAPP, DISKS, VAPP, VM};
use crate::steps::{
    AddCatalogItem, AddNetworks, DeleteCatalogMedia, DeleteUnusedNetworks, DeleteVApp,
    DiscardSuspendedState, EditVm, EjectCatalogMedia, InsertCatalogMedia, InstantiateVApp,
    PowerOn, RebootVm, ReconfigureVm, RecomposeVApp, SaveAgentEnv, Target, UploadCatalogMedia,
    WaitTasks,
};
use crate::traits::{ClientFactory, IsoImageBuilder, VcdClient};

/// Everything `create_vm` needs once the caller's arguments are resolved.
pub(crate) struct VmRequest<'a> {
    pub agent_id: &'a str,
    pub catalog_item_id: &'a str,
    pub resource_pool: &'a ResourcePool,
    pub networks: &'a Networks,
    pub disk_locality: &'a [String],
    pub environment: Option<&'a Value>,
}

impl<F, I> Cloud<F, I>
where
    F: ClientFactory,
    I: IsoImageBuilder,
{
    /// Create and power on a VM from a stemcell.
    ///
    /// When `environment` names a `vapp`, the VM is created in a temporary
    /// vApp and then moved into that existing vApp. Returns the VM's URN.
    ///
    /// # Errors
    ///
    /// Returns the error of the failing step after every completed step has
    /// been rolled back.
    pub fn create_vm(
        &self,
        agent_id: &str,
        catalog_item_id: &str,
        resource_pool: &ResourcePool,
        networks: &Networks,
        disk_locality: &[String],
        environment: Option<&Value>,
    ) -> Result<String> {
        let _span = info_span!("create_vm", agent_id).entered();
        let ctx = self.context()?;
        let request = VmRequest {
            agent_id,
            catalog_item_id,
            resource_pool,
            networks,
            disk_locality,
            environment,
        };

        let (result, audit) = create_vm_with_audit(&ctx, &request);
        debug!(steps = %audit.summary(), "create_vm finished");
        let state = result.map_err(|err| transaction_failed("create_vm", err))?;

        let vm = state.require(VM)?;
        info!(vm = %vm.name, urn = %vm.urn, "created VM");
        Ok(vm.urn.clone())
    }

    /// Power off a VM's vApp and, unless disabled in the debug settings,
    /// delete it together with its configuration media.
    ///
    /// # Errors
    ///
    /// Returns the last error once the CPI retry policy is exhausted.
    pub fn delete_vm(&self, vapp_id: &str) -> Result<()> {
        self.with_retries("delete_vm", |ctx| {
            info!(vapp_id, "deleting vApp");
            let (vapp, vm) = vapp_and_vm(ctx, vapp_id)?;
            with_suspend_recovery(ctx, &vapp, || power_off_vapp(ctx, &vapp))?;

            if ctx.config().vcd().debug().delete_vapp {
                delete_vapp(ctx, &vapp)?;
                info!(media = %vm.name, "deleting configuration media");
                delete_catalog_media(ctx, &vm.name)?;
            } else {
                info!(vapp = %vapp.name, "vApp deletion disabled, leaving it powered off");
            }
            info!(vapp_id, "deleted vApp");
            Ok(())
        })
    }

    /// Reboot a VM; a suspended or powered-off VM is powered on instead.
    ///
    /// # Errors
    ///
    /// Returns the error of the failing step.
    pub fn reboot_vm(&self, vm_id: &str) -> Result<()> {
        let _span = info_span!("reboot_vm", vm_id).entered();
        let ctx = self.context()?;

        CloudTransaction::perform("reboot_vm", &ctx, |tx| {
            let vm = tx.context().client().resolve_vm(vm_id)?;
            let status = vm.status;
            debug!(vm = %vm.name, %status, "rebooting");
            tx.state_mut().insert(VM, vm);

            // The status is not re-read; a concurrent power change can pick the wrong branch.
            match status {
                EntityStatus::Suspended => {
                    tx.next(DiscardSuspendedState::new())?;
                    tx.next(WaitTasks::new(Target::Vm, OperationClass::Default))?;
                    tx.next(PowerOn::new(Target::Vm))
                }
                EntityStatus::PoweredOff => tx.next(PowerOn::new(Target::Vm)),
                _ => tx.next(RebootVm::new()),
            }
        })
        .map_err(|err| transaction_failed("reboot_vm", err))?;
        Ok(())
    }

    /// Whether a VM with this id exists.
    ///
    /// # Errors
    ///
    /// Returns any lookup error other than not-found.
    pub fn has_vm(&self, vm_id: &str) -> Result<bool> {
        let ctx = self.context()?;
        match ctx.client().resolve_vm(vm_id) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Replace the networks of a VM's vApp and the NICs of its VM, then
    /// rewrite the network section of the agent environment.
    ///
    /// # Errors
    ///
    /// Returns `NetworkNotAccessible` before changing anything if a network is
    /// not available to the VDC, or the last error once the CPI retry policy
    /// is exhausted.
    pub fn configure_networks(&self, vapp_id: &str, networks: &Networks) -> Result<()> {
        self.with_retries("configure_networks", |ctx| {
            info!(vapp_id, "reconfiguring vApp networks");
            let (vapp, vm) = vapp_and_vm(ctx, vapp_id)?;
            let names = network_names(networks);
            let org_networks = accessible_networks(&ctx.client().vdc()?, &names)?;

            debug!(vapp = %vapp.name, "powering off");
            with_suspend_recovery(ctx, &vapp, || power_off_vapp(ctx, &vapp))?;

            add_vapp_networks(ctx, &vapp, &org_networks)?;
            let change = VmReconfiguration {
                remove_nics: vm.hardware.nics.iter().map(|nic| nic.index).collect(),
                add_nics: nic_specs(networks),
                ..VmReconfiguration::default()
            };
            let task = ctx.client().reconfigure_vm(&vm, &change)?;
            ctx.waiter().wait_task(&task, OperationClass::Default, false)?;
            delete_unused_networks(ctx, &vapp, &names)?;

            let (vapp, vm) = vapp_and_vm(ctx, vapp_id)?;
            let mut env = get_agent_env(ctx, &vm)?;
            env.networks = network_env(&vm.hardware.nics, networks);
            debug!(vm = %vm.name, "updating agent env networks");
            set_agent_env(ctx, &vm, &env)?;

            debug!(vapp = %vapp.name, "powering back on");
            power_on_vapp(ctx, &vapp)?;
            info!(vapp = %vapp.name, "configured vApp networks");
            Ok(())
        })
    }
}

/// Look up the container vApp named in `environment`. Returns the name for
/// the vApp to instantiate and the container, if any.
fn working_vapp<C, I>(
    ctx: &CloudContext<C, I>,
    agent_id: &str,
    environment: Option<&Value>,
) -> (String, Option<VApp>)
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let Some(requested) = environment
        .and_then(|env| env.get("vapp"))
        .and_then(Value::as_str)
    else {
        return (agent_id.to_string(), None);
    };

    match ctx.client().vapp_by_name(requested) {
        Ok(container) => {
            info!(container = %container.name, "recomposing into existing vApp");
            (format!("vapp-tmp-{}", Uuid::new_v4()), Some(container))
        }
        Err(err) => {
            debug!(requested, error = %err, "container vApp not found, not recomposing");
            (agent_id.to_string(), None)
        }
    }
}

pub(crate) fn create_vm_with_audit<C, I>(
    ctx: &CloudContext<C, I>,
    request: &VmRequest<'_>,
) -> (std::result::Result<StateBag, SagaError<CloudError>>, SagaAuditLog)
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    let names = network_names(request.networks);
    let description = ctx.entities().description.clone();

    CloudTransaction::perform_with_audit("create_vm", ctx, StateBag::new(), |tx| {
        let client = tx.context().client();

        let locality = request
            .disk_locality
            .iter()
            .map(|id| client.resolve_disk(id).map(|disk| disk.href))
            .collect::<Result<Vec<_>>>()?;
        if !locality.is_empty() {
            info!(disks = ?request.disk_locality, "instantiating vApp accessible to disks");
        }
        let (vapp_name, container) =
            working_vapp(tx.context(), request.agent_id, request.environment);

        tx.next(InstantiateVApp::new(
            request.catalog_item_id,
            vapp_name,
            locality,
        ))?;
        tx.next(WaitTasks::new(
            Target::VApp,
            OperationClass::InstantiateVAppTemplate,
        ))?;
        let vm = single_vm(tx.state().require(VAPP)?)?;
        tx.state_mut().insert(VM, vm);

        if let Some(container) = container {
            tx.state_mut().insert(CONTAINER_VAPP, container);
            tx.next(WaitTasks::new(Target::ContainerVApp, OperationClass::Default))?;
            tx.next(RecomposeVApp::new())?;
            tx.next(WaitTasks::new(Target::VApp, OperationClass::Default))?;
            tx.next(DeleteVApp::new())?;
            let container = tx.state().require(CONTAINER_VAPP)?.clone();
            tx.state_mut().insert(VAPP, container);
        }

        let vm = client.reload_vm(tx.state().require(VM)?)?;
        tx.state_mut().insert(DISKS, vm.hardware.hard_disks.clone());
        tx.state_mut().insert(VM, vm);

        tx.next(AddNetworks::new(names.clone()))?;
        tx.next(ReconfigureVm::new(
            request.agent_id,
            description,
            request.resource_pool.clone(),
            request.networks.clone(),
        ))?;
        if let Some(profile) = &request.resource_pool.storage_profile {
            tx.next(EditVm::new(profile))?;
        }
        tx.next(DeleteUnusedNetworks::new(names))?;

        tx.next(SaveAgentEnv::new(
            request.agent_id,
            request.networks.clone(),
            request.environment.cloned(),
        ))?;
        tx.next(EjectCatalogMedia::new())?;
        tx.next(DeleteCatalogMedia::new())?;
        tx.next(UploadCatalogMedia::new())?;
        tx.next(AddCatalogItem::new(CatalogItemKind::Media))?;
        tx.next(InsertCatalogMedia::new())?;
        tx.next(PowerOn::new(Target::Vm))
    })
}
