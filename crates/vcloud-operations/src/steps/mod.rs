//! Workflow steps run inside [`vcloud_saga::Transaction`]s.
//!
//! Every step is generic over the client (`C`) and image builder (`I`) of the
//! [`CloudContext`](crate::CloudContext) it runs against, takes its arguments
//! through `new`, and exchanges entity handles with other steps through the
//! keys in `crate::state`.

mod catalog;
mod media;
mod network;
mod power;
mod stemcell;
mod vapp;
mod vm;
mod wait;

pub use catalog::AddCatalogItem;
pub use media::{
    DeleteCatalogMedia, EjectCatalogMedia, InsertCatalogMedia, SaveAgentEnv, UploadCatalogMedia,
};
pub use network::{AddNetworks, DeleteUnusedNetworks};
pub use power::{DiscardSuspendedState, PowerOn, RebootVm};
pub use stemcell::{CreateTemplate, StemcellInfo, UploadTemplateFiles};
pub use vapp::{DeleteVApp, InstantiateVApp, RecomposeVApp};
pub use vm::{EditVm, ReconfigureVm};
pub use wait::WaitTasks;

use crate::state;

/// Which entity handle in the state bag a step acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    VApp,
    ContainerVApp,
    Vm,
    Template,
    Media,
}

impl Target {
    /// Name of the state key holding the handle.
    #[must_use]
    pub fn key_name(self) -> &'static str {
        match self {
            Self::VApp => state::VAPP.name(),
            Self::ContainerVApp => state::CONTAINER_VAPP.name(),
            Self::Vm => state::VM.name(),
            Self::Template => state::VAPP_TEMPLATE.name(),
            Self::Media => state::MEDIA.name(),
        }
    }
}
