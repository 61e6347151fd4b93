use std::sync::Arc;

use vcloud_config::{CloudConfig, ControlConfig, EntitiesConfig};

use crate::traits::{IsoImageBuilder, VcdClient};
use crate::wait::TaskWaiter;

/// Everything a workflow step needs: the shared client, the image builder and
/// the configuration.
pub struct CloudContext<C, I> {
    client: Arc<C>,
    iso_builder: Arc<I>,
    config: Arc<CloudConfig>,
}

impl<C, I> Clone for CloudContext<C, I> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            iso_builder: Arc::clone(&self.iso_builder),
            config: Arc::clone(&self.config),
        }
    }
}

impl<C, I> CloudContext<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    pub fn new(client: Arc<C>, iso_builder: Arc<I>, config: Arc<CloudConfig>) -> Self {
        Self {
            client,
            iso_builder,
            config,
        }
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    #[must_use]
    pub fn iso_builder(&self) -> &I {
        &self.iso_builder
    }

    #[must_use]
    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    #[must_use]
    pub fn entities(&self) -> &EntitiesConfig {
        self.config.vcd().entities()
    }

    #[must_use]
    pub fn control(&self) -> &ControlConfig {
        self.config.vcd().control()
    }

    #[must_use]
    pub fn waiter(&self) -> TaskWaiter<'_, C> {
        TaskWaiter::new(self.client(), self.control())
    }
}
