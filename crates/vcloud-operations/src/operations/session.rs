use std::sync::{Arc, Mutex};

use tracing::{debug, info};
use vcloud_config::VcdConfig;

use crate::Result;
use crate::error::CloudError;
use crate::traits::ClientFactory;

/// Lazily connected client shared by every operation of a [`Cloud`](super::Cloud).
///
/// The lock only covers the check-and-create of the session. Callers get
/// their own handle to the shared client and use it without holding the lock.
pub struct ClientSession<F: ClientFactory> {
    factory: F,
    client: Mutex<Option<Arc<F::Client>>>,
}

impl<F: ClientFactory> ClientSession<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            client: Mutex::new(None),
        }
    }

    /// The shared client, connecting on first use.
    ///
    /// # Errors
    ///
    /// Returns the factory's error if connecting fails, or `SessionPoisoned`
    /// if a previous connection attempt panicked.
    pub fn client(&self, vcd: &VcdConfig) -> Result<Arc<F::Client>> {
        let mut slot = self.client.lock().map_err(|_| CloudError::SessionPoisoned)?;
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }

        debug!(url = vcd.url(), "creating session");
        let client = Arc::new(self.factory.connect(vcd)?);
        info!(url = vcd.url(), user = vcd.user(), "created session");
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.client.lock().is_ok_and(|slot| slot.is_some())
    }
}
