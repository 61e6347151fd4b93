//! The CPI lifecycle API.

mod disk;
mod session;
mod stemcell;
mod vm;

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info_span};
use vcloud_config::CloudConfig;
use vcloud_saga::{SagaError, Transaction, retry_operation};

pub use session::ClientSession;

use crate::Result;
use crate::context::CloudContext;
use crate::error::CloudError;
use crate::traits::{ClientFactory, IsoImageBuilder};

type CloudTransaction<'c, C, I> = Transaction<'c, CloudContext<C, I>, CloudError>;

/// Stemcell, VM and disk lifecycle against one vCloud Director organization.
///
/// Operations may be called concurrently; they share one lazily created
/// client session.
pub struct Cloud<F: ClientFactory, I> {
    session: ClientSession<F>,
    iso_builder: Arc<I>,
    config: Arc<CloudConfig>,
}

impl<F, I> Cloud<F, I>
where
    F: ClientFactory,
    I: IsoImageBuilder,
{
    pub fn new(factory: F, iso_builder: I, config: CloudConfig) -> Self {
        Self {
            session: ClientSession::new(factory),
            iso_builder: Arc::new(iso_builder),
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// Not offered by this cloud.
    ///
    /// # Errors
    ///
    /// Always returns `CloudError::Unsupported`.
    pub fn validate_deployment(&self, _old_manifest: &Value, _new_manifest: &Value) -> Result<()> {
        Err(CloudError::Unsupported("validate_deployment"))
    }

    fn context(&self) -> Result<CloudContext<F::Client, I>> {
        let client = self.session.client(self.config.vcd())?;
        Ok(CloudContext::new(
            client,
            Arc::clone(&self.iso_builder),
            Arc::clone(&self.config),
        ))
    }

    /// Run `op` under the CPI retry policy, logging the final failure.
    fn with_retries<T>(
        &self,
        operation: &str,
        mut op: impl FnMut(&CloudContext<F::Client, I>) -> Result<T>,
    ) -> Result<T> {
        let _span = info_span!("operation", name = operation).entered();
        let ctx = self.context()?;
        retry_operation(operation, &ctx.control().cpi_retry_policy(), |_| op(&ctx))
            .inspect_err(|err| error!(operation, error = %err, "operation failed"))
    }
}

/// Log a failed transaction and reduce it to the error that triggered it.
fn transaction_failed(operation: &str, err: SagaError<CloudError>) -> CloudError {
    error!(
        operation,
        step = err.failed_step(),
        error = %err.step_error(),
        "operation failed"
    );
    err.into()
}
