//! Step-based transactions for multi-call remote workflows.
//!
//! A [`Transaction`] performs [`Step`]s one at a time as they are appended,
//! threading a typed [`StateBag`] between them. When any step (or code between
//! steps) fails, the steps that already completed are rolled back in reverse
//! order before the original failure is returned.
//!
//! [`retry_operation`] re-drives a whole operation, usually one that runs a
//! transaction, against a flaky remote endpoint.

mod audit;
mod cloneable;
mod error;
mod retry;
mod state;
mod step;
mod transaction;

pub use audit::{SagaAuditLog, StepRecord, StepStatus};
pub use error::{CompensationError, SagaError};
pub use retry::{Backoff, RetryPolicy, Transient, retry_operation};
pub use state::{StateBag, StateError, StateKey};
pub use step::Step;
pub use transaction::Transaction;
