use std::fmt::Debug;

use thiserror::Error;

/// Error from a failed rollback.
#[derive(Debug, thiserror::Error)]
#[error("rollback failed for step '{step}': {description}")]
pub struct CompensationError<E> {
    /// Name of the step whose rollback failed.
    pub step: String,
    /// Description of what the rollback was trying to do.
    pub description: String,
    /// The underlying error.
    #[source]
    pub error: E,
}

/// Error from transaction execution.
///
/// Both variants carry the error that triggered the rollback, unchanged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SagaError<E: Debug> {
    /// A step failed and every rollback succeeded.
    #[error("transaction '{transaction}' failed at step '{step}'")]
    StepFailed {
        /// Name of the transaction.
        transaction: String,
        /// Name of the step that failed.
        step: String,
        /// The error that caused the step to fail.
        #[source]
        source: E,
    },

    /// A step failed and some rollbacks also failed.
    #[error(
        "transaction '{transaction}' failed at step '{failed_step}', and {} rollback(s) also failed",
        compensation_errors.len()
    )]
    CompensationFailed {
        /// Name of the transaction.
        transaction: String,
        /// Name of the step that originally failed.
        failed_step: String,
        /// The error from the failed step.
        step_error: E,
        /// Errors from failed rollbacks.
        compensation_errors: Vec<CompensationError<E>>,
    },
}

impl<E: Debug> SagaError<E> {
    /// Name of the step whose failure triggered the rollback.
    #[must_use]
    pub fn failed_step(&self) -> &str {
        match self {
            Self::StepFailed { step, .. } => step,
            Self::CompensationFailed { failed_step, .. } => failed_step,
        }
    }

    /// The triggering error.
    #[must_use]
    pub fn step_error(&self) -> &E {
        match self {
            Self::StepFailed { source, .. } => source,
            Self::CompensationFailed { step_error, .. } => step_error,
        }
    }

    /// Discard the rollback details and return the triggering error.
    #[must_use]
    pub fn into_source(self) -> E {
        match self {
            Self::StepFailed { source, .. } => source,
            Self::CompensationFailed { step_error, .. } => step_error,
        }
    }
}
