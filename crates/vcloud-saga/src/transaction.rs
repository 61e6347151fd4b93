use std::fmt::Debug;

use tracing::{debug, warn};

use crate::audit::SagaAuditLog;
use crate::error::{CompensationError, SagaError};
use crate::state::{StateBag, StateError};
use crate::step::Step;

/// Step name reported when the transaction body fails outside of any step.
const BODY_STEP: &str = "transaction body";

struct CompletedStep<'c, Ctx, Err> {
    record: usize,
    step: Box<dyn Step<Context = Ctx, Error = Err> + 'c>,
}

/// A running transaction.
///
/// Steps are performed as soon as they are passed to [`Transaction::next`];
/// the body decides which step comes next from what earlier steps stored in
/// the state bag. If the body returns an error, every completed step is rolled
/// back in reverse order (LIFO) before the error is returned.
pub struct Transaction<'c, Ctx, Err> {
    name: String,
    ctx: &'c Ctx,
    state: StateBag,
    completed: Vec<CompletedStep<'c, Ctx, Err>>,
    audit_log: SagaAuditLog,
    failed_step: Option<&'static str>,
}

impl<'c, Ctx, Err> Transaction<'c, Ctx, Err>
where
    Err: Debug,
{
    /// Run `body` as a transaction with an empty state bag.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::StepFailed` if the body fails and every rollback succeeds.
    /// Returns `SagaError::CompensationFailed` if the body fails and some rollbacks also fail.
    pub fn perform<F>(
        name: impl Into<String>,
        ctx: &'c Ctx,
        body: F,
    ) -> Result<StateBag, SagaError<Err>>
    where
        F: FnOnce(&mut Self) -> Result<(), Err>,
    {
        Self::perform_with_state(name, ctx, StateBag::new(), body)
    }

    /// Run `body` as a transaction starting from `state`.
    ///
    /// # Errors
    ///
    /// See [`Transaction::perform`].
    pub fn perform_with_state<F>(
        name: impl Into<String>,
        ctx: &'c Ctx,
        state: StateBag,
        body: F,
    ) -> Result<StateBag, SagaError<Err>>
    where
        F: FnOnce(&mut Self) -> Result<(), Err>,
    {
        let (result, _audit_log) = Self::perform_with_audit(name, ctx, state, body);
        result
    }

    /// Run `body` as a transaction and return both the result and an audit log.
    pub fn perform_with_audit<F>(
        name: impl Into<String>,
        ctx: &'c Ctx,
        state: StateBag,
        body: F,
    ) -> (Result<StateBag, SagaError<Err>>, SagaAuditLog)
    where
        F: FnOnce(&mut Self) -> Result<(), Err>,
    {
        let mut tx = Self {
            name: name.into(),
            ctx,
            state,
            completed: Vec::new(),
            audit_log: SagaAuditLog::new(),
            failed_step: None,
        };
        debug!(transaction = %tx.name, "starting transaction");

        match body(&mut tx) {
            Ok(()) => {
                debug!(
                    transaction = %tx.name,
                    steps = tx.completed.len(),
                    "transaction completed"
                );
                (Ok(tx.state), tx.audit_log)
            }
            Err(error) => {
                let failed_step = tx.failed_step.take().unwrap_or(BODY_STEP);
                let saga_error = tx.compensate(failed_step, error);
                (Err(saga_error), tx.audit_log)
            }
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared context. The returned reference outlives the borrow of
    /// the transaction, so it can be held across calls to [`Transaction::next`].
    #[must_use]
    pub fn context(&self) -> &'c Ctx {
        self.ctx
    }

    #[must_use]
    pub fn state(&self) -> &StateBag {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StateBag {
        &mut self.state
    }

    /// Perform `step` now and, if it succeeds, register it for rollback.
    ///
    /// # Errors
    ///
    /// Returns the step's error, or a `StateError::Missing` converted into the
    /// step's error type if a key the step requires has not been stored yet.
    /// The failed step is not registered for rollback.
    pub fn next<S>(&mut self, step: S) -> Result<(), Err>
    where
        S: Step<Context = Ctx, Error = Err> + 'c,
        Err: From<StateError>,
    {
        let name = step.name();
        self.failed_step = None;
        let record = self.audit_log.record_start(name);

        if let Some(key) = step
            .requires()
            .into_iter()
            .find(|key| !self.state.contains(key))
        {
            warn!(
                transaction = %self.name,
                step = name,
                key,
                "step requires state that no earlier step stored"
            );
            self.audit_log.record_failure(record);
            self.failed_step = Some(name);
            return Err(StateError::Missing { key }.into());
        }

        debug!(transaction = %self.name, step = name, "performing step");
        match step.perform(self.ctx, &mut self.state) {
            Ok(()) => {
                self.audit_log
                    .record_success(record, step.rollback_description());
                self.completed.push(CompletedStep {
                    record,
                    step: Box::new(step),
                });
                Ok(())
            }
            Err(error) => {
                self.audit_log.record_failure(record);
                self.failed_step = Some(name);
                Err(error)
            }
        }
    }

    fn compensate(&mut self, failed_step: &str, step_error: Err) -> SagaError<Err> {
        warn!(
            transaction = %self.name,
            step = failed_step,
            error = ?step_error,
            completed = self.completed.len(),
            "transaction failed, rolling back completed steps"
        );
        let mut compensation_errors = Vec::new();

        while let Some(completed) = self.completed.pop() {
            let step_name = completed.step.name();
            let description = completed.step.rollback_description();

            match completed.step.rollback(self.ctx, &mut self.state) {
                Ok(()) => {
                    debug!(transaction = %self.name, step = step_name, "rolled back step");
                    self.audit_log.record_compensated(completed.record);
                }
                Err(error) => {
                    warn!(
                        transaction = %self.name,
                        step = step_name,
                        error = ?error,
                        "rollback failed, continuing with earlier steps"
                    );
                    self.audit_log.record_compensation_failed(completed.record);
                    compensation_errors.push(CompensationError {
                        step: step_name.to_string(),
                        description,
                        error,
                    });
                }
            }
        }

        if compensation_errors.is_empty() {
            SagaError::StepFailed {
                transaction: self.name.clone(),
                step: failed_step.to_string(),
                source: step_error,
            }
        } else {
            SagaError::CompensationFailed {
                transaction: self.name.clone(),
                failed_step: failed_step.to_string(),
                step_error,
                compensation_errors,
            }
        }
    }
}
