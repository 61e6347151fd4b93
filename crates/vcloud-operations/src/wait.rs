use std::collections::HashSet;
use std::thread;
use std::time::Instant;

use tracing::{debug, warn};
use vcloud_config::{ControlConfig, OperationClass};
use vcloud_core::{Resource, Task};

use crate::Result;
use crate::error::CloudError;
use crate::traits::VcdClient;

/// Blocking poller for remote tasks.
///
/// Every wait sleeps `control.delay` between polls and fails with
/// `CloudError::Timeout` once the time limit of its operation class elapses.
pub struct TaskWaiter<'a, C> {
    client: &'a C,
    control: &'a ControlConfig,
}

impl<'a, C: VcdClient> TaskWaiter<'a, C> {
    pub fn new(client: &'a C, control: &'a ControlConfig) -> Self {
        Self { client, control }
    }

    /// Poll `probe` until it yields a value.
    ///
    /// # Errors
    ///
    /// Returns the probe's error, or `Timeout` when the limit for `class` elapses.
    pub fn poll_until<T>(
        &self,
        target: &str,
        class: OperationClass,
        mut probe: impl FnMut() -> Result<Option<T>>,
    ) -> Result<T> {
        let limit = self.control.time_limit(class);
        let started = Instant::now();

        loop {
            if let Some(value) = probe()? {
                return Ok(value);
            }
            if started.elapsed() >= limit {
                return Err(CloudError::Timeout {
                    target: target.to_string(),
                    class,
                    limit,
                });
            }
            debug!(target, %class, "still waiting");
            thread::sleep(self.control.delay());
        }
    }

    /// Wait until `task` reaches a terminal status.
    ///
    /// # Errors
    ///
    /// Returns `TaskFailed` if the task ends unsuccessfully and `accept_failures`
    /// is off, or `Timeout`.
    pub fn wait_task(
        &self,
        task: &Task,
        class: OperationClass,
        accept_failures: bool,
    ) -> Result<Task> {
        let target = format!("task '{}'", task.operation);
        let task = self.poll_until(&target, class, || {
            let current = self.client.reload_task(task)?;
            Ok(current.status.is_terminal().then_some(current))
        })?;

        if task.status.is_failure() {
            let message = task.error_message.clone().unwrap_or_default();
            if accept_failures {
                warn!(
                    operation = %task.operation,
                    status = %task.status,
                    message,
                    "task failed, continuing"
                );
            } else {
                return Err(CloudError::TaskFailed {
                    target,
                    operation: task.operation.clone(),
                    status: task.status,
                    message,
                });
            }
        }
        Ok(task)
    }

    /// Wait until `entity` has no running tasks and return its refreshed handle.
    ///
    /// # Errors
    ///
    /// Returns `TaskFailed` if one of the entity's tasks failed and
    /// `accept_failures` is off, `Timeout`, or the error from `reload`.
    pub fn wait_entity<E: Resource>(
        &self,
        entity: &E,
        class: OperationClass,
        accept_failures: bool,
        reload: impl Fn(&E) -> Result<E>,
    ) -> Result<E> {
        let target = format!("'{}'", entity.name());
        let mut reported = HashSet::new();

        self.poll_until(&target, class, || {
            let current = reload(entity)?;
            for task in current.tasks().iter().filter(|t| t.status.is_failure()) {
                if !reported.insert(task.urn.clone()) {
                    continue;
                }
                let message = task.error_message.clone().unwrap_or_default();
                if !accept_failures {
                    return Err(CloudError::TaskFailed {
                        target: target.clone(),
                        operation: task.operation.clone(),
                        status: task.status,
                        message,
                    });
                }
                warn!(
                    entity = %current.name(),
                    operation = %task.operation,
                    message,
                    "entity task failed, continuing"
                );
            }
            Ok(current.running_tasks().is_empty().then_some(current))
        })
    }
}
