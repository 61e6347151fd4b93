use crate::state::StateBag;

/// A unit of remote work inside a [`Transaction`](crate::Transaction).
///
/// A step carries its own arguments (set by its constructor), reads values
/// that earlier steps stored in the [`StateBag`], and publishes its results
/// back into the bag. It owns no other state.
///
/// # Type Parameters
///
/// - `Context`: Shared dependencies such as the remote client (injected, not stored in the bag)
/// - `Error`: The error type for step failures
pub trait Step: Send + Sync {
    /// Shared context providing dependencies.
    type Context;

    /// Error type for step failures.
    type Error;

    /// Human-readable name for logging and error messages.
    fn name(&self) -> &'static str;

    /// State keys this step reads and expects earlier steps to have stored.
    ///
    /// The transaction checks them before calling [`Step::perform`].
    fn requires(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Perform the step.
    ///
    /// On failure the step must leave the remote side in a condition its own
    /// [`Step::rollback`] does not need to handle: a failed step is never
    /// rolled back.
    ///
    /// # Errors
    ///
    /// Returns an error if the step fails to complete.
    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error>;

    /// Undo the step's effects.
    ///
    /// Called at most once, only after a successful `perform`, once every later
    /// step has been rolled back. Entities stored by earlier steps may have
    /// been reloaded and changed shape since this step ran.
    ///
    /// The default implementation is a no-op, suitable for read-only steps.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails. The transaction logs it and
    /// keeps rolling back earlier steps.
    fn rollback(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let _ = (ctx, state);
        Ok(())
    }

    /// Human-readable description of what rollback will do.
    fn rollback_description(&self) -> String {
        format!("undo {}", self.name())
    }
}
