use std::any::Any;

/// Trait for type-erased values that can be cloned.
///
/// This trait combines `Any` with `Clone` capability, allowing values to be
/// cloned and inspected without knowing their concrete type at compile time.
pub(crate) trait CloneableAny: Any + Send {
    /// Clone the value into a new boxed trait object.
    fn clone_box(&self) -> Box<dyn CloneableAny>;

    /// Borrow as `Any` for downcasting by reference.
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrow as `Any` for downcasting by reference.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Convert into a boxed `Any` for downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T> CloneableAny for T
where
    T: Clone + Send + 'static,
{
    fn clone_box(&self) -> Box<dyn CloneableAny> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
