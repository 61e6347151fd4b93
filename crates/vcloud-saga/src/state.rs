use std::fmt;
use std::marker::PhantomData;

use indexmap::IndexMap;
use thiserror::Error;

use crate::cloneable::CloneableAny;

/// A named slot in a [`StateBag`] holding values of type `T`.
///
/// Keys are declared once as constants and shared by every step that reads
/// or writes the slot, so the value type is fixed where the key is declared.
pub struct StateKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StateKey<T> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for StateKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StateKey<T> {}

impl<T> fmt::Debug for StateKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateKey").field(&self.name).finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum StateError {
    #[error("state key '{key}' has not been set by an earlier step")]
    Missing { key: &'static str },

    #[error("state key '{key}' holds a value of a different type")]
    TypeMismatch { key: &'static str },
}

/// Scratchpad shared by the steps of one transaction run.
///
/// Entries keep their insertion order. Overwriting a key keeps its original
/// position; removing a key shifts later entries down.
#[derive(Default)]
pub struct StateBag {
    entries: IndexMap<&'static str, Box<dyn CloneableAny>>,
}

impl StateBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, returning the previous value if it had the
    /// same type.
    pub fn insert<T>(&mut self, key: StateKey<T>, value: T) -> Option<T>
    where
        T: Clone + Send + 'static,
    {
        self.entries
            .insert(key.name, Box::new(value))
            .and_then(|previous| previous.into_any().downcast::<T>().ok())
            .map(|previous| *previous)
    }

    #[must_use]
    pub fn get<T: 'static>(&self, key: StateKey<T>) -> Option<&T> {
        let value: &dyn CloneableAny = &**self.entries.get(key.name)?;
        value.as_any().downcast_ref::<T>()
    }

    pub fn get_mut<T: 'static>(&mut self, key: StateKey<T>) -> Option<&mut T> {
        let value: &mut dyn CloneableAny = &mut **self.entries.get_mut(key.name)?;
        value.as_any_mut().downcast_mut::<T>()
    }

    /// Read a value that an earlier step must have stored.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Missing` if no step stored the key, or
    /// `StateError::TypeMismatch` if the slot holds another type.
    pub fn require<T: 'static>(&self, key: StateKey<T>) -> Result<&T, StateError> {
        if !self.entries.contains_key(key.name) {
            return Err(StateError::Missing { key: key.name });
        }
        self.get(key)
            .ok_or(StateError::TypeMismatch { key: key.name })
    }

    pub fn remove<T: 'static>(&mut self, key: StateKey<T>) -> Option<T> {
        self.entries
            .shift_remove(key.name)
            .and_then(|value| value.into_any().downcast::<T>().ok())
            .map(|value| *value)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Clone for StateBag {
    fn clone(&self) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(name, value)| (*name, (**value).clone_box()))
            .collect();
        Self { entries }
    }
}

impl fmt::Debug for StateBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBag")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
