//! Reactive Objects
//!
//! [`Reactive`] is the interception layer over a [`Target`]. Rust has no
//! property hooks, so the wrapper is a key/value accessor: call sites use
//! [`get`](Reactive::get) and [`set`](Reactive::set) instead of field
//! syntax, and those two calls are where tracking and triggering happen.
//!
//! # Intercepted operations
//!
//! - `get(key)` reads the raw field, tracks `(target, key)` and returns the
//!   value. Absent fields are tracked too and read as `None`.
//! - `set(key, value)` writes the raw field (creating it if needed) and
//!   triggers `(target, key)` only when the value changed under
//!   `PartialEq`. Writing an equal value never re-runs anything.
//!
//! # Change detection
//!
//! Values are compared with `V`'s `PartialEq`. An absent field becoming
//! present is a change. For floats this means `NaN` over `NaN` triggers
//! (it is never equal to itself) while `-0.0` over `0.0` does not.
//!
//! # Everything else
//!
//! All other operations (`contains_key`, `keys`, `len`, `remove`,
//! `snapshot`, serialization) pass straight through to the target: they
//! neither track nor trigger. The raw target stays reachable through
//! [`raw`](Reactive::raw), and writes made there bypass tracking entirely.

use std::fmt;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};

use super::runtime::Runtime;
use super::target::{Identity, Key, Target};
use crate::error::Result;

/// A tracked view of a structured state object.
///
/// Cloning a `Reactive` clones the handle; all clones observe and mutate the
/// same target.
pub struct Reactive<V> {
    runtime: Runtime,
    target: Target<V>,
}

impl<V> Reactive<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn new(runtime: Runtime, target: Target<V>) -> Self {
        Self { runtime, target }
    }

    /// Read a field, subscribing the running effect to it.
    pub fn get(&self, key: &str) -> Option<V> {
        let _exec = self.runtime.inner.exec.lock();
        let value = self.target.get(key);
        self.runtime.track(self.target.identity(), key);
        value
    }

    /// Read a field without tracking it.
    pub fn get_untracked(&self, key: &str) -> Option<V> {
        self.target.get(key)
    }

    /// Write a field and re-run its subscribers if the value changed.
    ///
    /// Returns whether the value changed. Subscribers run before this
    /// returns.
    pub fn set(&self, key: impl Into<Key>, value: V) -> bool {
        let key = key.into();
        let _exec = self.runtime.inner.exec.lock();

        let changed = self.target.replace(key.clone(), value);
        if changed {
            self.runtime.trigger(self.target.identity(), &key);
        }
        changed
    }

    /// Compute a field's new value from its current one, then [`set`](Self::set) it.
    ///
    /// The read of the current value is not tracked. No other tracked write
    /// from another thread can land between the read and the write. `f` runs
    /// on a copy of the field and may itself write to this object.
    pub fn update<F>(&self, key: impl Into<Key>, f: F) -> bool
    where
        F: FnOnce(Option<&V>) -> V,
    {
        let key = key.into();
        let _exec = self.runtime.inner.exec.lock();
        let current = self.target.get(&key);
        let value = f(current.as_ref());
        self.set(key, value)
    }
}

impl<V> Reactive<V> {
    /// The untracked state object behind this wrapper.
    pub fn raw(&self) -> &Target<V> {
        &self.target
    }

    /// The identity this object is tracked under.
    pub fn identity(&self) -> &Identity {
        self.target.identity()
    }

    /// The runtime this wrapper tracks into.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Whether the object has a field named `key`. Not tracked.
    pub fn contains_key(&self, key: &str) -> bool {
        self.target.contains_key(key)
    }

    /// Field names in insertion order. Not tracked.
    pub fn keys(&self) -> Vec<Key> {
        self.target.keys()
    }

    /// Number of fields. Not tracked.
    pub fn len(&self) -> usize {
        self.target.len()
    }

    /// Whether the object has no fields. Not tracked.
    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    /// Remove a field. Neither tracked nor triggering.
    pub fn remove(&self, key: &str) -> Option<V> {
        self.target.remove(key)
    }

    /// Number of effects currently subscribed to `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.runtime.subscriber_count(self.target.identity(), key)
    }
}

impl<V: Clone> Reactive<V> {
    /// Copy of every field, in insertion order. Not tracked.
    pub fn snapshot(&self) -> IndexMap<Key, V> {
        self.target.snapshot()
    }
}

impl<V: Serialize> Reactive<V> {
    /// Convert an untracked snapshot of the fields into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_value()?)?)
    }

    /// Untracked snapshot of the fields as a JSON object.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.target)?)
    }
}

impl<V> Clone for Reactive<V> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            target: self.target.clone(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Reactive<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reactive").field(&self.target).finish()
    }
}

impl<V: Serialize> Serialize for Reactive<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.target.serialize(serializer)
    }
}
