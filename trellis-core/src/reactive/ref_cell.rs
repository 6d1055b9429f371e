//! Ref Cells
//!
//! A [`Ref`] is a reactive object with exactly one field. It exists for
//! values that are not naturally a set of named fields: a counter, a flag,
//! a derived price. It has its own [`Identity`] and is tracked under the
//! fixed key [`VALUE_KEY`].
//!
//! Writes follow the same change rule as [`Reactive::set`](super::Reactive::set):
//! only a value that differs under `PartialEq` triggers.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::runtime::Runtime;
use super::target::Identity;

/// Key every ref cell is tracked under.
pub const VALUE_KEY: &str = "value";

struct RefInner<V> {
    identity: Identity,
    value: RwLock<V>,
}

/// A single-value reactive container.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = Runtime::new();
/// let count = runtime.ref_cell(0);
///
/// // Read the value (tracked inside effects)
/// let value = count.get();
///
/// // Update the value (re-runs subscribers if it changed)
/// count.set(5);
/// ```
pub struct Ref<V> {
    runtime: Runtime,
    inner: Arc<RefInner<V>>,
}

impl<V> Ref<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn new(runtime: Runtime, value: V) -> Self {
        Self {
            runtime,
            inner: Arc::new(RefInner {
                identity: Identity::new(),
                value: RwLock::new(value),
            }),
        }
    }

    /// Get the current value, subscribing the running effect.
    pub fn get(&self) -> V {
        let _exec = self.runtime.inner.exec.lock();
        let value = self.inner.value.read().clone();
        self.runtime.track(&self.inner.identity, VALUE_KEY);
        value
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> V {
        self.inner.value.read().clone()
    }

    /// Set a new value, re-running subscribers if it changed.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: V) -> bool {
        let _exec = self.runtime.inner.exec.lock();

        let changed = {
            let mut slot = self.inner.value.write();
            if *slot == value {
                false
            } else {
                *slot = value;
                true
            }
        };

        if changed {
            self.runtime.trigger(&self.inner.identity, VALUE_KEY);
        }
        changed
    }

    /// Update the value using a function.
    ///
    /// The read of the current value is not tracked. `f` runs on a copy, so
    /// it may write to this cell itself.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&V) -> V,
    {
        let _exec = self.runtime.inner.exec.lock();
        let current = self.get_untracked();
        let new_value = f(&current);
        self.set(new_value)
    }
}

impl<V> Ref<V> {
    /// The identity this cell is tracked under.
    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    /// Number of effects currently subscribed to this cell.
    pub fn subscriber_count(&self) -> usize {
        self.runtime
            .subscriber_count(&self.inner.identity, VALUE_KEY)
    }
}

impl<V> Clone for Ref<V> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Ref<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.inner.identity.id())
            .field("value", &*self.inner.value.read())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn ref_get_and_set() {
        let runtime = Runtime::new();
        let cell = runtime.ref_cell(0);
        assert_eq!(cell.get(), 0);

        assert!(cell.set(42));
        assert_eq!(cell.get(), 42);
    }

    #[test]
    fn ref_update() {
        let runtime = Runtime::new();
        let cell = runtime.ref_cell(10);
        cell.update(|v| v + 5);
        assert_eq!(cell.get(), 15);
    }

    #[test]
    fn ref_update_closure_may_write_cell() {
        let runtime = Runtime::new();
        let cell = runtime.ref_cell(0);

        let inner = cell.clone();
        cell.update(|v| {
            inner.set(100);
            v + 1
        });

        assert_eq!(cell.get(), 1);
    }

    #[test]
    fn ref_notifies_only_on_change() {
        let runtime = Runtime::new();
        let cell = runtime.ref_cell(0);
        let runs = Arc::new(AtomicI32::new(0));

        let reader = cell.clone();
        let counter = runs.clone();
        let _effect = runtime.effect(move || {
            reader.get();
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        assert!(cell.set(1));
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        assert!(!cell.set(1));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn ref_untracked_read_does_not_subscribe() {
        let runtime = Runtime::new();
        let cell = runtime.ref_cell(0);

        let reader = cell.clone();
        let effect = runtime.effect(move || {
            reader.get_untracked();
        });

        assert_eq!(effect.dependency_count(), 0);
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn ref_clone_shares_state() {
        let runtime = Runtime::new();
        let cell1 = runtime.ref_cell(0);
        let cell2 = cell1.clone();

        cell1.set(42);
        assert_eq!(cell2.get(), 42);
        assert_eq!(cell1.identity(), cell2.identity());
    }

    #[test]
    fn ref_identities_are_unique() {
        let runtime = Runtime::new();
        let a = runtime.ref_cell(0);
        let b = runtime.ref_cell(0);

        assert_ne!(a.identity(), b.identity());
    }
}
