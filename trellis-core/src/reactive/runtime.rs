//! Reactive Runtime
//!
//! The runtime is the engine instance that connects reactive state to the
//! effects reading it. It owns the dependency store and the tracking
//! context, and implements the two halves of the protocol:
//!
//! - [`track`](Runtime::track): record that the running effect read a
//!   location.
//! - [`trigger`](Runtime::trigger): re-run every effect subscribed to a
//!   location.
//!
//! # How It Works
//!
//! 1. [`Runtime::effect`] runs a computation with the effect pushed on the
//!    tracking stack.
//!
//! 2. Reads through [`Reactive`](super::Reactive) or [`Ref`](super::Ref)
//!    call `track`, which subscribes the top of the stack to the location.
//!    Reads outside any effect track nothing.
//!
//! 3. A write that changes a value calls `trigger`, which snapshots the
//!    subscribers and runs each of them through the effect runner, so their
//!    dependencies are rebuilt. Cascades are depth-first and finish before
//!    the write returns. Subscriber order is unspecified.
//!
//! # Thread Safety
//!
//! A `Runtime` is a cheap handle and is `Send + Sync`. Tracked reads,
//! tracked writes and effect runs all hold the runtime's re-entrant
//! execution lock, so reactive work from different threads is serialized
//! while a single thread can re-enter freely. The dependency store has its
//! own lock, which is never held while user code runs.
//!
//! Several runtimes can coexist and never see each other's subscriptions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use tracing::{debug, trace};

use super::context::TrackingContext;
use super::effect::Effect;
use super::object::Reactive;
use super::ref_cell::Ref;
use super::store::DependencyStore;
use super::subscriber::SubscriberId;
use super::target::{Identity, Target};
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};

pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) exec: ReentrantMutex<TrackingContext>,
    pub(crate) store: Mutex<DependencyStore>,
    pub(crate) detached: Mutex<HashMap<SubscriberId, Effect>>,
}

/// A reactive engine instance.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = Runtime::new();
/// let state = runtime.reactive([("price", 0.0), ("quantity", 0.0)]);
///
/// let reader = state.clone();
/// let _effect = runtime.effect(move || {
///     let total = reader.get("price").unwrap_or(0.0) * reader.get("quantity").unwrap_or(0.0);
///     println!("total = {total}");
/// });
///
/// state.set("price", 5.0);    // prints "total = 0"
/// state.set("quantity", 2.0); // prints "total = 10"
/// ```
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        debug!(?config, "creating reactive runtime");
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                exec: ReentrantMutex::new(TrackingContext::default()),
                store: Mutex::new(DependencyStore::default()),
                detached: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The configuration this runtime was created with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Wrap a state object so reads are tracked and changed writes trigger.
    ///
    /// Wrapping the same [`Target`] twice gives two wrappers that share one
    /// tracking identity.
    pub fn reactive<V>(&self, target: impl Into<Target<V>>) -> Reactive<V>
    where
        V: Clone + PartialEq + Send + Sync + 'static,
    {
        Reactive::new(self.clone(), target.into())
    }

    /// Wrap any value that serializes to named fields.
    ///
    /// The fields are enumerated once, here. Fields added later through
    /// [`Reactive::set`] are tracked like any other.
    pub fn reactive_from<T>(&self, value: &T) -> Result<Reactive<serde_json::Value>>
    where
        T: Serialize + ?Sized,
    {
        let fields = match serde_json::to_value(value)? {
            serde_json::Value::Object(fields) => fields,
            other => {
                return Err(Error::NotAnObject {
                    found: json_kind(&other),
                })
            }
        };
        Ok(self.reactive(fields.into_iter().collect::<Target<_>>()))
    }

    /// Create a single-value reactive cell.
    pub fn ref_cell<V>(&self, value: V) -> Ref<V>
    where
        V: Clone + PartialEq + Send + Sync + 'static,
    {
        Ref::new(self.clone(), value)
    }

    /// Register an effect and run it once to establish its dependencies.
    pub fn effect<F>(&self, run: F) -> Effect
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = self.effect_lazy(run);
        effect.run();
        effect
    }

    /// Register an effect without running it.
    ///
    /// It has no dependencies until its first [`Effect::run`].
    pub fn effect_lazy<F>(&self, run: F) -> Effect
    where
        F: Fn() + Send + Sync + 'static,
    {
        Effect::new(self, run)
    }

    /// Subscribe the running effect to `(target, key)`.
    ///
    /// No-op when no effect is running.
    pub fn track(&self, target: &Identity, key: &str) {
        let exec = self.inner.exec.lock();
        let Some(effect) = exec.current() else {
            return;
        };
        // disposed mid-run: the rest of the run must not re-subscribe it
        if effect.is_disposed() {
            return;
        }

        let added = self
            .inner
            .store
            .lock()
            .subscribe(target, key, effect.id(), effect.downgrade());

        if let Some(location) = added {
            trace!(effect = %effect.id(), object = %target.id(), key, "tracked");
            effect.record(location);
        }
    }

    /// Run every effect subscribed to `(target, key)`.
    ///
    /// Returns how many effects ran. Effects already on the tracking stack
    /// are skipped unless the runtime allows recursive effects.
    ///
    /// # Panics
    ///
    /// Propagates the first panic raised by a subscriber; the remaining
    /// subscribers of this trigger do not run.
    pub fn trigger(&self, target: &Identity, key: &str) -> usize {
        let exec = self.inner.exec.lock();
        let effects = self.inner.store.lock().subscribers(target.id(), key);
        if effects.is_empty() {
            return 0;
        }

        debug!(object = %target.id(), key, subscribers = effects.len(), "triggering");

        let mut ran = 0;
        for weak in effects {
            // an earlier subscriber may have released this one
            let Some(inner) = weak.upgrade() else {
                continue;
            };
            let effect = Effect::from_inner(inner);
            if effect.is_disposed() {
                continue;
            }
            if !self.inner.config.allow_recursive_effects && exec.is_running(effect.id()) {
                trace!(effect = %effect.id(), "skipping effect already running");
                continue;
            }
            effect.run();
            ran += 1;
        }
        ran
    }

    /// Sweep dependency entries whose state objects have been dropped.
    ///
    /// Returns the number of targets removed. Sweeping also happens
    /// whenever a new target is tracked for the first time.
    pub fn purge(&self) -> usize {
        self.inner.store.lock().sweep()
    }

    /// Dispose an effect previously handed over with [`Effect::detach`].
    ///
    /// Returns `false` if no detached effect has that id.
    pub fn dispose_effect(&self, id: SubscriberId) -> bool {
        let released = self.inner.detached.lock().remove(&id);
        match released {
            Some(effect) => {
                effect.dispose();
                true
            }
            None => false,
        }
    }

    /// Whether an effect is currently running on this runtime.
    pub fn is_tracking(&self) -> bool {
        self.inner.exec.lock().current().is_some()
    }

    /// The id of the effect reads are currently attributed to.
    pub fn current_effect(&self) -> Option<SubscriberId> {
        self.inner.exec.lock().current().map(|effect| effect.id())
    }

    /// Number of state objects with at least one live subscription entry.
    pub fn tracked_targets(&self) -> usize {
        self.inner.store.lock().target_count()
    }

    /// Number of effects subscribed to `(target, key)`.
    pub fn subscriber_count(&self, target: &Identity, key: &str) -> usize {
        self.inner.store.lock().subscriber_count(target.id(), key)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("tracked_targets", &self.tracked_targets())
            .field("detached_effects", &self.inner.detached.lock().len())
            .finish()
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn track_outside_effect_is_noop() {
        let runtime = Runtime::new();
        let target = Identity::new();

        runtime.track(&target, "price");

        assert_eq!(runtime.tracked_targets(), 0);
        assert!(!runtime.is_tracking());
    }

    #[test]
    fn trigger_untracked_location_is_noop() {
        let runtime = Runtime::new();
        assert_eq!(runtime.trigger(&Identity::new(), "price"), 0);
    }

    #[test]
    fn track_then_trigger_reruns_effect() {
        let runtime = Runtime::new();
        let target = Identity::new();
        let runs = Arc::new(AtomicI32::new(0));

        let tracker = runtime.clone();
        let location = target.clone();
        let counter = runs.clone();
        let _effect = runtime.effect(move || {
            tracker.track(&location, "price");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(runtime.subscriber_count(&target, "price"), 1);
        assert_eq!(runtime.trigger(&target, "price"), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // other keys of the same target are isolated
        assert_eq!(runtime.trigger(&target, "quantity"), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn current_effect_is_visible_inside_run() {
        let runtime = Runtime::new();
        let seen = Arc::new(Mutex::new(None));

        let probe = runtime.clone();
        let sink = seen.clone();
        let effect = runtime.effect(move || {
            *sink.lock() = probe.current_effect();
        });

        assert_eq!(*seen.lock(), Some(effect.id()));
        assert_eq!(runtime.current_effect(), None);
    }

    #[test]
    fn runtimes_are_isolated() {
        let first = Runtime::new();
        let second = Runtime::new();
        let target = Identity::new();

        let tracker = first.clone();
        let location = target.clone();
        let _effect = first.effect(move || tracker.track(&location, "k"));

        assert_eq!(first.subscriber_count(&target, "k"), 1);
        assert_eq!(second.subscriber_count(&target, "k"), 0);
        assert_eq!(second.trigger(&target, "k"), 0);
    }

    #[test]
    fn reactive_from_rejects_non_objects() {
        let runtime = Runtime::new();
        let err = runtime.reactive_from(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::NotAnObject { found: "an array" }));
    }

    #[test]
    fn purge_after_target_dropped() {
        let runtime = Runtime::new();
        let slot = Arc::new(Mutex::new(Some(runtime.reactive([("x", 1)]))));

        let reader = slot.clone();
        let effect = runtime.effect(move || {
            if let Some(state) = reader.lock().as_ref() {
                state.get("x");
            }
        });
        assert_eq!(runtime.tracked_targets(), 1);
        assert_eq!(runtime.purge(), 0);

        // the effect still lists the location, but nothing holds the target
        slot.lock().take();
        assert_eq!(effect.dependency_count(), 1);
        assert_eq!(runtime.purge(), 1);
        assert_eq!(runtime.tracked_targets(), 0);
    }
}
