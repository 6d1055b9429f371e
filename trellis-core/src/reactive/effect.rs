//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever the
//! reactive state it read during its latest run changes.
//!
//! # How Effects Work
//!
//! 1. When created with [`Runtime::effect`](super::Runtime::effect), the
//!    effect runs immediately to establish its initial dependencies.
//!
//! 2. Every run first drops the subscriptions of the previous run, then
//!    executes with the effect on top of the tracking stack, so every read
//!    re-subscribes it. Dependencies are rebuilt from scratch on every run,
//!    whether the run came from creation, a trigger, or a manual
//!    [`Effect::run`].
//!
//! 3. When a dependency changes, the trigger runs the effect synchronously
//!    before the write returns.
//!
//! # Lifetime
//!
//! The dependency store only holds effects weakly. An effect stays alive as
//! long as some [`Effect`] handle does; dropping the last handle removes its
//! subscriptions. [`Effect::detach`] hands the handle to the runtime for
//! effects that should outlive their creator's scope.
//!
//! # Failure
//!
//! A panicking effect unwinds through whatever ran it. The tracking stack
//! is restored on the way out, and subscribers of the same trigger that had
//! not run yet are skipped.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::runtime::{Runtime, RuntimeInner};
use super::store::Location;
use super::subscriber::SubscriberId;
use crate::error::Error;

pub(crate) type WeakEffect = Weak<EffectInner>;

pub(crate) struct EffectInner {
    /// The subscriber ID used for dependency tracking.
    id: SubscriberId,

    /// The effect function.
    run: Box<dyn Fn() + Send + Sync>,

    /// The runtime this effect tracks into.
    runtime: Weak<RuntimeInner>,

    /// Locations subscribed to during the latest run.
    dependencies: Mutex<HashSet<Location>>,

    /// Whether the effect has been disposed.
    disposed: AtomicBool,

    /// Number of times the effect has run.
    run_count: AtomicUsize,
}

impl EffectInner {
    /// Remove this effect from every location it subscribed to.
    fn clear_dependencies(&self, runtime: &RuntimeInner) {
        let stale = std::mem::take(&mut *self.dependencies.lock());
        if stale.is_empty() {
            return;
        }

        let mut store = runtime.store.lock();
        for location in &stale {
            store.unsubscribe(location, self.id);
        }
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            self.clear_dependencies(&runtime);
        }
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// Handles are cheap to clone and all clones refer to the same effect.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = Runtime::new();
/// let count = runtime.ref_cell(0);
///
/// let reader = count.clone();
/// let effect = runtime.effect(move || {
///     println!("Count is: {}", reader.get());
/// });
///
/// count.set(5);  // Prints: "Count is: 5"
/// ```
#[must_use = "dropping the last handle to an effect stops it; use `detach` to keep it running"]
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    pub(crate) fn new<F>(runtime: &Runtime, run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(EffectInner {
                id: SubscriberId::new(),
                run: Box::new(run),
                runtime: Arc::downgrade(&runtime.inner),
                dependencies: Mutex::new(HashSet::new()),
                disposed: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<EffectInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> WeakEffect {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn record(&self, location: Location) {
        self.inner.dependencies.lock().insert(location);
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Execute the effect function, rebuilding its dependencies.
    ///
    /// Does nothing once the effect is disposed. If the runtime has been
    /// dropped the function still runs, untracked.
    ///
    /// # Panics
    ///
    /// Propagates any panic from the effect function. Also panics with
    /// [`Error::EffectDepthExceeded`] if the runtime's
    /// `max_effect_depth` effects are already running.
    pub fn run(&self) {
        if self.is_disposed() {
            return;
        }

        let Some(runtime) = self.inner.runtime.upgrade() else {
            debug!(effect = %self.id(), "runtime dropped, running untracked");
            self.inner.run_count.fetch_add(1, Ordering::SeqCst);
            (self.inner.run)();
            return;
        };

        let exec = runtime.exec.lock();

        let depth = exec.depth();
        if depth >= runtime.config.max_effect_depth {
            let err = Error::EffectDepthExceeded { depth };
            warn!(effect = %self.id(), depth, "aborting effect cascade");
            panic!("{err}");
        }

        self.inner.clear_dependencies(&runtime);
        self.inner.run_count.fetch_add(1, Ordering::SeqCst);
        trace!(effect = %self.id(), depth, "running effect");

        let _frame = exec.enter(self.clone());
        (self.inner.run)();
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again and holds no
    /// subscriptions. A detached effect is also released by the runtime.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let Some(runtime) = self.inner.runtime.upgrade() else {
            return;
        };
        self.inner.clear_dependencies(&runtime);
        let released = runtime.detached.lock().remove(&self.id());
        drop(released);
        debug!(effect = %self.id(), "effect disposed");
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of locations the effect subscribed to during its latest run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }

    /// Hand this effect to its runtime, keeping it alive without a handle.
    ///
    /// The effect keeps running on changes until
    /// [`Runtime::dispose_effect`](super::Runtime::dispose_effect) is called
    /// with the returned id, or the effect is disposed through another
    /// handle. A detached effect whose closure captures reactive state keeps
    /// that runtime alive until it is disposed.
    pub fn detach(self) -> SubscriberId {
        let id = self.id();
        if let Some(runtime) = self.inner.runtime.upgrade() {
            if !self.is_disposed() {
                runtime.detached.lock().insert(id, self);
            }
        }
        id
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Effect {}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let runtime = Runtime::new();
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = runtime.effect(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Effect should have run once on creation
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let runtime = Runtime::new();
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = runtime.effect_lazy(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 0);
        assert_eq!(effect.run_count(), 0);

        effect.run();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let runtime = Runtime::new();
        let cell = runtime.ref_cell(0);
        let reader = cell.clone();

        let effect = runtime.effect(move || {
            reader.get();
        });
        assert_eq!(effect.run_count(), 1);
        assert_eq!(effect.dependency_count(), 1);

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(effect.dependency_count(), 0);
        assert_eq!(cell.subscriber_count(), 0);

        cell.set(1);
        effect.run();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn disposal_during_run_leaves_no_subscriptions() {
        let runtime = Runtime::new();
        let a = runtime.ref_cell(0);
        let b = runtime.ref_cell(0);
        let handle: Arc<Mutex<Option<Effect>>> = Arc::new(Mutex::new(None));

        let (a_reader, b_reader, me) = (a.clone(), b.clone(), handle.clone());
        let effect = runtime.effect(move || {
            if a_reader.get() == 1 {
                let current = me.lock().clone();
                if let Some(effect) = current {
                    effect.dispose();
                }
            }
            b_reader.get();
        });
        *handle.lock() = Some(effect.clone());
        assert_eq!(b.subscriber_count(), 1);

        a.set(1);

        assert!(effect.is_disposed());
        assert_eq!(effect.dependency_count(), 0);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
        assert_eq!(runtime.tracked_targets(), 0);

        handle.lock().take();
    }

    #[test]
    fn effect_clone_shares_state() {
        let runtime = Runtime::new();
        let effect1 = runtime.effect(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1, effect2);
        assert_eq!(effect2.run_count(), 1);

        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }

    #[test]
    fn rerun_rebuilds_dependencies() {
        let runtime = Runtime::new();
        let cell = runtime.ref_cell(1);
        let reader = cell.clone();

        let effect = runtime.effect(move || {
            reader.get();
            reader.get();
        });

        // reading the same location twice subscribes once
        assert_eq!(effect.dependency_count(), 1);
        effect.run();
        assert_eq!(effect.dependency_count(), 1);
        assert_eq!(cell.subscriber_count(), 1);
    }

    #[test]
    fn dropping_last_handle_unsubscribes() {
        let runtime = Runtime::new();
        let cell = runtime.ref_cell(0);
        let reader = cell.clone();

        let effect = runtime.effect(move || {
            reader.get();
        });
        assert_eq!(cell.subscriber_count(), 1);

        drop(effect);
        assert_eq!(cell.subscriber_count(), 0);
        assert_eq!(runtime.tracked_targets(), 0);
    }

    #[test]
    fn detached_effect_keeps_running() {
        let runtime = Runtime::new();
        let cell = runtime.ref_cell(0);
        let seen = Arc::new(AtomicI32::new(-1));

        let reader = cell.clone();
        let sink = seen.clone();
        let id = runtime
            .effect(move || {
                sink.store(reader.get(), Ordering::SeqCst);
            })
            .detach();

        cell.set(7);
        assert_eq!(seen.load(Ordering::SeqCst), 7);

        assert!(runtime.dispose_effect(id));
        assert!(!runtime.dispose_effect(id));
        cell.set(8);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn runs_untracked_after_runtime_dropped() {
        let runtime = Runtime::new();
        let effect = runtime.effect_lazy(|| {});
        drop(runtime);

        effect.run();
        assert_eq!(effect.run_count(), 1);
        assert_eq!(effect.dependency_count(), 0);
    }
}
