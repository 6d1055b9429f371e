//! Dependency Store
//!
//! Two-level registry from a state location to the effects subscribed to it:
//!
//! ```text
//! TargetId -> (weak owner, Key -> { SubscriberId -> Weak<effect> })
//! ```
//!
//! Both levels are created on demand by [`subscribe`](DependencyStore::subscribe)
//! and removed as soon as they become empty, so a (target, key) entry exists
//! exactly while some live effect read that location during its latest run.
//!
//! Nothing in here holds anything strongly. Targets are referenced through
//! their [`Identity`](super::Identity) weak handle and effects through
//! `Weak`, so the store never keeps state or computations alive on its own.

use std::collections::HashMap;
use std::sync::Weak;

use smallvec::SmallVec;
use tracing::debug;

use super::effect::WeakEffect;
use super::subscriber::SubscriberId;
use super::target::{Identity, Key, TargetId};

/// One observed state location: a field of a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Location {
    pub target: TargetId,
    pub key: Key,
}

/// Effects collected by a trigger. Most locations have very few readers.
///
/// Kept weak so that an effect released by an earlier subscriber of the same
/// trigger is not run once more.
pub(crate) type Subscribers = SmallVec<[WeakEffect; 4]>;

type SubscriberSet = HashMap<SubscriberId, WeakEffect>;

struct TargetDeps {
    owner: Weak<TargetId>,
    keys: HashMap<Key, SubscriberSet>,
}

impl TargetDeps {
    fn is_alive(&self) -> bool {
        self.owner.strong_count() > 0
    }
}

#[derive(Default)]
pub(crate) struct DependencyStore {
    targets: HashMap<TargetId, TargetDeps>,
}

impl DependencyStore {
    /// Add `subscriber` to the set for `(target, key)`.
    ///
    /// Returns the location if the subscription is new, `None` if the
    /// subscriber was already present. Registering a target for the first
    /// time sweeps entries whose owners are gone.
    pub fn subscribe(
        &mut self,
        target: &Identity,
        key: &str,
        subscriber: SubscriberId,
        effect: WeakEffect,
    ) -> Option<Location> {
        let target_id = target.id();

        if !self.targets.contains_key(&target_id) {
            self.sweep();
            self.targets.insert(
                target_id,
                TargetDeps {
                    owner: target.downgrade(),
                    keys: HashMap::new(),
                },
            );
        }

        let deps = self.targets.get_mut(&target_id)?;
        let key: Key = match deps.keys.get_key_value(key) {
            Some((existing, _)) => existing.clone(),
            None => key.into(),
        };
        let set = deps.keys.entry(key.clone()).or_default();

        if set.contains_key(&subscriber) {
            return None;
        }
        set.insert(subscriber, effect);

        Some(Location {
            target: target_id,
            key,
        })
    }

    /// Remove `subscriber` from one location, dropping empty levels.
    pub fn unsubscribe(&mut self, location: &Location, subscriber: SubscriberId) {
        let Some(deps) = self.targets.get_mut(&location.target) else {
            return;
        };

        if let Some(set) = deps.keys.get_mut(&location.key) {
            set.remove(&subscriber);
            if set.is_empty() {
                deps.keys.remove(&location.key);
            }
        }

        if deps.keys.is_empty() {
            self.targets.remove(&location.target);
        }
    }

    /// Subscribers of `(target, key)` that were alive at the time of the
    /// call.
    ///
    /// Dead weak entries found along the way are removed. The iteration
    /// order of the result is unspecified.
    pub fn subscribers(&mut self, target: TargetId, key: &str) -> Subscribers {
        let mut live = Subscribers::new();

        let Some(deps) = self.targets.get_mut(&target) else {
            return live;
        };
        let Some(set) = deps.keys.get_mut(key) else {
            return live;
        };

        set.retain(|_, weak| {
            let alive = weak.strong_count() > 0;
            if alive {
                live.push(weak.clone());
            }
            alive
        });

        if set.is_empty() {
            deps.keys.remove(key);
            if deps.keys.is_empty() {
                self.targets.remove(&target);
            }
        }

        live
    }

    /// Drop every entry whose target has no remaining holder.
    ///
    /// Returns the number of targets removed.
    pub fn sweep(&mut self) -> usize {
        let before = self.targets.len();
        self.targets.retain(|_, deps| deps.is_alive());
        let removed = before - self.targets.len();
        if removed > 0 {
            debug!(removed, "swept dependency entries of dropped targets");
        }
        removed
    }

    /// Number of targets with at least one subscription.
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Number of subscribers registered for `(target, key)`.
    pub fn subscriber_count(&self, target: TargetId, key: &str) -> usize {
        self.targets
            .get(&target)
            .and_then(|deps| deps.keys.get(key))
            .map(|set| set.len())
            .unwrap_or(0)
    }
}
