//! State Objects
//!
//! A [`Target`] is the plain, untracked state object that a
//! [`Reactive`](super::Reactive) wrapper protects: an ordered map from field
//! name to value. Reading or writing a `Target` directly never tracks and
//! never triggers.
//!
//! Every target (and every [`Ref`](super::Ref)) carries an [`Identity`].
//! The dependency store is keyed by that identity, not by the values inside,
//! and only keeps a weak handle to it. Once the last holder of a target is
//! gone, its store entry becomes collectible.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// A property key.
pub type Key = Arc<str>;

/// Process-unique number naming one state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// The tracking identity of a state object.
///
/// Clones share the identity. The dependency store holds it weakly: when
/// every clone has been dropped the identity is dead and the store sweeps
/// its entry.
#[derive(Debug, Clone)]
pub struct Identity(Arc<TargetId>);

impl Identity {
    /// Allocate a fresh identity.
    pub fn new() -> Self {
        Self(Arc::new(TargetId::next()))
    }

    /// The numeric id used as the store key.
    pub fn id(&self) -> TargetId {
        *self.0
    }

    pub(crate) fn downgrade(&self) -> Weak<TargetId> {
        Arc::downgrade(&self.0)
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Identity {}

struct TargetInner<V> {
    identity: Identity,
    fields: RwLock<IndexMap<Key, V>>,
}

/// A structured state object: named fields in insertion order.
///
/// `Target` is a shared handle. Cloning it yields another handle to the same
/// object, with the same [`Identity`].
///
/// # Example
///
/// ```rust,ignore
/// let target = Target::from([("price", 0.0), ("quantity", 0.0)]);
/// target.insert("price", 5.0);
/// assert_eq!(target.get("price"), Some(5.0));
/// ```
pub struct Target<V> {
    inner: Arc<TargetInner<V>>,
}

impl<V> Target<V> {
    /// Create an empty state object.
    pub fn new() -> Self {
        Self::with_fields(IndexMap::new())
    }

    fn with_fields(fields: IndexMap<Key, V>) -> Self {
        Self {
            inner: Arc::new(TargetInner {
                identity: Identity::new(),
                fields: RwLock::new(fields),
            }),
        }
    }

    /// The identity this object is tracked under.
    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    /// Whether the object has a field named `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.fields.read().contains_key(key)
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> Vec<Key> {
        self.inner.fields.read().keys().cloned().collect()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.inner.fields.read().len()
    }

    /// Whether the object has no fields.
    pub fn is_empty(&self) -> bool {
        self.inner.fields.read().is_empty()
    }

    /// Remove a field, returning its value.
    ///
    /// Removal keeps the order of the remaining fields.
    pub fn remove(&self, key: &str) -> Option<V> {
        self.inner.fields.write().shift_remove(key)
    }
}

impl<V: Clone> Target<V> {
    /// Read a field. Absent fields read as `None`.
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.fields.read().get(key).cloned()
    }

    /// Write a field, creating it if absent. Returns the previous value.
    pub fn insert(&self, key: impl Into<Key>, value: V) -> Option<V> {
        self.inner.fields.write().insert(key.into(), value)
    }

    /// Copy of every field, in insertion order.
    pub fn snapshot(&self) -> IndexMap<Key, V> {
        self.inner.fields.read().clone()
    }
}

impl<V: PartialEq> Target<V> {
    /// Store `value` under `key` and report whether it differs from the
    /// previous value. An absent field always counts as changed.
    ///
    /// The comparison and the write happen under one lock.
    pub(crate) fn replace(&self, key: Key, value: V) -> bool {
        let mut fields = self.inner.fields.write();
        match fields.get_mut(&key) {
            Some(slot) if *slot == value => false,
            Some(slot) => {
                *slot = value;
                true
            }
            None => {
                fields.insert(key, value);
                true
            }
        }
    }
}

impl<V> Default for Target<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for Target<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Into<Key>, V> FromIterator<(K, V)> for Target<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::with_fields(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<K: Into<Key>, V, const N: usize> From<[(K, V); N]> for Target<V> {
    fn from(fields: [(K, V); N]) -> Self {
        fields.into_iter().collect()
    }
}

impl<K: Into<Key>, V> From<IndexMap<K, V>> for Target<V> {
    fn from(fields: IndexMap<K, V>) -> Self {
        fields.into_iter().collect()
    }
}

impl<V: fmt::Debug> fmt::Debug for Target<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.inner.identity.id())
            .field("fields", &*self.inner.fields.read())
            .finish()
    }
}

impl<V: Serialize> Serialize for Target<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.inner.fields.read();
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for (key, value) in fields.iter() {
            map.serialize_entry(&**key, value)?;
        }
        map.end()
    }
}
