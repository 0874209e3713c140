//! Chainable multi-value index.
//!
//! A [`Lookup`] maps each key to an ordered list of values. The most
//! recently added value wins on [`get`](Lookup::get), while
//! [`get_all`](Lookup::get_all) sees every value in the chain, parent
//! levels first. Containers use one for registered bindings and scopes use
//! one for cached values.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

/// A key usable in a [`Lookup`].
pub trait LookupKey: Eq + Hash + Clone + Send + Sync {
    /// Blank keys never match locally and always delegate to the parent.
    fn is_blank(&self) -> bool {
        false
    }
}

impl<T: Eq + Hash + Clone + Send + Sync> LookupKey for Option<T> {
    fn is_blank(&self) -> bool {
        self.is_none()
    }
}

impl LookupKey for &str {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl LookupKey for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

/// Identity comparison used by [`Lookup::remove`].
pub trait Identity {
    fn is_same(&self, other: &Self) -> bool;
}

/// The read-only view a child level has of its parent.
pub trait ParentLookup<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;

    fn get_all(&self, key: &K) -> Vec<V>;

    /// Keys visible through this level, for diagnostics.
    fn keys(&self) -> Vec<K> {
        Vec::new()
    }
}

struct Entries<K, V> {
    map: HashMap<K, Vec<V>>,
    order: Vec<K>,
}

/// An append-mostly multi-map with parent delegation.
///
/// # Examples
/// ```
/// use rabt_container::lookup::Lookup;
///
/// let lookup: Lookup<&str, i32> = Lookup::new();
/// lookup.add("k", 1);
/// lookup.add("k", 2);
///
/// assert_eq!(lookup.get(&"k"), Some(2));
/// assert_eq!(lookup.get_all(&"k"), vec![1, 2]);
/// ```
pub struct Lookup<K, V> {
    entries: RwLock<Entries<K, V>>,
    parent: Option<Arc<dyn ParentLookup<K, V>>>,
}

impl<K: LookupKey, V: Clone + Send + Sync> Lookup<K, V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries {
                map: HashMap::new(),
                order: Vec::new(),
            }),
            parent: None,
        }
    }

    /// Creates a lookup that falls back to `parent`.
    pub fn with_parent(parent: Arc<dyn ParentLookup<K, V>>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new()
        }
    }

    /// Creates a lookup pre-populated with `entries`, in order.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (K, V)>,
        parent: Option<Arc<dyn ParentLookup<K, V>>>,
    ) -> Self {
        let lookup = Self {
            parent,
            ..Self::new()
        };
        for (key, value) in entries {
            lookup.add(key, value);
        }
        lookup
    }

    /// Appends `value` under `key` and returns it.
    pub fn add(&self, key: K, value: V) -> V {
        let mut entries = self.entries.write();
        Self::push(&mut entries, key, value.clone());
        value
    }

    /// Returns the most recent local value for `key`, adding one if there is none.
    ///
    /// The check and the insert happen under one lock, so concurrent callers
    /// all observe the same value.
    pub(crate) fn get_or_add(&self, key: K, make: impl FnOnce() -> V) -> V {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.map.get(&key).and_then(|values| values.last()) {
            return existing.clone();
        }
        let value = make();
        Self::push(&mut entries, key, value.clone());
        value
    }

    fn push(entries: &mut Entries<K, V>, key: K, value: V) {
        match entries.map.get_mut(&key) {
            Some(values) => values.push(value),
            None => {
                entries.order.push(key.clone());
                entries.map.insert(key, vec![value]);
            }
        }
    }

    /// Returns the most recently added value for `key`, searching parents
    /// when this level has none.
    pub fn get(&self, key: &K) -> Option<V> {
        if !key.is_blank() {
            let entries = self.entries.read();
            if let Some(value) = entries.map.get(key).and_then(|values| values.last()) {
                return Some(value.clone());
            }
        }
        self.parent.as_ref().and_then(|parent| parent.get(key))
    }

    /// Returns every value for `key`: the parent chain's first, then this level's.
    pub fn get_all(&self, key: &K) -> Vec<V> {
        let mut all = self
            .parent
            .as_ref()
            .map(|parent| parent.get_all(key))
            .unwrap_or_default();

        let entries = self.entries.read();
        if let Some(values) = entries.map.get(key) {
            all.extend(values.iter().cloned());
        }
        all
    }

    /// Returns every local value, in key insertion order. Parents are ignored.
    pub fn values(&self) -> Vec<V> {
        let entries = self.entries.read();
        entries
            .order
            .iter()
            .filter_map(|key| entries.map.get(key))
            .flat_map(|values| values.iter().cloned())
            .collect()
    }

    /// Returns local keys in insertion order, followed by the parent's.
    pub fn keys(&self) -> Vec<K> {
        let mut keys = self.entries.read().order.clone();
        if let Some(parent) = &self.parent {
            keys.extend(parent.keys());
        }
        keys
    }

    /// Number of local values.
    pub fn len(&self) -> usize {
        self.entries.read().map.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: LookupKey, V: Clone + Identity + Send + Sync> Lookup<K, V> {
    /// Removes the first local value under `key` that is `value` itself.
    pub fn remove(&self, key: &K, value: &V) {
        let removed = {
            let mut entries = self.entries.write();
            entries.map.get_mut(key).and_then(|values| {
                let index = values.iter().position(|v| v.is_same(value))?;
                Some(values.remove(index))
            })
        };
        // Dropped outside the lock; a value's drop may call back into this lookup.
        drop(removed);
    }
}

impl<K: LookupKey, V: Clone + Send + Sync> Default for Lookup<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: LookupKey, V: Clone + Send + Sync> ParentLookup<K, V> for Lookup<K, V> {
    fn get(&self, key: &K) -> Option<V> {
        Lookup::get(self, key)
    }

    fn get_all(&self, key: &K) -> Vec<V> {
        Lookup::get_all(self, key)
    }

    fn keys(&self) -> Vec<K> {
        Lookup::keys(self)
    }
}

impl<K, V> std::fmt::Debug for Lookup<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        f.debug_struct("Lookup")
            .field("keys", &entries.order.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Item(&'static str, u32);

    impl Identity for Item {
        fn is_same(&self, other: &Self) -> bool {
            self.1 == other.1
        }
    }

    #[derive(Clone, PartialEq, Eq, Hash)]
    struct Name(&'static str);

    impl LookupKey for Name {
        fn is_blank(&self) -> bool {
            self.0.is_empty()
        }
    }

    fn parent_with(key: &'static str, values: &[u32]) -> Arc<Lookup<Name, Item>> {
        let parent = Lookup::new();
        for &v in values {
            parent.add(Name(key), Item("parent", v));
        }
        Arc::new(parent)
    }

    #[test]
    fn add_returns_value() {
        let lookup = Lookup::new();
        assert_eq!(lookup.add(Name("a"), Item("a", 1)), Item("a", 1));
    }

    #[test]
    fn last_added_wins() {
        let lookup = Lookup::new();
        lookup.add(Name("k"), Item("one", 1));
        lookup.add(Name("k"), Item("two", 2));
        assert_eq!(lookup.get(&Name("k")), Some(Item("two", 2)));
    }

    #[test]
    fn missing_key_delegates_to_parent() {
        let lookup = Lookup::with_parent(parent_with("k", &[1]));
        assert_eq!(lookup.get(&Name("k")), Some(Item("parent", 1)));
        assert_eq!(lookup.get(&Name("other")), None);
    }

    #[test]
    fn local_entry_shadows_parent() {
        let lookup = Lookup::with_parent(parent_with("k", &[1]));
        lookup.add(Name("k"), Item("local", 2));
        assert_eq!(lookup.get(&Name("k")), Some(Item("local", 2)));
    }

    #[test]
    fn blank_key_never_matches() {
        let lookup = Lookup::with_parent(parent_with("", &[1]));
        lookup.add(Name(""), Item("local", 2));
        assert_eq!(lookup.get(&Name("")), None);
        assert_eq!(lookup.get_all(&Name("")).len(), 2);
    }

    #[test]
    fn get_all_is_parent_first() {
        let lookup = Lookup::with_parent(parent_with("k", &[1, 2]));
        lookup.add(Name("k"), Item("local", 3));

        let all: Vec<u32> = lookup.get_all(&Name("k")).into_iter().map(|i| i.1).collect();
        assert_eq!(all, vec![1, 2, 3]);
    }

    #[test]
    fn remove_by_identity() {
        let lookup = Lookup::new();
        lookup.add(Name("k"), Item("a", 1));
        lookup.add(Name("k"), Item("b", 2));

        lookup.remove(&Name("k"), &Item("anything", 2));
        assert_eq!(lookup.get(&Name("k")), Some(Item("a", 1)));

        lookup.remove(&Name("missing"), &Item("a", 1));
        assert_eq!(lookup.len(), 1);
    }

    #[test]
    fn emptied_key_falls_back_to_parent() {
        let lookup = Lookup::with_parent(parent_with("k", &[1]));
        lookup.add(Name("k"), Item("local", 2));
        lookup.remove(&Name("k"), &Item("local", 2));
        assert_eq!(lookup.get(&Name("k")), Some(Item("parent", 1)));
    }

    #[test]
    fn values_in_insertion_order_ignoring_parent() {
        let lookup = Lookup::with_parent(parent_with("p", &[9]));
        lookup.add(Name("b"), Item("b", 1));
        lookup.add(Name("a"), Item("a", 2));
        lookup.add(Name("b"), Item("b", 3));

        let values: Vec<u32> = lookup.values().into_iter().map(|i| i.1).collect();
        assert_eq!(values, vec![1, 3, 2]);
    }

    #[test]
    fn get_or_add_reuses_existing() {
        let lookup: Lookup<Option<u32>, u32> = Lookup::new();
        assert_eq!(lookup.get_or_add(Some(1), || 10), 10);
        assert_eq!(lookup.get_or_add(Some(1), || 20), 10);
        assert_eq!(lookup.len(), 1);
    }

    #[test]
    fn none_key_is_blank() {
        let lookup: Lookup<Option<u32>, u32> = Lookup::new();
        lookup.add(None, 5);
        assert_eq!(lookup.get(&None), None);
        assert_eq!(lookup.values(), vec![5]);
    }

    #[test]
    fn keys_include_parent() {
        let lookup = Lookup::with_parent(parent_with("p", &[1]));
        lookup.add(Name("l"), Item("l", 2));
        let keys: Vec<&str> = lookup.keys().into_iter().map(|k| k.0).collect();
        assert_eq!(keys, vec!["l", "p"]);
    }
}
