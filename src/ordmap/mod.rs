mod iter;

pub use iter::{IntoIter, Iter, Keys, Values};

use std::collections::hash_map::DefaultHasher;
use std::fmt::{self, Debug, Display};
use std::hash::Hasher;
use std::iter::FromIterator;
use std::mem;
use std::rc::Rc;

use thiserror::Error;

use crate::map::MapKey;
use crate::some_or;

const MIN_BUCKETS: usize = 8; // bucket count stays a power of two
const MAX_LOAD: usize = 2; // slots per bucket before the index grows

/// Error of [`OrdMap::fetch`] on an absent key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("key not found: {0:?}")]
pub struct MissingKey<K: Debug>(pub K);

/// Default-computing function stored by [`MapDefault::Compute`].
pub type DefaultFn<K, V> = Rc<dyn Fn(&mut OrdMap<K, V>, &K) -> V>;

/// What [`OrdMap::get`] resolves to when the key is absent.
pub enum MapDefault<K, V> {
    /// Absent keys resolve to nothing.
    None,
    /// Absent keys resolve to a copy of one fixed value.
    Value(V),
    /// Absent keys resolve by calling the function with the map and the key.
    /// The function may insert the value it computes.
    Compute(DefaultFn<K, V>),
}

impl<K, V: Clone> Clone for MapDefault<K, V> {
    fn clone(&self) -> Self {
        match self {
            MapDefault::None => MapDefault::None,
            MapDefault::Value(value) => MapDefault::Value(value.clone()),
            MapDefault::Compute(f) => MapDefault::Compute(Rc::clone(f)),
        }
    }
}

impl<K, V: Debug> Debug for MapDefault<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapDefault::None => f.write_str("None"),
            MapDefault::Value(value) => f.debug_tuple("Value").field(value).finish(),
            MapDefault::Compute(_) => f.write_str("Compute(..)"),
        }
    }
}

/// One element of a flattened map: a key or a value, alternating in entry
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlatItem<K, V> {
    Key(K),
    Value(V),
}

#[derive(Clone)]
pub(crate) struct Slot<K, V> {
    pub(crate) hash: u64,
    pub(crate) key: K,
    pub(crate) value: V,
}

/// Insertion-ordered hash map.
///
/// Entries keep the order of their first insertion; overwriting a key keeps
/// its position. Keys are matched by content, or by reference identity after
/// [`compare_by_identity`](OrdMap::compare_by_identity). Lookups of absent
/// keys resolve through a [`MapDefault`] policy instead of failing; the only
/// failing operation is [`fetch`](OrdMap::fetch).
pub struct OrdMap<K, V> {
    slots: Vec<Slot<K, V>>,   // entries in first-insertion order
    buckets: Vec<Vec<usize>>, // hash index: bucket -> slot positions
    default: MapDefault<K, V>,
    identity: bool, // one-way switch
}

impl<K: MapKey, V> OrdMap<K, V> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            buckets: vec![Vec::new(); MIN_BUCKETS],
            default: MapDefault::None,
            identity: false,
        }
    }

    /// Create a map whose absent keys resolve to a copy of `value`.
    pub fn with_default(value: V) -> Self {
        let mut map = Self::new();
        map.default = MapDefault::Value(value);
        map
    }

    /// Create a map whose absent keys resolve by calling `f` with the map
    /// and the key.
    pub fn with_default_fn<F>(f: F) -> Self
    where
        F: Fn(&mut OrdMap<K, V>, &K) -> V + 'static,
    {
        let mut map = Self::new();
        map.default = MapDefault::Compute(Rc::new(f));
        map
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn hash_key(&self, key: &K) -> u64 {
        let mut state = DefaultHasher::new();

        match key.identity() {
            Some(id) if self.identity => state.write_usize(id),
            _ => key.hash_content(&mut state),
        }

        state.finish()
    }

    fn key_eq(&self, a: &K, b: &K) -> bool {
        if self.identity {
            if let (Some(x), Some(y)) = (a.identity(), b.identity()) {
                return x == y;
            }
        }

        a.eq_content(b)
    }

    fn bucket_of(&self, hash: u64) -> usize {
        hash as usize & (self.buckets.len() - 1)
    }

    /// find the slot position of the key, comparing under the current mode
    fn find(&self, key: &K) -> Option<usize> {
        let hash = self.hash_key(key);

        for &index in &self.buckets[self.bucket_of(hash)] {
            let slot = &self.slots[index];

            if slot.hash == hash && self.key_eq(&slot.key, key) {
                return Some(index);
            }
        }

        None
    }

    /// Rebuild the bucket index from the cached slot hashes.
    fn redistribute(&mut self) {
        let mut len = MIN_BUCKETS;

        while self.slots.len() > len * MAX_LOAD {
            len *= 2;
        }

        self.buckets = vec![Vec::new(); len];

        for (index, slot) in self.slots.iter().enumerate() {
            let bucket = slot.hash as usize & (len - 1);
            self.buckets[bucket].push(index);
        }
    }

    /// Insert (key, value) into the map, or overwrite the value of an
    /// existing key.
    ///
    /// An overwritten key keeps the position of its first insertion; the old
    /// value is returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(index) = self.find(&key) {
            return Some(mem::replace(&mut self.slots[index].value, value));
        }

        let hash = self.hash_key(&key);
        self.slots.push(Slot { hash, key, value });

        if self.slots.len() > self.buckets.len() * MAX_LOAD {
            self.redistribute();
        } else {
            let bucket = self.bucket_of(hash);
            self.buckets[bucket].push(self.slots.len() - 1);
        }

        None
    }

    /// Lookup the value of the key.
    ///
    /// Absent keys return None; the default policy is not consulted.
    pub fn lookup(&self, key: &K) -> Option<&V> {
        self.find(key).map(move |index| &self.slots[index].value)
    }

    pub fn lookup_mut(&mut self, key: &K) -> Option<&mut V> {
        let index = some_or!(self.find(key), return None);

        Some(&mut self.slots[index].value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Lookup the value of the key, resolving absent keys through the
    /// default policy.
    ///
    /// A `Compute` default receives the map itself and may insert, so the
    /// receiver is mutable and the result is returned by value.
    pub fn get(&mut self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        if let Some(index) = self.find(key) {
            return Some(self.slots[index].value.clone());
        }

        let f = match &self.default {
            MapDefault::None => return None,
            MapDefault::Value(value) => return Some(value.clone()),
            MapDefault::Compute(f) => Rc::clone(f),
        };

        Some((*f)(self, key))
    }

    /// Lookup the value of the key, failing on absent keys.
    ///
    /// The default policy is never consulted here.
    pub fn fetch(&self, key: &K) -> Result<&V, MissingKey<K>>
    where
        K: Clone + Debug,
    {
        match self.find(key) {
            Some(index) => Ok(&self.slots[index].value),
            None => Err(MissingKey(key.clone())),
        }
    }

    /// Lookup the value of the key, resolving absent keys by calling
    /// `fallback` with the key.
    pub fn fetch_or_else<F>(&self, key: &K, fallback: F) -> V
    where
        V: Clone,
        F: FnOnce(&K) -> V,
    {
        match self.find(key) {
            Some(index) => self.slots[index].value.clone(),
            None => fallback(key),
        }
    }

    /// Remove the entry of the key, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let index = some_or!(self.find(key), return None);
        let slot = self.slots.remove(index);

        // positions after index shifted down
        self.redistribute();

        Some(slot.value)
    }

    /// Remove and return the first-inserted entry.
    pub fn shift(&mut self) -> Option<(K, V)> {
        if self.slots.is_empty() {
            return None;
        }

        let slot = self.slots.remove(0);
        self.redistribute();

        Some((slot.key, slot.value))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.redistribute();
    }

    /// Remove every entry for which the predicate is true.
    pub fn remove_if<F>(&mut self, mut pred: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.slots.retain(|slot| !pred(&slot.key, &slot.value));
        self.redistribute();
    }

    /// Remove every entry for which the predicate is false.
    pub fn retain<F>(&mut self, mut pred: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.slots.retain(|slot| pred(&slot.key, &slot.value));
        self.redistribute();
    }

    /// true if any entry satisfies the predicate, visiting in entry order
    /// and stopping at the first match
    pub fn any<F>(&self, mut pred: F) -> bool
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.slots.iter().any(|slot| pred(&slot.key, &slot.value))
    }

    /// The (key, value) pair of the key.
    pub fn assoc(&self, key: &K) -> Option<(&K, &V)> {
        let index = some_or!(self.find(key), return None);
        let slot = &self.slots[index];

        Some((&slot.key, &slot.value))
    }

    /// The first (key, value) pair in entry order whose value matches.
    pub fn rassoc(&self, value: &V) -> Option<(&K, &V)>
    where
        V: PartialEq,
    {
        self.slots
            .iter()
            .find(|slot| slot.value == *value)
            .map(|slot| (&slot.key, &slot.value))
    }

    /// The first key in entry order whose value matches.
    pub fn key_for(&self, value: &V) -> Option<&K>
    where
        V: PartialEq,
    {
        self.rassoc(value).map(|(key, _)| key)
    }

    /// Values of the given keys, position by position; an absent key yields
    /// None at its position.
    pub fn values_at(&self, keys: &[K]) -> Vec<Option<&V>> {
        keys.iter().map(|key| self.lookup(key)).collect()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.slots)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys::new(&self.slots)
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values::new(&self.slots)
    }

    /// Add every entry of the other map, resolving key collisions with
    /// `resolve(key, own value, other value)`.
    pub fn update_with<F>(&mut self, other: &Self, mut resolve: F)
    where
        K: Clone,
        V: Clone,
        F: FnMut(&K, &V, &V) -> V,
    {
        for slot in &other.slots {
            match self.find(&slot.key) {
                Some(index) => {
                    let merged = resolve(&slot.key, &self.slots[index].value, &slot.value);
                    self.slots[index].value = merged;
                }
                None => {
                    self.insert(slot.key.clone(), slot.value.clone());
                }
            }
        }
    }

    /// Add every entry of the other map; on key collision the other map's
    /// value wins.
    pub fn update(&mut self, other: &Self)
    where
        K: Clone,
        V: Clone,
    {
        self.update_with(other, |_, _, other_value| other_value.clone());
    }

    /// New map holding the entries of both, resolving key collisions like
    /// [`update_with`](OrdMap::update_with).
    pub fn merge_with<F>(&self, other: &Self, resolve: F) -> Self
    where
        K: Clone,
        V: Clone,
        F: FnMut(&K, &V, &V) -> V,
    {
        let mut map = self.clone();
        map.update_with(other, resolve);
        map
    }

    /// New map holding the entries of both; on key collision the other
    /// map's value wins.
    pub fn merge(&self, other: &Self) -> Self
    where
        K: Clone,
        V: Clone,
    {
        let mut map = self.clone();
        map.update(other);
        map
    }

    /// empty map keeping the receiver's comparison mode, without its
    /// default policy
    fn derived(&self) -> Self {
        Self {
            slots: Vec::new(),
            buckets: vec![Vec::new(); MIN_BUCKETS],
            default: MapDefault::None,
            identity: self.identity,
        }
    }

    /// New map with the entries for which the predicate is true.
    pub fn select<F>(&self, mut pred: F) -> Self
    where
        K: Clone,
        V: Clone,
        F: FnMut(&K, &V) -> bool,
    {
        let mut map = self.derived();

        for slot in &self.slots {
            if pred(&slot.key, &slot.value) {
                map.insert(slot.key.clone(), slot.value.clone());
            }
        }

        map
    }

    /// New map with the entries for which the predicate is false.
    pub fn reject<F>(&self, mut pred: F) -> Self
    where
        K: Clone,
        V: Clone,
        F: FnMut(&K, &V) -> bool,
    {
        self.select(|key, value| !pred(key, value))
    }

    /// New map mapping each value to its key.
    ///
    /// If values collide, the value last in entry order wins while the entry
    /// keeps the position of the first occurrence.
    pub fn invert(&self) -> OrdMap<V, K>
    where
        K: Clone,
        V: MapKey + Clone,
    {
        let mut map = OrdMap::new();

        for slot in &self.slots {
            map.insert(slot.value.clone(), slot.key.clone());
        }

        map
    }

    /// Entries flattened to an alternating key, value sequence in entry
    /// order.
    pub fn flatten(&self) -> Vec<FlatItem<K, V>>
    where
        K: Clone,
        V: Clone,
    {
        let mut items = Vec::with_capacity(self.slots.len() * 2);

        for slot in &self.slots {
            items.push(FlatItem::Key(slot.key.clone()));
            items.push(FlatItem::Value(slot.value.clone()));
        }

        items
    }

    /// Entries as (key, value) pairs in entry order.
    pub fn to_vec(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.slots
            .iter()
            .map(|slot| (slot.key.clone(), slot.value.clone()))
            .collect()
    }

    /// Replace the whole content with the entries of the other map.
    ///
    /// The entries are re-indexed under the receiver's own comparison mode;
    /// the receiver's default policy stays.
    pub fn replace(&mut self, other: &Self)
    where
        K: Clone,
        V: Clone,
    {
        self.slots = other.slots.clone();
        self.rehash();
    }

    /// Recompute the cached hash of every key from its current content and
    /// rebuild the bucket index.
    ///
    /// Required after the content of an inserted key was mutated: the index
    /// still reflects the content at insertion time, so lookups with the
    /// mutated key miss until the map is rehashed.
    pub fn rehash(&mut self) {
        for index in 0..self.slots.len() {
            let hash = self.hash_key(&self.slots[index].key);
            self.slots[index].hash = hash;
        }

        self.redistribute();
    }

    /// Switch key matching from content equality to reference identity.
    ///
    /// One-way: content-equal keys of distinct allocations no longer match
    /// afterwards. Keys without a reference identity keep matching by
    /// content.
    pub fn compare_by_identity(&mut self) {
        if self.identity {
            return;
        }

        self.identity = true;
        self.rehash();
    }

    pub fn compares_by_identity(&self) -> bool {
        self.identity
    }

    /// The fixed default value, if the policy holds one.
    pub fn default_value(&self) -> Option<&V> {
        match &self.default {
            MapDefault::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The default-computing function, if the policy holds one.
    pub fn default_fn(&self) -> Option<&DefaultFn<K, V>> {
        match &self.default {
            MapDefault::Compute(f) => Some(f),
            _ => None,
        }
    }

    pub fn set_default(&mut self, default: MapDefault<K, V>) {
        self.default = default;
    }
}

impl<K: MapKey, V> Default for OrdMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone> Clone for OrdMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            buckets: self.buckets.clone(),
            default: self.default.clone(),
            identity: self.identity,
        }
    }
}

impl<K: Debug, V: Debug> Debug for OrdMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.slots.iter().map(|slot| (&slot.key, &slot.value)))
            .finish()
    }
}

impl<K: Display, V: Display> Display for OrdMap<K, V> {
    /// `{key=>value, key=>value}` in entry order
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;

        for (index, slot) in self.slots.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }

            write!(f, "{}=>{}", slot.key, slot.value)?;
        }

        f.write_str("}")
    }
}

/// Order-independent equality: same key set, equal value per key.
impl<K: MapKey, V: PartialEq> PartialEq for OrdMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.slots.len() == other.slots.len()
            && self.slots.iter().all(|slot| match other.find(&slot.key) {
                Some(index) => other.slots[index].value == slot.value,
                None => false,
            })
    }
}

impl<K: MapKey, V: Eq> Eq for OrdMap<K, V> {}

impl<K: MapKey, V> Extend<(K, V)> for OrdMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, entries: I) {
        for (key, value) in entries {
            self.insert(key, value);
        }
    }
}

impl<K: MapKey, V> FromIterator<(K, V)> for OrdMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(entries: I) -> Self {
        let mut map = Self::new();
        map.extend(entries);
        map
    }
}

impl<K: MapKey, V, const N: usize> From<[(K, V); N]> for OrdMap<K, V> {
    fn from(entries: [(K, V); N]) -> Self {
        Self::from_iter(IntoIterator::into_iter(entries))
    }
}

impl<K: MapKey, V> IntoIterator for OrdMap<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter::new(self.slots)
    }
}

impl<'a, K: MapKey, V> IntoIterator for &'a OrdMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}
