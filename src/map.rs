//! Persistent sorted associative container.
//!
//! This module provides [`SortedMap`], an immutable ordered map backed by
//! a weight-balanced binary search tree with structural sharing.
//!
//! # Overview
//!
//! `SortedMap` keeps its entries in ascending key order at all times:
//!
//! - O(log N) get
//! - O(log N) insert
//! - O(log N) remove
//! - O(log N) min/max
//! - O(log N + k) range queries where k is the number of results
//! - O(log N + k) positional slices
//! - O(1) len and `is_empty`
//!
//! All operations return new maps without modifying the original, and
//! structural sharing ensures memory efficiency.
//!
//! # Examples
//!
//! ```rust
//! use persistree::SortedMap;
//!
//! let map = SortedMap::new()
//!     .insert(3, "three")
//!     .insert(1, "one")
//!     .insert(2, "two");
//!
//! // Entries are always in sorted order
//! let keys: Vec<&i32> = map.keys().collect();
//! assert_eq!(keys, vec![&1, &2, &3]);
//!
//! // Range queries
//! let range: Vec<(&i32, &&str)> = map.range(1..3).collect();
//! assert_eq!(range.len(), 2); // 1 and 2
//! ```

use crate::algebra::union_entries;
use crate::error::Error;
use crate::iter::{BuildSignal, Entries, Step, Traversal};
use crate::tree::{collect_range, Tree};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;
use std::ops::RangeBounds;

/// A persistent (immutable) ordered map.
///
/// `SortedMap` is an immutable data structure: every mutating operation
/// path-copies the touched branch and shares everything else with the
/// previous version, so old versions remain valid and cheap to keep.
///
/// Keys must implement `Ord`. A map instance holds a single key type; the
/// total order is `Ord`'s, and there is no cross-type comparison.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log N)          |
/// | `insert`       | O(log N)          |
/// | `remove`       | O(log N)          |
/// | `min`/`max`    | O(log N)          |
/// | `range`        | O(log N + k)      |
/// | `slice`        | O(log N + k)      |
/// | `merge`        | O(N + M)          |
/// | `len`          | O(1)              |
///
/// # Examples
///
/// ```rust
/// use persistree::SortedMap;
///
/// let map = SortedMap::singleton(42, "answer");
/// assert_eq!(map.get(&42), Some(&"answer"));
///
/// let updated = map.insert(42, "other");
/// assert_eq!(map.get(&42), Some(&"answer")); // Original unchanged
/// assert_eq!(updated.get(&42), Some(&"other"));
/// ```
#[derive(Clone)]
pub struct SortedMap<K, V> {
    tree: Tree<K, V>,
}

impl<K, V> SortedMap<K, V> {
    /// Creates a new empty map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedMap;
    ///
    /// let map: SortedMap<i32, String> = SortedMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { tree: Tree::new() }
    }

    /// Returns the number of entries in the map.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns a lazy iterator over entries in ascending key order.
    ///
    /// The walk is genuinely lazy: dropping the iterator visits no
    /// further nodes, and the iterator value itself can be stored and
    /// resumed later.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedMap;
    ///
    /// let map = SortedMap::new().insert(2, "b").insert(1, "a");
    /// let entries: Vec<(&i32, &&str)> = map.iter().collect();
    /// assert_eq!(entries, vec![(&1, &"a"), (&2, &"b")]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> Entries<'_, K, V> {
        Entries::new(&self.tree.root, self.len())
    }

    /// Returns an iterator over keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values in ascending key order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Drives an in-order traversal with the three-signal protocol.
    ///
    /// The `step` function returns [`Step::Continue`] to advance,
    /// [`Step::Halt`] to stop without visiting remaining entries, or
    /// [`Step::Suspend`] to pause and receive a resumable continuation
    /// inside [`Traversal::Suspended`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::{SortedMap, Step, Traversal};
    ///
    /// let map = SortedMap::new().insert(1, 10).insert(2, 20).insert(3, 30);
    ///
    /// // Halt as soon as the running sum reaches 30.
    /// let outcome = map.reduce(0, |sum, _, value| {
    ///     let sum = sum + value;
    ///     if sum >= 30 { Step::Halt(sum) } else { Step::Continue(sum) }
    /// });
    /// assert!(matches!(outcome, Traversal::Halted(30)));
    /// ```
    pub fn reduce<B, F>(&self, init: B, step: F) -> Traversal<Entries<'_, K, V>, B>
    where
        F: FnMut(B, &K, &V) -> Step<B>,
    {
        self.iter().reduce(init, step)
    }

    /// Returns an iterator over the window of `length` entries starting
    /// at in-order position `start`.
    ///
    /// The first `start` entries are skipped by size-guided descent, not
    /// by walking past them, so the cost is O(log N + `length`). A window
    /// reaching past the end is simply truncated.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedMap;
    ///
    /// let map = SortedMap::new()
    ///     .insert(4, "d")
    ///     .insert(2, "b")
    ///     .insert(1, "a")
    ///     .insert(3, "c");
    ///
    /// let window: Vec<&i32> = map.slice(1, 2).map(|(key, _)| key).collect();
    /// assert_eq!(window, vec![&2, &3]);
    /// ```
    pub fn slice(&self, start: usize, length: usize) -> impl Iterator<Item = (&K, &V)> {
        Entries::seeded(&self.tree.root, start, self.len()).take(length)
    }
}

impl<K: Clone + Ord, V: Clone> SortedMap<K, V> {
    /// Creates a map containing a single key-value pair.
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().insert(key, value)
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but the
    /// ordering on the borrowed form must match the ordering on the key
    /// type. A missing key is not an error; it yields `None`.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedMap;
    ///
    /// let map = SortedMap::new().insert("hello".to_string(), 42);
    ///
    /// // Can use &str to look up String keys
    /// assert_eq!(map.get("hello"), Some(&42));
    /// assert_eq!(map.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key)
    }

    /// Returns the value for the key, or the supplied default when the
    /// key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedMap;
    ///
    /// let map = SortedMap::new().insert(1, "one");
    /// assert_eq!(map.get_or(&1, &"missing"), &"one");
    /// assert_eq!(map.get_or(&2, &"missing"), &"missing");
    /// ```
    #[must_use]
    pub fn get_or<'a, Q>(&'a self, key: &Q, default: &'a V) -> &'a V
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).unwrap_or(default)
    }

    /// Returns `true` if the map contains a value for the specified key.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map already contains the key, the value is replaced without
    /// changing the tree shape; otherwise every ancestor on the copied
    /// path is rebalanced.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedMap;
    ///
    /// let map1 = SortedMap::new().insert(1, "one");
    /// let map2 = map1.insert(1, "ONE");
    ///
    /// assert_eq!(map1.get(&1), Some(&"one")); // Original unchanged
    /// assert_eq!(map2.get(&1), Some(&"ONE")); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        Self {
            tree: self.tree.insert(key, value),
        }
    }

    /// Removes a key from the map.
    ///
    /// Returns a new map without the key. Removing an absent key is a
    /// content-preserving no-op, not an error.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedMap;
    ///
    /// let map = SortedMap::new().insert(1, "one").insert(2, "two");
    /// let removed = map.remove(&1);
    ///
    /// assert_eq!(map.len(), 2);     // Original unchanged
    /// assert_eq!(removed.len(), 1);
    /// assert_eq!(removed.get(&1), None);
    /// assert_eq!(map.remove(&7).len(), 2); // Absent key: no-op
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Self {
            tree: self.tree.remove(key),
        }
    }

    /// Applies a function to the existing value for `key`, or installs
    /// `default` when the key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedMap;
    ///
    /// let counts = SortedMap::new().insert("a", 1);
    /// let counts = counts.update("a", 1, |count| count + 1);
    /// let counts = counts.update("b", 1, |count| count + 1);
    ///
    /// assert_eq!(counts.get(&"a"), Some(&2));
    /// assert_eq!(counts.get(&"b"), Some(&1));
    /// ```
    #[must_use]
    pub fn update<F>(&self, key: K, default: V, transform: F) -> Self
    where
        F: FnOnce(&V) -> V,
    {
        match self.get(&key) {
            Some(existing) => {
                let updated = transform(existing);
                self.insert(key, updated)
            }
            None => self.insert(key, default),
        }
    }

    /// Returns the entry with the minimum key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyCollection`] when the map has no entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedMap;
    ///
    /// let map = SortedMap::new().insert(3, "three").insert(1, "one");
    /// assert_eq!(map.min(), Ok((&1, &"one")));
    /// ```
    pub fn min(&self) -> Result<(&K, &V), Error> {
        self.tree
            .min()
            .ok_or(Error::EmptyCollection { operation: "min" })
    }

    /// Returns the entry with the maximum key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyCollection`] when the map has no entries.
    pub fn max(&self) -> Result<(&K, &V), Error> {
        self.tree
            .max()
            .ok_or(Error::EmptyCollection { operation: "max" })
    }

    /// Returns an iterator over entries within the specified key range.
    ///
    /// The range is specified using Rust's range syntax (`a..b`, `a..=b`,
    /// `a..`, `..b`, `..`). The scan descends only into subtrees whose
    /// key interval can overlap the bounds; an empty map or inverted
    /// bounds yield an empty result rather than failing.
    ///
    /// # Complexity
    ///
    /// O(log N + k) where k is the number of entries in the range
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedMap;
    ///
    /// let map = SortedMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two")
    ///     .insert(3, "three")
    ///     .insert(4, "four");
    ///
    /// let keys: Vec<&i32> = map.range(2..=4).map(|(key, _)| key).collect();
    /// assert_eq!(keys, vec![&2, &3, &4]);
    /// ```
    pub fn range<R, Q>(&self, range: R) -> SortedMapRangeIterator<'_, K, V>
    where
        R: RangeBounds<Q>,
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut entries = Vec::new();
        collect_range(
            &self.tree.root,
            range.start_bound(),
            range.end_bound(),
            &mut entries,
        );
        SortedMapRangeIterator {
            entries,
            current_index: 0,
        }
    }

    /// Merges two maps, with values from `other` taking precedence on key
    /// collisions (right-biased union).
    ///
    /// Implemented as a linear merge of both maps' ordered entry lists
    /// followed by a balanced rebuild.
    ///
    /// # Complexity
    ///
    /// O(N + M)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedMap;
    ///
    /// let map1 = SortedMap::new().insert(1, "one").insert(2, "two");
    /// let map2 = SortedMap::new().insert(2, "TWO").insert(3, "three");
    /// let merged = map1.merge(&map2);
    ///
    /// assert_eq!(merged.get(&1), Some(&"one"));
    /// assert_eq!(merged.get(&2), Some(&"TWO")); // From map2
    /// assert_eq!(merged.get(&3), Some(&"three"));
    /// ```
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let merged = union_entries(&self.tree.to_vec(), &other.tree.to_vec());
        Self {
            tree: Tree::from_sorted_unchecked(&merged),
        }
    }

    /// Merges two maps with a custom conflict resolver.
    ///
    /// When a key exists in both maps, the resolver receives the key and
    /// both values and decides the merged value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedMap;
    ///
    /// let map1 = SortedMap::new().insert(1, 100).insert(2, 200);
    /// let map2 = SortedMap::new().insert(2, 50).insert(3, 300);
    /// let merged = map1.merge_with(&map2, |_, left, right| *left.max(right));
    ///
    /// assert_eq!(merged.get(&1), Some(&100));
    /// assert_eq!(merged.get(&2), Some(&200)); // max(200, 50)
    /// assert_eq!(merged.get(&3), Some(&300));
    /// ```
    #[must_use]
    pub fn merge_with<F>(&self, other: &Self, mut resolver: F) -> Self
    where
        F: FnMut(&K, &V, &V) -> V,
    {
        let mut result = self.clone();
        for (key, other_value) in other.iter() {
            let merged_value = result.get(key).map_or_else(
                || other_value.clone(),
                |self_value| resolver(key, self_value, other_value),
            );
            result = result.insert(key.clone(), merged_value);
        }
        result
    }

    /// Converts the map to an owned, strictly ascending entry list.
    ///
    /// # Complexity
    ///
    /// O(N)
    #[must_use]
    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.tree.to_vec()
    }

    /// Rebuilds the map into its most compact, shallow shape.
    ///
    /// Two maps with the same ordered content rebalance to the same
    /// shape, whatever their insertion histories. Content is unchanged.
    ///
    /// # Complexity
    ///
    /// O(N)
    #[must_use]
    pub fn rebalance(&self) -> Self {
        Self {
            tree: self.tree.rebalance(),
        }
    }

    /// Builds a map from entries that are already strictly ascending by
    /// key, in O(N).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the entries are not
    /// strictly ascending (equal or descending neighbours).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedMap;
    ///
    /// let map = SortedMap::from_sorted_entries(vec![(1, "a"), (2, "b")]).unwrap();
    /// assert_eq!(map.len(), 2);
    ///
    /// assert!(SortedMap::from_sorted_entries(vec![(2, "b"), (1, "a")]).is_err());
    /// ```
    pub fn from_sorted_entries(entries: Vec<(K, V)>) -> Result<Self, Error> {
        if entries.windows(2).any(|pair| pair[0].0 >= pair[1].0) {
            return Err(Error::InvalidArgument {
                operation: "from_sorted_entries",
                reason: "keys must be strictly ascending",
            });
        }
        Ok(Self {
            tree: Tree::from_sorted_unchecked(&entries),
        })
    }

    /// Builds a map incrementally from a sequence of build signals.
    ///
    /// `Append` accumulates an entry, `Finish` completes the build, and
    /// `Abort` discards everything and yields `None`. A source that ends
    /// without an explicit `Finish` finishes implicitly. Later appends of
    /// the same key overwrite earlier ones.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::{BuildSignal, SortedMap};
    ///
    /// let map = SortedMap::from_signals(vec![
    ///     BuildSignal::Append((2, "b")),
    ///     BuildSignal::Append((1, "a")),
    ///     BuildSignal::Finish,
    /// ]);
    /// assert_eq!(map.map(|map| map.len()), Some(2));
    ///
    /// let aborted = SortedMap::<i32, &str>::from_signals(vec![
    ///     BuildSignal::Append((1, "a")),
    ///     BuildSignal::Abort,
    /// ]);
    /// assert!(aborted.is_none());
    /// ```
    #[must_use]
    pub fn from_signals<I>(signals: I) -> Option<Self>
    where
        I: IntoIterator<Item = BuildSignal<(K, V)>>,
    {
        Self::new().build(signals)
    }

    /// Extends this map from a sequence of build signals, starting from
    /// the current content. Appended entries win on key collision.
    #[must_use]
    pub fn build<I>(&self, signals: I) -> Option<Self>
    where
        I: IntoIterator<Item = BuildSignal<(K, V)>>,
    {
        let mut appended = Vec::new();
        for signal in signals {
            match signal {
                BuildSignal::Append(entry) => appended.push(entry),
                BuildSignal::Finish => break,
                BuildSignal::Abort => return None,
            }
        }
        let additions: Self = appended.into_iter().collect();
        Some(self.merge(&additions))
    }

    /// Bulk-builds a map from unordered entries: stable sort by key,
    /// last occurrence wins per key, then a balanced build. O(N log N).
    fn bulk_build(mut entries: Vec<(K, V)>) -> Self {
        entries.sort_by(|left, right| left.0.cmp(&right.0));
        let mut deduped: Vec<(K, V)> = Vec::with_capacity(entries.len());
        for entry in entries {
            match deduped.last_mut() {
                // The sort is stable, so the later insert is the later entry.
                Some(last) if last.0 == entry.0 => *last = entry,
                _ => deduped.push(entry),
            }
        }
        Self {
            tree: Tree::from_sorted_unchecked(&deduped),
        }
    }
}

// =============================================================================
// Range Iterator
// =============================================================================

/// A range iterator over key-value pairs of a [`SortedMap`].
pub struct SortedMapRangeIterator<'a, K, V> {
    entries: Vec<(&'a K, &'a V)>,
    current_index: usize,
}

impl<'a, K, V> Iterator for SortedMapRangeIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_index >= self.entries.len() {
            None
        } else {
            let entry = self.entries[self.current_index];
            self.current_index += 1;
            Some(entry)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len().saturating_sub(self.current_index);
        (remaining, Some(remaining))
    }
}

impl<K, V> ExactSizeIterator for SortedMapRangeIterator<'_, K, V> {
    fn len(&self) -> usize {
        self.entries.len().saturating_sub(self.current_index)
    }
}

/// An owning iterator over key-value pairs of a [`SortedMap`].
pub struct SortedMapIntoIterator<K, V> {
    entries: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iterator for SortedMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> ExactSizeIterator for SortedMapIntoIterator<K, V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Default for SortedMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Ord, V: Clone> FromIterator<(K, V)> for SortedMap<K, V> {
    /// Bulk-builds via sort plus balanced build rather than sequential
    /// inserts; later entries overwrite earlier ones on equal keys.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::bulk_build(iter.into_iter().collect())
    }
}

impl<K: Clone + Ord, V: Clone> IntoIterator for SortedMap<K, V> {
    type Item = (K, V);
    type IntoIter = SortedMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        SortedMapIntoIterator {
            entries: self.tree.to_vec().into_iter(),
        }
    }
}

impl<'a, K, V> IntoIterator for &'a SortedMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Entries<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for SortedMap<K, V> {
    /// Content equality in key order; two maps with different insertion
    /// histories but the same entries are equal.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(left, right)| left == right)
    }
}

impl<K: Eq, V: Eq> Eq for SortedMap<K, V> {}

/// The hash covers the length and then every entry in key order, so equal
/// maps hash equally regardless of how they were built.
impl<K: Hash, V: Hash> Hash for SortedMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for (key, value) in self.iter() {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for SortedMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K: fmt::Display, V: fmt::Display> fmt::Display for SortedMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        let mut first = true;
        for (key, value) in self.iter() {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V> serde::Serialize for SortedMap<K, V>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct SortedMapVisitor<K, V> {
    key_marker: std::marker::PhantomData<K>,
    value_marker: std::marker::PhantomData<V>,
}

#[cfg(feature = "serde")]
impl<K, V> SortedMapVisitor<K, V> {
    const fn new() -> Self {
        Self {
            key_marker: std::marker::PhantomData,
            value_marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::de::Visitor<'de> for SortedMapVisitor<K, V>
where
    K: serde::Deserialize<'de> + Clone + Ord,
    V: serde::Deserialize<'de> + Clone,
{
    type Value = SortedMap<K, V>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        // Sequential insert keeps memory usage gradual for large inputs.
        let mut map = SortedMap::new();
        while let Some((key, value)) = access.next_entry()? {
            map = map.insert(key, value);
        }
        Ok(map)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::Deserialize<'de> for SortedMap<K, V>
where
    K: serde::Deserialize<'de> + Clone + Ord,
    V: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(SortedMapVisitor::new())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_new_creates_empty() {
        let map: SortedMap<i32, String> = SortedMap::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
    }

    #[rstest]
    fn test_singleton() {
        let map = SortedMap::singleton(42, "answer".to_string());
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&42), Some(&"answer".to_string()));
    }

    #[rstest]
    fn test_insert_and_get() {
        let map = SortedMap::new()
            .insert(1, "one".to_string())
            .insert(2, "two".to_string());

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&1), Some(&"one".to_string()));
        assert_eq!(map.get(&2), Some(&"two".to_string()));
        assert_eq!(map.get(&3), None);
    }

    #[rstest]
    fn test_insert_overwrite() {
        let map1 = SortedMap::new().insert(1, "one".to_string());
        let map2 = map1.insert(1, "ONE".to_string());

        assert_eq!(map1.get(&1), Some(&"one".to_string()));
        assert_eq!(map2.get(&1), Some(&"ONE".to_string()));
        assert_eq!(map1.len(), 1);
        assert_eq!(map2.len(), 1);
    }

    #[rstest]
    fn test_get_or_default() {
        let map = SortedMap::new().insert(1, 10);
        assert_eq!(map.get_or(&1, &0), &10);
        assert_eq!(map.get_or(&9, &0), &0);
    }

    #[rstest]
    fn test_remove() {
        let map = SortedMap::new()
            .insert(1, "one".to_string())
            .insert(2, "two".to_string());
        let removed = map.remove(&1);

        assert_eq!(removed.len(), 1);
        assert_eq!(removed.get(&1), None);
        assert_eq!(removed.get(&2), Some(&"two".to_string()));
    }

    #[rstest]
    fn test_remove_absent_key_preserves_content() {
        let map = SortedMap::new().insert(1, 10).insert(2, 20);
        let removed = map.remove(&9);
        assert_eq!(removed, map);
    }

    #[rstest]
    fn test_update_existing_and_absent() {
        let counts = SortedMap::new().insert("a", 1);
        let counts = counts.update("a", 1, |count| count + 1);
        let counts = counts.update("b", 1, |count| count + 1);
        assert_eq!(counts.get(&"a"), Some(&2));
        assert_eq!(counts.get(&"b"), Some(&1));
    }

    #[rstest]
    fn test_min_max() {
        let map = SortedMap::new()
            .insert(3, "three".to_string())
            .insert(1, "one".to_string())
            .insert(5, "five".to_string());

        assert_eq!(map.min(), Ok((&1, &"one".to_string())));
        assert_eq!(map.max(), Ok((&5, &"five".to_string())));
    }

    #[rstest]
    fn test_min_max_empty_collection() {
        let empty: SortedMap<i32, i32> = SortedMap::new();
        assert_eq!(empty.min(), Err(Error::EmptyCollection { operation: "min" }));
        assert_eq!(empty.max(), Err(Error::EmptyCollection { operation: "max" }));
    }

    #[rstest]
    fn test_iter_sorted() {
        let map = SortedMap::new()
            .insert(3, "three".to_string())
            .insert(1, "one".to_string())
            .insert(2, "two".to_string());

        let keys: Vec<&i32> = map.keys().collect();
        assert_eq!(keys, vec![&1, &2, &3]);
    }

    #[rstest]
    fn test_values_in_key_order() {
        let map = SortedMap::new().insert(2, 20).insert(1, 10).insert(3, 30);
        let values: Vec<&i32> = map.values().collect();
        assert_eq!(values, vec![&10, &20, &30]);
    }

    #[rstest]
    fn test_range() {
        let map = SortedMap::new()
            .insert(1, "one")
            .insert(2, "two")
            .insert(3, "three")
            .insert(4, "four")
            .insert(5, "five");

        let range: Vec<&i32> = map.range(2..=4).map(|(key, _)| key).collect();
        assert_eq!(range, vec![&2, &3, &4]);
    }

    #[rstest]
    fn test_range_inverted_bounds_is_empty() {
        let map = SortedMap::new().insert(1, "a").insert(2, "b");
        assert_eq!(map.range(5..=1).count(), 0);
    }

    #[rstest]
    fn test_range_on_empty_map_is_empty() {
        let map: SortedMap<i32, i32> = SortedMap::new();
        assert_eq!(map.range(..).count(), 0);
    }

    #[rstest]
    fn test_slice_window() {
        let map = SortedMap::new()
            .insert(4, "d")
            .insert(2, "b")
            .insert(1, "a")
            .insert(3, "c");
        let window: Vec<&i32> = map.slice(1, 2).map(|(key, _)| key).collect();
        assert_eq!(window, vec![&2, &3]);
    }

    #[rstest]
    fn test_slice_truncates_at_end() {
        let map = SortedMap::new().insert(1, "a").insert(2, "b");
        assert_eq!(map.slice(1, 10).count(), 1);
        assert_eq!(map.slice(5, 3).count(), 0);
    }

    #[rstest]
    fn test_from_iter_bulk_build() {
        let entries = vec![
            (3, "three".to_string()),
            (1, "one".to_string()),
            (2, "two".to_string()),
        ];
        let map: SortedMap<i32, String> = entries.into_iter().collect();

        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&1), Some(&"one".to_string()));
    }

    #[rstest]
    fn test_from_iter_last_duplicate_wins() {
        let map: SortedMap<i32, i32> = vec![(1, 10), (2, 20), (1, 999)].into_iter().collect();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&1), Some(&999));
    }

    #[rstest]
    fn test_from_sorted_entries_rejects_unsorted_input() {
        let unsorted = SortedMap::from_sorted_entries(vec![(2, "b"), (1, "a")]);
        assert_eq!(
            unsorted,
            Err(Error::InvalidArgument {
                operation: "from_sorted_entries",
                reason: "keys must be strictly ascending",
            })
        );

        let duplicated = SortedMap::from_sorted_entries(vec![(1, "a"), (1, "b")]);
        assert!(duplicated.is_err());
    }

    #[rstest]
    fn test_from_sorted_entries_accepts_sorted_input() {
        let map = SortedMap::from_sorted_entries(vec![(1, "a"), (2, "b"), (3, "c")])
            .expect("strictly ascending input");
        let keys: Vec<&i32> = map.keys().collect();
        assert_eq!(keys, vec![&1, &2, &3]);
    }

    #[rstest]
    fn test_from_signals_finish() {
        let map = SortedMap::from_signals(vec![
            BuildSignal::Append((2, "b")),
            BuildSignal::Append((1, "a")),
            BuildSignal::Finish,
        ])
        .expect("finished build");
        let keys: Vec<&i32> = map.keys().collect();
        assert_eq!(keys, vec![&1, &2]);
    }

    #[rstest]
    fn test_from_signals_abort_returns_none() {
        let aborted = SortedMap::<i32, &str>::from_signals(vec![
            BuildSignal::Append((1, "a")),
            BuildSignal::Abort,
        ]);
        assert!(aborted.is_none());
    }

    #[rstest]
    fn test_from_signals_implicit_finish() {
        let map = SortedMap::from_signals(vec![BuildSignal::Append((1, "a"))])
            .expect("exhausted stream finishes implicitly");
        assert_eq!(map.len(), 1);
    }

    #[rstest]
    fn test_build_onto_existing_map_appends_win() {
        let seed = SortedMap::new().insert(1, "old").insert(2, "kept");
        let built = seed
            .build(vec![BuildSignal::Append((1, "new")), BuildSignal::Finish])
            .expect("finished build");
        assert_eq!(built.get(&1), Some(&"new"));
        assert_eq!(built.get(&2), Some(&"kept"));
    }

    #[rstest]
    fn test_merge_right_biased() {
        let map1 = SortedMap::new()
            .insert(1, "one".to_string())
            .insert(2, "two".to_string());
        let map2 = SortedMap::new()
            .insert(2, "TWO".to_string())
            .insert(3, "three".to_string());
        let merged = map1.merge(&map2);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get(&2), Some(&"TWO".to_string()));
    }

    #[rstest]
    fn test_merge_preserves_order() {
        let map1 = SortedMap::singleton(2, "two".to_string());
        let map2 = SortedMap::new()
            .insert(1, "one".to_string())
            .insert(3, "three".to_string());
        let merged = map1.merge(&map2);
        let keys: Vec<&i32> = merged.keys().collect();
        assert_eq!(keys, vec![&1, &2, &3]);
    }

    #[rstest]
    fn test_merge_with_resolver() {
        let map1 = SortedMap::new().insert(1, 100).insert(2, 200);
        let map2 = SortedMap::new().insert(2, 50).insert(3, 300);
        let merged = map1.merge_with(&map2, |_, left, right| left + right);
        assert_eq!(merged.get(&1), Some(&100));
        assert_eq!(merged.get(&2), Some(&250));
        assert_eq!(merged.get(&3), Some(&300));
    }

    #[rstest]
    fn test_rebalance_preserves_content() {
        let mut map = SortedMap::new();
        for key in 0..100 {
            map = map.insert(key, key * 2);
        }
        let rebalanced = map.rebalance();
        assert_eq!(rebalanced, map);
        assert_eq!(rebalanced.to_vec(), map.to_vec());
    }

    #[rstest]
    fn test_eq_ignores_insertion_order() {
        let map1 = SortedMap::new()
            .insert(1, "one".to_string())
            .insert(2, "two".to_string());
        let map2 = SortedMap::new()
            .insert(2, "two".to_string())
            .insert(1, "one".to_string());

        assert_eq!(map1, map2);
    }

    #[rstest]
    fn test_reduce_halts() {
        let map = SortedMap::new().insert(1, 10).insert(2, 20).insert(3, 30);
        let outcome = map.reduce(0, |sum, _, value| {
            let sum = sum + value;
            if sum >= 30 {
                Step::Halt(sum)
            } else {
                Step::Continue(sum)
            }
        });
        assert!(matches!(outcome, Traversal::Halted(30)));
    }

    #[rstest]
    fn test_reduce_suspend_and_resume() {
        let map = SortedMap::new().insert(1, 10).insert(2, 20).insert(3, 30);
        let outcome = map.reduce(0, |sum, key, value| {
            if *key == 1 {
                Step::Suspend(sum + value)
            } else {
                Step::Continue(sum + value)
            }
        });
        let Traversal::Suspended(partial, continuation) = outcome else {
            panic!("traversal should have suspended");
        };
        assert_eq!(partial, 10);
        let resumed = continuation.reduce(partial, |sum, _, value| Step::Continue(sum + value));
        assert!(matches!(resumed, Traversal::Done(60)));
    }

    #[rstest]
    fn test_into_iterator_owned() {
        let map = SortedMap::new().insert(2, "b").insert(1, "a");
        let entries: Vec<(i32, &str)> = map.into_iter().collect();
        assert_eq!(entries, vec![(1, "a"), (2, "b")]);
    }

    #[rstest]
    fn test_display_sorted() {
        let map = SortedMap::new()
            .insert(3, "three".to_string())
            .insert(1, "one".to_string())
            .insert(2, "two".to_string());
        assert_eq!(format!("{map}"), "{1: one, 2: two, 3: three}");
    }

    #[rstest]
    fn test_display_empty() {
        let map: SortedMap<i32, String> = SortedMap::new();
        assert_eq!(format!("{map}"), "{}");
    }
}

// =============================================================================
// Send + Sync Tests (arc feature only)
// =============================================================================
