//! Persistent sorted set of unique elements.
//!
//! This module provides [`SortedSet`], an immutable ordered set backed by
//! the same weight-balanced search tree as [`SortedMap`](crate::SortedMap),
//! with set algebra implemented as linear merges of the ordered element
//! lists.
//!
//! # Examples
//!
//! ```rust
//! use persistree::SortedSet;
//!
//! let evens: SortedSet<i32> = (0..10).filter(|n| n % 2 == 0).collect();
//! let small: SortedSet<i32> = (0..5).collect();
//!
//! let both = evens.intersection(&small);
//! assert_eq!(both.to_vec(), vec![0, 2, 4]);
//! ```

use crate::algebra::{difference_entries, intersection_entries, union_entries};
use crate::error::Error;
use crate::iter::{BuildSignal, Elements, Step, Traversal};
use crate::tree::{collect_range, Tree};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;
use std::ops::RangeBounds;

/// A persistent (immutable) ordered set of unique elements.
///
/// Inserting an element already present is a content-preserving no-op, as
/// is removing an absent one. Every operation returns a new set sharing
/// structure with its input.
///
/// # Time Complexity
///
/// | Operation        | Complexity   |
/// |------------------|--------------|
/// | `contains`       | O(log N)     |
/// | `insert`/`remove`| O(log N)     |
/// | `min`/`max`      | O(log N)     |
/// | `range`          | O(log N + k) |
/// | `union`          | O(N + M)     |
/// | `intersection`   | O(N + M)     |
/// | `difference`     | O(N + M)     |
///
/// # Examples
///
/// ```rust
/// use persistree::SortedSet;
///
/// let set = SortedSet::new().insert(3).insert(1).insert(2).insert(1);
/// assert_eq!(set.len(), 3);
/// assert_eq!(set.to_vec(), vec![1, 2, 3]);
/// ```
#[derive(Clone)]
pub struct SortedSet<T> {
    tree: Tree<T, ()>,
}

impl<T> SortedSet<T> {
    /// Creates a new empty set.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { tree: Tree::new() }
    }

    /// Returns the number of elements in the set.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the set contains no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns a lazy iterator over elements in ascending order.
    #[must_use]
    pub fn iter(&self) -> Elements<'_, T> {
        Elements::new(&self.tree.root, self.len())
    }

    /// Drives an in-order traversal with the three-signal protocol.
    ///
    /// See [`SortedMap::reduce`](crate::SortedMap::reduce) for the
    /// signal semantics; the step function here receives elements rather
    /// than key-value pairs.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::{SortedSet, Step, Traversal};
    ///
    /// let set: SortedSet<i32> = (1..=100).collect();
    /// let outcome = set.reduce(0, |sum, element| {
    ///     if *element > 4 { Step::Halt(sum) } else { Step::Continue(sum + element) }
    /// });
    /// assert!(matches!(outcome, Traversal::Halted(10)));
    /// ```
    pub fn reduce<B, F>(&self, init: B, step: F) -> Traversal<Elements<'_, T>, B>
    where
        F: FnMut(B, &T) -> Step<B>,
    {
        self.iter().reduce(init, step)
    }

    /// Returns an iterator over the window of `length` elements starting
    /// at in-order position `start`, in O(log N + `length`).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedSet;
    ///
    /// let set: SortedSet<i32> = (0..100).collect();
    /// let window: Vec<&i32> = set.slice(10, 3).collect();
    /// assert_eq!(window, vec![&10, &11, &12]);
    /// ```
    pub fn slice(&self, start: usize, length: usize) -> impl Iterator<Item = &T> {
        Elements::seeded(&self.tree.root, start, self.len()).take(length)
    }
}

impl<T: Clone + Ord> SortedSet<T> {
    /// Creates a set containing a single element.
    #[inline]
    #[must_use]
    pub fn singleton(element: T) -> Self {
        Self::new().insert(element)
    }

    /// Returns `true` if the set contains the element.
    ///
    /// The element may be any borrowed form of the set's element type.
    ///
    /// # Complexity
    ///
    /// O(log N)
    #[must_use]
    pub fn contains<Q>(&self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(element).is_some()
    }

    /// Adds an element to the set.
    ///
    /// Inserting an element that is already present yields a set with the
    /// same content.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedSet;
    ///
    /// let set = SortedSet::new().insert(1).insert(1);
    /// assert_eq!(set.len(), 1);
    /// ```
    #[must_use]
    pub fn insert(&self, element: T) -> Self {
        Self {
            tree: self.tree.insert(element, ()),
        }
    }

    /// Removes an element from the set.
    ///
    /// Removing an absent element is a content-preserving no-op, not an
    /// error.
    ///
    /// # Complexity
    ///
    /// O(log N)
    #[must_use]
    pub fn remove<Q>(&self, element: &Q) -> Self
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Self {
            tree: self.tree.remove(element),
        }
    }

    /// Returns the minimum element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyCollection`] when the set has no elements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::{Error, SortedSet};
    ///
    /// let set = SortedSet::new().insert(3).insert(1);
    /// assert_eq!(set.min(), Ok(&1));
    ///
    /// let empty: SortedSet<i32> = SortedSet::new();
    /// assert_eq!(empty.min(), Err(Error::EmptyCollection { operation: "min" }));
    /// ```
    pub fn min(&self) -> Result<&T, Error> {
        self.tree
            .min()
            .map(|(element, _)| element)
            .ok_or(Error::EmptyCollection { operation: "min" })
    }

    /// Returns the maximum element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyCollection`] when the set has no elements.
    pub fn max(&self) -> Result<&T, Error> {
        self.tree
            .max()
            .map(|(element, _)| element)
            .ok_or(Error::EmptyCollection { operation: "max" })
    }

    /// Returns an iterator over elements within the specified range.
    ///
    /// # Complexity
    ///
    /// O(log N + k) where k is the number of elements in the range
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedSet;
    ///
    /// let set: SortedSet<i32> = (0..10).collect();
    /// let mid: Vec<&i32> = set.range(3..=5).collect();
    /// assert_eq!(mid, vec![&3, &4, &5]);
    /// ```
    pub fn range<R, Q>(&self, range: R) -> SortedSetRangeIterator<'_, T>
    where
        R: RangeBounds<Q>,
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut entries = Vec::new();
        collect_range(
            &self.tree.root,
            range.start_bound(),
            range.end_bound(),
            &mut entries,
        );
        SortedSetRangeIterator {
            elements: entries.into_iter().map(|(element, _)| element).collect(),
            current_index: 0,
        }
    }

    /// Returns the union of two sets.
    ///
    /// Implemented as a linear merge of both sets' ordered element lists
    /// followed by a balanced rebuild.
    ///
    /// # Complexity
    ///
    /// O(N + M)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedSet;
    ///
    /// let left: SortedSet<i32> = vec![1, 2, 3].into_iter().collect();
    /// let right: SortedSet<i32> = vec![3, 4].into_iter().collect();
    /// assert_eq!(left.union(&right).to_vec(), vec![1, 2, 3, 4]);
    /// ```
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let merged = union_entries(&self.tree.to_vec(), &other.tree.to_vec());
        Self {
            tree: Tree::from_sorted_unchecked(&merged),
        }
    }

    /// Returns the intersection of two sets.
    ///
    /// # Complexity
    ///
    /// O(N + M)
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let shared = intersection_entries(&self.tree.to_vec(), &other.tree.to_vec());
        Self {
            tree: Tree::from_sorted_unchecked(&shared),
        }
    }

    /// Returns the elements of `self` that are not in `other`.
    ///
    /// # Complexity
    ///
    /// O(N + M)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::SortedSet;
    ///
    /// let left: SortedSet<i32> = vec![1, 2, 3].into_iter().collect();
    /// let right: SortedSet<i32> = vec![2].into_iter().collect();
    /// assert_eq!(left.difference(&right).to_vec(), vec![1, 3]);
    /// ```
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let remaining = difference_entries(&self.tree.to_vec(), &other.tree.to_vec());
        Self {
            tree: Tree::from_sorted_unchecked(&remaining),
        }
    }

    /// Returns `true` if every element of `self` is in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.difference(other).is_empty()
    }

    /// Returns `true` if the sets share no elements.
    #[must_use]
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.intersection(other).is_empty()
    }

    /// Converts the set to an owned, strictly ascending element list.
    ///
    /// # Complexity
    ///
    /// O(N)
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.tree
            .to_vec()
            .into_iter()
            .map(|(element, ())| element)
            .collect()
    }

    /// Rebuilds the set into its most compact, shallow shape without
    /// changing its content.
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

    /// Builds a set from elements that are already strictly ascending, in
    /// O(N).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the elements are not
    /// strictly ascending (duplicates or descending neighbours).
    pub fn from_sorted_elements(elements: Vec<T>) -> Result<Self, Error> {
        if elements.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(Error::InvalidArgument {
                operation: "from_sorted_elements",
                reason: "elements must be strictly ascending",
            });
        }
        let entries: Vec<(T, ())> = elements.into_iter().map(|element| (element, ())).collect();
        Ok(Self {
            tree: Tree::from_sorted_unchecked(&entries),
        })
    }

    /// Builds a set incrementally from a sequence of build signals.
    ///
    /// `Append` accumulates an element, `Finish` completes the build, and
    /// `Abort` discards everything and yields `None`. A source that ends
    /// without an explicit `Finish` finishes implicitly.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistree::{BuildSignal, SortedSet};
    ///
    /// let set = SortedSet::from_signals(vec![
    ///     BuildSignal::Append(2),
    ///     BuildSignal::Append(1),
    ///     BuildSignal::Append(2),
    ///     BuildSignal::Finish,
    /// ]);
    /// assert_eq!(set.map(|set| set.to_vec()), Some(vec![1, 2]));
    /// ```
    #[must_use]
    pub fn from_signals<I>(signals: I) -> Option<Self>
    where
        I: IntoIterator<Item = BuildSignal<T>>,
    {
        Self::new().build(signals)
    }

    /// Extends this set from a sequence of build signals, starting from
    /// the current content.
    #[must_use]
    pub fn build<I>(&self, signals: I) -> Option<Self>
    where
        I: IntoIterator<Item = BuildSignal<T>>,
    {
        let mut appended = Vec::new();
        for signal in signals {
            match signal {
                BuildSignal::Append(element) => appended.push(element),
                BuildSignal::Finish => break,
                BuildSignal::Abort => return None,
            }
        }
        let additions: Self = appended.into_iter().collect();
        Some(self.union(&additions))
    }

    /// Bulk-builds a set from unordered elements: sort, dedup, balanced
    /// build. O(N log N).
    fn bulk_build(mut elements: Vec<T>) -> Self {
        elements.sort_unstable();
        elements.dedup();
        let entries: Vec<(T, ())> = elements.into_iter().map(|element| (element, ())).collect();
        Self {
            tree: Tree::from_sorted_unchecked(&entries),
        }
    }
}

// =============================================================================
// Range Iterator
// =============================================================================

/// A range iterator over elements of a [`SortedSet`].
pub struct SortedSetRangeIterator<'a, T> {
    elements: Vec<&'a T>,
    current_index: usize,
}

impl<'a, T> Iterator for SortedSetRangeIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_index >= self.elements.len() {
            None
        } else {
            let element = self.elements[self.current_index];
            self.current_index += 1;
            Some(element)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.elements.len().saturating_sub(self.current_index);
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for SortedSetRangeIterator<'_, T> {
    fn len(&self) -> usize {
        self.elements.len().saturating_sub(self.current_index)
    }
}

/// An owning iterator over elements of a [`SortedSet`].
pub struct SortedSetIntoIterator<T> {
    elements: std::vec::IntoIter<T>,
}

impl<T> Iterator for SortedSetIntoIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.elements.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.elements.size_hint()
    }
}

impl<T> ExactSizeIterator for SortedSetIntoIterator<T> {
    fn len(&self) -> usize {
        self.elements.len()
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Default for SortedSet<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Ord> FromIterator<T> for SortedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::bulk_build(iter.into_iter().collect())
    }
}

impl<T: Clone + Ord> IntoIterator for SortedSet<T> {
    type Item = T;
    type IntoIter = SortedSetIntoIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        SortedSetIntoIterator {
            elements: self.to_vec().into_iter(),
        }
    }
}

impl<'a, T> IntoIterator for &'a SortedSet<T> {
    type Item = &'a T;
    type IntoIter = Elements<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: PartialEq> PartialEq for SortedSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(left, right)| left == right)
    }
}

impl<T: Eq> Eq for SortedSet<T> {}

impl<T: Hash> Hash for SortedSet<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for element in self.iter() {
            element.hash(state);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SortedSet<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display> fmt::Display for SortedSet<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        let mut first = true;
        for element in self.iter() {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{element}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for SortedSet<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut sequence = serializer.serialize_seq(Some(self.len()))?;
        for element in self.iter() {
            sequence.serialize_element(element)?;
        }
        sequence.end()
    }
}

#[cfg(feature = "serde")]
struct SortedSetVisitor<T> {
    marker: std::marker::PhantomData<T>,
}

#[cfg(feature = "serde")]
impl<'de, T> serde::de::Visitor<'de> for SortedSetVisitor<T>
where
    T: serde::Deserialize<'de> + Clone + Ord,
{
    type Value = SortedSet<T>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut set = SortedSet::new();
        while let Some(element) = access.next_element()? {
            set = set.insert(element);
        }
        Ok(set)
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for SortedSet<T>
where
    T: serde::Deserialize<'de> + Clone + Ord,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(SortedSetVisitor {
            marker: std::marker::PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
