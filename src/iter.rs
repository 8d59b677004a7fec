//! Lazy in-order traversal and the signal-driven iteration protocol.
//!
//! # Overview
//!
//! [`Entries`] walks a tree in ascending key order one element at a time,
//! keeping only a stack of the pending right-subtree work (O(log N)
//! state). Because the walk is lazy, three control behaviours fall out
//! naturally:
//!
//! - **continue**: call [`Iterator::next`] again.
//! - **halt**: drop the iterator; no further nodes are visited.
//! - **suspend**: keep the iterator value around; it is a continuation
//!   that resumes exactly where it stopped.
//!
//! [`Entries::reduce`] packages the same three behaviours as an explicit
//! protocol: the consumer returns a [`Step`] for each entry, and a
//! suspension hands the iterator back inside [`Traversal::Suspended`].
//!
//! A traversal is finite and not restartable in place; construct a fresh
//! one from the container to start over.
//!
//! # Examples
//!
//! ```rust
//! use persistree::{SortedMap, Step, Traversal};
//!
//! let map = SortedMap::new().insert(1, "a").insert(2, "b").insert(3, "c");
//!
//! // Suspend after the first entry, then resume from the continuation.
//! let paused = map.reduce(Vec::new(), |mut seen, key, _| {
//!     seen.push(*key);
//!     Step::Suspend(seen)
//! });
//! if let Traversal::Suspended(seen, continuation) = paused {
//!     assert_eq!(seen, vec![1]);
//!     let rest = continuation.reduce(seen, |mut seen, key, _| {
//!         seen.push(*key);
//!         Step::Continue(seen)
//!     });
//!     assert!(matches!(rest, Traversal::Done(ref all) if *all == vec![1, 2, 3]));
//! } else {
//!     panic!("traversal should have suspended");
//! }
//! ```

use crate::tree::{link_size, Link, Node};
use smallvec::SmallVec;

/// Inline capacity of the traversal stack. A weight-balanced tree of a
/// few hundred elements fits without spilling to the heap.
const INLINE_STACK_DEPTH: usize = 16;

// =============================================================================
// Signal Protocol
// =============================================================================

/// A control signal returned by the consumer of a signal-driven traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<B> {
    /// Advance to the next entry with the updated accumulator.
    Continue(B),
    /// Stop immediately; remaining nodes are never visited.
    Halt(B),
    /// Pause; the traversal hands back a resumable continuation.
    Suspend(B),
}

/// The outcome of a signal-driven traversal.
#[derive(Debug)]
pub enum Traversal<I, B> {
    /// Every entry was visited.
    Done(B),
    /// The consumer halted early.
    Halted(B),
    /// The consumer suspended; the iterator resumes where it stopped.
    Suspended(B, I),
}

/// A build signal for constructing a container from an arbitrary source
/// sequence.
///
/// Consumed by `SortedMap::from_signals` and `SortedSet::from_signals`:
/// `Append` accumulates an element, `Finish` produces the container, and
/// `Abort` discards everything and yields `None`. A source that ends
/// without an explicit `Finish` finishes implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildSignal<T> {
    /// Add one element to the container under construction.
    Append(T),
    /// Complete the build and produce the container.
    Finish,
    /// Discard the build and produce the `None` sentinel.
    Abort,
}

// =============================================================================
// Entry Iterator
// =============================================================================

/// A lazy in-order iterator over the entries of a sorted container.
///
/// The stack holds every node whose own entry and right subtree are still
/// pending; the top of the stack is always the next entry to yield.
pub struct Entries<'a, K, V> {
    stack: SmallVec<[&'a Node<K, V>; INLINE_STACK_DEPTH]>,
    remaining: usize,
}

impl<'a, K, V> Entries<'a, K, V> {
    /// Starts a traversal at the leftmost entry.
    pub(crate) fn new(root: &'a Link<K, V>, length: usize) -> Self {
        let mut entries = Self {
            stack: SmallVec::new(),
            remaining: length,
        };
        entries.descend_left(root);
        entries
    }

    /// Starts a traversal at the entry with in-order index `start`,
    /// skipping the first `start` entries by size-guided descent in
    /// O(log N) instead of walking past them.
    pub(crate) fn seeded(root: &'a Link<K, V>, start: usize, length: usize) -> Self {
        let mut entries = Self {
            stack: SmallVec::new(),
            remaining: length.saturating_sub(start),
        };
        let mut cursor = root;
        let mut to_skip = start;
        while let Some(node) = cursor.as_deref() {
            let left_size = link_size(&node.left);
            if to_skip < left_size {
                entries.stack.push(node);
                cursor = &node.left;
            } else if to_skip == left_size {
                entries.stack.push(node);
                break;
            } else {
                to_skip -= left_size + 1;
                cursor = &node.right;
            }
        }
        entries
    }

    fn descend_left(&mut self, mut cursor: &'a Link<K, V>) {
        while let Some(node) = cursor.as_deref() {
            self.stack.push(node);
            cursor = &node.left;
        }
    }

    /// Drives the traversal with the three-signal protocol.
    ///
    /// The `step` function receives the accumulator and the current entry
    /// and decides how to proceed. A [`Step::Suspend`] hands this iterator
    /// back as the continuation; calling `reduce` (or `next`) on it
    /// resumes exactly where it stopped.
    pub fn reduce<B, F>(mut self, init: B, mut step: F) -> Traversal<Self, B>
    where
        F: FnMut(B, &'a K, &'a V) -> Step<B>,
    {
        let mut accumulator = init;
        while let Some((key, value)) = self.next() {
            match step(accumulator, key, value) {
                Step::Continue(next) => accumulator = next,
                Step::Halt(finished) => return Traversal::Halted(finished),
                Step::Suspend(paused) => return Traversal::Suspended(paused, self),
            }
        }
        Traversal::Done(accumulator)
    }
}

impl<'a, K, V> Iterator for Entries<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.descend_left(&node.right);
        self.remaining = self.remaining.saturating_sub(1);
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Entries<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

// =============================================================================
// Element Iterator
// =============================================================================

/// A lazy in-order iterator over the elements of a [`SortedSet`].
///
/// [`SortedSet`]: crate::SortedSet
pub struct Elements<'a, T> {
    inner: Entries<'a, T, ()>,
}

impl<'a, T> Elements<'a, T> {
    pub(crate) fn new(root: &'a Link<T, ()>, length: usize) -> Self {
        Self {
            inner: Entries::new(root, length),
        }
    }

    pub(crate) fn seeded(root: &'a Link<T, ()>, start: usize, length: usize) -> Self {
        Self {
            inner: Entries::seeded(root, start, length),
        }
    }

    /// Drives the traversal with the three-signal protocol.
    ///
    /// Identical to [`Entries::reduce`], projected onto set elements.
    pub fn reduce<B, F>(mut self, init: B, mut step: F) -> Traversal<Self, B>
    where
        F: FnMut(B, &'a T) -> Step<B>,
    {
        let mut accumulator = init;
        while let Some(element) = self.next() {
            match step(accumulator, element) {
                Step::Continue(next) => accumulator = next,
                Step::Halt(finished) => return Traversal::Halted(finished),
                Step::Suspend(paused) => return Traversal::Suspended(paused, self),
            }
        }
        Traversal::Done(accumulator)
    }
}

impl<'a, T> Iterator for Elements<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(element, _)| element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for Elements<'_, T> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
