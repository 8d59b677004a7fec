//! # persistree
//!
//! Persistent (immutable) sorted containers backed by a weight-balanced
//! binary search tree with structural sharing.
//!
//! ## Overview
//!
//! This library provides two ordered container types:
//!
//! - [`SortedMap`]: a persistent associative container (key → value)
//! - [`SortedSet`]: a persistent unique-element container
//!
//! Both maintain their contents in ascending key order at all times and
//! guarantee O(log N) insertion, lookup, and removal. All operations
//! return new container values without modifying the original; unmodified
//! subtrees are shared between versions through reference counting.
//!
//! ```rust
//! use persistree::SortedMap;
//!
//! let map = SortedMap::new()
//!     .insert("b", 2)
//!     .insert("a", 1)
//!     .insert("c", 3);
//!
//! // Entries are always in sorted key order
//! let keys: Vec<&&str> = map.keys().collect();
//! assert_eq!(keys, vec![&"a", &"b", &"c"]);
//!
//! // The original is never modified
//! let updated = map.insert("a", 100);
//! assert_eq!(map.get(&"a"), Some(&1));
//! assert_eq!(updated.get(&"a"), Some(&100));
//! ```
//!
//! ## Traversal protocol
//!
//! Iteration is lazy: [`SortedMap::iter`] and [`SortedSet::iter`] walk
//! the tree in-order one element at a time, so early termination visits
//! no further nodes. On top of that, `reduce` exposes a three-signal
//! protocol ([`Step::Continue`], [`Step::Halt`], [`Step::Suspend`]) where
//! a suspended traversal hands back a continuation that resumes exactly
//! where it stopped. See the [`iter`] module.
//!
//! ## Feature Flags
//!
//! - `arc`: use `std::sync::Arc` for node sharing instead of
//!   `std::rc::Rc`, making containers `Send + Sync`
//! - `serde`: `Serialize`/`Deserialize` support for both containers

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types.
///
/// # Usage
///
/// ```rust
/// use persistree::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::Error;
    pub use crate::iter::{BuildSignal, Step, Traversal};
    pub use crate::map::SortedMap;
    pub use crate::set::SortedSet;
}

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod algebra;
mod tree;

pub mod error;
pub mod iter;
pub mod map;
pub mod set;

pub use error::Error;
pub use iter::{BuildSignal, Elements, Entries, Step, Traversal};
pub use map::{SortedMap, SortedMapIntoIterator, SortedMapRangeIterator};
pub use set::{SortedSet, SortedSetIntoIterator, SortedSetRangeIterator};

// =============================================================================
// Tests
// =============================================================================
