//! Linear merge kernels for multi-tree set algebra.
//!
//! Union, intersection, and difference are computed as a single
//! two-pointer merge over the two trees' strictly ascending entry lists,
//! O(n + m), rather than by repeated insertion into the larger tree. Each
//! kernel carries a disjoint fast path: when the key ranges do not
//! overlap, the comparison loop is skipped entirely. The merged output is
//! itself strictly ascending, so the caller can rebuild a perfectly
//! balanced tree from it in O(n).
//!
//! On equal keys `union_entries` keeps the *right* entry, which gives
//! `SortedMap::merge` its right-biased collision semantics; for sets the
//! two entries are equal elements, so the bias is unobservable.

use std::cmp::Ordering;

/// Merges two strictly ascending entry slices, keeping the right entry on
/// key collision.
///
/// # Preconditions
///
/// Both inputs must be strictly ascending by key.
///
/// # Complexity
///
/// O(n + m); disjoint case: two bulk copies with no per-entry comparison.
pub(crate) fn union_entries<K: Clone + Ord, V: Clone>(
    left: &[(K, V)],
    right: &[(K, V)],
) -> Vec<(K, V)> {
    if left.is_empty() {
        return right.to_vec();
    }
    if right.is_empty() {
        return left.to_vec();
    }

    // Disjoint fast path: no overlap between key ranges.
    if let (Some(left_last), Some(right_first)) = (left.last(), right.first())
        && left_last.0 < right_first.0
    {
        let mut output = Vec::with_capacity(left.len() + right.len());
        output.extend_from_slice(left);
        output.extend_from_slice(right);
        return output;
    }
    if let (Some(right_last), Some(left_first)) = (right.last(), left.first())
        && right_last.0 < left_first.0
    {
        let mut output = Vec::with_capacity(left.len() + right.len());
        output.extend_from_slice(right);
        output.extend_from_slice(left);
        return output;
    }

    let mut output = Vec::with_capacity(left.len() + right.len());
    let mut left_index = 0;
    let mut right_index = 0;

    while left_index < left.len() && right_index < right.len() {
        match left[left_index].0.cmp(&right[right_index].0) {
            Ordering::Less => {
                output.push(left[left_index].clone());
                left_index += 1;
            }
            Ordering::Greater => {
                output.push(right[right_index].clone());
                right_index += 1;
            }
            Ordering::Equal => {
                // Right-biased: the second operand wins on collision.
                output.push(right[right_index].clone());
                left_index += 1;
                right_index += 1;
            }
        }
    }

    if left_index < left.len() {
        output.extend_from_slice(&left[left_index..]);
    }
    if right_index < right.len() {
        output.extend_from_slice(&right[right_index..]);
    }

    output
}

/// Entries of `left` whose key is absent from `right`.
///
/// # Preconditions
///
/// Both inputs must be strictly ascending by key.
///
/// # Complexity
///
/// O(n + m).
pub(crate) fn difference_entries<K: Clone + Ord, V: Clone>(
    left: &[(K, V)],
    right: &[(K, V)],
) -> Vec<(K, V)> {
    if left.is_empty() || right.is_empty() {
        return left.to_vec();
    }

    // Disjoint fast path: nothing can be removed from left.
    if let (Some(left_first), Some(left_last), Some(right_first), Some(right_last)) =
        (left.first(), left.last(), right.first(), right.last())
        && (left_last.0 < right_first.0 || right_last.0 < left_first.0)
    {
        return left.to_vec();
    }

    let mut output = Vec::with_capacity(left.len());
    let mut left_index = 0;
    let mut right_index = 0;

    while left_index < left.len() && right_index < right.len() {
        match left[left_index].0.cmp(&right[right_index].0) {
            Ordering::Less => {
                output.push(left[left_index].clone());
                left_index += 1;
            }
            Ordering::Greater => {
                right_index += 1;
            }
            Ordering::Equal => {
                left_index += 1;
                right_index += 1;
            }
        }
    }

    if left_index < left.len() {
        output.extend_from_slice(&left[left_index..]);
    }

    output
}

/// Entries of `left` whose key is also present in `right`.
///
/// # Preconditions
///
/// Both inputs must be strictly ascending by key.
///
/// # Complexity
///
/// O(n + m).
pub(crate) fn intersection_entries<K: Clone + Ord, V: Clone>(
    left: &[(K, V)],
    right: &[(K, V)],
) -> Vec<(K, V)> {
    if left.is_empty() || right.is_empty() {
        return Vec::new();
    }

    // Disjoint fast path: no key can occur on both sides.
    if let (Some(left_first), Some(left_last), Some(right_first), Some(right_last)) =
        (left.first(), left.last(), right.first(), right.last())
        && (left_last.0 < right_first.0 || right_last.0 < left_first.0)
    {
        return Vec::new();
    }

    let mut output = Vec::with_capacity(left.len().min(right.len()));
    let mut left_index = 0;
    let mut right_index = 0;

    while left_index < left.len() && right_index < right.len() {
        match left[left_index].0.cmp(&right[right_index].0) {
            Ordering::Less => {
                left_index += 1;
            }
            Ordering::Greater => {
                right_index += 1;
            }
            Ordering::Equal => {
                output.push(left[left_index].clone());
                left_index += 1;
                right_index += 1;
            }
        }
    }

    output
}

// =============================================================================
// Tests
// =============================================================================
