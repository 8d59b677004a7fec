//! Weight-balanced binary search tree engine.
//!
//! This module implements the persistent tree that backs both
//! [`SortedMap`](crate::SortedMap) and [`SortedSet`](crate::SortedSet).
//! Nodes are immutable once constructed: every mutating operation
//! path-copies from the touched position back to the root and shares all
//! unmodified subtrees with the previous version.
//!
//! # Balance discipline
//!
//! Each node carries its subtree size, and the tree maintains the weight
//! balance invariant: for every node with more than one descendant,
//! neither subtree is more than [`DELTA`] times larger than the other.
//! Insertion and removal restore the invariant along the copied path with
//! single or double rotations, choosing between them with [`RATIO`]. The
//! `(DELTA, RATIO) = (3, 2)` pair bounds the height to O(log N) and is
//! proven sound for single-step rebalancing after both insertion and
//! deletion.

use crate::ReferenceCounter;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::ops::Bound;

/// A subtree reference: `None` is the empty subtree (there is no sentinel
/// node).
pub(crate) type Link<K, V> = Option<ReferenceCounter<Node<K, V>>>;

/// Rebalance when one subtree grows beyond `DELTA` times the other.
const DELTA: usize = 3;

/// Choose a single rotation while the inner grandchild stays below
/// `RATIO` times the outer one, a double rotation otherwise.
const RATIO: usize = 2;

// =============================================================================
// Node Definition
// =============================================================================

/// Internal node structure. Immutable after construction.
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) size: usize,
    pub(crate) left: Link<K, V>,
    pub(crate) right: Link<K, V>,
}

/// Returns the node count of a subtree, 0 for the empty subtree.
#[inline]
pub(crate) fn link_size<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |node| node.size)
}

/// Builds a node from its parts, computing the cached subtree size.
fn make_link<K, V>(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Link<K, V> {
    let size = 1 + link_size(&left) + link_size(&right);
    Some(ReferenceCounter::new(Node {
        key,
        value,
        size,
        left,
        right,
    }))
}

// =============================================================================
// Rebalancing
// =============================================================================

/// Rebuilds a node whose children may differ by at most one insertion or
/// removal from a balanced state, restoring the weight balance invariant.
fn balance<K: Clone, V: Clone>(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Link<K, V> {
    let left_size = link_size(&left);
    let right_size = link_size(&right);

    if left_size + right_size <= 1 {
        return make_link(key, value, left, right);
    }
    if right_size > DELTA * left_size {
        return rotate_left(key, value, left, right);
    }
    if left_size > DELTA * right_size {
        return rotate_right(key, value, left, right);
    }
    make_link(key, value, left, right)
}

/// Restores balance when the right subtree is too heavy.
fn rotate_left<K: Clone, V: Clone>(
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
) -> Link<K, V> {
    match right {
        Some(right_node) => {
            if link_size(&right_node.left) < RATIO * link_size(&right_node.right) {
                single_left(key, value, left, &right_node)
            } else {
                double_left(key, value, left, &right_node)
            }
        }
        None => make_link(key, value, left, None),
    }
}

/// Restores balance when the left subtree is too heavy.
fn rotate_right<K: Clone, V: Clone>(
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
) -> Link<K, V> {
    match left {
        Some(left_node) => {
            if link_size(&left_node.right) < RATIO * link_size(&left_node.left) {
                single_right(key, value, &left_node, right)
            } else {
                double_right(key, value, &left_node, right)
            }
        }
        None => make_link(key, value, None, right),
    }
}

/// Single left rotation: the right child becomes the new subtree root.
fn single_left<K: Clone, V: Clone>(
    key: K,
    value: V,
    left: Link<K, V>,
    right_node: &ReferenceCounter<Node<K, V>>,
) -> Link<K, V> {
    make_link(
        right_node.key.clone(),
        right_node.value.clone(),
        make_link(key, value, left, right_node.left.clone()),
        right_node.right.clone(),
    )
}

/// Single right rotation: the left child becomes the new subtree root.
fn single_right<K: Clone, V: Clone>(
    key: K,
    value: V,
    left_node: &ReferenceCounter<Node<K, V>>,
    right: Link<K, V>,
) -> Link<K, V> {
    make_link(
        left_node.key.clone(),
        left_node.value.clone(),
        left_node.left.clone(),
        make_link(key, value, left_node.right.clone(), right),
    )
}

/// Double left rotation: the right child's left grandchild becomes the
/// new subtree root.
fn double_left<K: Clone, V: Clone>(
    key: K,
    value: V,
    left: Link<K, V>,
    right_node: &ReferenceCounter<Node<K, V>>,
) -> Link<K, V> {
    match &right_node.left {
        Some(pivot) => make_link(
            pivot.key.clone(),
            pivot.value.clone(),
            make_link(key, value, left, pivot.left.clone()),
            make_link(
                right_node.key.clone(),
                right_node.value.clone(),
                pivot.right.clone(),
                right_node.right.clone(),
            ),
        ),
        None => single_left(key, value, left, right_node),
    }
}

/// Double right rotation: the left child's right grandchild becomes the
/// new subtree root.
fn double_right<K: Clone, V: Clone>(
    key: K,
    value: V,
    left_node: &ReferenceCounter<Node<K, V>>,
    right: Link<K, V>,
) -> Link<K, V> {
    match &left_node.right {
        Some(pivot) => make_link(
            pivot.key.clone(),
            pivot.value.clone(),
            make_link(
                left_node.key.clone(),
                left_node.value.clone(),
                left_node.left.clone(),
                pivot.left.clone(),
            ),
            make_link(key, value, pivot.right.clone(), right),
        ),
        None => single_right(key, value, left_node, right),
    }
}

// =============================================================================
// Structural Operations
// =============================================================================

/// Recursive helper for insert.
/// Returns (`new_link`, `was_added`) where `was_added` is true if a new
/// entry was added rather than an existing one overwritten.
fn insert_link<K: Clone + Ord, V: Clone>(link: &Link<K, V>, key: K, value: V) -> (Link<K, V>, bool) {
    match link {
        None => (make_link(key, value, None, None), true),
        Some(node) => match key.cmp(&node.key) {
            Ordering::Less => {
                let (new_left, added) = insert_link(&node.left, key, value);
                (
                    balance(node.key.clone(), node.value.clone(), new_left, node.right.clone()),
                    added,
                )
            }
            Ordering::Greater => {
                let (new_right, added) = insert_link(&node.right, key, value);
                (
                    balance(node.key.clone(), node.value.clone(), node.left.clone(), new_right),
                    added,
                )
            }
            // Overwrite in place; the shape and size are unchanged.
            Ordering::Equal => (
                make_link(key, value, node.left.clone(), node.right.clone()),
                false,
            ),
        },
    }
}

/// Recursive helper for remove.
/// Returns (`new_link`, `was_removed`). When the key is absent the
/// original subtree is returned untouched.
fn remove_link<K, V, Q>(link: &Link<K, V>, key: &Q) -> (Link<K, V>, bool)
where
    K: Clone + Ord + Borrow<Q>,
    V: Clone,
    Q: Ord + ?Sized,
{
    match link {
        None => (None, false),
        Some(node) => match key.cmp(node.key.borrow()) {
            Ordering::Less => {
                let (new_left, removed) = remove_link(&node.left, key);
                if removed {
                    (
                        balance(node.key.clone(), node.value.clone(), new_left, node.right.clone()),
                        true,
                    )
                } else {
                    (Some(node.clone()), false)
                }
            }
            Ordering::Greater => {
                let (new_right, removed) = remove_link(&node.right, key);
                if removed {
                    (
                        balance(node.key.clone(), node.value.clone(), node.left.clone(), new_right),
                        true,
                    )
                } else {
                    (Some(node.clone()), false)
                }
            }
            Ordering::Equal => (remove_root(node), true),
        },
    }
}

/// Removes the root of a subtree. A node with two children is replaced by
/// its in-order successor, spliced out of the right subtree.
fn remove_root<K: Clone + Ord, V: Clone>(node: &ReferenceCounter<Node<K, V>>) -> Link<K, V> {
    match (&node.left, &node.right) {
        (None, None) => None,
        (Some(left), None) => Some(left.clone()),
        (None, Some(right)) => Some(right.clone()),
        (Some(_), Some(right)) => {
            let (new_right, successor_key, successor_value) = detach_min(right);
            balance(successor_key, successor_value, node.left.clone(), new_right)
        }
    }
}

/// Splices the minimum entry out of a subtree, rebalancing the path, and
/// returns the remainder together with the detached key and value.
fn detach_min<K: Clone, V: Clone>(node: &ReferenceCounter<Node<K, V>>) -> (Link<K, V>, K, V) {
    match &node.left {
        None => (node.right.clone(), node.key.clone(), node.value.clone()),
        Some(left) => {
            let (new_left, minimum_key, minimum_value) = detach_min(left);
            (
                balance(node.key.clone(), node.value.clone(), new_left, node.right.clone()),
                minimum_key,
                minimum_value,
            )
        }
    }
}

/// Recursive helper for get.
fn get_link<'a, K, V, Q>(link: &'a Link<K, V>, key: &Q) -> Option<&'a V>
where
    K: Borrow<Q>,
    Q: Ord + ?Sized,
{
    link.as_ref().and_then(|node| match key.cmp(node.key.borrow()) {
        Ordering::Less => get_link(&node.left, key),
        Ordering::Greater => get_link(&node.right, key),
        Ordering::Equal => Some(&node.value),
    })
}

/// Builds a perfectly balanced subtree from a strictly ascending slice in
/// O(n) by midpoint recursion.
fn build_from_sorted<K: Clone, V: Clone>(entries: &[(K, V)]) -> Link<K, V> {
    if entries.is_empty() {
        return None;
    }
    let midpoint = entries.len() / 2;
    let (key, value) = entries[midpoint].clone();
    make_link(
        key,
        value,
        build_from_sorted(&entries[..midpoint]),
        build_from_sorted(&entries[midpoint + 1..]),
    )
}

/// In-order traversal cloning every entry into `output`.
fn collect_into<K: Clone, V: Clone>(link: &Link<K, V>, output: &mut Vec<(K, V)>) {
    if let Some(node) = link {
        collect_into(&node.left, output);
        output.push((node.key.clone(), node.value.clone()));
        collect_into(&node.right, output);
    }
}

/// Bounded in-order scan. Descends only into subtrees whose key interval
/// can overlap the requested bounds, so the cost is O(log n + k) for k
/// collected entries. Inverted bounds simply collect nothing.
pub(crate) fn collect_range<'a, K, V, Q>(
    link: &'a Link<K, V>,
    start: Bound<&Q>,
    end: Bound<&Q>,
    output: &mut Vec<(&'a K, &'a V)>,
) where
    K: Borrow<Q>,
    Q: Ord + ?Sized,
{
    let Some(node) = link else {
        return;
    };
    let key = node.key.borrow();
    let above_start = match start {
        Bound::Included(bound) => key >= bound,
        Bound::Excluded(bound) => key > bound,
        Bound::Unbounded => true,
    };
    let below_end = match end {
        Bound::Included(bound) => key <= bound,
        Bound::Excluded(bound) => key < bound,
        Bound::Unbounded => true,
    };
    if above_start {
        collect_range(&node.left, start, end, output);
    }
    if above_start && below_end {
        output.push((&node.key, &node.value));
    }
    if below_end {
        collect_range(&node.right, start, end, output);
    }
}

// =============================================================================
// Tree Handle
// =============================================================================

/// A handle to a node graph plus a cached total count.
#[derive(Clone)]
pub(crate) struct Tree<K, V> {
    pub(crate) root: Link<K, V>,
    length: usize,
}

impl<K, V> Tree<K, V> {
    pub(crate) const fn new() -> Self {
        Self {
            root: None,
            length: 0,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.length
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl<K: Clone + Ord, V: Clone> Tree<K, V> {
    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        get_link(&self.root, key)
    }

    pub(crate) fn insert(&self, key: K, value: V) -> Self {
        let (new_root, added) = insert_link(&self.root, key, value);
        Self {
            root: new_root,
            length: if added { self.length + 1 } else { self.length },
        }
    }

    pub(crate) fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (new_root, removed) = remove_link(&self.root, key);
        if removed {
            Self {
                root: new_root,
                length: self.length - 1,
            }
        } else {
            self.clone()
        }
    }

    /// Leftmost entry, `None` when the tree has no nodes.
    pub(crate) fn min(&self) -> Option<(&K, &V)> {
        let mut cursor = self.root.as_deref()?;
        while let Some(left) = cursor.left.as_deref() {
            cursor = left;
        }
        Some((&cursor.key, &cursor.value))
    }

    /// Rightmost entry, `None` when the tree has no nodes.
    pub(crate) fn max(&self) -> Option<(&K, &V)> {
        let mut cursor = self.root.as_deref()?;
        while let Some(right) = cursor.right.as_deref() {
            cursor = right;
        }
        Some((&cursor.key, &cursor.value))
    }

    /// Full in-order conversion to an owned, strictly ascending entry list.
    pub(crate) fn to_vec(&self) -> Vec<(K, V)> {
        let mut output = Vec::with_capacity(self.length);
        collect_into(&self.root, &mut output);
        output
    }

    /// Builds a perfectly balanced tree from entries that the caller
    /// guarantees are strictly ascending by key.
    pub(crate) fn from_sorted_unchecked(entries: &[(K, V)]) -> Self {
        Self {
            root: build_from_sorted(entries),
            length: entries.len(),
        }
    }

    /// Rebuilds a tree of identical content into its most compact, shallow
    /// shape. Two trees with the same ordered content rebalance to the
    /// same shape regardless of their insertion histories.
    pub(crate) fn rebalance(&self) -> Self {
        Self::from_sorted_unchecked(&self.to_vec())
    }
}

// =============================================================================
// Invariant Checks (test builds only)
// =============================================================================

#[cfg(test)]
impl<K: Ord, V> Tree<K, V> {
    /// Asserts the search order, size, and weight balance invariants for
    /// every node, and that the cached length matches the root size.
    pub(crate) fn validate(&self) {
        let counted = Self::validate_link(&self.root, None, None);
        assert_eq!(counted, self.length, "cached length must equal node count");
    }

    fn validate_link(link: &Link<K, V>, lower: Option<&K>, upper: Option<&K>) -> usize {
        let Some(node) = link else {
            return 0;
        };
        if let Some(bound) = lower {
            assert!(node.key > *bound, "left subtree keys must be smaller");
        }
        if let Some(bound) = upper {
            assert!(node.key < *bound, "right subtree keys must be larger");
        }
        let left_size = Self::validate_link(&node.left, lower, Some(&node.key));
        let right_size = Self::validate_link(&node.right, Some(&node.key), upper);
        assert_eq!(node.size, 1 + left_size + right_size, "size must be cached correctly");
        if left_size + right_size > 1 {
            assert!(
                left_size <= DELTA * right_size && right_size <= DELTA * left_size,
                "weight balance violated: left={left_size} right={right_size}"
            );
        }
        node.size
    }

    pub(crate) fn height(&self) -> usize {
        fn height_link<K, V>(link: &Link<K, V>) -> usize {
            link.as_ref()
                .map_or(0, |node| 1 + height_link(&node.left).max(height_link(&node.right)))
        }
        height_link(&self.root)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tree_of(keys: &[i32]) -> Tree<i32, i32> {
        let mut tree = Tree::new();
        for key in keys {
            tree = tree.insert(*key, key * 10);
        }
        tree
    }

    /// Upper bound on the height of a weight-balanced tree with
    /// `(DELTA, RATIO) = (3, 2)`: comfortably within 3 * log2(n + 1) + 1.
    fn height_bound(length: usize) -> usize {
        let log2 = usize::BITS as usize - (length + 1).leading_zeros() as usize;
        3 * log2 + 1
    }

    #[rstest]
    fn test_empty_tree_is_valid() {
        let tree: Tree<i32, i32> = Tree::new();
        tree.validate();
        assert_eq!(tree.len(), 0);
        assert!(tree.is_empty());
    }

    #[rstest]
    fn test_sequential_ascending_inserts_stay_balanced() {
        let mut tree = Tree::new();
        for key in 0..1000 {
            tree = tree.insert(key, key);
        }
        tree.validate();
        assert_eq!(tree.len(), 1000);
        assert!(tree.height() <= height_bound(1000));
    }

    #[rstest]
    fn test_sequential_descending_inserts_stay_balanced() {
        let mut tree = Tree::new();
        for key in (0..1000).rev() {
            tree = tree.insert(key, key);
        }
        tree.validate();
        assert!(tree.height() <= height_bound(1000));
    }

    #[rstest]
    fn test_interleaved_inserts_stay_balanced() {
        let mut tree = Tree::new();
        // Deterministic scatter over the key space.
        for step in 0..1000_i32 {
            tree = tree.insert(step.wrapping_mul(2_654_435_761_u32 as i32), step);
        }
        tree.validate();
        assert!(tree.height() <= height_bound(tree.len()));
    }

    #[rstest]
    fn test_insert_overwrite_keeps_shape_and_size() {
        let tree = tree_of(&[5, 3, 8, 1, 4]);
        let overwritten = tree.insert(3, 999);
        overwritten.validate();
        assert_eq!(overwritten.len(), tree.len());
        assert_eq!(overwritten.get(&3), Some(&999));
        assert_eq!(overwritten.height(), tree.height());
    }

    #[rstest]
    fn test_remove_rebalances() {
        let mut tree = Tree::new();
        for key in 0..512 {
            tree = tree.insert(key, key);
        }
        // Remove the entire left half, forcing rebalances on the way.
        for key in 0..256 {
            tree = tree.remove(&key);
        }
        tree.validate();
        assert_eq!(tree.len(), 256);
        assert!(tree.height() <= height_bound(256));
    }

    #[rstest]
    fn test_remove_absent_key_is_noop() {
        let tree = tree_of(&[3, 1, 2]);
        let removed = tree.remove(&4);
        removed.validate();
        assert_eq!(removed.len(), 3);
        assert_eq!(removed.to_vec(), tree.to_vec());
    }

    #[rstest]
    fn test_remove_two_child_node_splices_successor() {
        let tree = tree_of(&[5, 2, 8, 1, 3, 7, 9]);
        let removed = tree.remove(&5);
        removed.validate();
        let keys: Vec<i32> = removed.to_vec().into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec![1, 2, 3, 7, 8, 9]);
    }

    #[rstest]
    fn test_to_vec_is_sorted_regardless_of_insert_order() {
        let tree = tree_of(&[4, 1, 3, 2, 5]);
        let keys: Vec<i32> = tree.to_vec().into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec![1, 2, 3, 4, 5]);
    }

    #[rstest]
    fn test_min_max() {
        let tree = tree_of(&[4, 1, 3, 2, 5]);
        assert_eq!(tree.min(), Some((&1, &10)));
        assert_eq!(tree.max(), Some((&5, &50)));

        let empty: Tree<i32, i32> = Tree::new();
        assert_eq!(empty.min(), None);
        assert_eq!(empty.max(), None);
    }

    #[rstest]
    fn test_structural_sharing_on_insert() {
        let tree = tree_of(&[2, 1, 3]);
        let updated = tree.insert(4, 40);
        // The untouched left subtree is shared, not copied.
        let original_left = tree.root.as_ref().and_then(|root| root.left.as_ref());
        let updated_left = updated.root.as_ref().and_then(|root| root.left.as_ref());
        if let (Some(original), Some(shared)) = (original_left, updated_left) {
            assert!(ReferenceCounter::ptr_eq(original, shared));
        } else {
            panic!("both trees should have a left subtree");
        }
    }

    #[rstest]
    fn test_from_sorted_unchecked_builds_minimal_height() {
        let entries: Vec<(i32, i32)> = (0..1023).map(|key| (key, key)).collect();
        let tree = Tree::from_sorted_unchecked(&entries);
        tree.validate();
        // A perfectly balanced tree of 1023 nodes has height exactly 10.
        assert_eq!(tree.height(), 10);
    }

    #[rstest]
    fn test_rebalance_preserves_content() {
        let mut tree = Tree::new();
        for key in 0..300 {
            tree = tree.insert(key, key);
        }
        for key in (0..300).step_by(3) {
            tree = tree.remove(&key);
        }
        let rebalanced = tree.rebalance();
        rebalanced.validate();
        assert_eq!(rebalanced.to_vec(), tree.to_vec());
        assert!(rebalanced.height() <= tree.height());
    }

    #[rstest]
    fn test_rebalance_normalises_shape() {
        // Same content, different insertion histories.
        let ascending = tree_of(&[1, 2, 3, 4, 5, 6, 7]);
        let descending = tree_of(&[7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(
            ascending.rebalance().height(),
            descending.rebalance().height()
        );
        assert_eq!(ascending.rebalance().to_vec(), descending.rebalance().to_vec());
    }

    #[rstest]
    fn test_collect_range_prunes_to_bounds() {
        let tree = tree_of(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut output = Vec::new();
        collect_range(&tree.root, Bound::Included(&3), Bound::Included(&6), &mut output);
        let keys: Vec<i32> = output.into_iter().map(|(key, _)| *key).collect();
        assert_eq!(keys, vec![3, 4, 5, 6]);
    }

    #[rstest]
    fn test_collect_range_inverted_bounds_is_empty() {
        let tree = tree_of(&[1, 2, 3]);
        let mut output = Vec::new();
        collect_range(&tree.root, Bound::Included(&3), Bound::Included(&1), &mut output);
        assert!(output.is_empty());
    }

    #[rstest]
    fn test_churn_keeps_all_invariants() {
        let mut tree = Tree::new();
        for round in 0..2000_i32 {
            let key = round.wrapping_mul(37) % 500;
            if round % 3 == 0 {
                tree = tree.remove(&key);
            } else {
                tree = tree.insert(key, round);
            }
        }
        tree.validate();
        assert!(tree.height() <= height_bound(tree.len()));
    }
}
