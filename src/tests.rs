extern crate std;

use std::{format, ops::Range, prelude::v1::*, vec};

use proptest::prelude::*;

use crate::model::{self, height_bound, TestNode};

use super::*;

fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

fn keys(tree: &AvlTree<TestNode>) -> Vec<u32> {
    tree.iter().map(|node| node.key).collect()
}

fn tree_of(keys: impl IntoIterator<Item = u32>) -> AvlTree<TestNode> {
    let mut tree = AvlTree::new();

    for key in keys {
        assert!(tree.insert(TestNode::new(key)).is_none());
        tree.assert_invariants();
    }

    tree
}

// Collects `(key, height, left key, right key)` for every node in level order.
fn shape(tree: &AvlTree<TestNode>) -> Vec<(u32, u8, Option<u32>, Option<u32>)> {
    let mut out = Vec::new();
    let mut queue: std::collections::VecDeque<&TestNode> = tree.root().into_iter().collect();

    while let Some(node) = queue.pop_front() {
        let left = tree.left(node);
        let right = tree.right(node);

        out.push((
            node.key,
            tree.node_height(node),
            left.map(|n| n.key),
            right.map(|n| n.key),
        ));

        queue.extend(left);
        queue.extend(right);
    }

    out
}

fn insert_find_all(keys: &[u32]) {
    let tree = tree_of(keys.iter().copied());

    for key in keys {
        let node = tree.find_raw(key).0.expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

#[test]
fn four_elems_find() {
    insert_find_all(&[0, 1, 2, 3]);
    insert_find_all(&[0, 1, 3, 2]);
    insert_find_all(&[0, 2, 1, 3]);
    insert_find_all(&[0, 2, 3, 1]);
    insert_find_all(&[0, 3, 1, 2]);
    insert_find_all(&[0, 3, 2, 1]);

    insert_find_all(&[1, 0, 2, 3]);
    insert_find_all(&[1, 0, 3, 2]);
    insert_find_all(&[1, 2, 0, 3]);
    insert_find_all(&[1, 2, 3, 0]);
    insert_find_all(&[1, 3, 0, 2]);
    insert_find_all(&[1, 3, 2, 0]);

    insert_find_all(&[2, 0, 1, 3]);
    insert_find_all(&[2, 0, 3, 1]);
    insert_find_all(&[2, 1, 0, 3]);
    insert_find_all(&[2, 1, 3, 0]);
    insert_find_all(&[2, 3, 0, 1]);
    insert_find_all(&[2, 3, 1, 0]);

    insert_find_all(&[3, 0, 1, 2]);
    insert_find_all(&[3, 0, 2, 1]);
    insert_find_all(&[3, 1, 0, 2]);
    insert_find_all(&[3, 1, 2, 0]);
    insert_find_all(&[3, 2, 0, 1]);
    insert_find_all(&[3, 2, 1, 0]);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree = tree_of(keys.iter().copied());

    for key in keys {
        let node = tree.remove(key).expect("item not found");
        assert_eq!(node.key, *key);
        assert!(tree.find_raw(key).0.is_none());
        tree.assert_invariants();
    }

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        let node = tree.find_raw(key).0.expect("item not found");
        unsafe { tree.remove_at(node) };
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_four() {
    insert_remove_all(&[0, 1, 2, 3]);
    insert_remove_all(&[0, 1, 3, 2]);
    insert_remove_all(&[0, 2, 1, 3]);
    insert_remove_all(&[0, 2, 3, 1]);
    insert_remove_all(&[0, 3, 1, 2]);
    insert_remove_all(&[0, 3, 2, 1]);

    insert_remove_all(&[1, 0, 2, 3]);
    insert_remove_all(&[1, 0, 3, 2]);
    insert_remove_all(&[1, 2, 0, 3]);
    insert_remove_all(&[1, 2, 3, 0]);
    insert_remove_all(&[1, 3, 0, 2]);
    insert_remove_all(&[1, 3, 2, 0]);

    insert_remove_all(&[2, 0, 1, 3]);
    insert_remove_all(&[2, 0, 3, 1]);
    insert_remove_all(&[2, 1, 0, 3]);
    insert_remove_all(&[2, 1, 3, 0]);
    insert_remove_all(&[2, 3, 0, 1]);
    insert_remove_all(&[2, 3, 1, 0]);

    insert_remove_all(&[3, 0, 1, 2]);
    insert_remove_all(&[3, 0, 2, 1]);
    insert_remove_all(&[3, 1, 0, 2]);
    insert_remove_all(&[3, 1, 2, 0]);
    insert_remove_all(&[3, 2, 0, 1]);
    insert_remove_all(&[3, 2, 1, 0]);
}

#[test]
fn single_value_tree() {
    let tree = tree_of([42]);

    assert_eq!(tree.height(), 1);
    assert_eq!(tree.smallest().map(|n| n.key), Some(42));
    assert_eq!(tree.largest().map(|n| n.key), Some(42));

    let (node, parent) = tree.find(&42);
    let node = node.expect("item not found");
    assert!(parent.is_none());
    assert!(core::ptr::eq(node.get_ref(), tree.root().unwrap()));
}

#[test]
fn empty_tree() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    assert!(tree.is_empty());
    assert_eq!(tree.height(), 0);
    assert!(tree.root().is_none());
    assert!(tree.smallest().is_none());
    assert!(tree.largest().is_none());
    assert!(tree.pop_largest().is_none());

    let (node, parent) = tree.find(&3);
    assert!(node.is_none() && parent.is_none());

    let mut visited = 0;
    tree.traverse(|_| visited += 1);
    assert_eq!(visited, 0);
}

#[test]
fn ascending_inserts() {
    init_logger();

    let tree = tree_of(0..16);

    assert!(tree.height() <= 5);
    assert_eq!(tree.smallest().map(|n| n.key), Some(0));
    assert_eq!(tree.largest().map(|n| n.key), Some(15));

    let mut ascending = Vec::new();
    tree.traverse(|node| ascending.push(node.key));
    assert_eq!(ascending, (0..16).collect::<Vec<_>>());

    let mut descending = Vec::new();
    tree.reverse_traverse(|node| descending.push(node.key));
    assert_eq!(descending, (0..16).rev().collect::<Vec<_>>());
}

#[test]
fn remove_largest_until_empty() {
    init_logger();

    let mut tree = tree_of(0..16);

    while let Some(largest) = tree.largest().map(|n| n.key) {
        let removed = tree.remove(&largest).expect("largest must be present");
        assert_eq!(removed.key, largest);

        tree.assert_invariants();
        assert!(!tree.contains_key(&largest));
        assert!(tree.height() <= height_bound(tree.len()));
    }

    assert!(tree.is_empty());
    assert!(tree.root().is_none());
}

#[test]
fn duplicate_insert_leaves_tree_unchanged() {
    let mut tree = tree_of([8, 3, 12, 1, 5, 10, 14, 4]);
    let before = shape(&tree);

    let rejected = tree.insert(TestNode::new(5)).expect("duplicate must be rejected");
    assert_eq!(rejected.key, 5);
    assert!(!rejected.links.is_linked());

    assert_eq!(tree.len(), 8);
    assert_eq!(shape(&tree), before);
}

// A miss is an ordinary outcome: the tree is kept whole, and nothing is unlinked, rebalanced or
// dropped.
#[test]
fn remove_absent_leaves_tree_unchanged() {
    let mut tree = tree_of([8, 3, 12, 1, 5, 10, 14, 4]);
    let before = shape(&tree);

    assert!(tree.remove(&9).is_none());
    assert!(tree.remove(&100).is_none());

    assert_eq!(tree.len(), 8);
    assert_eq!(shape(&tree), before);
    tree.assert_invariants();
}

#[test]
fn find_reports_parent() {
    //        8
    //      /   \
    //     3     12
    //    / \   /  \
    //   1   5 10  14
    //      /
    //     4
    let tree = tree_of([8, 3, 12, 1, 5, 10, 14, 4]);

    let parent_key = |key: u32| {
        let (node, parent) = tree.find(&key);
        (node.map(|n| n.key), parent.map(|p| p.key))
    };

    assert_eq!(parent_key(8), (Some(8), None));
    assert_eq!(parent_key(4), (Some(4), Some(5)));
    assert_eq!(parent_key(14), (Some(14), Some(12)));

    // On a miss, the parent is where the key would be attached.
    assert_eq!(parent_key(6), (None, Some(5)));
    assert_eq!(parent_key(0), (None, Some(1)));
    assert_eq!(parent_key(11), (None, Some(10)));
}

#[test]
fn single_rotations() {
    // Right-right: 0 -> 1 -> 2 rotates left at 0.
    let tree = tree_of([0, 1, 2]);
    assert_eq!(
        shape(&tree),
        vec![(1, 2, Some(0), Some(2)), (0, 1, None, None), (2, 1, None, None)]
    );

    // Left-left: 2 -> 1 -> 0 rotates right at 2.
    let tree = tree_of([2, 1, 0]);
    assert_eq!(
        shape(&tree),
        vec![(1, 2, Some(0), Some(2)), (0, 1, None, None), (2, 1, None, None)]
    );
}

#[test]
fn double_rotations() {
    // Right-left: 0 -> 2 -> 1.
    let tree = tree_of([0, 2, 1]);
    assert_eq!(
        shape(&tree),
        vec![(1, 2, Some(0), Some(2)), (0, 1, None, None), (2, 1, None, None)]
    );

    // Left-right: 2 -> 0 -> 1.
    let tree = tree_of([2, 0, 1]);
    assert_eq!(
        shape(&tree),
        vec![(1, 2, Some(0), Some(2)), (0, 1, None, None), (2, 1, None, None)]
    );
}

#[test]
fn equal_inner_heights_rotate_once() {
    //     2            4
    //    / \          / \
    //   1   4   ->   2   5
    //      / \      / \
    //     3   5    1   3
    let mut tree = tree_of([2, 1, 4, 3, 5]);
    tree.remove(&1).unwrap();

    tree.assert_invariants();
    assert_eq!(
        shape(&tree),
        vec![
            (4, 3, Some(2), Some(5)),
            (2, 2, None, Some(3)),
            (5, 1, None, None),
            (3, 1, None, None),
        ]
    );
}

#[test]
fn remove_without_left_child() {
    let mut tree = tree_of([8, 3, 12, 1, 5, 10, 14, 4]);

    // 12 has a left child; 14 and 1 have none.
    tree.remove(&14).unwrap();
    tree.assert_invariants();
    tree.remove(&1).unwrap();
    tree.assert_invariants();

    assert_eq!(keys(&tree), vec![3, 4, 5, 8, 10, 12]);
}

#[test]
fn remove_root_without_left_child() {
    let mut tree = tree_of([1, 2]);

    tree.remove(&1).unwrap();

    tree.assert_invariants();
    assert_eq!(shape(&tree), vec![(2, 1, None, None)]);
}

#[test]
fn remove_promotes_left_child_as_predecessor() {
    //        8              5
    //      /   \          /   \
    //     5     12  ->   3     12
    //    /
    //   3
    let mut tree = tree_of([8, 5, 12, 3]);
    tree.remove(&8).unwrap();

    tree.assert_invariants();
    assert_eq!(
        shape(&tree),
        vec![(5, 2, Some(3), Some(12)), (3, 1, None, None), (12, 1, None, None)]
    );
}

#[test]
fn remove_promotes_deep_predecessor() {
    //        8               6
    //      /   \           /   \
    //     3     12   ->   3     12
    //    / \   /  \      / \   /  \
    //   1   6 10  14    1   4 10  14
    //      /
    //     4
    let mut tree = tree_of([8, 3, 12, 1, 6, 10, 14, 4]);
    tree.remove(&8).unwrap();

    tree.assert_invariants();
    assert_eq!(
        shape(&tree),
        vec![
            (6, 3, Some(3), Some(12)),
            (3, 2, Some(1), Some(4)),
            (12, 2, Some(10), Some(14)),
            (1, 1, None, None),
            (4, 1, None, None),
            (10, 1, None, None),
            (14, 1, None, None),
        ]
    );
}

#[test]
fn pop_both_ends() {
    let mut tree = tree_of([5, 2, 8, 1, 9, 3]);

    assert_eq!(tree.pop_smallest().map(|n| n.key), Some(1));
    assert_eq!(tree.pop_largest().map(|n| n.key), Some(9));
    tree.assert_invariants();
    assert_eq!(keys(&tree), vec![2, 3, 5, 8]);
}

#[test]
fn iter_is_restartable() {
    let tree = tree_of([4, 2, 6, 1, 3, 5, 7]);

    assert_eq!(keys(&tree), vec![1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(keys(&tree), vec![1, 2, 3, 4, 5, 6, 7]);

    let descending: Vec<u32> = tree.iter().rev().map(|n| n.key).collect();
    assert_eq!(descending, vec![7, 6, 5, 4, 3, 2, 1]);

    let first_even = tree.iter().map(|n| n.key).find(|k| k % 2 == 0);
    assert_eq!(first_even, Some(2));

    let mut iter = (&tree).into_iter();
    iter.next();
    let rest = iter.clone().count();
    assert_eq!(rest, 6);
    assert_eq!(iter.len(), 6);
}

#[test]
fn entry_vacant_and_occupied() {
    let mut tree = tree_of([10, 5, 15]);

    match tree.entry(&7) {
        Entry::Vacant(entry) => {
            assert_eq!(*entry.key(), 7);
            let node = unsafe { entry.insert(TestNode::new(7)) };
            assert_eq!(node.key, 7);
        }
        Entry::Occupied(_) => panic!("7 is not in the tree"),
    }
    tree.assert_invariants();
    assert_eq!(tree.find(&7).1.map(|p| p.key), Some(5));

    match tree.entry(&15) {
        Entry::Occupied(entry) => {
            assert_eq!(entry.get().key, 15);
            assert_eq!(entry.remove().key, 15);
        }
        Entry::Vacant(_) => panic!("15 is in the tree"),
    }
    tree.assert_invariants();

    assert_eq!(keys(&tree), vec![5, 7, 10]);
}

#[test]
fn entry_into_empty_tree() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    match tree.entry(&3) {
        Entry::Vacant(entry) => unsafe {
            entry.insert(TestNode::new(3));
        },
        Entry::Occupied(_) => panic!("tree is empty"),
    }

    tree.assert_invariants();
    assert_eq!(tree.root().map(|n| n.key), Some(3));
}

#[test]
fn entry_replace_keeps_shape() {
    let mut tree = tree_of([8, 3, 12, 1, 5]);
    let before = shape(&tree);

    let Entry::Occupied(mut entry) = tree.entry(&3) else {
        panic!("3 is in the tree");
    };

    let old = unsafe { entry.replace(TestNode::new(3)) };
    assert!(!old.links.is_linked());
    assert!(entry.into_ref().links.is_linked());

    tree.assert_invariants();
    assert_eq!(tree.len(), 5);
    assert_eq!(shape(&tree), before);
}

#[test]
fn structural_accessors() {
    let tree = tree_of([2, 1, 3]);

    let root = tree.root().unwrap();
    let left = tree.left(root).unwrap();
    let right = tree.right(root).unwrap();

    assert_eq!((root.key, left.key, right.key), (2, 1, 3));
    assert!(tree.parent(root).is_none());
    assert!(core::ptr::eq(tree.parent(left).unwrap(), root));
    assert_eq!(tree.node_height(root), 2);
    assert_eq!(tree.node_height(left), 1);

    let loose = TestNode::new(9);
    assert!(tree.left(&loose).is_none());
    assert_eq!(tree.node_height(&loose), 0);
}

#[test]
fn accessors_span_two_trees() {
    let a = tree_of([5]);
    let b = tree_of([10, 3]);

    // Borrowing a node of `b` through `a` keeps both trees borrowed.
    let left = a.left(b.root().unwrap()).map(|n| n.key);
    assert_eq!(left, Some(3));
    assert!(a.parent(b.root().unwrap()).is_none());
    drop(b);

    assert_eq!(keys(&a), vec![5]);
}

#[test]
fn debug_shows_links() {
    let tree = tree_of([2, 1]);
    let root = tree.root().unwrap();
    let leaf = tree.left(root).unwrap();

    let root_links = format!("{:?}", root.links);
    assert!(root_links.starts_with("Links { parent: None, left: Some("));
    assert!(root_links.ends_with("), right: None, height: 2 }"));
    assert!(format!("{leaf:?}").contains("height: 1 }, key: 1 }"));
}

#[test]
fn height_bound_holds_for_large_trees() {
    let mut tree = tree_of([]);

    // Multiplicative stepping visits keys in a scrambled order.
    for i in 0..2000u32 {
        tree.insert(TestNode::new(i.wrapping_mul(7919) % 4001));
    }
    tree.assert_invariants();
    assert!(tree.height() <= height_bound(tree.len()));

    for i in (0..4001u32).step_by(3) {
        tree.remove(&i);
    }
    tree.assert_invariants();
    assert!(tree.height() <= height_bound(tree.len()));
}

#[test]
fn clear_unlinks_everything() {
    let mut tree = tree_of(0..50);

    tree.clear();

    assert!(tree.is_empty());
    assert_eq!(tree.height(), 0);
    tree.assert_invariants();

    tree.insert(TestNode::new(1));
    tree.assert_invariants();
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn traversal_is_sorted(values in proptest::collection::btree_set(0u32..10_000, 0..300)) {
        let tree = tree_of(values.iter().copied());

        prop_assert!(tree.height() <= height_bound(tree.len()));

        let mut ascending = Vec::new();
        tree.traverse(|node| ascending.push(node.key));
        prop_assert!(ascending.iter().eq(values.iter()));

        let mut descending = Vec::new();
        tree.reverse_traverse(|node| descending.push(node.key));
        prop_assert!(descending.iter().eq(values.iter().rev()));

        prop_assert_eq!(tree.smallest().map(|n| n.key), ascending.first().copied());
        prop_assert_eq!(tree.largest().map(|n| n.key), ascending.last().copied());
    }
}
