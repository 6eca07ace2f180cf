extern crate std;

use std::{collections::BTreeSet, prelude::v1::*, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{AvlTree, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
pub struct TestNode {
    pub links: Links<TestNode>,
    pub key: u32,
}

impl TestNode {
    pub fn new(key: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::new(Box::into_raw(r)).unwrap()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

/// The largest height an AVL tree holding `len` elements may have.
pub fn height_bound(len: usize) -> u8 {
    (1.44 * ((len + 2) as f64).log2()).ceil() as u8
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Get(ItemValue),
    Find(ItemValue),
    Remove(ItemValue),
    Smallest,
    PopSmallest,
    Largest,
    PopLargest,
}

impl Op {
    fn finalize(self, sorted: &[u32]) -> FinalOp {
        fn get_value(v: &[u32], i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => {
                    if v.is_empty() {
                        idx as u32
                    } else {
                        v[idx % v.len()]
                    }
                }
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_value(sorted, item)),
            Op::Get(item) => FinalOp::Get(get_value(sorted, item)),
            Op::Find(item) => FinalOp::Find(get_value(sorted, item)),
            Op::Remove(item) => FinalOp::Remove(get_value(sorted, item)),
            Op::Smallest => FinalOp::Smallest,
            Op::PopSmallest => FinalOp::PopSmallest,
            Op::Largest => FinalOp::Largest,
            Op::PopLargest => FinalOp::PopLargest,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    Get(u32),
    Find(u32),
    Remove(u32),
    Smallest,
    PopSmallest,
    Largest,
    PopLargest,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        value_strategy().prop_map(Op::Insert),
        value_strategy().prop_map(Op::Get),
        value_strategy().prop_map(Op::Find),
        value_strategy().prop_map(Op::Remove),
        Just(Op::Smallest),
        Just(Op::PopSmallest),
        Just(Op::Largest),
        Just(Op::PopLargest),
    ]
}

// Checks the parent half of a `find` result for `key`.
fn check_find_parent(tree: &AvlTree<TestNode>, key: u32, node: Option<&TestNode>, parent: Option<&TestNode>) {
    let Some(parent) = parent else {
        // Only the root, or a miss on an empty tree, has no parent.
        match node {
            Some(node) => assert!(tree.root().is_some_and(|root| core::ptr::eq(root, node))),
            None => assert!(tree.is_empty()),
        }
        return;
    };

    let child = if key < parent.key {
        tree.left(parent)
    } else {
        tree.right(parent)
    };

    match node {
        Some(node) => assert!(child.is_some_and(|child| core::ptr::eq(child, node))),
        None => assert!(child.is_none()),
    }
}

pub fn run_btree_equivalence(ops: Vec<Op>) {
    let mut sorted_values = Vec::with_capacity(ops.len());
    let mut btree = BTreeSet::new();
    let mut avl: AvlTree<TestNode> = AvlTree::new();

    fn insert_sorted(v: &mut Vec<u32>, value: u32) {
        if let Err(idx) = v.binary_search(&value) {
            v.insert(idx, value);
        }
    }

    fn remove_sorted(v: &mut Vec<u32>, value: u32) {
        if let Ok(idx) = v.binary_search(&value) {
            v.remove(idx);
        }
    }

    #[inline]
    #[allow(clippy::boxed_local)]
    fn node_key(node: Box<TestNode>) -> u32 {
        node.key
    }

    #[inline]
    fn ref_key(node: &TestNode) -> &u32 {
        &node.key
    }

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&sorted_values);

        match final_op {
            FinalOp::Insert(value) => {
                insert_sorted(&mut sorted_values, value);

                // A rejected insert hands the new item back.
                let from_btree = if btree.insert(value) {
                    None
                } else {
                    Some(value)
                };
                let from_avl = avl.insert(TestNode::new(value)).map(node_key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Get(value) => {
                let from_btree = btree.get(&value);
                let from_avl = avl.get(&value).map(|n| ref_key(n.get_ref()));

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Find(value) => {
                let (node, parent) = avl.find(&value);
                let node = node.map(|n| n.get_ref());
                let parent = parent.map(|p| p.get_ref());

                assert_eq!(
                    btree.get(&value),
                    node.map(ref_key),
                    "FinalOp #{op_id}: {final_op:?}"
                );
                check_find_parent(&avl, value, node, parent);
            }

            FinalOp::Remove(value) => {
                remove_sorted(&mut sorted_values, value);

                let from_btree = btree.remove(&value).then_some(value);
                let from_avl = avl.remove(&value).map(node_key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
                assert!(!avl.contains_key(&value));
            }

            FinalOp::Smallest => {
                let from_btree = btree.first();
                let from_avl = avl.smallest().map(|n| ref_key(n.get_ref()));

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopSmallest => {
                let from_btree = btree.pop_first();
                let from_avl = avl.pop_smallest().map(node_key);

                if let Some(value) = from_btree {
                    remove_sorted(&mut sorted_values, value);
                }

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Largest => {
                let from_btree = btree.last();
                let from_avl = avl.largest().map(|n| ref_key(n.get_ref()));

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopLargest => {
                let from_btree = btree.pop_last();
                let from_avl = avl.pop_largest().map(node_key);

                if let Some(value) = from_btree {
                    remove_sorted(&mut sorted_values, value);
                }

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }
        }

        avl.assert_invariants();
        assert_eq!(btree.len(), avl.len());
        assert!(avl.height() <= height_bound(avl.len()));
        assert!(btree.iter().eq(avl.iter().map(ref_key)));
        assert!(btree.iter().rev().eq(avl.iter().rev().map(ref_key)));
    }
}
