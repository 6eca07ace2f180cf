use core::ptr::NonNull;

use crate::{AvlTree, Dir, Link, Links, TreeNode};

/// A broken structural invariant, as reported by [`AvlTree::check_invariants`].
///
/// Depths count from the root, which is at depth 0.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("node at depth {depth} is out of order with respect to an ancestor")]
    Unordered { depth: usize },

    #[error("node at depth {depth} caches height {cached} but its subtrees give {actual}")]
    HeightMismatch { depth: usize, cached: u8, actual: u8 },

    #[error("node at depth {depth} has subtrees of heights {left} and {right}")]
    Unbalanced { depth: usize, left: u8, right: u8 },

    #[error("node at depth {depth} is not linked back to its parent")]
    ParentMismatch { depth: usize },

    #[error("the root node has a parent")]
    RootHasParent,

    #[error("tree records {recorded} elements but {linked} are linked")]
    LenMismatch { recorded: usize, linked: usize },
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Checks every structural invariant of the tree.
    ///
    /// This runs in _O(n)_ time.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let Some(root) = self.root else {
            return match self.len {
                0 => Ok(()),
                recorded => Err(InvariantViolation::LenMismatch {
                    recorded,
                    linked: 0,
                }),
            };
        };

        if unsafe { self.links(root).parent() }.is_some() {
            return Err(InvariantViolation::RootHasParent);
        }

        let linked = unsafe { self.check_at(root, 0, None, None)? };

        if linked != self.len {
            return Err(InvariantViolation::LenMismatch {
                recorded: self.len,
                linked,
            });
        }

        Ok(())
    }

    #[doc(hidden)]
    #[track_caller]
    pub fn assert_invariants(&self) {
        if let Err(violation) = self.check_invariants() {
            panic!("AVL invariant violated: {violation}");
        }
    }

    // Checks the subtree rooted at `node`, whose keys must lie strictly between those of `lower`
    // and `upper`. Returns the number of nodes in the subtree.
    unsafe fn check_at(
        &self,
        node: NonNull<T>,
        depth: usize,
        lower: Link<T>,
        upper: Link<T>,
    ) -> Result<usize, InvariantViolation> {
        unsafe {
            let key = node.as_ref().key();

            let above_lower = lower.map_or(true, |l| l.as_ref().key() < key);
            let below_upper = upper.map_or(true, |u| key < u.as_ref().key());
            if !(above_lower && below_upper) {
                return Err(InvariantViolation::Unordered { depth });
            }

            let links = self.links(node);
            if links.left().is_some() && links.left() == links.right() {
                return Err(InvariantViolation::ParentMismatch { depth: depth + 1 });
            }

            let mut count = 1;

            for (dir, lower, upper) in [(Dir::Left, lower, Some(node)), (Dir::Right, Some(node), upper)] {
                let Some(child) = links.child(dir) else {
                    continue;
                };

                if self.links(child).parent() != Some(node) {
                    return Err(InvariantViolation::ParentMismatch { depth: depth + 1 });
                }

                count += self.check_at(child, depth + 1, lower, upper)?;
            }

            let left = self.height_of(links.left());
            let right = self.height_of(links.right());

            let actual = left.max(right) + 1;
            if links.height() != actual {
                return Err(InvariantViolation::HeightMismatch {
                    depth,
                    cached: links.height(),
                    actual,
                });
            }

            if left.abs_diff(right) > 1 {
                return Err(InvariantViolation::Unbalanced { depth, left, right });
            }

            Ok(count)
        }
    }
}
