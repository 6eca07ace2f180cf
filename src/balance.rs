use core::ptr::NonNull;

use crate::{AvlTree, Dir, Link, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns the cached height of the pointed-to subtree.
    ///
    /// Missing subtrees have height 0.
    #[inline]
    pub(crate) unsafe fn height_of(&self, node: Link<T>) -> u8 {
        node.map(|n| unsafe { self.links(n).height() }).unwrap_or(0)
    }

    #[inline]
    pub(crate) unsafe fn recompute_height(&mut self, node: NonNull<T>) {
        unsafe {
            let left = self.height_of(self.links(node).left());
            let right = self.height_of(self.links(node).right());

            let height = left.max(right).checked_add(1).unwrap();
            self.links_mut(node).set_height(height);
        }
    }

    // Rotates `down` towards `dir`: its `!dir` child `up` takes its place, `down` becomes the `dir`
    // child of `up`, and the `dir` subtree of `up` moves across to become the `!dir` child of
    // `down`.
    //
    // Heights of `down` and then `up` are recomputed. Returns `up`.
    pub(crate) unsafe fn rotate(&mut self, down: NonNull<T>, dir: Dir) -> NonNull<T> {
        unsafe {
            let Some(up) = self.links(down).child(!dir) else {
                unreachable!("rotating {dir:?} requires a {:?} child", !dir);
            };

            log::trace!("rotate {dir:?}: {:p} up over {:p}", up.as_ptr(), down.as_ptr());

            let across = self.links(up).child(dir);
            self.links_mut(down).set_child(!dir, across);
            self.maybe_set_parent(across, Some(down));

            self.links_mut(up).set_child(dir, Some(down));
            let parent = self.links_mut(down).set_parent(Some(up));
            self.links_mut(up).set_parent(parent);

            self.replace_child_or_set_root(parent, down, Some(up));

            self.recompute_height(down);
            self.recompute_height(up);

            up
        }
    }

    /// Promotes the right child of `node` into its position.
    #[inline]
    pub(crate) unsafe fn rotate_left(&mut self, node: NonNull<T>) -> NonNull<T> {
        unsafe { self.rotate(node, Dir::Left) }
    }

    /// Promotes the left child of `node` into its position.
    #[inline]
    pub(crate) unsafe fn rotate_right(&mut self, node: NonNull<T>) -> NonNull<T> {
        unsafe { self.rotate(node, Dir::Right) }
    }

    // Restores the balance of `node`, whose `heavy` subtree is two taller than the other one.
    //
    // Returns the node now occupying `node`'s position.
    unsafe fn rebalance(&mut self, node: NonNull<T>, heavy: Dir) -> NonNull<T> {
        unsafe {
            let Some(child) = self.links(node).child(heavy) else {
                unreachable!("the heavy side of an unbalanced node must be non-empty");
            };

            let outer = self.height_of(self.links(child).child(heavy));
            let inner = self.height_of(self.links(child).child(!heavy));

            // Equal heights resolve to a single rotation.
            if inner > outer {
                log::trace!("rebalance {:p}: double rotation", node.as_ptr());

                match heavy {
                    Dir::Right => self.rotate_right(child),
                    Dir::Left => self.rotate_left(child),
                };
            }

            match heavy {
                Dir::Right => self.rotate_left(node),
                Dir::Left => self.rotate_right(node),
            }
        }
    }

    /// Walks from `start` up to the root, recomputing heights and rotating away every imbalance.
    ///
    /// Returns the root of the tree, i.e. the last node visited.
    pub(crate) unsafe fn fix(&mut self, start: NonNull<T>) -> NonNull<T> {
        let mut node = start;

        loop {
            unsafe {
                self.recompute_height(node);

                let left = self.height_of(self.links(node).left());
                let right = self.height_of(self.links(node).right());

                let top = if right > left + 1 {
                    self.rebalance(node, Dir::Right)
                } else if left > right + 1 {
                    self.rebalance(node, Dir::Left)
                } else {
                    node
                };

                match self.links(top).parent() {
                    Some(parent) => node = parent,
                    None => return top,
                }
            }
        }
    }
}
