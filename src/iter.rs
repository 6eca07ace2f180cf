use core::{iter::FusedIterator, ptr::NonNull};

use crate::{AvlTree, Dir, Link, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Calls `f` on every element of the tree in ascending order.
    pub fn traverse<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        if let Some(root) = self.root {
            unsafe { self.walk(root, Dir::Left, &mut f) };
        }
    }

    /// Calls `f` on every element of the tree in descending order.
    pub fn reverse_traverse<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        if let Some(root) = self.root {
            unsafe { self.walk(root, Dir::Right, &mut f) };
        }
    }

    // Visits the `first` subtree, then `node`, then the other subtree. Recursion depth is bounded
    // by the tree height.
    unsafe fn walk<F>(&self, node: NonNull<T>, first: Dir, f: &mut F)
    where
        F: FnMut(&T),
    {
        unsafe {
            if let Some(child) = self.links(node).child(first) {
                self.walk(child, first, f);
            }

            f(node.as_ref());

            if let Some(child) = self.links(node).child(!first) {
                self.walk(child, first, f);
            }
        }
    }

    /// Returns an iterator over the elements of the tree in ascending order.
    ///
    /// Use [`Iterator::rev`] to iterate in descending order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    // Returns the in-order neighbor of `node` in direction `dir`: the successor for `Dir::Right`,
    // the predecessor for `Dir::Left`.
    pub(crate) unsafe fn step(&self, node: NonNull<T>, dir: Dir) -> Link<T> {
        unsafe {
            if let Some(child) = self.links(node).child(dir) {
                return Some(self.extreme_in_subtree(child, !dir));
            }

            // Ascend until arriving from the `!dir` side.
            let mut cur = node;
            while let Some(parent) = self.links(cur).parent() {
                if self.which_child(parent, cur) == !dir {
                    return Some(parent);
                }

                cur = parent;
            }

            None
        }
    }
}

/// An iterator over the elements of an [`AvlTree`].
///
/// This struct is created by [`AvlTree::iter`].
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    tree: &'tree AvlTree<T>,

    front: Link<T>,
    back: Link<T>,

    len: usize,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree AvlTree<T>) -> Self {
        Iter {
            tree,

            front: tree.extreme(Dir::Left),
            back: tree.extreme(Dir::Right),

            len: tree.len(),
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        // The ends meet once `len` reaches zero.
        if self.len == 0 {
            return None;
        }

        let cur = self.front?;
        self.front = unsafe { self.tree.step(cur, Dir::Right) };
        self.len -= 1;

        Some(unsafe { cur.as_ref() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> DoubleEndedIterator for Iter<'tree, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let cur = self.back?;
        self.back = unsafe { self.tree.step(cur, Dir::Left) };
        self.len -= 1;

        Some(unsafe { cur.as_ref() })
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> ExactSizeIterator for Iter<'tree, T> {}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> FusedIterator for Iter<'tree, T> {}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Clone for Iter<'tree, T> {
    fn clone(&self) -> Self {
        Iter { ..*self }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> IntoIterator for &'tree AvlTree<T> {
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
