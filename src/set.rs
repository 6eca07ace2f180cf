//! An ordered set of owned values.

use alloc::boxed::Box;
use core::{borrow::Borrow, fmt, marker::PhantomPinned, pin::Pin, ptr::NonNull};

use cordyceps::Linked;

use crate::{AvlTree, InvariantViolation, Links, TreeNode};

/// An ordered set based on an [AVL tree].
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlSet<T: Ord> {
    tree: AvlTree<SetNode<T>>,
}

struct SetNode<T> {
    links: Links<SetNode<T>>,
    value: T,
    _unpin: PhantomPinned,
}

impl<T> SetNode<T> {
    fn boxed(value: T) -> Box<Self> {
        Box::new(SetNode {
            links: Links::new(),
            value,
            _unpin: PhantomPinned,
        })
    }
}

unsafe impl<T> Linked<Links<SetNode<T>>> for SetNode<T> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<SetNode<T>>> {
        let ptr = ptr.as_ptr();
        NonNull::new(unsafe { core::ptr::addr_of_mut!((*ptr).links) }).unwrap()
    }
}

impl<T: Ord> TreeNode<Links<SetNode<T>>> for SetNode<T> {
    type Key = T;

    fn key(&self) -> &Self::Key {
        &self.value
    }
}

#[inline]
fn value_ref<T>(node: Pin<&SetNode<T>>) -> &T {
    &Pin::get_ref(node).value
}

#[inline]
#[allow(clippy::boxed_local)]
fn into_value<T>(node: Box<SetNode<T>>) -> T {
    let SetNode { value, .. } = *node;
    value
}

impl<T: Ord> AvlSet<T> {
    /// Creates a new, empty `AvlSet`.
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Creates a set holding only `value`.
    pub fn from_value(value: T) -> Self {
        let mut set = Self::new();
        set.insert(value);
        set
    }

    /// Returns `true` if the set contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the set.
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the underlying tree.
    pub fn height(&self) -> u8 {
        self.tree.height()
    }

    /// Adds `value` to the set.
    ///
    /// Returns `false`, dropping `value` and leaving the set unchanged, if an equal value is
    /// already present.
    pub fn insert(&mut self, value: T) -> bool {
        self.tree.insert(SetNode::boxed(value)).is_none()
    }

    /// Returns `true` if the set contains a value equal to `value`.
    #[inline]
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(value)
    }

    /// Returns a reference to the stored value equal to `value`.
    #[inline]
    pub fn get<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(value).map(value_ref)
    }

    /// Searches for `value`, returning the matching stored value and the value of its parent in
    /// the tree.
    ///
    /// See [`AvlTree::find`] for the meaning of the parent on a miss.
    pub fn find<Q>(&self, value: &Q) -> (Option<&T>, Option<&T>)
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (node, parent) = self.tree.find(value);
        (node.map(value_ref), parent.map(value_ref))
    }

    /// Removes the value equal to `value` from the set and returns it.
    ///
    /// Returns `None`, leaving the set unchanged, if no such value is present.
    #[inline]
    pub fn remove<Q>(&mut self, value: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(value).map(into_value)
    }

    /// Returns the minimum value in the set.
    #[inline]
    pub fn smallest(&self) -> Option<&T> {
        self.tree.smallest().map(value_ref)
    }

    /// Returns the maximum value in the set.
    #[inline]
    pub fn largest(&self) -> Option<&T> {
        self.tree.largest().map(value_ref)
    }

    /// Removes and returns the minimum value in the set.
    #[inline]
    pub fn pop_smallest(&mut self) -> Option<T> {
        self.tree.pop_smallest().map(into_value)
    }

    /// Removes and returns the maximum value in the set.
    #[inline]
    pub fn pop_largest(&mut self) -> Option<T> {
        self.tree.pop_largest().map(into_value)
    }

    /// Calls `f` on every value in ascending order.
    pub fn traverse<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        self.tree.traverse(|node| f(&node.value));
    }

    /// Calls `f` on every value in descending order.
    pub fn reverse_traverse<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        self.tree.reverse_traverse(|node| f(&node.value));
    }

    /// Returns an iterator over the values in ascending order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.tree.iter(),
        }
    }

    /// Clears the set, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Checks the structural invariants of the underlying tree.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.tree.check_invariants()
    }
}

impl<T: Ord> Default for AvlSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + fmt::Debug> fmt::Debug for AvlSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: Ord> Extend<T> for AvlSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T: Ord> FromIterator<T> for AvlSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

/// An iterator over the values of an [`AvlSet`].
///
/// This struct is created by [`AvlSet::iter`].
pub struct Iter<'a, T: Ord> {
    inner: crate::Iter<'a, SetNode<T>>,
}

impl<'a, T: Ord> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|node| &node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, T: Ord> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|node| &node.value)
    }
}

impl<'a, T: Ord> ExactSizeIterator for Iter<'a, T> {}

impl<'a, T: Ord> core::iter::FusedIterator for Iter<'a, T> {}

impl<'a, T: Ord> IntoIterator for &'a AvlSet<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
