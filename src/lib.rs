//! An intrusive AVL tree.
#![cfg_attr(not(feature = "std"), no_std)]

// Conventions used in comments:
// - The height of a node `x` is denoted `h(x)`. Missing subtrees have height 0, so a leaf has
//   height 1.
// - The parent of a node `x` is denoted `p(x)`.
// - The balance factor of a node `x` is `h(right(x)) - h(left(x))`.
//
// The fundamental invariants of an AVL tree are:
// 1. `h(x) = 1 + max(h(left(x)), h(right(x)))` for every node, and the cached height is exact.
// 2. Every balance factor is -1, 0 or 1.
//
// Corollary:
// 3. A tree holding `n` nodes has height below `1.4405 * log2(n + 2)`.
//
// Every mutation first edits the structure as for an unbalanced search tree, then walks from the
// lowest touched node up to the root (`fix`), recomputing heights and rotating wherever a balance
// factor reached +/-2. Because each node keeps a parent pointer, the walk needs no stack.

#[cfg(feature = "alloc")]
extern crate alloc;

use core::{
    borrow::Borrow, cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not,
    pin::Pin, ptr::NonNull,
};

use cordyceps::Linked;

mod balance;
#[cfg(feature = "std")]
mod debug;
mod entry;
mod invariants;
mod iter;
#[cfg(any(test, feature = "model"))]
pub mod model;
#[cfg(feature = "alloc")]
pub mod set;
#[cfg(test)]
mod tests;

pub use entry::{Entry, OccupiedEntry, VacantEntry};
pub use invariants::InvariantViolation;
pub use iter::Iter;
#[cfg(feature = "alloc")]
pub use set::AvlSet;

/// An item that can be linked into an [`AvlTree`].
///
/// The tree orders items by a single three-way comparison of their keys.
pub trait TreeNode<L>: Linked<L> {
    type Key: Ord;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// Items are owned by the tree while linked: [`insert`](AvlTree::insert) consumes a
/// [`Linked::Handle`], and every removal hands one back. Dropping the tree drops all items that are
/// still linked.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

/// The links embedded in each item of an [`AvlTree`].
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    height: u8,
    _unpin: PhantomPinned,
}

pub(crate) type Link<T> = Option<NonNull<T>>;

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the height of the tree. An empty tree has height 0.
    pub fn height(&self) -> u8 {
        unsafe { self.height_of(self.root) }
    }

    /// Returns a reference to the item corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let (ptr, _) = self.find_raw(key);
        ptr.map(|ptr| unsafe { Pin::new_unchecked(ptr.as_ref()) })
    }

    /// Returns `true` if the tree contains an item corresponding to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.find_raw(key).0.is_some()
    }

    /// Searches for `key`, returning the matching item together with its parent.
    ///
    /// On a hit, the parent is `None` iff the match is the root. On a miss, the parent is the last
    /// item visited, i.e. the item a new item with this key would be attached to, or `None` if the
    /// tree is empty.
    pub fn find<Q>(&self, key: &Q) -> (Option<Pin<&T>>, Option<Pin<&T>>)
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let (node, parent) = self.find_raw(key);

        unsafe {
            (
                node.map(|n| Pin::new_unchecked(n.as_ref())),
                parent.map(|p| Pin::new_unchecked(p.as_ref())),
            )
        }
    }

    pub(crate) fn find_raw<Q>(&self, key: &Q) -> (Link<T>, Link<T>)
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut parent = None;
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            let dir = unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => Dir::Left,
                    Ordering::Equal => return (Some(cur), parent),
                    Ordering::Greater => Dir::Right,
                }
            };

            parent = Some(cur);
            opt_cur = unsafe { self.links(cur).child(dir) };
        }

        (None, parent)
    }

    /// Returns the minimum element of the tree.
    pub fn smallest(&self) -> Option<Pin<&T>> {
        self.extreme(Dir::Left)
            .map(|ptr| unsafe { Pin::new_unchecked(ptr.as_ref()) })
    }

    /// Returns the maximum element of the tree.
    pub fn largest(&self) -> Option<Pin<&T>> {
        self.extreme(Dir::Right)
            .map(|ptr| unsafe { Pin::new_unchecked(ptr.as_ref()) })
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_smallest(&mut self) -> Option<T::Handle> {
        let ptr = self.extreme(Dir::Left)?;
        Some(unsafe { self.remove_at(ptr) })
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_largest(&mut self) -> Option<T::Handle> {
        let ptr = self.extreme(Dir::Right)?;
        Some(unsafe { self.remove_at(ptr) })
    }

    pub(crate) fn extreme(&self, dir: Dir) -> Link<T> {
        self.root
            .map(|root| unsafe { self.extreme_in_subtree(root, dir) })
    }

    // Returns the node reached by following `dir` links from `root` as far as possible.
    #[inline]
    pub(crate) unsafe fn extreme_in_subtree(&self, root: NonNull<T>, dir: Dir) -> NonNull<T> {
        let mut cur = root;

        while let Some(next) = unsafe { self.links(cur).child(dir) } {
            cur = next;
        }

        cur
    }

    // Returns the maximum node in the subtree.
    //
    // If the subtree root is not the maximum, also returns the maximum node's parent.
    #[inline]
    unsafe fn max_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Link<T>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(right) = unsafe { self.links(cur).right() } {
            parent = Some(cur);
            cur = right;
        }

        (cur, parent)
    }

    // Structural read access ==================================================

    /// Returns the root item of the tree.
    pub fn root(&self) -> Option<&T> {
        self.root.map(|root| unsafe { root.as_ref() })
    }

    /// Returns the left child of `node`.
    ///
    /// `node` should be an element of this tree; for an unlinked item this returns `None`. The
    /// returned item borrows both `self` and `node`, so it cannot outlive the tree `node` came
    /// from:
    ///
    /// ```compile_fail
    /// # use core::ptr::NonNull;
    /// # use cordyceps::Linked;
    /// # use cordyceps_avl::{AvlTree, Links, TreeNode};
    /// # struct Node { links: Links<Node>, key: u32 }
    /// # unsafe impl Linked<Links<Node>> for Node {
    /// #     type Handle = Box<Node>;
    /// #     fn into_ptr(r: Box<Node>) -> NonNull<Node> { NonNull::from(Box::leak(r)) }
    /// #     unsafe fn from_ptr(ptr: NonNull<Node>) -> Box<Node> { unsafe { Box::from_raw(ptr.as_ptr()) } }
    /// #     unsafe fn links(ptr: NonNull<Node>) -> NonNull<Links<Node>> {
    /// #         unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr.as_ptr()).links)) }
    /// #     }
    /// # }
    /// # impl TreeNode<Links<Node>> for Node {
    /// #     type Key = u32;
    /// #     fn key(&self) -> &u32 { &self.key }
    /// # }
    /// # let node = |key: u32| Box::new(Node { links: Links::new(), key });
    /// let mut a: AvlTree<Node> = AvlTree::new();
    /// a.insert(node(5));
    ///
    /// let mut b: AvlTree<Node> = AvlTree::new();
    /// b.insert(node(10));
    /// b.insert(node(3));
    ///
    /// let escaped = a.left(b.root().unwrap()).unwrap();
    /// drop(b);
    /// assert_eq!(escaped.key, 3);
    /// ```
    pub fn left<'a>(&'a self, node: &'a T) -> Option<&'a T> {
        self.relative(node, |links| links.left())
    }

    /// Returns the right child of `node`.
    ///
    /// `node` should be an element of this tree; for an unlinked item this returns `None`.
    pub fn right<'a>(&'a self, node: &'a T) -> Option<&'a T> {
        self.relative(node, |links| links.right())
    }

    /// Returns the parent of `node`, or `None` if `node` is the root.
    pub fn parent<'a>(&'a self, node: &'a T) -> Option<&'a T> {
        self.relative(node, |links| links.parent())
    }

    /// Returns the cached height of the subtree rooted at `node`.
    pub fn node_height(&self, node: &T) -> u8 {
        unsafe { self.links(NonNull::from(node)).height() }
    }

    fn relative<'a>(&'a self, node: &'a T, f: impl FnOnce(&Links<T>) -> Link<T>) -> Option<&'a T> {
        unsafe { f(self.links(NonNull::from(node))).map(|ptr| ptr.as_ref()) }
    }

    // Mutation ================================================================

    /// Inserts an item into the tree.
    ///
    /// If the tree already holds an item with an equal key, the tree is left unchanged and `item`
    /// is handed back.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);

        let (found, parent) = self.find_raw(unsafe { ptr.as_ref() }.key());

        if found.is_some() {
            log::trace!("insert: key already present, rejecting {:p}", ptr.as_ptr());
            return Some(unsafe { T::from_ptr(ptr) });
        }

        unsafe {
            match parent {
                None => self.insert_as_root(ptr),
                Some(parent) => {
                    let dir = match ptr.as_ref().key().cmp(parent.as_ref().key()) {
                        Ordering::Less => Dir::Left,
                        Ordering::Greater => Dir::Right,
                        Ordering::Equal => unreachable!("search missed an equal key"),
                    };

                    self.insert_as_child(parent, dir, ptr);
                }
            }
        }

        None
    }

    // Links `ptr` as the sole element of an empty tree.
    pub(crate) unsafe fn insert_as_root(&mut self, ptr: NonNull<T>) {
        debug_assert!(self.root.is_none(), "tree must be empty");

        unsafe { self.links_mut(ptr).reset(None) };

        self.root = Some(ptr);
        self.len += 1;
    }

    // Links `ptr` as the `dir` child of `parent` and rebalances.
    //
    // # Safety
    //
    // The caller must ensure that `parent` is an element of `self` with no `dir` child, and that
    // the key of `ptr` sorts into that position.
    pub(crate) unsafe fn insert_as_child(&mut self, parent: NonNull<T>, dir: Dir, ptr: NonNull<T>) {
        unsafe {
            debug_assert!(
                self.links(parent).child(dir).is_none(),
                "insertion point must be vacant"
            );

            self.links_mut(ptr).reset(Some(parent));
            self.links_mut(parent).set_child(dir, Some(ptr));
            self.len += 1;

            let root = self.fix(parent);
            self.root = Some(root);
        }
    }

    /// Removes the item corresponding to `key` from the tree.
    ///
    /// A missing key is not an error: `None` is returned and the tree is left exactly as it was.
    /// In particular, a miss never discards the tree or any of its items.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let Some(node) = self.find_raw(key).0 else {
            log::trace!("remove: key not present, tree unchanged");
            return None;
        };

        Some(unsafe { self.remove_at(node) })
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        // There are two cases:
        //
        // 1. `node` has no left child.
        //
        //    Its right subtree (possibly empty) is elevated to replace it. That subtree is
        //    untouched, so rebalancing starts at `p(node)`. If `node` was the root, nothing above
        //    the elevated subtree remains and no rebalancing is needed.
        //
        // 2. `node` has a left child.
        //
        //    `node`'s predecessor[^1] `r` assumes `node`'s place. If `r` is not `node`'s left child,
        //    `r`'s left subtree is elevated to replace it under `p(r)`, and rebalancing starts at
        //    `p(r)`; otherwise `r` keeps its left subtree and rebalancing starts at `r`.
        //
        // [^1]: The predecessor of a node `a` is the greatest node in `a`'s left subtree. It has
        //       no right child by definition.

        unsafe {
            let parent = self.links(node).parent();
            let left = self.links(node).left();
            let right = self.links(node).right();

            let rebalance_from = match left {
                None => {
                    self.replace_child_or_set_root(parent, node, right);
                    self.maybe_set_parent(right, parent);

                    parent
                }

                Some(left) => {
                    let (pred, pred_parent) = self.max_in_subtree(left);

                    if let Some(pred_parent) = pred_parent {
                        // Elevate the predecessor's left child to replace it.
                        let pred_left = self.links(pred).left();
                        self.links_mut(pred_parent).set_right(pred_left);
                        self.maybe_set_parent(pred_left, Some(pred_parent));

                        self.links_mut(pred).set_left(Some(left));
                        self.links_mut(left).set_parent(Some(pred));
                    }

                    self.replace_child_or_set_root(parent, node, Some(pred));
                    self.links_mut(pred).set_parent(parent);
                    self.links_mut(pred).set_right(right);
                    self.maybe_set_parent(right, Some(pred));

                    Some(pred_parent.unwrap_or(pred))
                }
            };

            self.len -= 1;

            if let Some(start) = rebalance_from {
                let root = self.fix(start);
                self.root = Some(root);
            }

            self.links_mut(node).clear();

            T::from_ptr(node)
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let cur = self.extreme_in_subtree(cur, Dir::Left);
                let parent = self.links(cur).parent();
                let right = self.links(cur).right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                self.links_mut(cur).clear();
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Support methods ========================================================

    #[inline]
    pub(crate) unsafe fn links<'a>(&self, node: NonNull<T>) -> &'a Links<T> {
        unsafe { T::links(node).as_ref() }
    }

    #[inline]
    pub(crate) unsafe fn links_mut<'a>(&mut self, node: NonNull<T>) -> &'a mut Links<T> {
        unsafe { T::links(node).as_mut() }
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { self.links_mut(node).set_parent(parent) };
    }

    #[inline]
    pub(crate) unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    #[cfg(not(debug_assertions))]
    #[inline]
    unsafe fn replace_child(&mut self, parent: NonNull<T>, old_child: NonNull<T>, new_child: Link<T>) {
        unsafe {
            let dir = self.which_child(parent, old_child);
            self.links_mut(parent).set_child(dir, new_child);
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // In debug builds `new_child`'s parent pointer is also set.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    #[cfg(debug_assertions)]
    unsafe fn replace_child(&mut self, parent: NonNull<T>, old_child: NonNull<T>, new_child: Link<T>) {
        unsafe {
            let dir = if self.links(parent).left() == Some(old_child) {
                Dir::Left
            } else if self.links(parent).right() == Some(old_child) {
                Dir::Right
            } else {
                unreachable!("`old_child` must be a child of `parent`");
            };

            if let Some(new_child) = new_child {
                assert_ne!(
                    self.links(parent).child(!dir),
                    Some(new_child),
                    "`new_child` must not be a child of `parent`"
                );
            }

            self.links_mut(parent).set_child(dir, new_child);
            self.maybe_set_parent(new_child, Some(parent));
        }
    }

    #[inline]
    pub(crate) unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if unsafe { self.links(parent).left() } == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                height: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    /// Returns `true` if this item is currently linked into a tree.
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.height() != 0
    }

    #[inline]
    fn height(&self) -> u8 {
        unsafe { (*self.inner.get()).height }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_height(&mut self, height: u8) {
        self.inner.get_mut().height = height;
    }

    // Turns these links into those of a fresh leaf under `parent`.
    fn reset(&mut self, parent: Link<T>) {
        let inner = self.inner.get_mut();
        inner.parent = parent;
        inner.children = [None; 2];
        inner.height = 1;
    }

    // Marks these links as unlinked.
    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.height = 0;
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("height", &self.height())
            .finish()
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}
