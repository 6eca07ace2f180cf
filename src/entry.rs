use core::{borrow::Borrow, cmp::Ordering, pin::Pin, ptr::NonNull};

use crate::{AvlTree, Dir, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns the entry for `key`, which remembers where an item with that key is or would be
    /// linked.
    pub fn entry<'tree, 'key, Q>(&'tree mut self, key: &'key Q) -> Entry<'tree, 'key, T, Q>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        match self.find_raw(key) {
            (Some(node), _) => Entry::Occupied(OccupiedEntry { tree: self, node }),

            (None, None) => Entry::Vacant(VacantEntry {
                tree: self,
                key,
                insert_as: InsertAs::Root,
            }),

            (None, Some(parent)) => {
                let dir = match key.cmp(unsafe { parent.as_ref() }.key().borrow()) {
                    Ordering::Less => Dir::Left,
                    Ordering::Greater => Dir::Right,
                    Ordering::Equal => unreachable!("search missed an equal key"),
                };

                Entry::Vacant(VacantEntry {
                    tree: self,
                    key,
                    insert_as: InsertAs::Child { parent, dir },
                })
            }
        }
    }
}

/// A view into a single entry in an [`AvlTree`], which may be either vacant or occupied.
pub enum Entry<'tree, 'key, T, Q>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: Borrow<Q> + Ord,
    Q: Ord + ?Sized,
{
    Vacant(VacantEntry<'tree, 'key, T, Q>),
    Occupied(OccupiedEntry<'tree, T>),
}

pub(crate) enum InsertAs<T: ?Sized> {
    Root,
    Child { parent: NonNull<T>, dir: Dir },
}

/// A vacant entry: the tree holds no item with the entry's key.
pub struct VacantEntry<'tree, 'key, T, Q>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: Borrow<Q> + Ord,
    Q: Ord + ?Sized,
{
    tree: &'tree mut AvlTree<T>,
    key: &'key Q,
    insert_as: InsertAs<T>,
}

impl<'tree, 'key, T, Q> VacantEntry<'tree, 'key, T, Q>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: Borrow<Q> + Ord,
    Q: Ord + ?Sized,
{
    /// Returns the key this entry was looked up with.
    pub fn key(&self) -> &'key Q {
        self.key
    }

    /// Inserts `item` at the key associated with this entry.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the key returned by `item.key()` is equal to the key used to
    /// retrieve this entry.
    pub unsafe fn insert(self, item: T::Handle) -> Pin<&'tree mut T> {
        let mut ptr = T::into_ptr(item);

        unsafe {
            debug_assert!(
                Borrow::<Q>::borrow(ptr.as_ref().key()).cmp(self.key) == Ordering::Equal,
                "item key must equal the entry key"
            );

            match self.insert_as {
                InsertAs::Root => self.tree.insert_as_root(ptr),
                InsertAs::Child { parent, dir } => self.tree.insert_as_child(parent, dir, ptr),
            }

            Pin::new_unchecked(ptr.as_mut())
        }
    }
}

/// An occupied entry: the tree holds an item with the entry's key.
pub struct OccupiedEntry<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: &'tree mut AvlTree<T>,
    node: NonNull<T>,
}

impl<'tree, T> OccupiedEntry<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a reference to the item in the entry.
    pub fn get(&self) -> &T {
        unsafe { self.node.as_ref() }
    }

    /// Converts the entry into a reference to its item, borrowed for the tree's lifetime.
    pub fn into_ref(self) -> &'tree T {
        // SAFETY: `self.tree` is mutably borrowed for `'tree`
        unsafe { self.node.as_ref() }
    }

    /// Returns a pinned mutable reference to the item in the entry.
    ///
    /// # Safety
    ///
    /// The caller must ensure that neither the links nor the key of the mutably borrowed item are
    /// modified, as doing so may result in undefined behavior.
    pub unsafe fn get_mut(&mut self) -> Pin<&mut T> {
        // SAFETY: `self.node` is guaranteed pinned by contract with `Linked`.
        unsafe { Pin::new_unchecked(self.node.as_mut()) }
    }

    /// Puts `item` in the place of the current item, returning the current item.
    ///
    /// The new item takes over the links and height of the old one, so no rebalancing happens.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `item`'s key is equivalent to the key of the existing item.
    pub unsafe fn replace(&mut self, item: T::Handle) -> T::Handle {
        let new_ptr = T::into_ptr(item);
        let old_ptr = self.node;

        // Point this entry at the new item.
        self.node = new_ptr;

        unsafe {
            debug_assert!(new_ptr.as_ref().key() == old_ptr.as_ref().key());

            let old_links = self.tree.links(old_ptr);
            let height = old_links.height();
            let parent = old_links.parent();
            let left = old_links.left();
            let right = old_links.right();

            let new_links = self.tree.links_mut(new_ptr);
            new_links.set_parent(parent);
            new_links.set_left(left);
            new_links.set_right(right);
            new_links.set_height(height);

            self.tree.replace_child_or_set_root(parent, old_ptr, Some(new_ptr));

            for child in [left, right].into_iter().flatten() {
                self.tree.links_mut(child).set_parent(Some(new_ptr));
            }

            self.tree.links_mut(old_ptr).clear();

            T::from_ptr(old_ptr)
        }
    }

    /// Removes and returns the item pointed to by this entry.
    pub fn remove(self) -> T::Handle {
        unsafe { self.tree.remove_at(self.node) }
    }
}
