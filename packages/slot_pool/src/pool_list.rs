use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::{PoolAllocator, Result};

/// A singly linked list whose nodes live in slots of a [`SlotPool`][crate::SlotPool].
///
/// The list is handed an allocator for its element type `T` and rebinds it to its internal node
/// type, so every element occupies exactly one slot. When the list is dropped, every remaining
/// element is dropped and every node slot is returned to the pool.
///
/// # Examples
///
/// ```rust
/// use new_zealand::nz;
/// use slot_pool::{PoolAllocator, PoolList, SlotPool};
///
/// let pool = SlotPool::new(nz!(32), nz!(3)).unwrap();
/// let mut list = PoolList::new_in(PoolAllocator::<u32>::new(&pool));
///
/// list.push_front(1).unwrap();
/// list.push_front(2).unwrap();
/// list.push_front(3).unwrap();
///
/// // One slot per element.
/// assert!(list.push_front(4).is_err());
///
/// assert_eq!(list.iter().copied().collect::<Vec<_>>(), [3, 2, 1]);
/// assert_eq!(list.pop_front(), Some(3));
/// assert_eq!(pool.available(), 1);
/// ```
pub struct PoolList<'pool, T> {
    head: Option<NonNull<Node<T>>>,
    len: usize,

    allocator: PoolAllocator<'pool, Node<T>>,

    // We own the values in the nodes and will drop them.
    _owns: PhantomData<T>,
}

struct Node<T> {
    value: T,
    next: Option<NonNull<Node<T>>>,
}

impl<'pool, T> PoolList<'pool, T> {
    /// Creates an empty list that allocates its nodes through `allocator`.
    ///
    /// No slot is taken until the first element is pushed.
    #[must_use]
    pub fn new_in(allocator: PoolAllocator<'pool, T>) -> Self {
        Self {
            head: None,
            len: 0,
            allocator: allocator.rebind(),
            _owns: PhantomData,
        }
    }

    /// Returns an allocator equal to the one the list was created with.
    #[must_use]
    pub fn allocator(&self) -> PoolAllocator<'pool, T> {
        self.allocator.rebind()
    }

    /// The number of elements in the list.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the list has no elements.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Adds an element to the front of the list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndersizedSlot`][crate::Error::UndersizedSlot] if a list node does not
    /// fit into a slot and [`Error::PoolExhausted`][crate::Error::PoolExhausted] if the pool has
    /// no free slot. The list is unchanged and `value` is dropped in both cases.
    pub fn push_front(&mut self, value: T) -> Result<()> {
        let node = self.allocator.allocate(1)?.cast::<Node<T>>();

        // SAFETY: The allocator verified that a node fits into the slot by size and alignment.
        unsafe {
            node.write(Node {
                value,
                next: self.head,
            });
        }

        self.head = Some(node);

        // Cannot overflow because every element occupies its own slot of memory.
        self.len = self.len.wrapping_add(1);

        Ok(())
    }

    /// Removes the first element and returns it, or `None` if the list is empty.
    ///
    /// The slot of the removed node is returned to the pool.
    pub fn pop_front(&mut self) -> Option<T> {
        let node = self.head?;

        // SAFETY: Every node in the list is initialized and owned by the list. We unlink it
        // below, so the value is never read again.
        let Node { value, next } = unsafe { node.read() };

        self.head = next;
        self.len = self.len.wrapping_sub(1);

        // SAFETY: The node was allocated by an equal allocator with a count of one and its
        // contents have just been moved out.
        unsafe {
            self.allocator.deallocate(node, 1);
        }

        Some(value)
    }

    /// Returns a reference to the first element, or `None` if the list is empty.
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        // SAFETY: Nodes are initialized while linked into the list and `&self` prevents
        // concurrent mutation.
        self.head.map(|node| unsafe { &node.as_ref().value })
    }

    /// Returns an exclusive reference to the first element, or `None` if the list is empty.
    #[must_use]
    pub fn front_mut(&mut self) -> Option<&mut T> {
        // SAFETY: Nodes are initialized while linked into the list and `&mut self` guarantees
        // exclusive access.
        self.head.map(|mut node| unsafe { &mut node.as_mut().value })
    }

    /// Iterates over the elements from front to back.
    pub fn iter(&self) -> ListIter<'_, T> {
        ListIter {
            next: self.head,
            remaining: self.len,
            _list: PhantomData,
        }
    }

    /// Removes and drops every element, returning all node slots to the pool.
    ///
    /// If dropping an element panics, that element's node has already been returned and the
    /// remaining elements stay in the list.
    pub fn clear(&mut self) {
        while self.pop_front().is_some() {}
    }
}

impl<T> Drop for PoolList<'_, T> {
    fn drop(&mut self) {
        // If dropping an element panics, keep releasing the remaining nodes while unwinding.
        let mut this = scopeguard::guard(self, |this| this.clear());

        this.clear();
    }
}

impl<T: fmt::Debug> fmt::Debug for PoolList<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterates over the elements from front to back, same as [`PoolList::iter()`].
impl<'a, T> IntoIterator for &'a PoolList<'_, T> {
    type Item = &'a T;
    type IntoIter = ListIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the elements of a [`PoolList`], created by [`PoolList::iter()`].
#[derive(Debug)]
pub struct ListIter<'a, T> {
    next: Option<NonNull<Node<T>>>,
    remaining: usize,

    _list: PhantomData<&'a T>,
}

impl<'a, T> Iterator for ListIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;

        // SAFETY: The iterator borrows the list, so every linked node stays initialized and
        // unmodified for `'a`.
        let node = unsafe { node.as_ref() };

        self.next = node.next;
        self.remaining = self.remaining.wrapping_sub(1);

        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for ListIter<'_, T> {}

impl<T> FusedIterator for ListIter<'_, T> {}
