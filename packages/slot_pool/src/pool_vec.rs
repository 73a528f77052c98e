use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::slice;

use tracing::trace;

use crate::{PoolAllocator, Result};

/// A contiguous growable vector whose buffer lives in a slot of a [`SlotPool`][crate::SlotPool].
///
/// The vector reaches the pool only through its [`PoolAllocator`], so growing reallocates the
/// same way a standard vector would: a new buffer is allocated, the elements are moved over and
/// the old buffer is deallocated. Because every allocation is a single slot, the vector can hold
/// at most [`PoolAllocator::max_len()`] elements. The first growth step claims a whole slot's
/// worth of capacity.
///
/// # Examples
///
/// ```rust
/// use new_zealand::nz;
/// use slot_pool::{Error, PoolAllocator, PoolVec, SlotPool};
///
/// let pool = SlotPool::new(nz!(3 * size_of::<i32>()), nz!(10)).unwrap();
/// let mut numbers = PoolVec::new_in(PoolAllocator::<i32>::new(&pool));
///
/// numbers.push(1).unwrap();
/// numbers.push(2).unwrap();
/// numbers.push(3).unwrap();
///
/// assert_eq!(numbers.as_slice(), [1, 2, 3]);
/// assert_eq!(pool.len(), 1);
///
/// // A fourth element would need a buffer larger than a slot.
/// assert!(matches!(numbers.push(4), Err(Error::UndersizedSlot { .. })));
/// ```
pub struct PoolVec<'pool, T> {
    buf: NonNull<T>,
    capacity: usize,
    len: usize,

    allocator: PoolAllocator<'pool, T>,

    // We own the elements in the buffer and will drop them.
    _owns: PhantomData<T>,
}

impl<'pool, T> PoolVec<'pool, T> {
    /// Creates an empty vector that allocates through `allocator`.
    ///
    /// No slot is taken until the first element is pushed.
    #[must_use]
    pub fn new_in(allocator: PoolAllocator<'pool, T>) -> Self {
        Self {
            buf: NonNull::dangling(),
            capacity: 0,
            len: 0,
            allocator,
            _owns: PhantomData,
        }
    }

    /// Creates an empty vector with room for at least `capacity` elements.
    ///
    /// A zero capacity takes no slot, like [`new_in()`](Self::new_in).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndersizedSlot`][crate::Error::UndersizedSlot] if `capacity` elements do
    /// not fit into one slot and [`Error::PoolExhausted`][crate::Error::PoolExhausted] if the
    /// pool has no free slot.
    pub fn with_capacity_in(capacity: usize, allocator: PoolAllocator<'pool, T>) -> Result<Self> {
        let mut vec = Self::new_in(allocator);

        if capacity != 0 {
            vec.buf = allocator.allocate(capacity)?.cast::<T>();
            vec.capacity = capacity;
        }

        Ok(vec)
    }

    /// Returns the allocator the vector was created with.
    #[must_use]
    #[inline]
    pub fn allocator(&self) -> PoolAllocator<'pool, T> {
        self.allocator
    }

    /// The number of elements in the vector.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the vector has no elements.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of elements the vector can hold without reallocating.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends an element to the back of the vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndersizedSlot`][crate::Error::UndersizedSlot] if the vector would need
    /// a buffer larger than a slot and [`Error::PoolExhausted`][crate::Error::PoolExhausted] if
    /// the pool has no free slot for a new buffer. The vector is unchanged and `value` is dropped
    /// in both cases.
    pub fn push(&mut self, value: T) -> Result<()> {
        if self.len == self.capacity {
            self.grow()?;
        }

        // SAFETY: `len < capacity` after growing, so the target is inside the buffer and holds
        // no initialized element.
        unsafe {
            self.buf.add(self.len).write(value);
        }

        // Cannot overflow because `len < capacity` held before the increment.
        self.len = self.len.wrapping_add(1);

        Ok(())
    }

    /// Removes the last element and returns it, or `None` if the vector is empty.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        self.len = self.len.wrapping_sub(1);

        // SAFETY: The element at the old last index is initialized. We shortened the vector
        // above, so it is never read again.
        Some(unsafe { self.buf.add(self.len).read() })
    }

    /// Returns the elements as a slice.
    #[must_use]
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: The first `len` elements of the buffer are initialized. The buffer pointer is
        // aligned and non-null even when nothing has been allocated yet.
        unsafe { slice::from_raw_parts(self.buf.as_ptr(), self.len) }
    }

    /// Returns the elements as an exclusive slice.
    #[must_use]
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: See `as_slice()`. We have exclusive access through `&mut self`.
        unsafe { slice::from_raw_parts_mut(self.buf.as_ptr(), self.len) }
    }

    /// Iterates over the elements from front to back.
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Drops every element. The buffer is kept for reuse.
    pub fn clear(&mut self) {
        let elements = ptr::slice_from_raw_parts_mut(self.buf.as_ptr(), self.len);

        // If an element panics while being dropped, the rest are leaked rather than dropped
        // twice.
        self.len = 0;

        // SAFETY: The elements were initialized and are no longer reachable through the vector.
        unsafe {
            ptr::drop_in_place(elements);
        }
    }

    /// Moves the elements into a larger buffer obtained from the allocator.
    fn grow(&mut self) -> Result<()> {
        // Asking for more than a slot holds produces the error the caller needs to see.
        let new_capacity = self
            .capacity
            .saturating_add(1)
            .max(self.allocator.max_len());

        let new_buf = self.allocator.allocate(new_capacity)?.cast::<T>();

        trace!(
            from = self.capacity,
            to = new_capacity,
            "pool vector moved to a new buffer"
        );

        // SAFETY: Both buffers hold at least `len` elements and are distinct allocations.
        unsafe {
            ptr::copy_nonoverlapping(self.buf.as_ptr(), new_buf.as_ptr(), self.len);
        }

        self.release_buffer();

        self.buf = new_buf;
        self.capacity = new_capacity;

        Ok(())
    }

    /// Returns the buffer to the pool without touching its contents.
    fn release_buffer(&mut self) {
        // SAFETY: The buffer was allocated by our allocator with `capacity` elements and is
        // replaced or discarded by the caller. Zero-capacity buffers were never allocated and
        // deallocating zero elements does nothing.
        unsafe {
            self.allocator.deallocate(self.buf, self.capacity);
        }
    }
}

impl<T> Drop for PoolVec<'_, T> {
    fn drop(&mut self) {
        // The buffer goes back to the pool even if dropping an element panics.
        let mut this = scopeguard::guard(self, |this| this.release_buffer());

        this.clear();
    }
}

impl<T> Deref for PoolVec<'_, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T> DerefMut for PoolVec<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for PoolVec<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_slice(), f)
    }
}

/// Iterates over the elements from front to back, same as [`PoolVec::iter()`].
impl<'a, T> IntoIterator for &'a PoolVec<'_, T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterates over exclusive references to the elements from front to back.
impl<'a, T> IntoIterator for &'a mut PoolVec<'_, T> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use new_zealand::nz;
    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::{Error, SlotPool};

    assert_not_impl_any!(PoolVec<'static, u32>: Send, Sync, Clone);

    #[test]
    fn new_vec_takes_no_slots() {
        let pool = SlotPool::new(nz!(16), nz!(1)).unwrap();
        let vec = PoolVec::<u32>::new_in(PoolAllocator::new(&pool));

        assert!(vec.is_empty());
        assert_eq!(vec.capacity(), 0);
        assert!(vec.as_slice().is_empty());
        assert!(pool.is_empty());
    }

    #[test]
    fn first_push_claims_whole_slot() {
        let pool = SlotPool::new(nz!(16), nz!(1)).unwrap();
        let mut vec = PoolVec::new_in(PoolAllocator::<u32>::new(&pool));

        vec.push(1).unwrap();

        assert_eq!(vec.capacity(), 4);
        assert_eq!(pool.len(), 1);

        for value in 2..=4 {
            vec.push(value).unwrap();
        }

        assert_eq!(vec.as_slice(), [1, 2, 3, 4]);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn push_beyond_slot_is_undersized() {
        let pool = SlotPool::new(nz!(8), nz!(4)).unwrap();
        let mut vec = PoolVec::new_in(PoolAllocator::<u32>::new(&pool));

        vec.push(1).unwrap();
        vec.push(2).unwrap();

        assert!(matches!(vec.push(3), Err(Error::UndersizedSlot { .. })));
        assert_eq!(vec.as_slice(), [1, 2]);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn push_into_exhausted_pool_fails() {
        let pool = SlotPool::new(nz!(8), nz!(1)).unwrap();
        let _held = pool.insert(0_u64).unwrap();

        let mut vec = PoolVec::new_in(PoolAllocator::<u32>::new(&pool));

        assert!(matches!(
            vec.push(1),
            Err(Error::PoolExhausted { capacity: 1 })
        ));
        assert!(vec.is_empty());
    }

    #[test]
    fn element_not_fitting_slot_is_undersized() {
        let pool = SlotPool::new(nz!(4), nz!(2)).unwrap();
        let mut vec = PoolVec::new_in(PoolAllocator::<u64>::new(&pool));

        assert!(matches!(vec.push(1), Err(Error::UndersizedSlot { .. })));
        assert!(pool.is_empty());
    }

    #[test]
    fn growth_moves_elements_to_new_buffer() {
        let pool = SlotPool::new(nz!(64), nz!(2)).unwrap();
        let mut vec = PoolVec::with_capacity_in(1, PoolAllocator::<String>::new(&pool)).unwrap();

        vec.push("first".to_string()).unwrap();
        assert_eq!(vec.capacity(), 1);

        vec.push("second".to_string()).unwrap();

        assert_eq!(vec.capacity(), 64 / size_of::<String>());
        assert_eq!(vec.as_slice(), ["first", "second"]);

        // The old buffer went back to the pool.
        assert_eq!(pool.len(), 1);
        pool.integrity_check();
    }

    #[test]
    fn with_capacity_larger_than_slot_is_undersized() {
        let pool = SlotPool::new(nz!(8), nz!(1)).unwrap();

        let result = PoolVec::with_capacity_in(3, PoolAllocator::<u32>::new(&pool));

        assert!(matches!(result, Err(Error::UndersizedSlot { .. })));
    }

    #[test]
    fn with_zero_capacity_takes_no_slot() {
        let pool = SlotPool::new(nz!(8), nz!(1)).unwrap();

        let vec = PoolVec::with_capacity_in(0, PoolAllocator::<u32>::new(&pool)).unwrap();

        assert_eq!(vec.capacity(), 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn pop_returns_elements_in_reverse() {
        let pool = SlotPool::new(nz!(16), nz!(1)).unwrap();
        let mut vec = PoolVec::new_in(PoolAllocator::<u8>::new(&pool));

        vec.push(1).unwrap();
        vec.push(2).unwrap();

        assert_eq!(vec.pop(), Some(2));
        assert_eq!(vec.pop(), Some(1));
        assert_eq!(vec.pop(), None);

        // The buffer is kept.
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn slice_access_and_iteration() {
        let pool = SlotPool::new(nz!(16), nz!(1)).unwrap();
        let mut vec = PoolVec::new_in(PoolAllocator::<u16>::new(&pool));

        for value in 1..=4 {
            vec.push(value).unwrap();
        }

        vec.as_mut_slice().reverse();
        for value in &mut vec {
            *value *= 10;
        }

        assert_eq!(vec.iter().copied().collect::<Vec<_>>(), [40, 30, 20, 10]);
        assert_eq!(vec.first(), Some(&40));
        assert_eq!(vec.iter().len(), 4);

        let mut visited = Vec::new();
        for value in &vec {
            visited.push(*value);
        }
        assert_eq!(visited, [40, 30, 20, 10]);
        assert_eq!(format!("{vec:?}"), "[40, 30, 20, 10]");
    }

    #[test]
    fn clear_and_drop_drop_each_element_once() {
        struct Counted(Rc<Cell<usize>>);

        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let drops = Rc::new(Cell::new(0));
        let pool = SlotPool::new(nz!(64), nz!(1)).unwrap();

        let mut vec = PoolVec::new_in(PoolAllocator::<Counted>::new(&pool));
        vec.push(Counted(Rc::clone(&drops))).unwrap();
        vec.push(Counted(Rc::clone(&drops))).unwrap();

        vec.clear();
        assert_eq!(drops.get(), 2);
        assert!(vec.is_empty());
        assert_eq!(pool.len(), 1);

        vec.push(Counted(Rc::clone(&drops))).unwrap();
        drop(vec);

        assert_eq!(drops.get(), 3);
        assert!(pool.is_empty());
    }

    #[test]
    fn zero_sized_elements_use_one_slot() {
        let pool = SlotPool::new(nz!(1), nz!(1)).unwrap();
        let mut vec = PoolVec::new_in(PoolAllocator::<()>::new(&pool));

        for _ in 0..100 {
            vec.push(()).unwrap();
        }

        assert_eq!(vec.len(), 100);
        assert_eq!(pool.len(), 1);

        drop(vec);
        assert!(pool.is_empty());
    }
}
