use std::alloc::Layout;
use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use tracing::trace;

use crate::{Error, Result, SlotPool};

/// A typed allocator view over a [`SlotPool`], for containers that need to allocate through a
/// pool instead of the global heap.
///
/// The allocator does not own the pool. It is a cheap [`Copy`] handle that borrows the pool for
/// `'pool`, so it can never outlive it. A container that stores elements of type `T` but also
/// needs memory for some internal type (e.g. list nodes) can [`rebind()`](Self::rebind) its
/// allocator to that type and keep drawing slots from the same pool.
///
/// Two allocators are equal if and only if they refer to the same pool, regardless of their
/// element types. Memory allocated through one can be deallocated through any equal allocator.
///
/// Every successful non-empty allocation occupies exactly one slot of the pool, so at most
/// [`max_len()`](Self::max_len) elements can be allocated at once. Larger requests fail with
/// [`Error::UndersizedSlot`].
///
/// # Examples
///
/// ```rust
/// use new_zealand::nz;
/// use slot_pool::{PoolAllocator, SlotPool};
///
/// let pool = SlotPool::new(nz!(64), nz!(4)).unwrap();
/// let allocator = PoolAllocator::<u32>::new(&pool);
///
/// let memory = allocator.allocate(16).unwrap();
/// assert_eq!(memory.len(), 16);
/// assert_eq!(pool.available(), 3);
///
/// // SAFETY: The memory came from an equal allocator with the same element count.
/// unsafe { allocator.deallocate(memory.cast(), 16) };
/// assert_eq!(pool.available(), 4);
///
/// // The same pool can serve other element types.
/// let bytes = allocator.rebind::<u8>();
/// assert_eq!(bytes, allocator);
/// assert_eq!(bytes.max_len(), 64);
/// ```
pub struct PoolAllocator<'pool, T> {
    pool: &'pool SlotPool,

    _element: PhantomData<fn() -> T>,
}

impl<'pool, T> PoolAllocator<'pool, T> {
    /// Creates an allocator that draws memory for elements of type `T` from `pool`.
    #[must_use]
    #[inline]
    pub fn new(pool: &'pool SlotPool) -> Self {
        Self {
            pool,
            _element: PhantomData,
        }
    }

    /// Returns the pool this allocator draws from.
    #[must_use]
    #[inline]
    pub fn pool(&self) -> &'pool SlotPool {
        self.pool
    }

    /// Creates an equal allocator for a different element type, backed by the same pool.
    #[must_use]
    #[inline]
    pub fn rebind<U>(&self) -> PoolAllocator<'pool, U> {
        PoolAllocator::new(self.pool)
    }

    /// The largest number of `T` that a single allocation can hold.
    ///
    /// This is zero if a single `T` does not fit into a slot, either by size or by alignment.
    #[must_use]
    pub fn max_len(&self) -> usize {
        let slot_layout = self.pool.slot_layout();

        if align_of::<T>() > slot_layout.align() {
            return 0;
        }

        // Any number of zero-sized values fits into a slot.
        slot_layout
            .size()
            .checked_div(size_of::<T>())
            .unwrap_or(usize::MAX)
    }

    /// Allocates memory for `n` elements of type `T`.
    ///
    /// The returned memory is uninitialized. If `n` is zero, the pool is not touched and an
    /// empty, dangling slice is returned. Otherwise the memory occupies one slot of the pool
    /// until it is passed to [`deallocate()`](Self::deallocate).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndersizedSlot`] if `n` elements do not fit into one slot and
    /// [`Error::PoolExhausted`] if the pool has no free slot.
    pub fn allocate(&self, n: usize) -> Result<NonNull<[T]>> {
        if n == 0 {
            return Ok(NonNull::slice_from_raw_parts(NonNull::dangling(), 0));
        }

        self.pool.check_fits(array_layout::<T>(n))?;

        if !self.pool.has_available() {
            trace!(
                element = type_name::<T>(),
                n, "pool allocator found no free slot"
            );

            return Err(Error::PoolExhausted {
                capacity: self.pool.capacity(),
            });
        }

        let slot = self.pool.acquire()?;

        Ok(NonNull::slice_from_raw_parts(slot.cast::<T>(), n))
    }

    /// Returns memory obtained from [`allocate()`](Self::allocate) to the pool.
    ///
    /// Any values in the memory are not dropped. Deallocating zero elements does nothing.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `ptr` was returned by `allocate(n)` on this allocator or on an equal one, using the same
    ///   `n` (possibly via a rebound element type with the same pointer).
    /// - The memory has not been deallocated since.
    /// - Nothing accesses the memory after this call.
    pub unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) {
        if n == 0 {
            return;
        }

        // SAFETY: Forwarding the guarantees from the caller - non-empty allocations are slots
        // acquired from this pool.
        unsafe {
            self.pool.release(ptr.cast::<u8>());
        }
    }
}

/// Layout of an array of `n` elements of `T`.
///
/// Requests too large to be described by a layout are reported as the largest layout with the
/// same alignment, which no slot can satisfy either.
fn array_layout<T>(n: usize) -> Layout {
    Layout::array::<T>(n).unwrap_or_else(|_| {
        let align = align_of::<T>();
        let largest_size = (usize::MAX >> 1) & !align.wrapping_sub(1);

        Layout::from_size_align(largest_size, align)
            .expect("isize::MAX rounded down to a power-of-two alignment is a valid layout size")
    })
}

impl<T> Clone for PoolAllocator<'_, T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PoolAllocator<'_, T> {}

impl<T, U> PartialEq<PoolAllocator<'_, U>> for PoolAllocator<'_, T> {
    #[inline]
    fn eq(&self, other: &PoolAllocator<'_, U>) -> bool {
        self.pool.pool_id() == other.pool.pool_id()
    }
}

impl<T> Eq for PoolAllocator<'_, T> {}

impl<T> fmt::Debug for PoolAllocator<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("pool", &self.pool.pool_id())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(
    clippy::undocumented_unsafe_blocks,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use new_zealand::nz;
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(PoolAllocator<'static, u32>: Copy, Clone, Eq, fmt::Debug);
    assert_not_impl_any!(PoolAllocator<'static, u32>: Send, Sync);

    #[test]
    fn allocate_zero_does_not_touch_pool() {
        let pool = SlotPool::new(nz!(8), nz!(1)).unwrap();
        let allocator = PoolAllocator::<u64>::new(&pool);

        let empty = allocator.allocate(0).unwrap();
        assert_eq!(empty.len(), 0);
        assert_eq!(pool.available(), 1);

        // Works even when the pool is exhausted.
        let _held = pool.insert(1_u64).unwrap();
        let empty = allocator.allocate(0).unwrap();
        assert_eq!(empty.len(), 0);
        assert_eq!(pool.available(), 0);

        unsafe { allocator.deallocate(empty.cast(), 0) };
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn allocate_takes_one_slot_per_request() {
        let pool = SlotPool::new(nz!(32), nz!(2)).unwrap();
        let allocator = PoolAllocator::<u32>::new(&pool);

        let a = allocator.allocate(1).unwrap();
        let b = allocator.allocate(8).unwrap();
        assert_ne!(a.cast::<u32>(), b.cast::<u32>());
        assert_eq!(pool.available(), 0);

        assert!(matches!(
            allocator.allocate(1),
            Err(Error::PoolExhausted { capacity: 2 })
        ));

        unsafe {
            allocator.deallocate(a.cast(), 1);
            allocator.deallocate(b.cast(), 8);
        }

        assert!(pool.is_empty());
    }

    #[test]
    fn allocate_more_than_a_slot_is_undersized() {
        let pool = SlotPool::new(nz!(size_of::<i32>()), nz!(4)).unwrap();
        let allocator = PoolAllocator::<i32>::new(&pool);

        assert_eq!(allocator.max_len(), 1);
        assert!(matches!(
            allocator.allocate(2),
            Err(Error::UndersizedSlot { requested, .. }) if requested.size() == 8
        ));
        assert_eq!(pool.available(), 4);
    }

    #[test]
    fn allocate_overflowing_count_is_undersized() {
        let pool = SlotPool::new(nz!(64), nz!(1)).unwrap();
        let allocator = PoolAllocator::<u64>::new(&pool);

        assert!(matches!(
            allocator.allocate(usize::MAX),
            Err(Error::UndersizedSlot { .. })
        ));
    }

    #[test]
    fn allocated_memory_is_usable() {
        let pool = SlotPool::new(nz!(64), nz!(1)).unwrap();
        let allocator = PoolAllocator::<u16>::new(&pool);

        let memory = allocator.allocate(32).unwrap();
        let first = memory.cast::<u16>();

        unsafe {
            for index in 0..32_u16 {
                first.add(usize::from(index)).write(index * 3);
            }

            for index in 0..32_u16 {
                assert_eq!(first.add(usize::from(index)).read(), index * 3);
            }

            allocator.deallocate(first, 32);
        }
    }

    #[test]
    fn max_len_accounts_for_alignment() {
        let pool = SlotPool::builder()
            .slot_size(nz!(64))
            .slot_align(4)
            .capacity(nz!(1))
            .build()
            .unwrap();

        assert_eq!(PoolAllocator::<u32>::new(&pool).max_len(), 16);
        assert_eq!(PoolAllocator::<u64>::new(&pool).max_len(), 0);
        assert_eq!(PoolAllocator::<()>::new(&pool).max_len(), usize::MAX);
    }

    #[test]
    fn allocators_over_same_pool_are_equal() {
        let pool = SlotPool::new(nz!(16), nz!(2)).unwrap();

        let a = PoolAllocator::<u32>::new(&pool);
        let b = PoolAllocator::<u32>::new(&pool);
        let rebound = a.rebind::<String>();

        assert_eq!(a, b);
        assert!(a == rebound);
        assert!(rebound == b);
    }

    #[test]
    fn allocators_over_distinct_pools_are_not_equal() {
        let pool_a = SlotPool::new(nz!(16), nz!(2)).unwrap();
        let pool_b = SlotPool::new(nz!(16), nz!(2)).unwrap();

        let a = PoolAllocator::<u32>::new(&pool_a);
        let b = PoolAllocator::<u32>::new(&pool_b);

        assert_ne!(a, b);
        assert!(a.rebind::<u8>() != b);
    }

    #[test]
    fn rebound_allocator_shares_pool_state() {
        let pool = SlotPool::new(nz!(16), nz!(2)).unwrap();
        let ints = PoolAllocator::<u32>::new(&pool);
        let pairs = ints.rebind::<(u32, u32)>();

        let memory = pairs.allocate(2).unwrap();
        assert_eq!(pool.available(), 1);

        // Deallocation through an equal allocator of another element type.
        unsafe { ints.deallocate(memory.cast(), 2) };
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn debug_output_names_pool() {
        let pool = SlotPool::new(nz!(8), nz!(1)).unwrap();
        let allocator = PoolAllocator::<u8>::new(&pool);

        let debug_output = format!("{allocator:?}");
        assert!(debug_output.contains("PoolAllocator"));
        assert!(debug_output.contains(&pool.pool_id().to_string()));
    }
}
