use std::alloc::{Layout, alloc, dealloc};
use std::cell::RefCell;
use std::num::NonZero;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use scopeguard::ScopeGuard;
use tracing::{debug, trace};

use crate::{DropPolicy, Error, PoolBox, Result, SlotPoolBuilder};

/// Global counter for generating unique pool IDs.
static POOL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generates a unique pool ID.
fn generate_pool_id() -> u64 {
    POOL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A fixed-capacity pool of equally sized memory slots.
///
/// All slots are reserved when the pool is created and the pool never grows. Slots are handed
/// out and returned in constant time, either as raw memory via [`acquire()`](Self::acquire) and
/// [`release()`](Self::release) or as typed values owned by a [`PoolBox`] via
/// [`insert()`](Self::insert) and friends. Generic containers reach the pool through a
/// [`PoolAllocator`][crate::PoolAllocator].
///
/// Every operation takes `&self`, so any number of allocators and boxes may borrow the same pool
/// at the same time. The borrow checker guarantees that none of them outlive the pool.
///
/// # Examples
///
/// ```rust
/// use new_zealand::nz;
/// use slot_pool::SlotPool;
///
/// let pool = SlotPool::new(nz!(size_of::<i32>()), nz!(2)).unwrap();
///
/// let a = pool.insert(42_i32).unwrap();
/// let b = pool.insert(100_i32).unwrap();
///
/// assert_eq!(*a, 42);
/// assert_eq!(*b, 100);
/// assert!(!pool.has_available());
///
/// // Dropping a box destroys the value and returns the slot to the pool.
/// drop(a);
/// assert!(pool.has_available());
/// ```
///
/// # Thread Safety
///
/// The pool is thread-mobile ([`Send`]) and can be moved between threads while nothing borrows
/// it, but it is not thread-safe ([`Sync`]) and cannot be shared between threads.
#[derive(Debug)]
pub struct SlotPool {
    /// Identifies the pool so allocators can tell whether they refer to the same pool.
    pool_id: u64,

    /// The memory layout of every slot.
    slot_layout: Layout,

    /// Every region reserved at creation time. We own these and release them when dropped.
    slots: Box<[NonNull<u8>]>,

    /// Stack of slots that are not currently acquired. Its capacity is reserved up front so
    /// pushing a released slot never reallocates.
    free_slots: RefCell<Vec<NonNull<u8>>>,

    /// Drop policy that determines how the pool handles outstanding slots when dropped.
    drop_policy: DropPolicy,
}

// SAFETY: The pool exclusively owns the memory behind every slot pointer and does not touch the
// contents of the slots. Anything that borrows the pool (and thus the slot memory) prevents it
// from being moved, so moving the pool to another thread cannot race with slot access.
unsafe impl Send for SlotPool {}

impl SlotPool {
    /// Creates a builder for configuring and constructing a [`SlotPool`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use new_zealand::nz;
    /// use slot_pool::SlotPool;
    ///
    /// let pool = SlotPool::builder()
    ///     .slot_size(nz!(24))
    ///     .slot_align(8)
    ///     .capacity(nz!(100))
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(pool.available(), 100);
    /// ```
    #[inline]
    pub fn builder() -> SlotPoolBuilder {
        SlotPoolBuilder::new()
    }

    /// Reserves `capacity` slots of `slot_size` bytes each, aligned to
    /// [`DEFAULT_SLOT_ALIGN`][crate::DEFAULT_SLOT_ALIGN].
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailure`] if the memory could not be reserved. Any slots
    /// reserved before the failure are released again before returning.
    pub fn new(slot_size: NonZero<usize>, capacity: NonZero<usize>) -> Result<Self> {
        Self::builder()
            .slot_size(slot_size)
            .capacity(capacity)
            .build()
    }

    /// Creates a new [`SlotPool`] with the specified configuration.
    ///
    /// This method is used internally by the builder to construct the actual pool.
    ///
    /// # Panics
    ///
    /// Panics if the layout has zero size.
    pub(crate) fn new_inner(
        slot_layout: Layout,
        capacity: NonZero<usize>,
        drop_policy: DropPolicy,
    ) -> Result<Self> {
        assert!(
            slot_layout.size() > 0,
            "SlotPool must have non-zero slot size"
        );

        let allocation_failure = |reserved: usize| Error::AllocationFailure {
            slot_layout,
            capacity: capacity.get(),
            reserved,
        };

        // The bookkeeping itself may be too large to reserve if the capacity is absurd.
        let mut slots = Vec::new();
        let mut free_slots = Vec::new();
        if slots.try_reserve_exact(capacity.get()).is_err()
            || free_slots.try_reserve_exact(capacity.get()).is_err()
        {
            debug!(
                slot_size = slot_layout.size(),
                capacity = capacity.get(),
                "failed to reserve slot pool bookkeeping"
            );
            return Err(allocation_failure(0));
        }

        for _ in 0..capacity.get() {
            // SAFETY: The layout has a non-zero size, guarded by the assertion above.
            let Some(slot) = NonNull::new(unsafe { alloc(slot_layout) }) else {
                let reserved = slots.len();

                // SAFETY: Every pointer in `slots` came from `alloc()` with this same layout
                // and has not been handed out to anyone yet.
                unsafe {
                    release_regions(&slots, slot_layout);
                }

                debug!(
                    slot_size = slot_layout.size(),
                    capacity = capacity.get(),
                    reserved,
                    "failed to reserve slot pool memory"
                );

                return Err(allocation_failure(reserved));
            };

            slots.push(slot);
        }

        free_slots.extend_from_slice(&slots);

        let pool_id = generate_pool_id();

        debug!(
            pool_id,
            slot_size = slot_layout.size(),
            slot_align = slot_layout.align(),
            capacity = capacity.get(),
            "reserved slot pool"
        );

        Ok(Self {
            pool_id,
            slot_layout,
            slots: slots.into_boxed_slice(),
            free_slots: RefCell::new(free_slots),
            drop_policy,
        })
    }

    /// Returns the memory layout of every slot in this pool.
    #[must_use]
    #[inline]
    pub fn slot_layout(&self) -> Layout {
        self.slot_layout
    }

    /// Returns the size in bytes of every slot in this pool.
    #[must_use]
    #[inline]
    pub fn slot_size(&self) -> usize {
        self.slot_layout.size()
    }

    /// The total number of slots in the pool, whether acquired or not.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The number of slots that can currently be acquired.
    #[must_use]
    #[inline]
    pub fn available(&self) -> usize {
        self.free_slots.borrow().len()
    }

    /// The number of slots that are currently acquired.
    ///
    /// # Example
    ///
    /// ```rust
    /// use new_zealand::nz;
    /// use slot_pool::SlotPool;
    ///
    /// let pool = SlotPool::new(nz!(8), nz!(4)).unwrap();
    /// assert_eq!(pool.len(), 0);
    ///
    /// let item = pool.insert(1_u64).unwrap();
    /// assert_eq!(pool.len(), 1);
    /// assert_eq!(pool.available(), 3);
    /// ```
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Mutating this to a wrong count is caught by integrity checks only.
    #[inline]
    pub fn len(&self) -> usize {
        // Cannot wrap around because the free stack never holds more than `capacity` slots.
        self.capacity().wrapping_sub(self.available())
    }

    /// Whether no slot is currently acquired.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.available() == self.capacity()
    }

    /// Whether [`acquire()`](Self::acquire) would currently succeed.
    #[must_use]
    #[inline]
    pub fn has_available(&self) -> bool {
        !self.free_slots.borrow().is_empty()
    }

    /// Takes one free slot out of the pool and returns a pointer to its memory.
    ///
    /// The memory is uninitialized and valid for reads and writes of
    /// [`slot_size()`](Self::slot_size) bytes, aligned to the pool's slot alignment. No ordering
    /// is guaranteed between slots that are equally free.
    ///
    /// Prefer [`insert()`](Self::insert), which returns an owning [`PoolBox`] that releases the
    /// slot automatically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolExhausted`] if every slot is in use.
    ///
    /// # Example
    ///
    /// ```rust
    /// use new_zealand::nz;
    /// use slot_pool::SlotPool;
    ///
    /// let pool = SlotPool::new(nz!(4), nz!(1)).unwrap();
    ///
    /// let slot = pool.acquire().unwrap();
    /// assert!(pool.acquire().is_err());
    ///
    /// // SAFETY: The slot came from this pool and is released exactly once.
    /// unsafe { pool.release(slot) };
    /// ```
    pub fn acquire(&self) -> Result<NonNull<u8>> {
        let slot = self.free_slots.borrow_mut().pop();

        slot.ok_or_else(|| {
            trace!(
                pool_id = self.pool_id,
                capacity = self.capacity(),
                "slot pool exhausted"
            );

            Error::PoolExhausted {
                capacity: self.capacity(),
            }
        })
    }

    /// Returns a slot previously obtained from [`acquire()`](Self::acquire) to the pool.
    ///
    /// The slot is not dropped or cleared - if it holds a value that needs dropping, the caller
    /// must drop it first.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if the slot does not belong to this pool or if more slots are
    /// released than were acquired.
    ///
    /// The ownership check scans every slot of the pool, so in debug builds this takes time
    /// linear in the capacity. Release builds skip the check and take constant time.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `slot` was returned by `acquire()` on this same pool.
    /// - `slot` has not been released since it was acquired.
    /// - Nothing accesses the slot memory after this call.
    pub unsafe fn release(&self, slot: NonNull<u8>) {
        debug_assert!(
            self.owns(slot),
            "attempted to release {slot:?} which is not a slot of pool {}",
            self.pool_id
        );

        let mut free_slots = self.free_slots.borrow_mut();

        debug_assert!(
            free_slots.len() < self.slots.len(),
            "released more slots than were acquired from pool {}",
            self.pool_id
        );

        // Never reallocates because we reserved room for every slot at creation time.
        free_slots.push(slot);
    }

    /// Moves a value into a slot of the pool and returns a box that owns it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndersizedSlot`] if `T` does not fit into a slot and
    /// [`Error::PoolExhausted`] if every slot is in use. The value is dropped in both cases.
    ///
    /// # Example
    ///
    /// ```rust
    /// use new_zealand::nz;
    /// use slot_pool::SlotPool;
    ///
    /// let pool = SlotPool::new(nz!(size_of::<String>()), nz!(4)).unwrap();
    ///
    /// let mut greeting = pool.insert("Hello".to_string()).unwrap();
    /// greeting.push_str(", World!");
    ///
    /// assert_eq!(&*greeting, "Hello, World!");
    /// ```
    pub fn insert<T>(&self, value: T) -> Result<PoolBox<'_, T>> {
        self.try_insert_with(|| Ok(value))
    }

    /// Acquires a slot and then constructs a value in it by calling `f`.
    ///
    /// If `f` panics, the slot is returned to the pool before the panic continues to unwind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndersizedSlot`] if `T` does not fit into a slot and
    /// [`Error::PoolExhausted`] if every slot is in use. `f` is not called in either case.
    pub fn insert_with<T>(&self, f: impl FnOnce() -> T) -> Result<PoolBox<'_, T>> {
        self.try_insert_with(|| Ok(f()))
    }

    /// Acquires a slot and then constructs a value in it by calling a fallible `f`.
    ///
    /// If `f` returns an error or panics, the slot is returned to the pool before the failure
    /// propagates. Errors of the pool itself are converted into the caller's error type.
    ///
    /// # Errors
    ///
    /// Returns the error of `f` if construction fails, or the converted [`Error::UndersizedSlot`]
    /// or [`Error::PoolExhausted`] if no suitable slot could be acquired (in which case `f` is
    /// not called).
    ///
    /// # Example
    ///
    /// ```rust
    /// use new_zealand::nz;
    /// use slot_pool::{Error, SlotPool};
    ///
    /// #[derive(Debug)]
    /// enum ParseError {
    ///     Pool(Error),
    ///     Invalid,
    /// }
    ///
    /// impl From<Error> for ParseError {
    ///     fn from(error: Error) -> Self {
    ///         Self::Pool(error)
    ///     }
    /// }
    ///
    /// let pool = SlotPool::new(nz!(8), nz!(1)).unwrap();
    ///
    /// let failed = pool.try_insert_with(|| "x".parse::<u64>().map_err(|_| ParseError::Invalid));
    /// assert!(matches!(failed, Err(ParseError::Invalid)));
    ///
    /// // The slot was returned, so the next attempt can use it.
    /// let parsed = pool
    ///     .try_insert_with(|| "42".parse::<u64>().map_err(|_| ParseError::Invalid))
    ///     .unwrap();
    /// assert_eq!(*parsed, 42);
    /// ```
    pub fn try_insert_with<T, E>(
        &self,
        f: impl FnOnce() -> std::result::Result<T, E>,
    ) -> std::result::Result<PoolBox<'_, T>, E>
    where
        E: From<Error>,
    {
        self.check_fits(Layout::new::<T>())?;

        let slot = self.acquire()?;

        // Returns the slot to the pool if the constructor fails or panics.
        let guard = scopeguard::guard(slot, |slot| {
            // SAFETY: We just acquired the slot from this pool and nobody else has seen it.
            unsafe {
                self.release(slot);
            }
        });

        let value = f()?;

        let ptr = ScopeGuard::into_inner(guard).cast::<T>();

        // SAFETY: The slot is valid for writes of `T` because `check_fits()` verified that both
        // the size and the alignment of `T` fit into a slot.
        unsafe {
            ptr.write(value);
        }

        // SAFETY: The pointer refers to an initialized `T` in a slot acquired from this pool
        // that nothing else references.
        Ok(unsafe { PoolBox::from_raw_parts(ptr, self) })
    }

    /// Verifies that memory with the requested layout fits into one slot.
    pub(crate) fn check_fits(&self, requested: Layout) -> Result<()> {
        if requested.size() <= self.slot_layout.size()
            && requested.align() <= self.slot_layout.align()
        {
            return Ok(());
        }

        trace!(
            pool_id = self.pool_id,
            requested_size = requested.size(),
            requested_align = requested.align(),
            "request does not fit into a slot"
        );

        Err(Error::UndersizedSlot {
            requested,
            slot_layout: self.slot_layout,
        })
    }

    #[must_use]
    pub(crate) fn pool_id(&self) -> u64 {
        self.pool_id
    }

    /// Whether the pointer is the start of one of our slots. Linear time, for debug checks.
    fn owns(&self, ptr: NonNull<u8>) -> bool {
        self.slots.contains(&ptr)
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(debug_assertions)]
    #[allow(dead_code, reason = "only called from tests")]
    pub(crate) fn integrity_check(&self) {
        let free_slots = self.free_slots.borrow();

        assert!(
            free_slots.len() <= self.slots.len(),
            "pool {} has {} free slots but a capacity of only {}",
            self.pool_id,
            free_slots.len(),
            self.slots.len()
        );

        for (index, slot) in free_slots.iter().enumerate() {
            assert!(
                self.owns(*slot),
                "free slot {slot:?} does not belong to pool {}",
                self.pool_id
            );

            let later = free_slots
                .get(index.wrapping_add(1)..)
                .expect("index is in bounds so the range after it is valid");

            assert!(
                !later.contains(slot),
                "slot {slot:?} is free more than once in pool {}",
                self.pool_id
            );
        }
    }
}

impl Drop for SlotPool {
    fn drop(&mut self) {
        let outstanding = self.len();

        // SAFETY: Every pointer in `slots` came from `alloc()` with `slot_layout`. Nothing can
        // still borrow the pool, so the only remaining users are raw slots that were never
        // released, which the caller gave up on by dropping the pool.
        unsafe {
            release_regions(&self.slots, self.slot_layout);
        }

        debug!(
            pool_id = self.pool_id,
            capacity = self.slots.len(),
            outstanding,
            "released slot pool"
        );

        // We do this check at the end so we clean up the memory first.
        //
        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the original panic was, leading to debug difficulties.
        if self.drop_policy == DropPolicy::MustNotHaveOutstandingSlots && !thread::panicking() {
            assert!(
                outstanding == 0,
                "dropped slot pool {} with {outstanding} outstanding slots with a policy that says all slots must be released first",
                self.pool_id
            );
        }
    }
}

/// Releases the memory of every region back to the global allocator.
///
/// # Safety
///
/// Every pointer must have been returned by `alloc()` with `layout` and must not have been
/// deallocated already.
unsafe fn release_regions(regions: &[NonNull<u8>], layout: Layout) {
    for region in regions {
        // SAFETY: Forwarding the guarantees from the caller.
        unsafe {
            dealloc(region.as_ptr(), layout);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::indexing_slicing,
    clippy::cast_possible_truncation,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::rc::Rc;

    use new_zealand::nz;
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(SlotPool: Send, std::fmt::Debug);
    assert_not_impl_any!(SlotPool: Sync, Clone);

    #[test]
    fn smoke_test() {
        let pool = SlotPool::new(nz!(8), nz!(3)).unwrap();

        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.available(), 3);
        assert_eq!(pool.len(), 0);
        assert!(pool.is_empty());
        assert!(pool.has_available());

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.available(), 1);
        assert!(!pool.is_empty());

        unsafe {
            pool.release(a);
            pool.release(b);
        }

        assert!(pool.is_empty());
        pool.integrity_check();
    }

    #[test]
    fn acquire_returns_distinct_slots_until_exhausted() {
        for capacity in [1_usize, 2, 5, 64] {
            let pool = SlotPool::new(nz!(16), NonZero::new(capacity).unwrap()).unwrap();

            let slots = (0..capacity)
                .map(|_| pool.acquire().unwrap())
                .collect::<HashSet<_>>();

            assert_eq!(slots.len(), capacity);
            assert!(!pool.has_available());
            assert!(matches!(
                pool.acquire(),
                Err(Error::PoolExhausted { capacity: c }) if c == capacity
            ));

            for slot in slots {
                unsafe { pool.release(slot) };
            }

            pool.integrity_check();
        }
    }

    #[test]
    fn release_after_exhaustion_makes_slot_available() {
        let pool = SlotPool::new(nz!(size_of::<i32>()), nz!(2)).unwrap();

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert!(pool.acquire().is_err());

        unsafe { pool.release(a) };
        assert!(pool.has_available());

        let c = pool.acquire().unwrap();
        assert!(!pool.has_available());
        assert!(c == a || c == b);

        unsafe {
            pool.release(b);
            pool.release(c);
        }
    }

    #[test]
    fn slots_are_aligned_and_writable() {
        let pool = SlotPool::builder()
            .slot_size(nz!(64))
            .slot_align(64)
            .capacity(nz!(4))
            .build()
            .unwrap();

        let slots = (0..4).map(|_| pool.acquire().unwrap()).collect::<Vec<_>>();

        for (index, slot) in slots.iter().enumerate() {
            assert_eq!(slot.as_ptr().addr() % 64, 0);
            unsafe { slot.as_ptr().write_bytes(index as u8, 64) };
        }

        // Writing a full slot must not clobber its neighbors.
        for (index, slot) in slots.iter().enumerate() {
            let bytes = unsafe { std::slice::from_raw_parts(slot.as_ptr(), 64) };
            assert!(bytes.iter().all(|byte| *byte == index as u8));
        }

        for slot in slots {
            unsafe { pool.release(slot) };
        }
    }

    #[test]
    fn impossible_reservation_is_allocation_failure() {
        let result = SlotPool::new(nz!(1 << 62), nz!(3));

        assert!(matches!(
            result,
            Err(Error::AllocationFailure {
                capacity: 3,
                reserved: 0,
                ..
            })
        ));
    }

    #[test]
    fn insert_and_drop_returns_slot() {
        let pool = SlotPool::new(nz!(size_of::<i32>()), nz!(1)).unwrap();

        let value = pool.insert(42_i32).unwrap();
        assert_eq!(*value, 42);
        assert!(!pool.has_available());

        drop(value);
        assert!(pool.has_available());
    }

    #[test]
    fn insert_into_exhausted_pool_drops_value() {
        struct Counted(Rc<Cell<i32>>);

        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let dropped = Rc::new(Cell::new(0));

        let pool = SlotPool::new(nz!(size_of::<Counted>()), nz!(1)).unwrap();

        let first = pool.insert(Counted(Rc::clone(&dropped))).unwrap();
        let second = pool.insert(Counted(Rc::clone(&dropped)));

        assert!(matches!(second, Err(Error::PoolExhausted { capacity: 1 })));
        assert_eq!(dropped.get(), 1);

        drop(first);
        assert_eq!(dropped.get(), 2);
    }

    #[test]
    fn insert_oversized_type_is_undersized_slot() {
        let pool = SlotPool::new(nz!(4), nz!(1)).unwrap();

        let result = pool.insert(7_u64);

        assert!(matches!(result, Err(Error::UndersizedSlot { .. })));
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn insert_overaligned_type_is_undersized_slot() {
        #[repr(align(32))]
        struct Overaligned(#[allow(dead_code, reason = "only the layout matters")] u8);

        let pool = SlotPool::new(nz!(64), nz!(1)).unwrap();

        let result = pool.insert(Overaligned(1));

        assert!(matches!(result, Err(Error::UndersizedSlot { .. })));
    }

    #[test]
    fn insert_with_does_not_call_constructor_when_exhausted() {
        let pool = SlotPool::new(nz!(8), nz!(1)).unwrap();
        let _held = pool.insert(1_u64).unwrap();

        let called = Cell::new(false);
        let result = pool.insert_with(|| {
            called.set(true);
            2_u64
        });

        assert!(result.is_err());
        assert!(!called.get());
    }

    #[test]
    fn try_insert_with_error_releases_slot() {
        let pool = SlotPool::new(nz!(8), nz!(1)).unwrap();

        let result = pool.try_insert_with(|| -> std::result::Result<u64, Error> {
            Err(Error::PoolExhausted { capacity: 0 })
        });

        assert!(result.is_err());
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn insert_with_panic_releases_slot() {
        let pool = SlotPool::new(nz!(8), nz!(1)).unwrap();

        let result = catch_unwind(AssertUnwindSafe(|| {
            pool.insert_with(|| -> u64 { panic!("constructor failed") })
        }));

        assert!(result.is_err());
        assert_eq!(pool.available(), 1);
        pool.integrity_check();
    }

    #[test]
    fn drop_with_outstanding_slots_is_allowed_by_default() {
        let pool = SlotPool::new(nz!(8), nz!(2)).unwrap();
        let _leaked = pool.acquire().unwrap();

        drop(pool);
    }

    #[test]
    fn drop_without_outstanding_slots_does_not_panic_if_policy_must_not_have_outstanding() {
        let pool = SlotPool::builder()
            .slot_size(nz!(8))
            .capacity(nz!(2))
            .drop_policy(DropPolicy::MustNotHaveOutstandingSlots)
            .build()
            .unwrap();

        let value = pool.insert(5_u64).unwrap();
        drop(value);

        drop(pool);
    }

    #[test]
    #[should_panic]
    fn drop_with_outstanding_slots_panics_if_policy_must_not_have_outstanding() {
        let pool = SlotPool::builder()
            .slot_size(nz!(8))
            .capacity(nz!(2))
            .drop_policy(DropPolicy::MustNotHaveOutstandingSlots)
            .build()
            .unwrap();

        let _leaked = pool.acquire().unwrap();

        drop(pool);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic]
    fn release_foreign_slot_panics_in_debug() {
        let pool_a = SlotPool::new(nz!(8), nz!(1)).unwrap();
        let pool_b = SlotPool::new(nz!(8), nz!(1)).unwrap();

        let slot = pool_a.acquire().unwrap();

        unsafe { pool_b.release(slot) };
    }

    #[test]
    fn pool_ids_are_unique() {
        let a = SlotPool::new(nz!(8), nz!(1)).unwrap();
        let b = SlotPool::new(nz!(8), nz!(1)).unwrap();

        assert_ne!(a.pool_id(), b.pool_id());
    }

    #[test]
    fn pool_can_move_between_threads() {
        let pool = SlotPool::new(nz!(8), nz!(2)).unwrap();

        let handle = std::thread::spawn(move || {
            let value = pool.insert(9_u64).unwrap();
            *value
        });

        assert_eq!(handle.join().unwrap(), 9);
    }
}
