use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use crate::{PoolAllocator, Result, SlotPool};

/// Owning handle to a value stored in a slot of a [`SlotPool`].
///
/// A `PoolBox<T>` works like a [`Box<T>`] whose memory comes from a pool. When the box is dropped,
/// the value is dropped first and only then is the slot returned to the pool, so the slot can
/// never be handed to someone else while the value is still being torn down.
///
/// The box cannot be copied or cloned, so exactly one owner exists for each occupied slot and the
/// slot is returned exactly once. The `'pool` lifetime ties the box to the pool it came from.
///
/// The box does not pin its value. If a box is leaked with [`std::mem::forget()`], the pool
/// releases the slot memory when it is dropped without ever dropping the value.
///
/// Boxes are created via [`SlotPool::insert()`], [`SlotPool::insert_with()`],
/// [`SlotPool::try_insert_with()`] or [`PoolBox::new_in()`].
///
/// # Examples
///
/// ```rust
/// use new_zealand::nz;
/// use slot_pool::SlotPool;
///
/// let pool = SlotPool::new(nz!(size_of::<Vec<u8>>()), nz!(1)).unwrap();
///
/// {
///     let mut bytes = pool.insert(vec![1_u8, 2, 3]).unwrap();
///     bytes.push(4);
///     assert_eq!(bytes.len(), 4);
///     assert!(!pool.has_available());
/// } // The vector is dropped here and its slot returns to the pool.
///
/// assert!(pool.has_available());
/// ```
///
/// # Thread Safety
///
/// A box borrows its pool, which is not [`Sync`], so boxes can neither be sent nor shared
/// between threads.
pub struct PoolBox<'pool, T> {
    ptr: NonNull<T>,

    pool: &'pool SlotPool,

    // We own a `T` and will drop it.
    _owns: PhantomData<T>,
}

impl<'pool, T> PoolBox<'pool, T> {
    /// Assembles a box from an initialized value in a slot of `pool`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `ptr` points to an initialized `T` stored at the start of a
    /// slot acquired from `pool`, and that nothing else will access or release that slot.
    #[must_use]
    pub(crate) unsafe fn from_raw_parts(ptr: NonNull<T>, pool: &'pool SlotPool) -> Self {
        Self {
            ptr,
            pool,
            _owns: PhantomData,
        }
    }

    /// Moves `value` into a slot obtained through `allocator`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndersizedSlot`][crate::Error::UndersizedSlot] if `T` does not fit into
    /// a slot and [`Error::PoolExhausted`][crate::Error::PoolExhausted] if every slot is in use.
    ///
    /// # Example
    ///
    /// ```rust
    /// use new_zealand::nz;
    /// use slot_pool::{PoolAllocator, PoolBox, SlotPool};
    ///
    /// let pool = SlotPool::new(nz!(16), nz!(2)).unwrap();
    /// let allocator = PoolAllocator::<u64>::new(&pool);
    ///
    /// let value = PoolBox::new_in(7, &allocator).unwrap();
    /// assert_eq!(*value, 7);
    /// ```
    pub fn new_in(value: T, allocator: &PoolAllocator<'pool, T>) -> Result<Self> {
        allocator.pool().insert(value)
    }

    /// Returns a pointer to the value.
    ///
    /// The pointer stays valid until the box is dropped or consumed.
    #[must_use]
    #[inline]
    pub fn ptr(&self) -> NonNull<T> {
        self.ptr
    }

    /// Returns the pool the value is stored in.
    #[must_use]
    #[inline]
    pub fn pool(&self) -> &'pool SlotPool {
        self.pool
    }

    /// Moves the value out of the pool and returns the slot.
    ///
    /// # Example
    ///
    /// ```rust
    /// use new_zealand::nz;
    /// use slot_pool::SlotPool;
    ///
    /// let pool = SlotPool::new(nz!(size_of::<String>()), nz!(1)).unwrap();
    ///
    /// let pooled = pool.insert("moved out".to_string()).unwrap();
    /// let value: String = pooled.into_inner();
    ///
    /// assert_eq!(value, "moved out");
    /// assert!(pool.has_available());
    /// ```
    #[must_use]
    pub fn into_inner(self) -> T {
        // We take over responsibility for the value and the slot, so our `Drop` must not run.
        let this = ManuallyDrop::new(self);

        // SAFETY: The pointer refers to an initialized `T` that we own. Since `this` will never
        // be dropped, the value is not dropped in place afterwards.
        let value = unsafe { this.ptr.read() };

        // SAFETY: The slot came from this pool and we are its only owner. The value has been
        // moved out above, so nothing accesses the slot memory anymore.
        unsafe {
            this.pool.release(this.ptr.cast());
        }

        value
    }
}

impl<T> Deref for PoolBox<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        // SAFETY: The pointer refers to an initialized `T` that we own. Shared access through
        // `&self` cannot conflict with exclusive access through `&mut self`.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for PoolBox<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: The pointer refers to an initialized `T` that we own and `&mut self`
        // guarantees exclusive access.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> AsRef<T> for PoolBox<'_, T> {
    #[inline]
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T> AsMut<T> for PoolBox<'_, T> {
    #[inline]
    fn as_mut(&mut self) -> &mut T {
        self
    }
}

impl<T> Drop for PoolBox<'_, T> {
    fn drop(&mut self) {
        let pool = self.pool;
        let slot = self.ptr.cast::<u8>();

        // The slot goes back to the pool even if dropping the value panics.
        let _release = scopeguard::guard((), |()| {
            // SAFETY: The slot came from this pool and we are its only owner. The guard runs
            // after the value has been dropped in place below.
            unsafe {
                pool.release(slot);
            }
        });

        // SAFETY: The pointer refers to an initialized `T` that we own and nobody will access
        // it after this.
        unsafe {
            ptr::drop_in_place(self.ptr.as_ptr());
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PoolBox<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: fmt::Display> fmt::Display for PoolBox<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::marker::PhantomPinned;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::rc::Rc;

    use new_zealand::nz;
    use static_assertions::assert_not_impl_any;

    use super::*;

    assert_not_impl_any!(PoolBox<'static, u32>: Send, Sync, Clone, Copy);

    /// Test helper that counts how many times it has been dropped.
    struct DropCounter {
        drops: Rc<Cell<usize>>,
    }

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[test]
    fn drop_runs_destructor_once_and_releases_slot() {
        let pool = SlotPool::new(nz!(size_of::<DropCounter>()), nz!(1)).unwrap();
        let drops = Rc::new(Cell::new(0));

        let pooled = pool
            .insert(DropCounter {
                drops: Rc::clone(&drops),
            })
            .unwrap();

        assert_eq!(drops.get(), 0);
        assert!(!pool.has_available());

        drop(pooled);

        assert_eq!(drops.get(), 1);
        assert!(pool.has_available());
    }

    #[test]
    fn destructor_runs_before_slot_is_released() {
        struct ObservesPool<'a> {
            pool: &'a SlotPool,
            available_during_drop: Rc<Cell<Option<usize>>>,
        }

        impl Drop for ObservesPool<'_> {
            fn drop(&mut self) {
                self.available_during_drop.set(Some(self.pool.available()));
            }
        }

        let pool = SlotPool::new(nz!(32), nz!(1)).unwrap();
        let observed = Rc::new(Cell::new(None));

        let pooled = pool
            .insert(ObservesPool {
                pool: &pool,
                available_during_drop: Rc::clone(&observed),
            })
            .unwrap();

        drop(pooled);

        assert_eq!(observed.get(), Some(0));
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn panicking_destructor_still_releases_slot() {
        struct PanicsOnDrop;

        impl Drop for PanicsOnDrop {
            fn drop(&mut self) {
                panic!("destructor failed");
            }
        }

        let pool = SlotPool::new(nz!(8), nz!(1)).unwrap();
        let pooled = pool.insert(PanicsOnDrop).unwrap();

        let result = catch_unwind(AssertUnwindSafe(move || drop(pooled)));

        assert!(result.is_err());
        assert!(pool.has_available());
    }

    #[test]
    fn into_inner_returns_value_without_dropping_it() {
        let pool = SlotPool::new(nz!(size_of::<DropCounter>()), nz!(1)).unwrap();
        let drops = Rc::new(Cell::new(0));

        let pooled = pool
            .insert(DropCounter {
                drops: Rc::clone(&drops),
            })
            .unwrap();

        let value = pooled.into_inner();
        assert_eq!(drops.get(), 0);
        assert!(pool.has_available());

        drop(value);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn deref_and_deref_mut_reach_value() {
        let pool = SlotPool::new(nz!(size_of::<String>()), nz!(1)).unwrap();

        let mut pooled = pool.insert("Hello".to_string()).unwrap();
        pooled.push_str(", World!");

        assert_eq!(&*pooled, "Hello, World!");
        assert_eq!(pooled.as_ref().len(), 13);

        // SAFETY: The box is alive and nothing else accesses the value.
        let through_ptr = unsafe { pooled.ptr().as_ref() };
        assert_eq!(through_ptr, "Hello, World!");
    }

    #[test]
    fn value_lives_inside_the_slot() {
        let pool = SlotPool::new(nz!(8), nz!(1)).unwrap();

        let pooled = pool.insert(5_u64).unwrap();
        let address = pooled.ptr().cast::<u8>();
        drop(pooled);

        // With a single slot, the next acquire hands out the same memory again.
        let slot = pool.acquire().unwrap();
        assert_eq!(slot, address);

        // SAFETY: The slot came from this pool and is released once.
        unsafe { pool.release(slot) };
    }

    #[test]
    fn into_inner_moves_out_values_that_are_not_unpin() {
        struct NotUnpin {
            value: u32,
            _pinned: PhantomPinned,
        }

        let pool = SlotPool::new(nz!(8), nz!(1)).unwrap();

        let pooled = pool
            .insert(NotUnpin {
                value: 3,
                _pinned: PhantomPinned,
            })
            .unwrap();

        // The value was never pinned, so moving it out of its slot is fine.
        let moved = pooled.into_inner();

        assert_eq!(moved.value, 3);
        assert!(pool.has_available());
    }

    #[test]
    fn new_in_uses_allocator_pool() {
        let pool = SlotPool::new(nz!(16), nz!(1)).unwrap();
        let allocator = PoolAllocator::<u32>::new(&pool);

        let pooled = PoolBox::new_in(11, &allocator).unwrap();

        assert_eq!(*pooled, 11);
        assert!(ptr::eq(pooled.pool(), &pool));
        assert!(PoolBox::new_in(12, &allocator).is_err());
    }

    #[test]
    fn nested_boxes_release_all_slots() {
        let pool = SlotPool::new(nz!(64), nz!(3)).unwrap();
        let log = RefCell::new(Vec::new());

        {
            let inner = pool.insert(1_u8).unwrap();
            let outer = pool.insert((inner, 2_u8)).unwrap();
            log.borrow_mut().push(*outer.0 + outer.1);
            assert_eq!(pool.len(), 2);
        }

        assert!(pool.is_empty());
        assert_eq!(*log.borrow(), vec![3]);
    }

    #[test]
    fn formatting_forwards_to_value() {
        let pool = SlotPool::new(nz!(8), nz!(1)).unwrap();
        let pooled = pool.insert(42_i32).unwrap();

        assert_eq!(format!("{pooled}"), "42");
        assert_eq!(format!("{pooled:?}"), "42");
    }
}
