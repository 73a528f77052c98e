use std::alloc::Layout;
use std::cell::Cell;
use std::marker::PhantomData;
use std::num::NonZero;

use crate::{DropPolicy, Error, Result, SlotPool};

/// Alignment of every slot unless the builder is told otherwise.
///
/// This matches what a system `malloc` guarantees on common 64-bit platforms, so any type that
/// fits into a slot by size will usually also fit by alignment.
pub const DEFAULT_SLOT_ALIGN: usize = 16;

/// Builder for creating an instance of [`SlotPool`].
///
/// [`SlotPool`] requires the slot size and the capacity to be specified at construction time.
/// Use either `.slot_size()` (optionally with `.slot_align()`), `.slot_layout()` or
/// `.slot_layout_of::<T>()` to describe the slots, and `.capacity()` to set the slot count.
///
/// The slot size and capacity are mandatory, whereas other settings are optional.
///
/// # Examples
///
/// Using an explicit slot size:
///
/// ```
/// use new_zealand::nz;
/// use slot_pool::SlotPool;
///
/// let pool = SlotPool::builder()
///     .slot_size(nz!(64))
///     .capacity(nz!(32))
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.slot_size(), 64);
/// assert_eq!(pool.capacity(), 32);
/// ```
///
/// Using type-based layout:
///
/// ```
/// use new_zealand::nz;
/// use slot_pool::SlotPool;
///
/// let pool = SlotPool::builder()
///     .slot_layout_of::<u64>()
///     .capacity(nz!(8))
///     .build()
///     .unwrap();
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) but not thread-safe ([`Sync`]).
#[derive(Debug)]
#[must_use]
pub struct SlotPoolBuilder {
    slot_size: Option<NonZero<usize>>,
    slot_align: usize,
    capacity: Option<NonZero<usize>>,
    drop_policy: DropPolicy,

    // Prevents Sync while allowing Send - builders are thread-mobile but not thread-safe
    _not_sync: PhantomData<Cell<()>>,
}

impl SlotPoolBuilder {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            slot_size: None,
            slot_align: DEFAULT_SLOT_ALIGN,
            capacity: None,
            drop_policy: DropPolicy::default(),
            _not_sync: PhantomData,
        }
    }

    /// Sets the size in bytes of every slot in the pool.
    #[inline]
    pub fn slot_size(mut self, size: NonZero<usize>) -> Self {
        self.slot_size = Some(size);
        self
    }

    /// Sets the alignment in bytes of every slot in the pool.
    ///
    /// Defaults to [`DEFAULT_SLOT_ALIGN`]. The alignment must be a power of two; this is
    /// validated by [`build()`](Self::build).
    #[inline]
    pub fn slot_align(mut self, align: usize) -> Self {
        self.slot_align = align;
        self
    }

    /// Sets both the slot size and the slot alignment from a memory layout.
    ///
    /// # Panics
    ///
    /// Panics if the layout has zero size.
    #[inline]
    pub fn slot_layout(mut self, layout: Layout) -> Self {
        let size = NonZero::new(layout.size()).expect("SlotPool must have non-zero slot size");
        self.slot_size = Some(size);
        self.slot_align = layout.align();
        self
    }

    /// Sizes and aligns the slots to hold exactly one `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is a zero-sized type.
    #[inline]
    pub fn slot_layout_of<T>(self) -> Self {
        self.slot_layout(Layout::new::<T>())
    }

    /// Sets the number of slots the pool reserves up front. The pool never grows beyond this.
    #[inline]
    pub fn capacity(mut self, capacity: NonZero<usize>) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Sets the [drop policy][DropPolicy] for the pool. This governs how to treat slots that
    /// are still acquired when the pool is dropped.
    #[inline]
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Reserves the memory for every slot and builds the pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSlotLayout`] if the slot size and alignment do not form a valid
    /// memory layout and [`Error::AllocationFailure`] if the memory could not be reserved.
    ///
    /// # Panics
    ///
    /// Panics if the slot size or the capacity has not been set.
    pub fn build(self) -> Result<SlotPool> {
        let size = self
            .slot_size
            .expect("slot size must be set using .slot_size(), .slot_layout() or .slot_layout_of::<T>() before calling .build()");
        let capacity = self
            .capacity
            .expect("capacity must be set using .capacity() before calling .build()");

        let slot_layout =
            Layout::from_size_align(size.get(), self.slot_align).map_err(|_| {
                Error::InvalidSlotLayout {
                    size: size.get(),
                    align: self.slot_align,
                }
            })?;

        SlotPool::new_inner(slot_layout, capacity, self.drop_policy)
    }
}
