//! Verifies that a pool whose memory reservation fails partway releases every slot it had
//! already reserved before reporting the failure.
//!
//! This uses a global allocator that refuses slot-sized allocations after a set number of them,
//! so it lives in its own test binary. All checks run in a single test because the allocator
//! state is process-wide.

use std::alloc::{GlobalAlloc, Layout, System};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use new_zealand::nz;
use slot_pool::{Error, SlotPool};

/// A slot size and alignment nothing else in the test process is expected to allocate.
const SLOT_SIZE: usize = 1000;
const SLOT_ALIGN: usize = 64;

/// How many more slot-sized allocations will succeed.
static SLOT_ALLOCATIONS_REMAINING: AtomicUsize = AtomicUsize::new(usize::MAX);

/// How many slot-sized allocations have been returned to the allocator.
static SLOT_DEALLOCATIONS: AtomicUsize = AtomicUsize::new(0);

struct FailingAllocator;

fn is_slot(layout: Layout) -> bool {
    layout.size() == SLOT_SIZE && layout.align() == SLOT_ALIGN
}

// SAFETY: We delegate all allocation operations to the system allocator and only decide
// whether to fail slot-sized allocations up front by returning null.
unsafe impl GlobalAlloc for FailingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if is_slot(layout)
            && SLOT_ALLOCATIONS_REMAINING
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                    remaining.checked_sub(1)
                })
                .is_err()
        {
            return ptr::null_mut();
        }

        // SAFETY: We forward the call to the system allocator.
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if is_slot(layout) {
            SLOT_DEALLOCATIONS.fetch_add(1, Ordering::SeqCst);
        }

        // SAFETY: We forward the call to the system allocator.
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static ALLOCATOR: FailingAllocator = FailingAllocator;

fn build_pool() -> Result<SlotPool, Error> {
    SlotPool::builder()
        .slot_size(nz!(SLOT_SIZE))
        .slot_align(SLOT_ALIGN)
        .capacity(nz!(5))
        .build()
}

#[test]
fn failed_reservation_releases_reserved_slots() {
    // Only three of the five slots can be reserved.
    SLOT_ALLOCATIONS_REMAINING.store(3, Ordering::SeqCst);
    SLOT_DEALLOCATIONS.store(0, Ordering::SeqCst);

    let result = build_pool();

    assert!(matches!(
        result,
        Err(Error::AllocationFailure {
            capacity: 5,
            reserved: 3,
            ..
        })
    ));
    assert_eq!(SLOT_DEALLOCATIONS.load(Ordering::SeqCst), 3);

    // Once memory is available again, a full reservation succeeds and dropping the pool
    // releases every slot.
    SLOT_ALLOCATIONS_REMAINING.store(usize::MAX, Ordering::SeqCst);
    SLOT_DEALLOCATIONS.store(0, Ordering::SeqCst);

    let pool = build_pool().unwrap();
    assert_eq!(pool.capacity(), 5);
    assert_eq!(SLOT_DEALLOCATIONS.load(Ordering::SeqCst), 0);

    drop(pool);
    assert_eq!(SLOT_DEALLOCATIONS.load(Ordering::SeqCst), 5);
}
