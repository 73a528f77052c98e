use std::alloc::Layout;

use thiserror::Error;

/// Errors that can occur when reserving a pool or obtaining slots from it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The memory backing the pool could not be reserved. No pool was created and any memory
    /// reserved before the failure has already been released.
    #[error(
        "failed to reserve {capacity} slots of {} bytes (align {}): memory reservation failed after {reserved} slots",
        slot_layout.size(),
        slot_layout.align()
    )]
    AllocationFailure {
        /// The layout of each slot the pool attempted to reserve.
        slot_layout: Layout,

        /// The number of slots the pool attempted to reserve.
        capacity: usize,

        /// How many slots had been reserved successfully before the failure.
        reserved: usize,
    },

    /// Every slot of the pool is currently in use. The pool never grows, so the caller must
    /// release a slot (or use a different pool) before trying again.
    #[error("all {capacity} slots of the pool are in use")]
    PoolExhausted {
        /// The total number of slots in the exhausted pool.
        capacity: usize,
    },

    /// The caller requested memory that does not fit into a single slot of the pool, either
    /// because it is too large or because it requires a stricter alignment.
    #[error(
        "requested {} bytes (align {}) but pool slots are {} bytes (align {})",
        requested.size(),
        requested.align(),
        slot_layout.size(),
        slot_layout.align()
    )]
    UndersizedSlot {
        /// The memory layout that was requested.
        requested: Layout,

        /// The layout of each slot in the pool.
        slot_layout: Layout,
    },

    /// The slot size and alignment do not form a valid memory layout.
    #[error("slot size {size} with alignment {align} is not a valid memory layout")]
    InvalidSlotLayout {
        /// The requested slot size in bytes.
        size: usize,

        /// The requested slot alignment in bytes.
        align: usize,
    },
}

/// A specialized `Result` type for slot pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn pool_exhausted_mentions_capacity() {
        let error = Error::PoolExhausted { capacity: 7 };

        assert_eq!(error.to_string(), "all 7 slots of the pool are in use");
    }

    #[test]
    fn undersized_slot_mentions_both_layouts() {
        let error = Error::UndersizedSlot {
            requested: Layout::new::<u64>(),
            slot_layout: Layout::new::<u32>(),
        };

        let message = error.to_string();
        assert!(message.contains("requested 8 bytes"));
        assert!(message.contains("slots are 4 bytes"));
    }

    #[test]
    fn allocation_failure_mentions_progress() {
        let error = Error::AllocationFailure {
            slot_layout: Layout::new::<u32>(),
            capacity: 10,
            reserved: 3,
        };

        let message = error.to_string();
        assert!(message.contains("10 slots of 4 bytes"));
        assert!(message.contains("after 3 slots"));
    }
}
