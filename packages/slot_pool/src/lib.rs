#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A fixed-capacity pool of equally sized memory slots, with a typed allocator view that lets
//! generic containers draw their memory from the pool.
//!
//! This crate provides [`SlotPool`], which reserves all of its slots when it is created and hands
//! them out and takes them back in constant time without ever touching the global allocator
//! again. On top of the raw slots it offers:
//!
//! - [`PoolBox<T>`]: an owning handle to a value constructed in a slot. Dropping it drops the
//!   value and returns the slot.
//! - [`PoolAllocator<T>`]: a cheap copyable allocator view for element type `T` that can be
//!   rebound to other element types while staying on the same pool.
//! - [`PoolList<T>`] and [`PoolVec<T>`]: containers that allocate exclusively through a
//!   [`PoolAllocator`].
//!
//! # Key Features
//!
//! - **Fixed capacity**: Memory for every slot is reserved up front and the pool never grows.
//! - **Constant-time reuse**: Free slots are kept on a stack, so the most recently released slot
//!   is handed out next.
//! - **Checked layouts**: Requests that do not fit into a slot by size or alignment are reported
//!   as [`Error::UndersizedSlot`] instead of overrunning the slot.
//! - **Scoped release**: Handles return their slot automatically when dropped, even on panic.
//! - **Borrow-checked lifetimes**: Allocators, boxes and containers borrow the pool, so none of
//!   them can outlive it.
//!
//! # Example
//!
//! ```rust
//! use new_zealand::nz;
//! use slot_pool::{PoolAllocator, PoolVec, SlotPool};
//!
//! let pool = SlotPool::new(nz!(16), nz!(10)).unwrap();
//!
//! let a = pool.insert(42_i32).unwrap();
//! let b = pool.insert(100_i32).unwrap();
//! assert_eq!(*a + *b, 142);
//!
//! let mut numbers = PoolVec::new_in(PoolAllocator::<i32>::new(&pool));
//! numbers.push(1).unwrap();
//! numbers.push(2).unwrap();
//! numbers.push(3).unwrap();
//!
//! assert_eq!(numbers.iter().sum::<i32>(), 6);
//! assert_eq!(pool.len(), 3);
//! ```
//!
//! # Logging
//!
//! The pool emits `tracing` events: `debug` level when memory is reserved or released and
//! `trace` level when a request is rejected. No subscriber is installed by this crate.

mod allocator;
mod builder;
mod drop_policy;
mod error;
mod pool;
mod pool_box;
mod pool_list;
mod pool_vec;

pub use allocator::PoolAllocator;
pub use builder::*;
pub use drop_policy::*;
pub use error::Error;
pub(crate) use error::Result;
pub use pool::SlotPool;
pub use pool_box::PoolBox;
pub use pool_list::{ListIter, PoolList};
pub use pool_vec::PoolVec;
