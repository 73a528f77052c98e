//! Example that demonstrates the basic usage of `SlotPool`.
//!
//! This shows constructing values in pool slots, pool-backed containers and how requests that
//! do not fit into a slot are reported.

use new_zealand::nz;
use slot_pool::{PoolAllocator, PoolVec, SlotPool};
use tracing::Level;

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    println!("=== Slot Pool README Example ===");

    // Ten slots, each large enough for one `i32`.
    let int_pool = SlotPool::new(nz!(size_of::<i32>()), nz!(10)).unwrap();

    let a = int_pool.insert(42_i32).unwrap();
    let b = int_pool.insert(100_i32).unwrap();

    println!("Values: {a}, {b}");
    println!("Slots in use: {}", int_pool.len());

    // A vector keeps all its elements in a single slot, so a slot that holds one `i32` cannot
    // hold a buffer of three.
    let allocator = PoolAllocator::<i32>::new(&int_pool);
    match allocator.allocate(3) {
        Ok(_) => unreachable!("three integers do not fit into one slot"),
        Err(error) => println!("Rejected oversized request: {error}"),
    }

    // Sizing the slots for the whole buffer makes the vector work.
    let vec_pool = SlotPool::new(nz!(3 * size_of::<i32>()), nz!(10)).unwrap();
    let mut numbers = PoolVec::new_in(PoolAllocator::<i32>::new(&vec_pool));

    numbers.push(1).unwrap();
    numbers.push(2).unwrap();
    numbers.push(3).unwrap();

    print!("Vector contents:");
    for number in &numbers {
        print!(" {number}");
    }
    println!();

    drop(a);
    drop(b);
    println!("Slots in use after dropping values: {}", int_pool.len());

    println!("README example completed successfully!");
}
