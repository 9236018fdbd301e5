//! Integration test for the stack/heap provisioning properties.
//!
//! Note: This is an integration test as we must override the global allocator, which must be done
//! for the entire binary, so this will allow doing so solely for this test. The scenarios run
//! inside a single test function because the allocation counters are binary-wide.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use beacon_buffer::{Backing, ProvisionPolicy};

struct CountingAllocator;

static ALLOCATIONS: AtomicUsize = AtomicUsize::new(0);
static DEALLOCATIONS: AtomicUsize = AtomicUsize::new(0);

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ALLOCATIONS.fetch_add(1, Relaxed);
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        DEALLOCATIONS.fetch_add(1, Relaxed);
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static ALLOC: CountingAllocator = CountingAllocator;

/// Runs `f` and returns its result along with the number of allocations and deallocations that
/// occurred while it ran.
fn counted<T>(f: impl FnOnce() -> T) -> (T, usize, usize) {
    let allocations_before = ALLOCATIONS.load(Relaxed);
    let deallocations_before = DEALLOCATIONS.load(Relaxed);
    let result = f();
    (
        result,
        ALLOCATIONS.load(Relaxed) - allocations_before,
        DEALLOCATIONS.load(Relaxed) - deallocations_before,
    )
}

#[test]
fn provisioning_allocation_behavior() {
    let policy = ProvisionPolicy::new(256);

    // Within the threshold: no heap traffic at all.
    let (backing, allocations, deallocations) = counted(|| {
        policy
            .with_buffer(256, |buffer| buffer.backing())
            .expect("stack provisioning should not fail")
    });
    assert_eq!(backing, Backing::Stack);
    assert_eq!(allocations, 0);
    assert_eq!(deallocations, 0);

    // One byte past the threshold: exactly one allocation, exactly one release.
    let (backing, allocations, deallocations) = counted(|| {
        policy
            .with_buffer(257, |buffer| buffer.backing())
            .expect("heap provisioning should not fail")
    });
    assert_eq!(backing, Backing::Heap);
    assert_eq!(allocations, 1);
    assert_eq!(deallocations, 1);

    // The release happens even when the operation itself reports failure.
    let (outcome, allocations, deallocations) = counted(|| {
        policy
            .with_buffer(257, |_| Err::<(), &str>("operation failed"))
            .expect("heap provisioning should not fail")
    });
    assert!(outcome.is_err());
    assert_eq!(allocations, 1);
    assert_eq!(deallocations, 1);
}
