//! Global allocator selection.
//!
//! jemalloc is used on unix systems when the `jemalloc` feature is enabled, and the system
//! allocator otherwise.

#[cfg(all(feature = "jemalloc", unix))]
type AllocatorInner = tikv_jemallocator::Jemalloc;
#[cfg(not(all(feature = "jemalloc", unix)))]
type AllocatorInner = std::alloc::System;

/// The global allocator of the node.
pub(crate) type Allocator = AllocatorInner;

/// Creates a new [allocator][Allocator].
pub(crate) const fn new_allocator() -> Allocator {
    AllocatorInner {}
}
