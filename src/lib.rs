//! # bestfit - A Best-Fit Free-List Allocator
//!
//! This crate provides a small **best-fit allocator** that manages a single
//! growable heap, by default the process heap extended through `sbrk(2)`.
//!
//! ## Overview
//!
//! Every allocation is a block: a fixed-size header followed by the bytes
//! handed to the caller. Blocks are threaded into one list in creation
//! order. Released blocks stay in the list, marked free, and are handed out
//! again to later requests they can hold.
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────┬────────┬──────┬──────────────┬──────┬─────┬───────────────┐
//!   │ hdr  │  A (8) │ hdr  │  B (32) free │ hdr  │ C   │  ... break    │
//!   └──┬───┴────────┴──┬───┴──────────────┴──┬───┴─────┴───────────────┘
//!      │   next        ▲  │   next           ▲
//!      └───────────────┘  └──────────────────┘
//!   head                                   tail
//! ```
//!
//! ## Allocation
//!
//! ```text
//!   allocate(n)
//!     │
//!     ├── n == 0 ─────────────────────────────► null
//!     │
//!     ├── lock
//!     ├── scan list: smallest free block with size >= n
//!     │     ├── found ─► mark used ──────────► payload
//!     │     └── none ──► grow heap by hdr + n
//!     │                   ├── ok ─► append ──► payload
//!     │                   └── fail ──────────► null
//!     └── unlock
//! ```
//!
//! Blocks are never split, merged, or shrunk, and the heap never gives
//! memory back. A freed 64 byte block serving an 8 byte request stays a
//! 64 byte block.
//!
//! ## Crate Structure
//!
//! ```text
//!   bestfit
//!   ├── block      - Block header layout (internal)
//!   ├── scan       - Block list and best-fit search (internal)
//!   ├── grower     - Heap-extension primitives (Sbrk, FixedRegion)
//!   ├── observer   - Diagnostic hook (LogObserver, NoopObserver)
//!   ├── error      - AllocError
//!   └── best_fit   - BestFitAllocator
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use bestfit::{BestFitAllocator, FixedRegion, NoopObserver};
//!
//! let region = FixedRegion::with_capacity(4096).unwrap();
//! let allocator = BestFitAllocator::with_grower_and_observer(region, NoopObserver);
//!
//! let ptr = allocator.zero_allocate(4, 8);
//! assert!(!ptr.is_null());
//!
//! unsafe { allocator.release(ptr) };
//! assert_eq!(allocator.allocate(16), ptr);
//! ```
//!
//! ## Alignment
//!
//! The heap grows by exactly header plus request, so payloads carry no
//! alignment beyond one byte. Use unaligned reads and writes on them.
//!
//! ## Safety
//!
//! Releasing a pointer that did not come from the same allocator, or
//! releasing it twice, is undefined behavior and is not detected.

mod best_fit;
mod block;
mod error;
pub mod grower;
pub mod observer;
mod scan;

pub use best_fit::BestFitAllocator;
pub use block::HEADER_SIZE;
pub use error::{AllocError, Result};
pub use grower::{FixedRegion, HeapGrower, Sbrk};
pub use observer::{AllocEvent, AllocObserver, LogObserver, NoopObserver};
pub use scan::HeapStats;

/// Allocator over the process heap backing the free functions below.
static GLOBAL: BestFitAllocator = BestFitAllocator::new();

/// The process-wide allocator.
pub fn global() -> &'static BestFitAllocator {
  &GLOBAL
}

/// Allocates `size` bytes from the process heap. Null for a zero size or
/// when the heap cannot grow.
pub fn allocate(
  size: usize,
) -> *mut u8 {
  GLOBAL.allocate(size)
}

/// Allocates `count * elem_size` zeroed bytes from the process heap.
pub fn zero_allocate(
  count: usize,
  elem_size: usize,
) -> *mut u8 {
  GLOBAL.zero_allocate(count, elem_size)
}

/// Returns a block to the process heap's free list.
///
/// # Safety
///
/// `ptr` must be null or come from [`allocate`] / [`zero_allocate`] and not
/// have been released yet.
pub unsafe fn release(
  ptr: *mut u8,
) {
  unsafe { GLOBAL.release(ptr) }
}

pub fn stats() -> HeapStats {
  GLOBAL.stats()
}
