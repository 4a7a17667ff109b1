use std::{
  alloc::{self, Layout},
  ptr::NonNull,
};

use libc::{c_void, intptr_t, sbrk};

/// Primitive that extends a contiguous heap.
///
/// Every successful call returns the start of `increment` fresh bytes that
/// directly follow the previous region. Regions are never moved or
/// reclaimed.
pub trait HeapGrower {
  /// Extends the heap by `increment` bytes, or returns `None` when it
  /// cannot grow any further.
  ///
  /// # Safety
  ///
  /// Implementations may touch process-wide state (the program break).
  /// Callers must serialize calls against every other user of that state.
  unsafe fn grow(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>>;
}

/// Grows the real process heap by moving the program break with `sbrk(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sbrk;

impl HeapGrower for Sbrk {
  unsafe fn grow(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>> {
    let increment = intptr_t::try_from(increment).ok()?;
    let address = unsafe { sbrk(increment) };

    if address == usize::MAX as *mut c_void {
      return None;
    }

    NonNull::new(address as *mut u8)
  }
}

/// A bounded heap carved out of one up-front reservation.
///
/// The reservation is made once and never relocated, so growth is a bump of
/// an offset. Useful for independent heaps that must not disturb the
/// process break.
pub struct FixedRegion {
  base: NonNull<u8>,
  offset: usize,
  layout: Layout,
}

// The region is exclusively owned; the allocator guard serializes `grow`.
unsafe impl Send for FixedRegion {}

impl FixedRegion {
  pub fn with_capacity(
    capacity: usize,
  ) -> Option<Self> {
    let layout = Layout::from_size_align(capacity.max(1), 1).ok()?;
    let base = NonNull::new(unsafe { alloc::alloc(layout) })?;

    Some(Self {
      base,
      offset: 0,
      layout,
    })
  }

  pub fn capacity(&self) -> usize {
    self.layout.size()
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.offset
  }
}

impl HeapGrower for FixedRegion {
  unsafe fn grow(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>> {
    let end = self.offset.checked_add(increment)?;

    if end > self.capacity() {
      return None;
    }

    let start = unsafe { self.base.add(self.offset) };
    self.offset = end;

    Some(start)
  }
}

impl Drop for FixedRegion {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) };
  }
}
