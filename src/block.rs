use std::{mem, ptr};

/// Metadata placed in front of every payload handed out by the allocator.
///
/// The heap grows by exactly `HEADER_SIZE + size` bytes per block, so a
/// header can start at any byte offset. The layout is packed to keep every
/// field access valid regardless of where the previous payload ended.
#[repr(C, packed)]
pub struct Block {
  pub size: usize,
  pub free: bool,
  pub next: *mut Block,
}

/// Bytes between a block header and the payload pointer given to callers.
pub const HEADER_SIZE: usize = mem::size_of::<Block>();

impl Block {
  pub fn new(
    size: usize,
    free: bool,
    next: *mut Block,
  ) -> Self {
    Self { size, free, next }
  }

  /// Writes a fresh in-use header at `at`.
  ///
  /// # Safety
  ///
  /// `at` must point to at least `HEADER_SIZE + size` writable bytes that
  /// nothing else references.
  pub unsafe fn write(
    at: *mut u8,
    size: usize,
  ) -> *mut Block {
    let block = at as *mut Block;
    unsafe { ptr::write(block, Block::new(size, false, ptr::null_mut())) };
    block
  }

  /// Address of the first payload byte of `block`.
  ///
  /// # Safety
  ///
  /// `block` must be a header created by [`Block::write`].
  pub unsafe fn payload(
    block: *mut Block,
  ) -> *mut u8 {
    unsafe { (block as *mut u8).add(HEADER_SIZE) }
  }

  /// Header that precedes a payload pointer.
  ///
  /// # Safety
  ///
  /// `payload` must have been obtained from [`Block::payload`].
  pub unsafe fn from_payload(
    payload: *mut u8,
  ) -> *mut Block {
    unsafe { payload.sub(HEADER_SIZE) as *mut Block }
  }
}
