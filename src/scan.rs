use std::ptr;

use crate::block::{Block, HEADER_SIZE};

/// Append-only intrusive list of every block the heap has produced.
///
/// Blocks are linked in creation order, which is also address order since
/// the heap only grows upward.
pub struct BlockList {
  head: *mut Block,
  tail: *mut Block,
}

// The list only stores addresses into heap memory owned by the allocator;
// all access goes through the allocator's guard.
unsafe impl Send for BlockList {}

/// Point-in-time summary of the block list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub blocks: usize,
  pub free_blocks: usize,
  pub payload_bytes: usize,
  pub free_bytes: usize,
}

impl HeapStats {
  /// Total bytes taken from the heap-extension primitive, headers included.
  pub fn heap_bytes(&self) -> usize {
    self.payload_bytes + self.blocks * HEADER_SIZE
  }
}

impl BlockList {
  pub const fn new() -> Self {
    Self {
      head: ptr::null_mut(),
      tail: ptr::null_mut(),
    }
  }

  /// Smallest free block with at least `size` usable bytes.
  ///
  /// Walks the whole list; of several equally small candidates the one
  /// created first wins.
  pub fn find_best_fit(
    &self,
    size: usize,
  ) -> Option<*mut Block> {
    let mut best: Option<(*mut Block, usize)> = None;

    for block in self.iter() {
      let (free, block_size) = unsafe { ((*block).free, (*block).size) };

      if !free || block_size < size {
        continue;
      }

      match best {
        Some((_, best_size)) if best_size <= block_size => {},
        _ => best = Some((block, block_size)),
      }
    }

    best.map(|(block, _)| block)
  }

  /// Links `block` after the current tail.
  ///
  /// # Safety
  ///
  /// `block` must be a freshly written header that is not yet in any list.
  pub unsafe fn append(
    &mut self,
    block: *mut Block,
  ) {
    unsafe {
      (*block).next = ptr::null_mut();

      if self.head.is_null() {
        self.head = block;
      } else {
        (*self.tail).next = block;
      }
    }

    self.tail = block;
  }

  pub fn iter(&self) -> Iter<'_> {
    Iter {
      current: self.head,
      _list: self,
    }
  }

  pub fn stats(&self) -> HeapStats {
    self.iter().fold(HeapStats::default(), |mut stats, block| {
      let (free, size) = unsafe { ((*block).free, (*block).size) };

      stats.blocks += 1;
      stats.payload_bytes += size;
      if free {
        stats.free_blocks += 1;
        stats.free_bytes += size;
      }

      stats
    })
  }

  #[cfg(test)]
  pub(crate) fn head(&self) -> *mut Block {
    self.head
  }

  #[cfg(test)]
  pub(crate) fn tail(&self) -> *mut Block {
    self.tail
  }
}

impl Default for BlockList {
  fn default() -> Self {
    Self::new()
  }
}

pub struct Iter<'a> {
  current: *mut Block,
  _list: &'a BlockList,
}

impl Iterator for Iter<'_> {
  type Item = *mut Block;

  fn next(&mut self) -> Option<Self::Item> {
    if self.current.is_null() {
      return None;
    }

    let block = self.current;
    self.current = unsafe { (*block).next };
    Some(block)
  }
}
