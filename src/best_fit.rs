use std::ptr::{self, NonNull};

use parking_lot::Mutex;

use crate::{
  block::{Block, HEADER_SIZE},
  error::{AllocError, Result},
  grower::{HeapGrower, Sbrk},
  observer::{AllocEvent, AllocObserver, LogObserver},
  scan::{BlockList, HeapStats},
};

/// Everything the guard protects: the block list and the primitive that
/// extends the memory it lives in.
struct Heap<G> {
  blocks: BlockList,
  grower: G,
}

impl<G: HeapGrower> Heap<G> {
  /// Hands out a block for `size` bytes and says whether it was recycled.
  fn take(
    &mut self,
    size: usize,
  ) -> Result<(NonNull<u8>, bool)> {
    if let Some(block) = self.blocks.find_best_fit(size) {
      unsafe {
        (*block).free = false;
        return Ok((NonNull::new_unchecked(Block::payload(block)), true));
      }
    }

    self.grow(size).map(|payload| (payload, false))
  }

  /// Extends the heap by one header plus `size` bytes and appends the new,
  /// in-use block. The list is untouched when the heap cannot grow.
  fn grow(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let exhausted = AllocError::HeapExhausted { requested: size };

    let increment = HEADER_SIZE.checked_add(size).ok_or(exhausted)?;
    let start = unsafe { self.grower.grow(increment) }.ok_or(exhausted)?;

    unsafe {
      let block = Block::write(start.as_ptr(), size);
      self.blocks.append(block);

      Ok(start.add(HEADER_SIZE))
    }
  }
}

/// Best-fit allocator over a single growable heap.
///
/// One mutex guards the whole block list. Freed blocks are recycled as they
/// are: never split, merged, or given back to the heap.
pub struct BestFitAllocator<G = Sbrk, O = LogObserver> {
  heap: Mutex<Heap<G>>,
  observer: O,
}

impl BestFitAllocator {
  /// An allocator over the process heap that traces through `log`.
  ///
  /// Only one such allocator should exist per process, since they would all
  /// move the same program break.
  pub const fn new() -> Self {
    Self::with_grower_and_observer(Sbrk, LogObserver)
  }
}

impl Default for BestFitAllocator {
  fn default() -> Self {
    Self::new()
  }
}

impl<G: HeapGrower> BestFitAllocator<G> {
  pub const fn with_grower(
    grower: G,
  ) -> Self {
    Self::with_grower_and_observer(grower, LogObserver)
  }
}

impl<G: HeapGrower, O: AllocObserver> BestFitAllocator<G, O> {
  pub const fn with_grower_and_observer(
    grower: G,
    observer: O,
  ) -> Self {
    Self {
      heap: Mutex::new(Heap {
        blocks: BlockList::new(),
        grower,
      }),
      observer,
    }
  }

  /// Allocates `size` bytes, returning null for a zero size or when the
  /// heap cannot grow.
  pub fn allocate(
    &self,
    size: usize,
  ) -> *mut u8 {
    Self::to_raw(self.try_allocate(size))
  }

  /// Allocates `count * elem_size` zeroed bytes. Null for a zero count or
  /// size, an overflowing product, or an exhausted heap.
  pub fn zero_allocate(
    &self,
    count: usize,
    elem_size: usize,
  ) -> *mut u8 {
    Self::to_raw(self.try_zero_allocate(count, elem_size))
  }

  /// Like [`allocate`](Self::allocate), but reports why nothing was
  /// allocated. `Ok(None)` means a zero-sized request.
  pub fn try_allocate(
    &self,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    if size == 0 {
      return Ok(None);
    }

    let taken = self.heap.lock().take(size);

    match taken {
      Ok((payload, reused)) => {
        self.observer.on_event(AllocEvent::Allocated { size, reused });
        Ok(Some(payload))
      },
      Err(err) => {
        self.observer.on_event(AllocEvent::Exhausted { size });
        Err(err)
      },
    }
  }

  pub fn try_zero_allocate(
    &self,
    count: usize,
    elem_size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    if count == 0 || elem_size == 0 {
      return Ok(None);
    }

    let total = count
      .checked_mul(elem_size)
      .ok_or(AllocError::SizeOverflow { count, elem_size })?;

    let Some(payload) = self.try_allocate(total)? else {
      return Ok(None);
    };

    // The block is ours now; a recycled one still holds its old contents.
    unsafe { ptr::write_bytes(payload.as_ptr(), 0, total) };
    self.observer.on_event(AllocEvent::ZeroAllocated { size: total });

    Ok(Some(payload))
  }

  /// Marks the block behind `payload` free for reuse. Null is ignored.
  ///
  /// # Safety
  ///
  /// `payload` must be null or a pointer returned by this allocator that has
  /// not been released since. Nothing about it is checked.
  pub unsafe fn release(
    &self,
    payload: *mut u8,
  ) {
    if payload.is_null() {
      return;
    }

    let size = {
      let _heap = self.heap.lock();

      unsafe {
        let block = Block::from_payload(payload);
        (*block).free = true;
        (*block).size
      }
    };

    self.observer.on_event(AllocEvent::Released { size });
  }

  pub fn stats(&self) -> HeapStats {
    self.heap.lock().blocks.stats()
  }

  fn to_raw(
    result: Result<Option<NonNull<u8>>>,
  ) -> *mut u8 {
    match result {
      Ok(Some(payload)) => payload.as_ptr(),
      _ => ptr::null_mut(),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{sync::Arc, thread};

  use super::*;
  use crate::{grower::FixedRegion, observer::NoopObserver};

  fn heap(
    capacity: usize,
  ) -> BestFitAllocator<FixedRegion, NoopObserver> {
    BestFitAllocator::with_grower_and_observer(FixedRegion::with_capacity(capacity).unwrap(), NoopObserver)
  }

  fn size_of_block(
    payload: *mut u8,
  ) -> usize {
    unsafe { (*Block::from_payload(payload)).size }
  }

  #[test]
  fn test_alloc() {
    let allocator = heap(4096);

    unsafe {
      let first_addr = allocator.allocate(8) as *mut u64;
      first_addr.write_unaligned(3);

      let size: usize = 6;
      let second_addr = allocator.allocate(size * 2) as *mut u16;

      for i in 0..size {
        second_addr.add(i).write_unaligned((i + 1) as u16);
      }

      assert_eq!(first_addr.read_unaligned(), 3);

      for i in 0..size {
        assert_eq!((i + 1) as u16, second_addr.add(i).read_unaligned());
      }

      allocator.release(first_addr as *mut u8);

      let third_addr = allocator.allocate(4);
      assert_eq!(first_addr as *mut u8, third_addr);

      let fourth_addr = allocator.allocate(16);
      assert!(fourth_addr > second_addr as *mut u8);
    }
  }

  #[test]
  fn zero_sizes_touch_nothing() {
    let allocator = heap(256);

    assert!(allocator.allocate(0).is_null());
    assert!(allocator.zero_allocate(0, 8).is_null());
    assert!(allocator.zero_allocate(8, 0).is_null());
    assert_eq!(allocator.try_allocate(0), Ok(None));
    assert_eq!(allocator.stats(), HeapStats::default());
  }

  #[test]
  fn release_then_allocate_reuses_block() {
    let allocator = heap(1024);

    let first = allocator.allocate(40);
    unsafe { allocator.release(first) };
    let second = allocator.allocate(40);

    assert_eq!(first, second);
    assert_eq!(allocator.stats().blocks, 1);
  }

  #[test]
  fn reuses_larger_freed_block_instead_of_growing() {
    let allocator = heap(1024);

    let a = allocator.allocate(64);
    let _b = allocator.allocate(16);
    unsafe { allocator.release(a) };

    let c = allocator.allocate(32);

    assert_eq!(c, a);
    // size is never adjusted on reuse
    assert_eq!(size_of_block(c), 64);
    assert_eq!(allocator.stats().blocks, 2);
  }

  #[test]
  fn chooses_smallest_free_block() {
    let allocator = heap(1024);

    let twenty = allocator.allocate(20);
    let ten = allocator.allocate(10);
    let _pin = allocator.allocate(1);

    unsafe {
      allocator.release(twenty);
      allocator.release(ten);
    }

    assert_eq!(allocator.allocate(8), ten);
    assert_eq!(allocator.allocate(8), twenty);
  }

  #[test]
  fn adjacent_free_blocks_are_not_coalesced() {
    let allocator = heap(1024);

    let a = allocator.allocate(24);
    let b = allocator.allocate(24);

    unsafe {
      allocator.release(a);
      allocator.release(b);
    }

    let combined = allocator.allocate(48);

    assert_ne!(combined, a);
    assert_ne!(combined, b);
    let stats = allocator.stats();
    assert_eq!(stats.blocks, 3);
    assert_eq!(stats.free_blocks, 2);
  }

  #[test]
  fn zero_allocate_clears_recycled_memory() {
    let allocator = heap(1024);

    let dirty = allocator.allocate(32);
    unsafe {
      ptr::write_bytes(dirty, 0xAB, 32);
      allocator.release(dirty);
    }

    let zeroed = allocator.zero_allocate(4, 8);
    assert_eq!(zeroed, dirty);

    let bytes = unsafe { std::slice::from_raw_parts(zeroed, 32) };
    assert!(bytes.iter().all(|&b| b == 0));
  }

  #[test]
  fn zero_allocate_overflow_fails() {
    let allocator = heap(256);

    assert_eq!(
      allocator.try_zero_allocate(usize::MAX, 2),
      Err(AllocError::SizeOverflow {
        count: usize::MAX,
        elem_size: 2
      })
    );
    assert!(allocator.zero_allocate(usize::MAX / 2 + 1, 2).is_null());
    assert_eq!(allocator.stats().blocks, 0);
  }

  #[test]
  fn exhaustion_returns_null_and_keeps_list() {
    let allocator = heap(HEADER_SIZE + 16);

    let only = allocator.allocate(16);
    assert!(!only.is_null());

    assert!(allocator.allocate(1).is_null());
    assert_eq!(allocator.try_allocate(1), Err(AllocError::HeapExhausted { requested: 1 }));
    assert_eq!(allocator.try_allocate(usize::MAX), Err(AllocError::HeapExhausted { requested: usize::MAX }));
    assert!(allocator.zero_allocate(2, 2).is_null());
    assert_eq!(allocator.stats().blocks, 1);

    // freed memory is still reachable once the heap is full
    unsafe { allocator.release(only) };
    assert_eq!(allocator.allocate(1), only);
  }

  #[test]
  fn release_null_is_noop() {
    let allocator = heap(256);

    unsafe { allocator.release(ptr::null_mut()) };
    assert_eq!(allocator.stats(), HeapStats::default());
  }

  #[test]
  fn observer_sees_each_operation() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let allocator = BestFitAllocator::with_grower_and_observer(
      FixedRegion::with_capacity(HEADER_SIZE + 8).unwrap(),
      move |event: AllocEvent| sink.lock().push(event),
    );

    let payload = allocator.allocate(8);
    unsafe { allocator.release(payload) };
    let _ = allocator.zero_allocate(2, 4);
    let _ = allocator.allocate(9);
    let _ = allocator.allocate(0);

    assert_eq!(*events.lock(), vec![
      AllocEvent::Allocated { size: 8, reused: false },
      AllocEvent::Released { size: 8 },
      AllocEvent::Allocated { size: 8, reused: true },
      AllocEvent::ZeroAllocated { size: 8 },
      AllocEvent::Exhausted { size: 9 },
    ]);
  }

  #[test]
  fn concurrent_allocations_do_not_overlap() {
    const THREADS: usize = 16;
    let allocator = heap(64 * 1024);

    let mut regions: Vec<(usize, usize)> = thread::scope(|s| {
      let handles: Vec<_> = (1..=THREADS)
        .map(|i| {
          let allocator = &allocator;
          s.spawn(move || {
            let size = i * 24;
            let payload = allocator.allocate(size);
            unsafe { ptr::write_bytes(payload, i as u8, size) };
            (payload as usize, size)
          })
        })
        .collect();

      handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    regions.sort();
    for pair in regions.windows(2) {
      let (start, size) = pair[0];
      assert!(start + size <= pair[1].0, "{pair:?} overlap");
    }

    for (start, size) in regions {
      let bytes = unsafe { std::slice::from_raw_parts(start as *const u8, size) };
      assert!(bytes.iter().all(|&b| b as usize == size / 24));
    }
  }

  #[test]
  fn concurrent_allocate_and_release() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 500;
    let allocator = heap(256 * 1024);

    thread::scope(|s| {
      for i in 1..=THREADS {
        let allocator = &allocator;
        s.spawn(move || {
          let size = i * 16;
          for _ in 0..ROUNDS {
            let payload = allocator.allocate(size);
            assert!(!payload.is_null());

            unsafe {
              ptr::write_bytes(payload, i as u8, size);
              let bytes = std::slice::from_raw_parts(payload, size);
              assert!(bytes.iter().all(|&b| b == i as u8));
              allocator.release(payload);
            }
          }
        });
      }
    });

    let stats = allocator.stats();
    assert_eq!(stats.free_blocks, stats.blocks);
    assert!(stats.blocks <= THREADS * THREADS);
  }
}
