use std::fmt;

/// Something the allocator did, reported after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocEvent {
  /// `size` bytes were handed out, from a recycled block if `reused`.
  Allocated { size: usize, reused: bool },
  /// `size` zeroed bytes were handed out.
  ZeroAllocated { size: usize },
  /// A block with `size` usable bytes went back to the free list.
  Released { size: usize },
  /// The heap could not grow to fit `size` more bytes.
  Exhausted { size: usize },
}

impl fmt::Display for AllocEvent {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::Allocated { size, reused: true } => write!(f, "malloc {size} bytes (reused)"),
      Self::Allocated { size, reused: false } => write!(f, "malloc {size} bytes"),
      Self::ZeroAllocated { size } => write!(f, "calloc {size} bytes"),
      Self::Released { size } => write!(f, "freed {size} bytes"),
      Self::Exhausted { size } => write!(f, "heap exhausted allocating {size} bytes"),
    }
  }
}

/// Diagnostic hook called outside the allocator guard.
///
/// Implementations run on the allocating thread and must not allocate from
/// the allocator that reports to them.
pub trait AllocObserver: Send + Sync {
  fn on_event(
    &self,
    event: AllocEvent,
  );
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl AllocObserver for LogObserver {
  fn on_event(
    &self,
    event: AllocEvent,
  ) {
    match event {
      AllocEvent::Exhausted { .. } => log::warn!("{event}"),
      _ => log::trace!("{event}"),
    }
  }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AllocObserver for NoopObserver {
  fn on_event(
    &self,
    _event: AllocEvent,
  ) {
  }
}

impl<F> AllocObserver for F
where
  F: Fn(AllocEvent) + Send + Sync,
{
  fn on_event(
    &self,
    event: AllocEvent,
  ) {
    self(event)
  }
}
