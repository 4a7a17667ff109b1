#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
  #[error("heap exhausted: no room for {requested} more bytes")]
  HeapExhausted { requested: usize },

  #[error("size overflow: {count} elements of {elem_size} bytes")]
  SizeOverflow { count: usize, elem_size: usize },
}

pub type Result<T, E = AllocError> = std::result::Result<T, E>;
