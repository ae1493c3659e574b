pub mod buffer_pool;
mod clock_replacer;

/// Position of a frame inside the buffer pool
pub type PoolPos = usize;
