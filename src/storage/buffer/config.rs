//! Buffer pool configuration.

/// Configuration for a [`BufferPool`](super::BufferPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of frames. Fixed for the pool's lifetime; must be non-zero.
    pub pool_size: usize,
}

impl BufferPoolConfig {
    pub const DEFAULT_POOL_SIZE: usize = 1024;

    pub fn new(pool_size: usize) -> Self {
        Self { pool_size }
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: Self::DEFAULT_POOL_SIZE,
        }
    }
}
