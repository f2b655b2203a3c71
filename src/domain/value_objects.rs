//! Value objects shared across the pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic identifier assigned to each shop as it enters the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShopId(pub u64);

impl fmt::Display for ShopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out shop ids; safe to share between workers.
#[derive(Debug, Default)]
pub struct ShopIdAllocator {
    next: AtomicU64,
}

impl ShopIdAllocator {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(first: u64) -> Self {
        Self { next: AtomicU64::new(first) }
    }

    pub fn allocate(&self) -> ShopId {
        ShopId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of ids handed out so far (relative to zero).
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}
