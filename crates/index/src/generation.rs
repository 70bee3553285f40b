use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic reindex generation shared by a coordinator and its tokens.
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    current: Arc<AtomicU64>,
}

impl GenerationCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new generation, superseding every token handed out before.
    pub fn advance(&self) -> GenerationToken {
        let generation = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        GenerationToken {
            generation,
            current: Arc::clone(&self.current),
        }
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }
}

/// Handle of one reindex run; checked between processing steps.
#[derive(Debug, Clone)]
pub struct GenerationToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl GenerationToken {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn is_superseded(&self) -> bool {
        self.current.load(Ordering::Acquire) != self.generation
    }
}
