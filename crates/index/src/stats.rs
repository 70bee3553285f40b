use serde::Serialize;
use std::time::Duration;

/// Size of one scope's index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScopeStats {
    pub roots: usize,
    pub nodes: usize,
    pub sources: usize,
}

/// Summary of one reindex run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub scopes: usize,
    pub sources_added: usize,
    pub sources_modified: usize,
    pub sources_removed: usize,
    pub sources_unchanged: usize,
    pub sources_failed: usize,
    pub records_inserted: usize,
    pub hints_dropped: usize,
    /// Module scopes dropped because the environment no longer lists them.
    pub scopes_dropped: usize,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    /// The run was superseded before it finished.
    pub cancelled: bool,
}

impl IndexStats {
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.sources_added + self.sources_modified + self.sources_removed + self.scopes_dropped > 0
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
