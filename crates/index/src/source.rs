use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Logical identity of a classpath container (its canonical location).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(Arc<str>);

impl SourceId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for SourceId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

/// Change marker of a container's metadata. Only equality is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fingerprint {
    Filesystem {
        modified_unix_ms: u64,
        size_bytes: u64,
    },
    Revision(u64),
    Missing,
}

impl Fingerprint {
    #[must_use]
    pub fn from_fs_metadata(metadata: &std::fs::Metadata) -> Self {
        let modified_unix_ms = metadata
            .modified()
            .ok()
            .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::Filesystem {
            modified_unix_ms,
            size_bytes: metadata.len(),
        }
    }

    /// Folds several filesystem fingerprints into one (latest mtime, summed size).
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        match (self, other) {
            (
                Self::Filesystem {
                    modified_unix_ms: a_ms,
                    size_bytes: a_len,
                },
                Self::Filesystem {
                    modified_unix_ms: b_ms,
                    size_bytes: b_len,
                },
            ) => Self::Filesystem {
                modified_unix_ms: a_ms.max(b_ms),
                size_bytes: a_len.saturating_add(b_len),
            },
            (Self::Missing, other) => other,
            (this, _) => this,
        }
    }
}

/// One classpath root as last observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub root_path: PathBuf,
    pub container_identity: SourceId,
    pub fingerprint: Fingerprint,
    pub has_metadata_file: bool,
}

impl SourceDescriptor {
    #[must_use]
    pub fn new(
        root_path: impl Into<PathBuf>,
        container_identity: impl Into<SourceId>,
        fingerprint: Fingerprint,
        has_metadata_file: bool,
    ) -> Self {
        Self {
            root_path: root_path.into(),
            container_identity: container_identity.into(),
            fingerprint,
            has_metadata_file,
        }
    }

    #[must_use]
    pub fn is_modified(&self, previous: &Self) -> bool {
        self.fingerprint != previous.fingerprint
            || self.has_metadata_file != previous.has_metadata_file
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceChange {
    /// Never seen before.
    Added(SourceDescriptor),
    /// Seen with a different fingerprint; old references must be purged first.
    Modified {
        previous: SourceDescriptor,
        current: SourceDescriptor,
    },
    /// Seen before, no longer on the classpath.
    Removed(SourceDescriptor),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDiff {
    /// Removals first, then additions/modifications in classpath order.
    pub changes: Vec<SourceChange>,
    pub unchanged: usize,
}

impl SourceDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Compares the roots currently on the classpath against the ones seen last time.
///
/// Pure: the caller records a root as seen only once its change has been
/// applied, so a superseded run leaves unapplied roots to be picked up again.
#[must_use]
pub fn diff_sources(
    current_roots: &[SourceDescriptor],
    seen: &HashMap<SourceId, SourceDescriptor>,
) -> SourceDiff {
    let mut diff = SourceDiff::default();
    let mut visible: HashSet<&SourceId> = HashSet::with_capacity(current_roots.len());
    let mut fresh = Vec::new();

    for root in current_roots {
        if !visible.insert(&root.container_identity) {
            continue;
        }
        match seen.get(&root.container_identity) {
            None => fresh.push(SourceChange::Added(root.clone())),
            Some(previous) if root.is_modified(previous) => {
                log::debug!(
                    "Container seems to have been updated. Previous version: {previous:?}; newer version: {root:?}"
                );
                fresh.push(SourceChange::Modified {
                    previous: previous.clone(),
                    current: root.clone(),
                });
            }
            Some(_) => diff.unchanged += 1,
        }
    }

    let mut removed: Vec<&SourceDescriptor> = seen
        .values()
        .filter(|previous| !visible.contains(&previous.container_identity))
        .collect();
    removed.sort_by(|a, b| a.container_identity.cmp(&b.container_identity));
    diff.changes
        .extend(removed.into_iter().cloned().map(SourceChange::Removed));
    diff.changes.extend(fresh);
    diff
}

pub(crate) fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn root(id: &str, revision: u64, has_metadata: bool) -> SourceDescriptor {
        SourceDescriptor::new(
            format!("/cp/{id}"),
            id,
            Fingerprint::Revision(revision),
            has_metadata,
        )
    }

    fn seen(roots: &[SourceDescriptor]) -> HashMap<SourceId, SourceDescriptor> {
        roots
            .iter()
            .map(|r| (r.container_identity.clone(), r.clone()))
            .collect()
    }

    #[test]
    fn unseen_roots_are_added() {
        let diff = diff_sources(&[root("a.jar", 1, true), root("b", 1, false)], &HashMap::new());
        assert_eq!(
            diff.changes,
            vec![
                SourceChange::Added(root("a.jar", 1, true)),
                SourceChange::Added(root("b", 1, false)),
            ]
        );
    }

    #[test]
    fn unchanged_roots_are_skipped() {
        let roots = [root("a.jar", 1, true)];
        let diff = diff_sources(&roots, &seen(&roots));
        assert!(diff.is_empty());
        assert_eq!(diff.unchanged, 1);
    }

    #[test]
    fn modified_root_is_removed_then_processed() {
        let diff = diff_sources(&[root("a.jar", 2, true)], &seen(&[root("a.jar", 1, true)]));
        assert_eq!(
            diff.changes,
            vec![SourceChange::Modified {
                previous: root("a.jar", 1, true),
                current: root("a.jar", 2, true),
            }]
        );
    }

    #[test]
    fn losing_metadata_file_counts_as_modification() {
        let diff = diff_sources(&[root("a.jar", 1, false)], &seen(&[root("a.jar", 1, true)]));
        assert_eq!(
            diff.changes,
            vec![SourceChange::Modified {
                previous: root("a.jar", 1, true),
                current: root("a.jar", 1, false),
            }]
        );
    }

    #[test]
    fn vanished_roots_are_removed_first() {
        let previous = [root("gone.jar", 1, true), root("kept.jar", 1, true)];
        let diff = diff_sources(&[root("kept.jar", 1, true), root("new.jar", 1, true)], &seen(&previous));
        assert_eq!(
            diff.changes,
            vec![
                SourceChange::Removed(root("gone.jar", 1, true)),
                SourceChange::Added(root("new.jar", 1, true)),
            ]
        );
    }

    #[test]
    fn duplicate_roots_are_diffed_once() {
        let diff = diff_sources(&[root("a.jar", 1, true), root("a.jar", 1, true)], &HashMap::new());
        assert_eq!(diff.changes.len(), 1);
    }

    #[test]
    fn combine_takes_latest_mtime_and_total_size() {
        let a = Fingerprint::Filesystem {
            modified_unix_ms: 10,
            size_bytes: 5,
        };
        let b = Fingerprint::Filesystem {
            modified_unix_ms: 20,
            size_bytes: 7,
        };
        assert_eq!(
            a.combine(b),
            Fingerprint::Filesystem {
                modified_unix_ms: 20,
                size_bytes: 12
            }
        );
        assert_eq!(Fingerprint::Missing.combine(Fingerprint::Revision(3)), Fingerprint::Revision(3));
    }
}
