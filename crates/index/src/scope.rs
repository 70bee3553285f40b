use crate::root_index::RootIndex;
use crate::source::{SourceDescriptor, SourceId};
use crate::stats::ScopeStats;
use crate::suggestion::{Suggestion, SuggestionSet};
use crate::tree::{MetadataRecord, MetadataTree, NodeId, NodeInfo};
use keyhint_metadata::{
    flatten_keys, sanitize, sanitized_segments, to_path_segments, HintRecord, MetadataDocument,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Indexing boundary: one module, or the whole project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeId {
    Project,
    Module(String),
}

impl ScopeId {
    #[must_use]
    pub fn module(name: impl Into<String>) -> Self {
        Self::Module(name.into())
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project => f.write_str("<project>"),
            Self::Module(name) => f.write_str(name),
        }
    }
}

/// Counts of one document insertion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub records: usize,
    pub hints: usize,
    pub dropped_hints: usize,
}

/// Index state of a single scope.
#[derive(Debug, Default)]
pub struct ScopeIndex {
    roots: RootIndex,
    tree: MetadataTree,
    seen: HashMap<SourceId, SourceDescriptor>,
    /// Nodes each source attached a hint to.
    hinted: HashMap<SourceId, BTreeSet<NodeId>>,
}

impl ScopeIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn roots(&self) -> &RootIndex {
        &self.roots
    }

    #[must_use]
    pub const fn tree(&self) -> &MetadataTree {
        &self.tree
    }

    #[must_use]
    pub const fn seen(&self) -> &HashMap<SourceId, SourceDescriptor> {
        &self.seen
    }

    pub fn mark_seen(&mut self, descriptor: SourceDescriptor) {
        self.seen
            .insert(descriptor.container_identity.clone(), descriptor);
    }

    #[must_use]
    pub fn stats(&self) -> ScopeStats {
        ScopeStats {
            roots: self.roots.len(),
            nodes: self.tree.len(),
            sources: self.seen.len(),
        }
    }

    /// Inserts groups, then properties, then hints. Records are taken in the
    /// order given; callers sort the document by name beforehand.
    pub fn insert_document(&mut self, source: &SourceId, document: &MetadataDocument) -> InsertOutcome {
        let mut outcome = InsertOutcome::default();

        for group in &document.groups {
            if self
                .insert_record(&group.name, MetadataRecord::Group(group.clone()), source)
                .is_some()
            {
                outcome.records += 1;
            }
        }
        for property in &document.properties {
            if self
                .insert_record(&property.name, MetadataRecord::Property(property.clone()), source)
                .is_some()
            {
                outcome.records += 1;
            }
        }
        for hint in &document.hints {
            if self.attach_hint(hint.clone(), source) {
                outcome.hints += 1;
            } else {
                log::debug!("Dropping hint {} from {source}: no such property", hint.name);
                outcome.dropped_hints += 1;
            }
        }

        outcome
    }

    /// Inserts `record` at its dotted `name`, creating the root on first use.
    pub fn insert_record(
        &mut self,
        name: &str,
        record: MetadataRecord,
        source: &SourceId,
    ) -> Option<NodeId> {
        let segments = to_path_segments(name);
        let first = *segments.first()?;
        let key = sanitize(first);
        let root = match self.roots.get(&key) {
            Some(root) => root,
            None => {
                let root = self.tree.create_root(first);
                self.roots.insert(key, root);
                root
            }
        };
        self.tree.insert_path(root, &segments, record, source)
    }

    /// Attaches `hint` to the property at exactly its name.
    pub fn attach_hint(&mut self, hint: HintRecord, source: &SourceId) -> bool {
        let segments = sanitized_segments(&hint.name);
        let Some(root) = segments.first().and_then(|first| self.roots.get(first)) else {
            return false;
        };
        let Some(id) = self.tree.find_deepest_match(root, &segments, 1, true) else {
            return false;
        };
        if !self.tree.attach_hint(id, hint, source) {
            return false;
        }
        self.hinted.entry(source.clone()).or_default().insert(id);
        true
    }

    /// Drops every reference `source` holds in this scope and forgets that it
    /// was seen. Returns the number of roots that went away.
    pub fn remove_source(&mut self, source: &SourceId) -> usize {
        self.seen.remove(source);
        for id in self.hinted.remove(source).unwrap_or_default() {
            self.tree.forget_hint(id, source);
        }

        let roots: Vec<(String, NodeId)> = self
            .roots
            .iter()
            .map(|(key, id)| (key.to_string(), id))
            .collect();
        let mut removed = 0;
        for (key, root) in roots {
            if self.tree.remove_owner(root, source) {
                self.roots.remove(&key);
                self.tree.release(root);
                removed += 1;
            }
        }
        removed
    }

    /// Resolves an autocomplete query. `None` means there is nothing to
    /// search from: the scope is empty or the ancestor path does not exist.
    #[must_use]
    pub fn compute_suggestions(
        &self,
        ancestors: Option<&[&str]>,
        partial: &str,
    ) -> Option<Vec<Suggestion>> {
        if self.roots.is_empty() {
            return None;
        }
        let query = sanitized_segments(partial);
        let mut out = SuggestionSet::default();

        match ancestors.filter(|keys| !keys.is_empty()) {
            None => {
                let first = query.first()?;
                for (_, root) in self.roots.prefix_range(first) {
                    self.tree.find_suggestions(root, &query, 1, 0, false, &mut out);
                }
                if out.is_empty() {
                    for (_, root) in self.roots.iter() {
                        self.tree.find_suggestions(root, &query, 1, 0, true, &mut out);
                    }
                }
            }
            Some(ancestors) => {
                let path = sanitized_path(ancestors);
                let root = self.roots.get(path.first()?)?;
                let start = self.tree.find_deepest_match(root, &path, 1, false)?;
                if self.tree.get(start)?.is_leaf() {
                    self.tree.value_suggestions(start, partial, &mut out);
                } else {
                    self.tree
                        .find_child_suggestions(start, &query, 0, false, &mut out);
                    if out.is_empty() {
                        self.tree
                            .find_child_suggestions(start, &query, 0, true, &mut out);
                    }
                }
            }
        }

        Some(out.into_sorted_vec())
    }

    /// Node at exactly the path spelled by `keys`.
    #[must_use]
    pub fn find_exact(&self, keys: &[&str]) -> Option<NodeInfo> {
        let path = sanitized_path(keys);
        let root = self.roots.get(path.first()?)?;
        let id = self.tree.find_deepest_match(root, &path, 1, true)?;
        self.tree.node_info(id)
    }
}

fn sanitized_path(keys: &[&str]) -> Vec<String> {
    flatten_keys(keys).iter().map(|segment| sanitize(segment)).collect()
}
