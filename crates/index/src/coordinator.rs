use crate::environment::ClasspathEnvironment;
use crate::error::Result;
use crate::generation::{GenerationCounter, GenerationToken};
use crate::scope::{InsertOutcome, ScopeId, ScopeIndex};
use crate::source::{diff_sources, SourceChange, SourceDescriptor, SourceId};
use crate::stats::{IndexStats, ScopeStats};
use crate::suggestion::Suggestion;
use crate::tree::NodeInfo;
use keyhint_metadata::MetadataDocument;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// What a reindex run covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReindexTarget {
    /// Every module the environment lists; scopes of vanished modules are dropped.
    All,
    Modules(BTreeSet<String>),
}

impl ReindexTarget {
    #[must_use]
    pub fn module(name: impl Into<String>) -> Self {
        Self::Modules(BTreeSet::from([name.into()]))
    }

    /// Union of two targets.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Modules(mut a), Self::Modules(b)) => {
                a.extend(b);
                Self::Modules(a)
            }
            _ => Self::All,
        }
    }

    #[must_use]
    pub fn includes(&self, module: &str) -> bool {
        match self {
            Self::All => true,
            Self::Modules(modules) => modules.contains(module),
        }
    }
}

impl From<ScopeId> for ReindexTarget {
    fn from(scope: ScopeId) -> Self {
        match scope {
            ScopeId::Project => Self::All,
            ScopeId::Module(name) => Self::module(name),
        }
    }
}

#[derive(Debug, Default)]
struct IndexState {
    scopes: BTreeMap<String, ScopeIndex>,
    /// Union of every module scope, maintained incrementally.
    project: ScopeIndex,
    /// Modules currently holding each source in the project aggregate.
    holders: HashMap<SourceId, BTreeSet<String>>,
}

impl IndexState {
    fn scope(&self, scope: &ScopeId) -> Option<&ScopeIndex> {
        match scope {
            ScopeId::Project => Some(&self.project),
            ScopeId::Module(name) => self.scopes.get(name),
        }
    }

    fn insert_source(
        &mut self,
        module: &str,
        descriptor: &SourceDescriptor,
        document: &MetadataDocument,
    ) -> InsertOutcome {
        let id = &descriptor.container_identity;
        let scope = self.scopes.entry(module.to_string()).or_default();
        let outcome = scope.insert_document(id, document);
        scope.mark_seen(descriptor.clone());

        self.holders
            .entry(id.clone())
            .or_default()
            .insert(module.to_string());
        let stale = self
            .project
            .seen()
            .get(id)
            .map_or(true, |previous| descriptor.is_modified(previous));
        if stale {
            self.project.remove_source(id);
            self.project.insert_document(id, document);
            self.project.mark_seen(descriptor.clone());
        }
        outcome
    }

    fn remove_source(&mut self, module: &str, id: &SourceId) {
        if let Some(scope) = self.scopes.get_mut(module) {
            scope.remove_source(id);
        }
        self.release(module, id);
    }

    /// Drops `module`'s hold on `id`; the aggregate forgets `id` with its
    /// last holder.
    fn release(&mut self, module: &str, id: &SourceId) {
        let Some(holders) = self.holders.get_mut(id) else {
            return;
        };
        holders.remove(module);
        if holders.is_empty() {
            self.holders.remove(id);
            self.project.remove_source(id);
        }
    }

    fn drop_module(&mut self, module: &str) -> usize {
        let Some(scope) = self.scopes.remove(module) else {
            return 0;
        };
        let sources: Vec<SourceId> = scope.seen().keys().cloned().collect();
        for id in &sources {
            self.release(module, id);
        }
        sources.len()
    }
}

/// Owns the per-module indexes and the project aggregate, keeps them in sync
/// with a [`ClasspathEnvironment`], and answers queries.
///
/// Reindexing reads the environment without holding the index lock and takes
/// the write lock once per source change, so queries interleave with a run and
/// always see a tree between two completed steps.
pub struct IndexCoordinator {
    environment: Arc<dyn ClasspathEnvironment>,
    state: RwLock<IndexState>,
    generations: GenerationCounter,
}

impl IndexCoordinator {
    pub fn new(environment: Arc<dyn ClasspathEnvironment>) -> Self {
        Self {
            environment,
            state: RwLock::new(IndexState::default()),
            generations: GenerationCounter::new(),
        }
    }

    #[must_use]
    pub fn environment(&self) -> &Arc<dyn ClasspathEnvironment> {
        &self.environment
    }

    /// Starts a new generation. Runs holding an older token stop at their next
    /// checkpoint.
    pub fn begin_reindex(&self) -> GenerationToken {
        self.generations.advance()
    }

    #[must_use]
    pub fn current_generation(&self) -> u64 {
        self.generations.current()
    }

    /// Reindexes `target` in a fresh generation, superseding any run in flight.
    pub fn reindex_now(&self, target: &ReindexTarget) -> Result<IndexStats> {
        let token = self.begin_reindex();
        self.reindex(target, &token)
    }

    /// Brings the scopes named by `target` up to date with the environment.
    ///
    /// Fails only when the module list itself cannot be read. Per-module and
    /// per-source failures are logged and counted; a source that failed is not
    /// recorded as seen, so the next run retries it.
    pub fn reindex(&self, target: &ReindexTarget, token: &GenerationToken) -> Result<IndexStats> {
        let started = Instant::now();
        let mut stats = IndexStats::default();

        let listed: BTreeSet<String> = self.environment.modules()?.into_iter().collect();
        let vanished: Vec<String> = self
            .read()
            .scopes
            .keys()
            .filter(|module| target.includes(module) && !listed.contains(*module))
            .cloned()
            .collect();
        let modules: Vec<&String> = listed.iter().filter(|m| target.includes(m)).collect();

        log::info!(
            "Reindexing {} module(s) (generation {})",
            modules.len(),
            token.generation()
        );

        for module in &vanished {
            if token.is_superseded() {
                stats.cancelled = true;
                break;
            }
            let removed = self.write().drop_module(module);
            log::debug!("Module {module} vanished; dropped {removed} source(s)");
            stats.sources_removed += removed;
            stats.scopes_dropped += 1;
        }

        for module in modules {
            if stats.cancelled || token.is_superseded() {
                stats.cancelled = true;
                break;
            }
            self.reindex_module(module, token, &mut stats);
            stats.scopes += 1;
        }

        stats.duration = started.elapsed();
        if stats.cancelled {
            log::info!(
                "Reindex generation {} superseded after {} module(s)",
                token.generation(),
                stats.scopes
            );
        } else {
            log::info!(
                "Reindexed {} module(s) in {:?}: {} added, {} modified, {} removed, {} failed",
                stats.scopes,
                stats.duration,
                stats.sources_added,
                stats.sources_modified,
                stats.sources_removed,
                stats.sources_failed
            );
        }
        Ok(stats)
    }

    fn reindex_module(&self, module: &str, token: &GenerationToken, stats: &mut IndexStats) {
        let roots = match self.environment.classpath_roots(module) {
            Ok(roots) => roots,
            Err(err) => {
                log::warn!("Failed to enumerate classpath of module {module}: {err}");
                return;
            }
        };

        let diff = {
            let mut state = self.write();
            let scope = state.scopes.entry(module.to_string()).or_default();
            diff_sources(&roots, scope.seen())
        };
        stats.sources_unchanged += diff.unchanged;

        for change in diff.changes {
            if token.is_superseded() {
                stats.cancelled = true;
                return;
            }
            match change {
                SourceChange::Removed(previous) => {
                    log::debug!("Removing {} from module {module}", previous.container_identity);
                    self.write()
                        .remove_source(module, &previous.container_identity);
                    stats.sources_removed += 1;
                }
                SourceChange::Added(current) => {
                    stats.sources_added += 1;
                    self.apply_source(module, &current, false, stats);
                }
                SourceChange::Modified { current, .. } => {
                    stats.sources_modified += 1;
                    self.apply_source(module, &current, true, stats);
                }
            }
        }
    }

    fn apply_source(
        &self,
        module: &str,
        descriptor: &SourceDescriptor,
        modified: bool,
        stats: &mut IndexStats,
    ) {
        let id = &descriptor.container_identity;
        let document = descriptor
            .has_metadata_file
            .then(|| self.load_document(descriptor));

        let mut state = self.write();
        if modified {
            state.remove_source(module, id);
        }
        match document {
            None => {
                if let Some(scope) = state.scopes.get_mut(module) {
                    scope.mark_seen(descriptor.clone());
                }
            }
            Some(Ok(document)) => {
                let outcome = state.insert_source(module, descriptor, &document);
                log::debug!(
                    "Indexed {id} into module {module}: {} record(s), {} hint(s)",
                    outcome.records,
                    outcome.hints
                );
                stats.records_inserted += outcome.records;
                stats.hints_dropped += outcome.dropped_hints;
            }
            Some(Err(err)) => {
                log::error!("Failed to read metadata from {id}: {err}");
                stats.sources_failed += 1;
            }
        }
    }

    /// Main and additional documents of `source`, merged and sorted by name.
    fn load_document(&self, source: &SourceDescriptor) -> Result<MetadataDocument> {
        let mut merged = MetadataDocument::default();
        for bytes in self.environment.read_metadata(source)? {
            merged.extend(MetadataDocument::from_slice(&bytes)?);
        }
        if merged.skipped > 0 {
            log::warn!(
                "Skipped {} malformed entries in {}",
                merged.skipped,
                source.container_identity
            );
        }
        merged.sort_by_name();
        Ok(merged)
    }

    /// Suggestions for `partial` typed below `ancestors` (or at the top level
    /// when there are none).
    ///
    /// `None` when there is nothing to search from: the scope is unknown or
    /// empty, or the ancestor path has no node. `Some(vec![])` when a start
    /// node exists but nothing matched.
    #[must_use]
    pub fn compute_suggestions(
        &self,
        scope: &ScopeId,
        ancestors: Option<&[&str]>,
        partial: &str,
    ) -> Option<Vec<Suggestion>> {
        let started = Instant::now();
        let suggestions = self
            .read()
            .scope(scope)?
            .compute_suggestions(ancestors, partial);
        log::debug!(
            "Computed {} suggestion(s) for {partial:?} in {scope} in {:?}",
            suggestions.as_ref().map_or(0, Vec::len),
            started.elapsed()
        );
        suggestions
    }

    /// The node at exactly the path spelled by `keys`.
    #[must_use]
    pub fn find_deepest_exact_match(&self, scope: &ScopeId, keys: &[&str]) -> Option<NodeInfo> {
        self.read().scope(scope)?.find_exact(keys)
    }

    /// Whether `scope` has anything indexed. For the project this holds as soon
    /// as any module has a root.
    #[must_use]
    pub fn can_provide_suggestions(&self, scope: &ScopeId) -> bool {
        let state = self.read();
        match scope {
            ScopeId::Project => state.scopes.values().any(|s| !s.roots().is_empty()),
            ScopeId::Module(name) => state
                .scopes
                .get(name)
                .is_some_and(|s| !s.roots().is_empty()),
        }
    }

    /// Indexed modules, sorted.
    #[must_use]
    pub fn modules(&self) -> Vec<String> {
        self.read().scopes.keys().cloned().collect()
    }

    #[must_use]
    pub fn scope_stats(&self) -> BTreeMap<ScopeId, ScopeStats> {
        let state = self.read();
        let mut stats: BTreeMap<ScopeId, ScopeStats> = state
            .scopes
            .iter()
            .map(|(name, scope)| (ScopeId::module(name.clone()), scope.stats()))
            .collect();
        stats.insert(ScopeId::Project, state.project.stats());
        stats
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for IndexCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCoordinator")
            .field("generation", &self.generations.current())
            .field("modules", &self.modules())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn merge_is_a_union() {
        let merged = ReindexTarget::module("a").merge(ReindexTarget::module("b"));
        assert_eq!(
            merged,
            ReindexTarget::Modules(BTreeSet::from(["a".to_string(), "b".to_string()]))
        );
        assert_eq!(ReindexTarget::module("a").merge(ReindexTarget::All), ReindexTarget::All);
        assert!(merged.includes("b"));
        assert!(!merged.includes("c"));
    }

    #[test]
    fn project_scope_targets_everything() {
        assert_eq!(ReindexTarget::from(ScopeId::Project), ReindexTarget::All);
        assert_eq!(
            ReindexTarget::from(ScopeId::module("app")),
            ReindexTarget::module("app")
        );
    }
}
