use crate::config::IndexConfig;
use crate::coordinator::ReindexTarget;
use crate::environment::is_archive;
use crate::error::{IndexError, Result};
use crate::worker::{BackgroundIndexer, ReindexRequester};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

const WATCH_REASON: &str = "classpath_change";

/// Watches the environment's filesystem roots and requests a full reindex
/// whenever an archive or metadata document changes.
pub struct ClasspathWatcher {
    _watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl ClasspathWatcher {
    pub fn start(indexer: &BackgroundIndexer, config: &IndexConfig) -> Result<Self> {
        let paths = indexer.coordinator().environment().watch_paths();
        let metadata_files: Vec<PathBuf> = config
            .metadata_files()
            .into_iter()
            .map(PathBuf::from)
            .collect();
        let requester = indexer.requester();

        let mut watcher = RecommendedWatcher::new(
            move |event: notify::Result<Event>| handle_event(event, &metadata_files, &requester),
            NotifyConfig::default().with_poll_interval(config.watch_poll_interval),
        )
        .map_err(|e| IndexError::WatcherError(format!("watcher init failed: {e}")))?;

        let mut watched = Vec::new();
        for path in paths {
            let mode = if path.is_dir() {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            match watcher.watch(&path, mode) {
                Ok(()) => watched.push(path),
                Err(err) => log::warn!("Failed to watch {}: {err}", path.display()),
            }
        }
        if watched.is_empty() {
            log::warn!("No classpath location could be watched");
        }

        Ok(Self {
            _watcher: watcher,
            watched,
        })
    }

    #[must_use]
    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watched
    }
}

fn handle_event(event: notify::Result<Event>, metadata_files: &[PathBuf], requester: &ReindexRequester) {
    let event = match event {
        Ok(event) => event,
        Err(err) => {
            log::warn!("Watcher error: {err}");
            return;
        }
    };
    if matches!(event.kind, EventKind::Access(_)) {
        return;
    }
    let relevant = matches!(event.kind, EventKind::Remove(_))
        || event
            .paths
            .iter()
            .any(|path| is_relevant_path(path, metadata_files));
    if !relevant {
        return;
    }
    if let Err(err) = requester.try_request(ReindexTarget::All, WATCH_REASON) {
        log::debug!("Reindex already queued: {err}");
    }
}

fn is_relevant_path(path: &Path, metadata_files: &[PathBuf]) -> bool {
    is_archive(path) || metadata_files.iter().any(|file| path.ends_with(file))
}
