use crate::config::IndexConfig;
use crate::coordinator::{IndexCoordinator, ReindexTarget};
use crate::error::{IndexError, Result};
use crate::source::unix_now_ms;
use crate::stats::IndexStats;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time;

/// Published after every finished reindex run.
#[derive(Debug, Clone, Serialize)]
pub struct IndexUpdate {
    pub generation: u64,
    pub target: ReindexTarget,
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<IndexStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at_unix_ms: u64,
}

impl IndexUpdate {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexerStatus {
    pub indexing: bool,
    pub pending_requests: usize,
    pub runs_completed: u64,
    pub runs_superseded: u64,
    pub consecutive_failures: u32,
    pub last_success_unix_ms: Option<u64>,
    pub last_duration_ms: Option<u64>,
    pub last_error: Option<String>,
}

enum IndexerCommand {
    Reindex {
        target: ReindexTarget,
        reason: String,
        done: Option<oneshot::Sender<IndexUpdate>>,
    },
    Shutdown,
}

/// Cheap sender side of a [`BackgroundIndexer`], usable from non-async
/// callbacks. Does not keep the worker alive.
#[derive(Clone)]
pub struct ReindexRequester {
    command_tx: mpsc::Sender<IndexerCommand>,
}

impl ReindexRequester {
    /// Queues a reindex without waiting. Fails when the queue is full or the
    /// worker has stopped; a full queue already holds a pending run.
    pub fn try_request(&self, target: ReindexTarget, reason: impl Into<String>) -> Result<()> {
        self.command_tx
            .try_send(IndexerCommand::Reindex {
                target,
                reason: reason.into(),
                done: None,
            })
            .map_err(|e| IndexError::Other(format!("failed to queue reindex: {e}")))
    }
}

/// Runs reindexing of one [`IndexCoordinator`] on a single background task.
///
/// Requests arriving within the debounce window are coalesced into one run. A
/// request arriving while a run is in flight supersedes it; whatever the
/// superseded run did not finish is folded into the next run.
#[derive(Clone)]
pub struct BackgroundIndexer {
    inner: Arc<BackgroundIndexerInner>,
}

struct BackgroundIndexerInner {
    coordinator: Arc<IndexCoordinator>,
    command_tx: mpsc::Sender<IndexerCommand>,
    update_tx: broadcast::Sender<IndexUpdate>,
    status_tx: watch::Sender<IndexerStatus>,
}

impl BackgroundIndexer {
    /// Spawns the worker task on the current tokio runtime.
    pub fn start(coordinator: Arc<IndexCoordinator>, config: &IndexConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (status_tx, _) = watch::channel(IndexerStatus::default());
        let (update_tx, _) = broadcast::channel(32);

        spawn_index_loop(
            Arc::clone(&coordinator),
            config.debounce,
            command_rx,
            update_tx.clone(),
            status_tx.clone(),
        );

        Self {
            inner: Arc::new(BackgroundIndexerInner {
                coordinator,
                command_tx,
                update_tx,
                status_tx,
            }),
        }
    }

    #[must_use]
    pub fn coordinator(&self) -> &Arc<IndexCoordinator> {
        &self.inner.coordinator
    }

    #[must_use]
    pub fn requester(&self) -> ReindexRequester {
        ReindexRequester {
            command_tx: self.inner.command_tx.clone(),
        }
    }

    pub async fn request(&self, target: ReindexTarget, reason: impl Into<String>) -> Result<()> {
        self.inner
            .command_tx
            .send(IndexerCommand::Reindex {
                target,
                reason: reason.into(),
                done: None,
            })
            .await
            .map_err(|e| IndexError::Other(format!("failed to send reindex request: {e}")))
    }

    pub fn try_request(&self, target: ReindexTarget, reason: impl Into<String>) -> Result<()> {
        self.requester().try_request(target, reason)
    }

    /// Queues a reindex and waits until a run covering `target` has finished.
    pub async fn reindex_and_wait(
        &self,
        target: ReindexTarget,
        reason: impl Into<String>,
    ) -> Result<IndexUpdate> {
        let (done_tx, done_rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(IndexerCommand::Reindex {
                target,
                reason: reason.into(),
                done: Some(done_tx),
            })
            .await
            .map_err(|e| IndexError::Other(format!("failed to send reindex request: {e}")))?;
        done_rx
            .await
            .map_err(|_| IndexError::Other("indexer stopped before finishing".to_string()))
    }

    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<IndexUpdate> {
        self.inner.update_tx.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> IndexerStatus {
        self.inner.status_tx.borrow().clone()
    }

    #[must_use]
    pub fn status_stream(&self) -> watch::Receiver<IndexerStatus> {
        self.inner.status_tx.subscribe()
    }
}

impl Drop for BackgroundIndexer {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(IndexerCommand::Shutdown);
        }
    }
}

/// Requests accumulated for the next run.
#[derive(Default)]
struct PendingRun {
    target: Option<ReindexTarget>,
    reasons: Vec<String>,
    waiters: Vec<oneshot::Sender<IndexUpdate>>,
}

impl PendingRun {
    fn add(
        &mut self,
        target: ReindexTarget,
        reasons: impl IntoIterator<Item = String>,
        waiters: impl IntoIterator<Item = oneshot::Sender<IndexUpdate>>,
    ) {
        self.target = Some(match self.target.take() {
            Some(pending) => pending.merge(target),
            None => target,
        });
        self.reasons.extend(reasons);
        self.waiters.extend(waiters);
    }

    fn len(&self) -> usize {
        self.reasons.len()
    }

    fn is_empty(&self) -> bool {
        self.target.is_none()
    }

    fn take(&mut self) -> Option<(ReindexTarget, Vec<String>, Vec<oneshot::Sender<IndexUpdate>>)> {
        let target = self.target.take()?;
        Some((
            target,
            std::mem::take(&mut self.reasons),
            std::mem::take(&mut self.waiters),
        ))
    }
}

fn spawn_index_loop(
    coordinator: Arc<IndexCoordinator>,
    debounce: Duration,
    mut command_rx: mpsc::Receiver<IndexerCommand>,
    update_tx: broadcast::Sender<IndexUpdate>,
    status_tx: watch::Sender<IndexerStatus>,
) {
    tokio::spawn(async move {
        let mut pending = PendingRun::default();
        let mut status = IndexerStatus::default();
        let mut shutdown = false;

        while !shutdown {
            match command_rx.recv().await {
                Some(IndexerCommand::Reindex {
                    target,
                    reason,
                    done,
                }) => pending.add(target, Some(reason), done),
                Some(IndexerCommand::Shutdown) | None => break,
            }

            // Coalesce whatever else arrives within the window.
            let deadline = time::Instant::now() + debounce;
            loop {
                match time::timeout_at(deadline, command_rx.recv()).await {
                    Ok(Some(IndexerCommand::Reindex {
                        target,
                        reason,
                        done,
                    })) => pending.add(target, Some(reason), done),
                    Ok(Some(IndexerCommand::Shutdown) | None) => {
                        shutdown = true;
                        break;
                    }
                    Err(_) => break,
                }
            }

            while let Some((target, reasons, waiters)) = pending.take() {
                if shutdown {
                    break;
                }
                status.indexing = true;
                status.pending_requests = 0;
                status_tx.send_replace(status.clone());

                let token = coordinator.begin_reindex();
                let generation = token.generation();
                let run_target = target.clone();
                let run_coordinator = Arc::clone(&coordinator);
                let mut run = tokio::task::spawn_blocking(move || {
                    run_coordinator.reindex(&run_target, &token)
                });

                let result = loop {
                    tokio::select! {
                        result = &mut run => break result,
                        command = command_rx.recv(), if !shutdown => {
                            match command {
                                Some(IndexerCommand::Reindex { target, reason, done }) => {
                                    pending.add(target, Some(reason), done);
                                    status.pending_requests = pending.len();
                                    status_tx.send_replace(status.clone());
                                }
                                Some(IndexerCommand::Shutdown) | None => shutdown = true,
                            }
                            // Newer work supersedes the run in flight.
                            coordinator.begin_reindex();
                        }
                    }
                };

                status.indexing = false;
                let finished = match result {
                    Ok(Ok(stats)) if stats.cancelled => {
                        status.runs_superseded += 1;
                        pending.add(target, reasons, waiters);
                        None
                    }
                    Ok(Ok(stats)) => {
                        info!(
                            "Reindex generation {generation} finished in {}ms",
                            stats.duration.as_millis()
                        );
                        status.runs_completed += 1;
                        status.consecutive_failures = 0;
                        status.last_error = None;
                        status.last_success_unix_ms = Some(unix_now_ms());
                        status.last_duration_ms = Some(stats.duration.as_millis() as u64);
                        let update = IndexUpdate {
                            generation,
                            target,
                            reasons,
                            stats: Some(stats),
                            error: None,
                            finished_at_unix_ms: unix_now_ms(),
                        };
                        Some((waiters, update))
                    }
                    Ok(Err(err)) => {
                        error!("Reindex generation {generation} failed: {err}");
                        let update =
                            failure(&mut status, generation, target, reasons, err.to_string());
                        Some((waiters, update))
                    }
                    Err(err) => {
                        error!("Reindex task for generation {generation} panicked: {err}");
                        let update =
                            failure(&mut status, generation, target, reasons, err.to_string());
                        Some((waiters, update))
                    }
                };

                status.pending_requests = pending.len();
                status_tx.send_replace(status.clone());
                if let Some((waiters, update)) = finished {
                    publish(&update_tx, waiters, update);
                }
            }
        }

        if !pending.is_empty() {
            warn!("Indexer stopped with {} pending request(s)", pending.len());
        }
    });
}

fn failure(
    status: &mut IndexerStatus,
    generation: u64,
    target: ReindexTarget,
    reasons: Vec<String>,
    error: String,
) -> IndexUpdate {
    status.consecutive_failures += 1;
    status.last_error = Some(error.clone());
    IndexUpdate {
        generation,
        target,
        reasons,
        stats: None,
        error: Some(error),
        finished_at_unix_ms: unix_now_ms(),
    }
}

fn publish(
    update_tx: &broadcast::Sender<IndexUpdate>,
    waiters: Vec<oneshot::Sender<IndexUpdate>>,
    update: IndexUpdate,
) {
    for waiter in waiters {
        let _ = waiter.send(update.clone());
    }
    let _ = update_tx.send(update);
}
