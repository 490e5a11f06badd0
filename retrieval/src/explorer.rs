//! Concurrent multi-seed explorer.
//!
//! One task per seed, each inside its own read transaction; results surface
//! in completion order. Tasks are independent — the only shared state is the
//! read-only store handle and the immutable configuration. Cancellation is
//! cooperative: tasks are never hard-aborted, so a cancelled exploration
//! still rolls its transaction back before exiting.

use crate::traversal::GraphTraversalState;
use engram_core::config::{InvalidConfig, RetrieverConfig};
use engram_core::model::{RetrievalResult, SeedInput};
use std::sync::Arc;
use std::time::Duration;
use stores::{ExpandOptions, GraphStore, GraphTx, StoreError};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, warn};

const BACKOFF_BASE_MS: u64 = 50;

pub struct GraphExplorer {
    store: Arc<dyn GraphStore>,
    config: RetrieverConfig,
}

impl GraphExplorer {
    pub fn new(store: Arc<dyn GraphStore>, config: RetrieverConfig) -> Result<Self, InvalidConfig> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Launches one exploration task per seed.
    ///
    /// An empty seed list produces a stream that is immediately exhausted.
    pub fn explore(&self, seeds: Vec<SeedInput>, query_tags: Vec<String>) -> ExplorationStream {
        let mut tasks = JoinSet::new();
        let (cancel, _) = watch::channel(false);
        let query_tags = Arc::new(query_tags);
        for seed in seeds {
            let store = Arc::clone(&self.store);
            let config = self.config.clone();
            let query_tags = Arc::clone(&query_tags);
            let cancelled = cancel.subscribe();
            tasks.spawn(async move {
                explore_with_retry(store, config, seed, query_tags, cancelled).await
            });
        }
        ExplorationStream { tasks, cancel }
    }
}

/// Stream of exploration results in completion order.
///
/// [`shutdown`] cancels all outstanding explorations and awaits them;
/// dropping the stream signals the same cancellation and detaches the tasks,
/// which roll their transactions back and exit on their own.
///
/// [`shutdown`]: ExplorationStream::shutdown
pub struct ExplorationStream {
    tasks: JoinSet<Option<RetrievalResult>>,
    cancel: watch::Sender<bool>,
}

impl ExplorationStream {
    /// Next finished exploration, or `None` once every task has been drained.
    /// Explorations that exhausted their retries have already been logged and
    /// are skipped here.
    pub async fn next(&mut self) -> Option<RetrievalResult> {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Some(result)) => return Some(result),
                Ok(None) => continue,
                Err(join_error) if join_error.is_cancelled() => continue,
                Err(join_error) => {
                    warn!(error = %join_error, "exploration task aborted abnormally");
                    continue;
                }
            }
        }
        None
    }

    /// Outstanding explorations.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancels all outstanding explorations and awaits their termination.
    /// Each task finishes its read transaction before exiting.
    pub async fn shutdown(mut self) {
        let _ = self.cancel.send(true);
        while self.tasks.join_next().await.is_some() {}
    }
}

impl Drop for ExplorationStream {
    fn drop(&mut self) {
        // Signal instead of aborting: an abort would drop a task between
        // suspension points and leak its open transaction. Detached tasks
        // observe the signal, roll back and exit on their own.
        let _ = self.cancel.send(true);
        std::mem::take(&mut self.tasks).detach_all();
    }
}

enum ExplorationOutcome {
    Done(RetrievalResult),
    Cancelled,
    Failed(StoreError),
}

async fn explore_with_retry(
    store: Arc<dyn GraphStore>,
    config: RetrieverConfig,
    seed: SeedInput,
    query_tags: Arc<Vec<String>>,
    mut cancelled: watch::Receiver<bool>,
) -> Option<RetrievalResult> {
    let attempts = config.max_retries + 1;
    for attempt in 0..attempts {
        match explore_single(store.as_ref(), &config, &seed, &query_tags, &mut cancelled).await {
            ExplorationOutcome::Done(result) => return Some(result),
            ExplorationOutcome::Cancelled => {
                debug!(seed = %seed.node_id, "exploration cancelled");
                return None;
            }
            ExplorationOutcome::Failed(error) => {
                warn!(
                    seed = %seed.node_id,
                    attempt = attempt + 1,
                    attempts,
                    %error,
                    "exploration attempt failed"
                );
                if attempt + 1 < attempts {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(BACKOFF_BASE_MS << attempt)) => {}
                        _ = wait_cancelled(&mut cancelled) => {
                            debug!(seed = %seed.node_id, "exploration cancelled");
                            return None;
                        }
                    }
                }
            }
        }
    }
    warn!(seed = %seed.node_id, "exploration discarded after exhausting retries");
    None
}

async fn explore_single(
    store: &dyn GraphStore,
    config: &RetrieverConfig,
    seed: &SeedInput,
    query_tags: &[String],
    cancelled: &mut watch::Receiver<bool>,
) -> ExplorationOutcome {
    let mut tx = match store.begin_read().await {
        Ok(tx) => tx,
        Err(error) => return ExplorationOutcome::Failed(error),
    };

    // Race the traversal against cancellation so the rollback below runs on
    // every exit path; a cancelled task must not leave an open transaction.
    let outcome = tokio::select! {
        outcome = drive_exploration(tx.as_mut(), config, seed, query_tags) => match outcome {
            Ok(result) => ExplorationOutcome::Done(result),
            Err(error) => ExplorationOutcome::Failed(error),
        },
        _ = wait_cancelled(cancelled) => ExplorationOutcome::Cancelled,
    };

    // The transaction is read-only; a failed rollback costs nothing beyond a
    // server-side expiry.
    if let Err(error) = tx.finish().await {
        debug!(seed = %seed.node_id, %error, "read transaction rollback failed");
    }
    outcome
}

/// Resolves once cancellation is signalled. A closed channel means the
/// owning stream is gone and counts as cancellation.
async fn wait_cancelled(cancelled: &mut watch::Receiver<bool>) {
    loop {
        if *cancelled.borrow_and_update() {
            return;
        }
        if cancelled.changed().await.is_err() {
            return;
        }
    }
}

async fn drive_exploration(
    tx: &mut dyn GraphTx,
    config: &RetrieverConfig,
    seed: &SeedInput,
    query_tags: &[String],
) -> Result<RetrievalResult, StoreError> {
    let Some(seed_node) = tx.fetch_seed(&seed.node_id).await? else {
        debug!(seed = %seed.node_id, "seed node not found in graph");
        return Ok(RetrievalResult::seed_not_found(seed.clone()));
    };

    let mut state = GraphTraversalState::new(seed.clone(), seed_node, config.max_branches);
    let options = ExpandOptions {
        query_tags,
        tag_sim_floor: config.tag_sim_floor,
        min_activation: config.min_activation,
    };

    for _depth in 0..config.max_depth {
        if !state.is_active() {
            break;
        }
        let frontier = state.frontier_inputs();
        let candidates = tx
            .expand_frontier(&frontier, state.visited(), &options)
            .await?;
        let update = state.select_next_frontier(&candidates);
        state.apply(update);
    }

    state.finalize_remaining();
    Ok(state.into_result())
}
