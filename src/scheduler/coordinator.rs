//! Crawl coordinator - main orchestration logic
//!
//! Owns the whole crawl lifecycle: planning (or resuming from checkpoint),
//! seeding the worklist, driving per-store lane workers under the
//! concurrency ceiling, and producing the final run summary.

use crate::checkpoint::{CheckpointStore, CrawlTotals, RunStatus, SqliteCheckpoint, UnitRecord};
use crate::config::Config;
use crate::fetch::{FetchError, FetchPort};
use crate::planner::plan_crawl;
use crate::scheduler::worklist::{lane_assignments, seed_worklist, SeedOutcome};
use crate::sink::{ProductSink, SharedCheckpoint};
use crate::state::{backoff_delay, CrawlUnit, LaneState, UnitState};
use crate::catalog::{CategoryId, StoreId};
use crate::{Result, ShelfmapError};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

/// Requests run-level cancellation
///
/// Cancellation stops issuing new fetches promptly; in-flight fetches
/// complete or hit the enforced timeout, and the checkpoint is left cleanly
/// resumable.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// What a finished (or interrupted) run looked like
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Pages fetched by this process
    pub pages_fetched: u64,

    /// Aggregate product counters over the whole checkpoint
    pub totals: CrawlTotals,

    /// Units that exhausted their retry budget
    pub failed_units: Vec<UnitRecord>,

    /// Planner outcome (achieved, target), when this run planned
    pub coverage: Option<(f64, f64)>,

    /// Worklist accounting for this run
    pub seed: SeedOutcome,

    /// True when the run was interrupted by cancellation
    pub cancelled: bool,
}

/// Main crawl coordinator
pub struct Coordinator {
    config: Arc<Config>,
    checkpoint: SharedCheckpoint,
    sink: Arc<ProductSink>,
    fetch: Arc<dyn FetchPort>,
    run_id: i64,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Opens the checkpoint database, requeues units left in-flight by a
    /// crashed process, and creates or resumes a run-ledger entry. With
    /// `fresh` the unit and product tables are cleared first; the run ledger
    /// itself is never erased.
    pub fn new(
        config: Config,
        config_hash: &str,
        fetch: Arc<dyn FetchPort>,
        fresh: bool,
    ) -> Result<Self> {
        let path = Path::new(&config.output.database_path);
        let mut checkpoint = SqliteCheckpoint::new(path)?;

        if fresh {
            checkpoint.reset()?;
        }

        let requeued = checkpoint.requeue_in_flight()?;
        if requeued > 0 {
            tracing::info!(
                "Requeued {} in-flight units left by a previous process",
                requeued
            );
        }

        let run_id = if fresh {
            checkpoint.create_run(config_hash)?
        } else if let Some(latest) = checkpoint.get_latest_run()? {
            if matches!(latest.status, RunStatus::Running) {
                tracing::info!("Resuming interrupted run {}", latest.id);
                latest.id
            } else {
                tracing::info!("Starting new run");
                checkpoint.create_run(config_hash)?
            }
        } else {
            tracing::info!("No previous runs found, starting new run");
            checkpoint.create_run(config_hash)?
        };

        let checkpoint: SharedCheckpoint = Arc::new(Mutex::new(checkpoint));
        let sink = Arc::new(ProductSink::new(checkpoint.clone())?);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        Ok(Self {
            config: Arc::new(config),
            checkpoint,
            sink,
            fetch,
            run_id,
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        })
    }

    /// Handle for requesting cancellation from outside the run loop
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel_tx.clone(),
        }
    }

    /// Shared checkpoint handle, for reporting after the run
    pub fn checkpoint(&self) -> SharedCheckpoint {
        self.checkpoint.clone()
    }

    /// Runs the crawl to completion (or cancellation)
    ///
    /// A fresh checkpoint goes through the planning phase first; a
    /// checkpoint with existing units resumes them without replanning.
    pub async fn run(&mut self) -> Result<RunSummary> {
        tracing::info!("Starting crawl run {}", self.run_id);
        let start_time = Instant::now();

        // Plan or resume.
        let existing_units = self.checkpoint.lock().unwrap().snapshot()?.units;
        let (categories, coverage) = if existing_units.is_empty() {
            let planned = plan_crawl(&self.config, self.fetch.as_ref()).await?;
            self.checkpoint.lock().unwrap().set_run_coverage(
                self.run_id,
                planned.plan.achieved,
                planned.plan.target,
            )?;
            let categories: Vec<CategoryId> = planned
                .representatives
                .iter()
                .map(|t| t.canonical_id)
                .collect();
            (categories, Some((planned.plan.achieved, planned.plan.target)))
        } else {
            tracing::info!(
                "Resuming from checkpoint: {} units on record",
                existing_units.len()
            );
            let categories: BTreeSet<CategoryId> =
                existing_units.iter().map(|u| u.category).collect();
            (categories.into_iter().collect(), None)
        };

        // Seed the worklist and carve it into store lanes.
        let seed = {
            let mut checkpoint = self.checkpoint.lock().unwrap();
            seed_worklist(
                &mut *checkpoint,
                &self.config.stores,
                &categories,
                &self.config.skip,
            )?
        };
        tracing::info!(
            "Worklist: {} units restored, {} discovered, {} skipped",
            seed.restored,
            seed.discovered,
            seed.skipped
        );

        let lanes = lane_assignments(&self.checkpoint.lock().unwrap().snapshot()?);
        tracing::info!(
            "Dispatching {} store lanes (up to {} concurrent)",
            lanes.len(),
            self.config.crawler.max_concurrent_stores
        );

        let semaphore = Arc::new(Semaphore::new(
            self.config.crawler.max_concurrent_stores as usize,
        ));
        let pages_fetched = Arc::new(AtomicU64::new(0));
        let mut join_set = JoinSet::new();

        for (store_id, lane_categories) in lanes {
            let semaphore = semaphore.clone();
            let config = self.config.clone();
            let checkpoint = self.checkpoint.clone();
            let sink = self.sink.clone();
            let fetch = self.fetch.clone();
            let cancel = self.cancel_rx.clone();
            let pages = pages_fetched.clone();

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Ok(()),
                };
                run_lane(
                    store_id,
                    lane_categories,
                    config,
                    checkpoint,
                    sink,
                    fetch,
                    cancel,
                    pages,
                )
                .await
            });
        }

        // Any lane error is a persistence failure and aborts the run.
        let mut failure: Option<ShelfmapError> = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!("Lane worker failed: {}", e);
                    if failure.is_none() {
                        failure = Some(e);
                    }
                    join_set.abort_all();
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(ShelfmapError::Worker(e.to_string()));
                    }
                    join_set.abort_all();
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        let cancelled = *self.cancel_rx.borrow();
        let (totals, failed_units) = {
            let checkpoint = self.checkpoint.lock().unwrap();
            (
                checkpoint.totals()?,
                checkpoint.units_in_state(UnitState::Failed)?,
            )
        };

        if cancelled {
            tracing::info!(
                "Crawl interrupted after {:?}; run {} left open for resume",
                start_time.elapsed(),
                self.run_id
            );
        } else {
            self.checkpoint.lock().unwrap().complete_run(self.run_id)?;
            tracing::info!(
                "Crawl completed: {} pages fetched, {} unique products in {:?}",
                pages_fetched.load(Ordering::Relaxed),
                totals.unique_products,
                start_time.elapsed()
            );
        }

        Ok(RunSummary {
            pages_fetched: pages_fetched.load(Ordering::Relaxed),
            totals,
            failed_units,
            coverage,
            seed,
            cancelled,
        })
    }
}

/// Processes every category assigned to one store lane, in order
///
/// The lane is the only writer for its (store, *) units, so pagination
/// order within each pair is sequential by construction and no fine-grained
/// locking beyond the checkpoint mutex is needed.
#[allow(clippy::too_many_arguments)]
async fn run_lane(
    store_id: StoreId,
    categories: Vec<CategoryId>,
    config: Arc<Config>,
    checkpoint: SharedCheckpoint,
    sink: Arc<ProductSink>,
    fetch: Arc<dyn FetchPort>,
    mut cancel: watch::Receiver<bool>,
    pages_fetched: Arc<AtomicU64>,
) -> Result<()> {
    let mut lane = LaneState::new();
    tracing::debug!(
        "Lane {} starting with {} categories",
        store_id,
        categories.len()
    );

    'categories: for category in categories {
        loop {
            if *cancel.borrow() {
                break 'categories;
            }

            let unit = checkpoint.lock().unwrap().get_unit(&store_id, category)?;
            let Some(unit) = unit else {
                break;
            };

            match unit.state {
                UnitState::Done | UnitState::Skipped => break,
                UnitState::Failed => {
                    if unit.retry_count > config.crawler.max_retries {
                        tracing::error!(
                            "Unit store {} / category {} permanently failed after {} attempts: {}",
                            store_id,
                            category,
                            unit.retry_count,
                            unit.error_message.as_deref().unwrap_or("unknown error")
                        );
                        break;
                    }
                    let delay = backoff_delay(
                        config.crawler.retry_backoff_ms,
                        unit.retry_count.saturating_sub(1),
                    );
                    tracing::debug!(
                        "Retry {}/{} for store {} / category {} in {:?}",
                        unit.retry_count,
                        config.crawler.max_retries,
                        store_id,
                        category,
                        delay
                    );
                    if !sleep_or_cancel(delay, &mut cancel).await {
                        break 'categories;
                    }
                    checkpoint
                        .lock()
                        .unwrap()
                        .requeue_for_retry(&store_id, category)?;
                    continue;
                }
                UnitState::InFlight => {
                    // Single-writer lanes make this unreachable once startup
                    // requeue has run.
                    tracing::warn!(
                        "Unit store {} / category {} unexpectedly in flight, leaving it",
                        store_id,
                        category
                    );
                    break;
                }
                UnitState::Pending => {}
            }
            let cursor = unit.next_cursor;

            // Lane pacing: the anti-bot minimum gap between requests.
            if let Some(wait) = lane.time_until_next_request(&config.crawler, Instant::now()) {
                if !sleep_or_cancel(wait, &mut cancel).await {
                    break 'categories;
                }
            }
            if *cancel.borrow() {
                break 'categories;
            }

            checkpoint
                .lock()
                .unwrap()
                .mark_in_flight(&store_id, category)?;
            lane.record_request(Instant::now());

            let crawl_unit = CrawlUnit::new(store_id.clone(), category, cursor);
            let outcome = tokio::time::timeout(
                Duration::from_millis(config.crawler.fetch_timeout_ms),
                fetch.fetch_page(crawl_unit.clone()),
            )
            .await;

            match outcome {
                Ok(Ok(page)) => {
                    sink.ingest(&crawl_unit, &page.products)?;
                    checkpoint
                        .lock()
                        .unwrap()
                        .mark_done(&store_id, category, cursor, page.has_more)?;

                    let fetched = pages_fetched.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::debug!(
                        "Fetched {}: {} products, has_more={}",
                        crawl_unit,
                        page.products.len(),
                        page.has_more
                    );
                    if fetched % config.crawler.progress_interval == 0 {
                        let totals = sink.totals();
                        tracing::info!(
                            "Progress: {} pages fetched, {} unique products",
                            fetched,
                            totals.unique_products
                        );
                    }
                }
                Ok(Err(err)) => {
                    log_fetch_error(&crawl_unit, &err);
                    if matches!(err, FetchError::Blocked) {
                        lane.mark_throttled();
                    }
                    checkpoint
                        .lock()
                        .unwrap()
                        .mark_failed(&store_id, category, &err.to_string())?;
                }
                Err(_elapsed) => {
                    let err = FetchError::Timeout;
                    log_fetch_error(&crawl_unit, &err);
                    checkpoint
                        .lock()
                        .unwrap()
                        .mark_failed(&store_id, category, &err.to_string())?;
                }
            }
        }
    }

    tracing::debug!("Lane {} finished", store_id);
    Ok(())
}

/// Sleeps for the given duration unless cancellation arrives first
///
/// Returns false when the sleep was interrupted by cancellation.
async fn sleep_or_cancel(delay: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    if *cancel.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = cancel.changed() => false,
    }
}

/// Logs a fetch failure with a variant-specific message for diagnosis
fn log_fetch_error(unit: &CrawlUnit, err: &FetchError) {
    match err {
        FetchError::Blocked => {
            tracing::warn!("Blocked while fetching {}", unit);
        }
        FetchError::Timeout => {
            tracing::warn!("Timed out fetching {}", unit);
        }
        FetchError::BrowserCrash(msg) => {
            tracing::error!("Browser crash fetching {}: {}", unit, msg);
        }
        FetchError::ParseError(msg) => {
            tracing::warn!("Unparseable listing payload for {}: {}", unit, msg);
        }
    }
}
