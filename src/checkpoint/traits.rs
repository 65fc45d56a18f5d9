//! Checkpoint store trait and error types

use crate::catalog::{CategoryId, StoreId};
use crate::checkpoint::{
    CategoryProgress, CrawlCheckpoint, CrawlTotals, IngestCounts, RunRecord, StoreProgress,
    UnitRecord,
};
use crate::fetch::RawProduct;
use crate::state::{CrawlUnit, UnitState};
use thiserror::Error;

/// Errors that can occur during checkpoint operations
///
/// These are fatal to the running process: once the checkpoint cannot be
/// read or written, progress can no longer be trusted. Prior checkpoints are
/// never corrupted — SQLite journals writes ahead and compacts on commit.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unit not found: store {store} / category {category}")]
    UnitNotFound { store: String, category: u64 },

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: UnitState, to: UnitState },

    #[error("Page cursor out of sequence: expected {expected}, got {got}")]
    CursorGap { expected: u32, got: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Trait for checkpoint store implementations
///
/// Any durable key-value or document store can satisfy this contract; the
/// crate ships a SQLite implementation. All unit transitions are validated
/// against the state machine, so a `Done` unit can never regress.
pub trait CheckpointStore {
    // ===== Run Ledger =====

    /// Creates a new crawl run, returning its id
    fn create_run(&mut self, config_hash: &str) -> CheckpointResult<i64>;

    /// Gets a run by id
    fn get_run(&self, run_id: i64) -> CheckpointResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> CheckpointResult<Option<RunRecord>>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> CheckpointResult<()>;

    /// Records the planner's coverage outcome on a run
    fn set_run_coverage(
        &mut self,
        run_id: i64,
        achieved: f64,
        target: f64,
    ) -> CheckpointResult<()>;

    // ===== Unit Lifecycle =====

    /// Inserts a unit in `Pending` at the first page cursor
    ///
    /// Returns true if the unit was newly created, false if it already
    /// existed (a restored unit).
    fn insert_unit(&mut self, store: &StoreId, category: CategoryId) -> CheckpointResult<bool>;

    /// Gets one unit record
    fn get_unit(
        &self,
        store: &StoreId,
        category: CategoryId,
    ) -> CheckpointResult<Option<UnitRecord>>;

    /// The next page cursor to fetch for a unit still in progress
    ///
    /// Returns None when the unit is not in `Pending`.
    fn next_pending(&self, store: &StoreId, category: CategoryId)
        -> CheckpointResult<Option<u32>>;

    /// Transitions `Pending -> InFlight`
    fn mark_in_flight(&mut self, store: &StoreId, category: CategoryId) -> CheckpointResult<()>;

    /// Records a successful page fetch
    ///
    /// With `has_more` the unit returns to `Pending` at the next cursor;
    /// without it the pair is closed permanently (`Done`). The cursor must
    /// match the unit's current cursor — pages complete in sequence with no
    /// gaps.
    fn mark_done(
        &mut self,
        store: &StoreId,
        category: CategoryId,
        cursor: u32,
        has_more: bool,
    ) -> CheckpointResult<()>;

    /// Transitions `InFlight -> Failed`, incrementing and returning the
    /// retry count
    fn mark_failed(
        &mut self,
        store: &StoreId,
        category: CategoryId,
        error: &str,
    ) -> CheckpointResult<u32>;

    /// Transitions `Failed -> Pending` for a retry at the same cursor
    fn requeue_for_retry(&mut self, store: &StoreId, category: CategoryId)
        -> CheckpointResult<()>;

    /// Transitions `Pending -> Skipped` with an operator-visible reason
    fn mark_skipped(
        &mut self,
        store: &StoreId,
        category: CategoryId,
        reason: &str,
    ) -> CheckpointResult<()>;

    /// Crash recovery: requeues every `InFlight` unit as `Pending`
    ///
    /// Run at process start. The fetch side is at-least-once; the sink's
    /// idempotent ingestion absorbs the possible duplicate fetch.
    fn requeue_in_flight(&mut self) -> CheckpointResult<u64>;

    /// Clears all unit and product state for a fresh crawl
    ///
    /// The run ledger is kept; prior runs remain on record.
    fn reset(&mut self) -> CheckpointResult<()>;

    // ===== Product Recording =====

    /// Records the products of one fetched page, idempotently per origin
    ///
    /// A page origin `(store, category, cursor)` is recorded at most once;
    /// replaying the same origin changes nothing and reports `replayed`.
    /// New products are created on first sighting; later sightings extend
    /// the product's (store, category) sighting set without duplicating it.
    fn record_products(
        &mut self,
        origin: &CrawlUnit,
        products: &[RawProduct],
    ) -> CheckpointResult<IngestCounts>;

    // ===== Aggregates =====

    /// Aggregate crawl counters
    fn totals(&self) -> CheckpointResult<CrawlTotals>;

    /// All units currently in the given state
    fn units_in_state(&self, state: UnitState) -> CheckpointResult<Vec<UnitRecord>>;

    /// Number of units in the given state
    fn count_units_in_state(&self, state: UnitState) -> CheckpointResult<u64>;

    /// Per-category progress summaries, ordered by category id
    fn category_progress(&self) -> CheckpointResult<Vec<CategoryProgress>>;

    /// Per-store progress summaries, ordered by store id
    fn store_progress(&self) -> CheckpointResult<Vec<StoreProgress>>;

    /// Full durable projection of the crawl state
    fn snapshot(&self) -> CheckpointResult<CrawlCheckpoint>;
}
