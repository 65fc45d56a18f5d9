//! Durable crawl checkpoint store
//!
//! Persists the state of every (store, category) unit plus aggregate
//! counters, so a killed crawler process can be restarted and resume exactly
//! where it stopped, including mid-category pagination.

mod schema;
mod sqlite;
mod traits;

pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::SqliteCheckpoint;
pub use traits::{CheckpointError, CheckpointResult, CheckpointStore};

use crate::catalog::{CategoryId, StoreId};
use crate::state::UnitState;

/// One checkpointed (store, category) unit
///
/// Progress within the pair is tracked as the next cursor to fetch, not one
/// row per page.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRecord {
    pub store: StoreId,
    pub category: CategoryId,
    pub state: UnitState,

    /// The next page cursor to fetch for this pair
    pub next_cursor: u32,

    /// Consecutive failed attempts at the current cursor
    pub retry_count: u32,

    /// Last failure or skip reason, when present
    pub error_message: Option<String>,

    /// RFC 3339 timestamp of the last transition
    pub updated_at: Option<String>,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// One row of the run ledger
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,

    /// Coverage fraction the planner achieved, once planning has run
    pub coverage_achieved: Option<f64>,

    /// Coverage fraction the planner was asked for
    pub coverage_target: Option<f64>,
}

/// Aggregate crawl counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlTotals {
    /// Product listings ingested, counting every sighting once per origin page
    pub total_fetched: u64,

    /// Distinct products recorded across the whole run
    pub unique_products: u64,
}

/// Durable projection of the whole crawl state
#[derive(Debug, Clone)]
pub struct CrawlCheckpoint {
    pub units: Vec<UnitRecord>,
    pub totals: CrawlTotals,
}

impl CrawlCheckpoint {
    /// Units that a restarted scheduler still has work for
    pub fn open_units(&self) -> impl Iterator<Item = &UnitRecord> {
        self.units.iter().filter(|u| u.state.is_active())
    }
}

/// Per-category progress summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryProgress {
    pub category: CategoryId,
    pub pages_fetched: u64,
    pub products_seen: u64,
    pub stores_done: u64,
    pub stores_total: u64,
}

/// Per-store progress summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreProgress {
    pub store: StoreId,
    pub pages_fetched: u64,
    pub products_seen: u64,
    pub categories_done: u64,
    pub categories_total: u64,
}

/// What one `record_products` call changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestCounts {
    /// Listings on the page (zero when the origin was a replay)
    pub fetched: u64,

    /// Products recorded for the first time
    pub new_products: u64,

    /// New (product, store, category) sightings
    pub new_sightings: u64,

    /// True when this origin page had already been recorded
    pub replayed: bool,
}
