//! Product deduplication sink
//!
//! Collapses duplicate products (the same product id seen via multiple
//! category or store paths) into one canonical record and keeps the running
//! totals the progress surface reports.

use crate::checkpoint::{CheckpointResult, CheckpointStore, CrawlTotals, IngestCounts};
use crate::fetch::RawProduct;
use crate::state::{CrawlUnit, UnitState};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Shared handle to the checkpoint store
pub type SharedCheckpoint = Arc<Mutex<dyn CheckpointStore + Send>>;

/// What happened to one fetched page's products
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The page was new; counts describe what it added
    Recorded(IngestCounts),

    /// The origin page was already ingested (replay after crash or resume)
    Replayed,
}

/// Aggregation sink over the checkpoint store
///
/// Ingestion is idempotent per origin page: the unit's `Done` state acts as
/// a fence for whole closed pairs, and the durable origin ledger fences
/// individual replayed pages. Counters only ever grow.
pub struct ProductSink {
    checkpoint: SharedCheckpoint,
    total_fetched: AtomicU64,
    unique_products: AtomicU64,
}

impl ProductSink {
    /// Creates a sink over the checkpoint store, priming the running totals
    /// from whatever a prior run already recorded
    pub fn new(checkpoint: SharedCheckpoint) -> CheckpointResult<Self> {
        let totals = checkpoint.lock().unwrap().totals()?;
        Ok(Self {
            checkpoint,
            total_fetched: AtomicU64::new(totals.total_fetched),
            unique_products: AtomicU64::new(totals.unique_products),
        })
    }

    /// Ingests the products of one fetched page
    ///
    /// A result for a unit already `Done` is discarded; an already-recorded
    /// origin page is discarded. Either way the totals are unchanged.
    pub fn ingest(
        &self,
        origin: &CrawlUnit,
        products: &[RawProduct],
    ) -> CheckpointResult<IngestOutcome> {
        let counts = {
            let mut checkpoint = self.checkpoint.lock().unwrap();

            if let Some(unit) = checkpoint.get_unit(&origin.store, origin.category)? {
                if unit.state == UnitState::Done {
                    tracing::debug!(
                        "Discarding fetch result for closed unit {}",
                        origin
                    );
                    return Ok(IngestOutcome::Replayed);
                }
            }

            checkpoint.record_products(origin, products)?
        };

        if counts.replayed {
            tracing::debug!("Origin {} already recorded, ignoring replay", origin);
            return Ok(IngestOutcome::Replayed);
        }

        self.total_fetched.fetch_add(counts.fetched, Ordering::Relaxed);
        self.unique_products
            .fetch_add(counts.new_products, Ordering::Relaxed);

        Ok(IngestOutcome::Recorded(counts))
    }

    /// Running totals
    pub fn totals(&self) -> CrawlTotals {
        CrawlTotals {
            total_fetched: self.total_fetched.load(Ordering::Relaxed),
            unique_products: self.unique_products.load(Ordering::Relaxed),
        }
    }
}
