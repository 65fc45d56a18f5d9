//! SQLite checkpoint implementation

use crate::catalog::{CategoryId, StoreId};
use crate::checkpoint::schema::initialize_schema;
use crate::checkpoint::traits::{CheckpointError, CheckpointResult, CheckpointStore};
use crate::checkpoint::{
    CategoryProgress, CrawlCheckpoint, CrawlTotals, IngestCounts, RunRecord, RunStatus,
    StoreProgress, UnitRecord,
};
use crate::fetch::RawProduct;
use crate::state::{CrawlUnit, UnitState, FIRST_PAGE};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite checkpoint backend
pub struct SqliteCheckpoint {
    conn: Connection,
}

impl SqliteCheckpoint {
    /// Opens (or creates) the checkpoint database at the given path
    pub fn new(path: &Path) -> CheckpointResult<Self> {
        let conn = Connection::open(path)?;

        // WAL keeps checkpoint writes append-then-compact, never destructive
        // in place.
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory checkpoint (for tests)
    pub fn new_in_memory() -> CheckpointResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn require_unit(&self, store: &StoreId, category: CategoryId) -> CheckpointResult<UnitRecord> {
        self.get_unit(store, category)?
            .ok_or_else(|| CheckpointError::UnitNotFound {
                store: store.to_string(),
                category: category.0,
            })
    }
}

fn row_to_unit(row: &Row<'_>) -> rusqlite::Result<UnitRecord> {
    Ok(UnitRecord {
        store: StoreId::new(row.get::<_, String>(0)?),
        category: CategoryId(row.get::<_, i64>(1)? as u64),
        state: UnitState::from_db_string(&row.get::<_, String>(2)?).unwrap_or(UnitState::Failed),
        next_cursor: row.get::<_, i64>(3)? as u32,
        retry_count: row.get::<_, i64>(4)? as u32,
        error_message: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        coverage_achieved: row.get(5)?,
        coverage_target: row.get(6)?,
    })
}

const UNIT_COLUMNS: &str =
    "store_id, category_id, state, next_cursor, retry_count, error_message, updated_at";
const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, status, coverage_achieved, coverage_target";

impl CheckpointStore for SqliteCheckpoint {
    // ===== Run Ledger =====

    fn create_run(&mut self, config_hash: &str) -> CheckpointResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> CheckpointResult<RunRecord> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS))?;

        stmt.query_row(params![run_id], row_to_run)
            .map_err(|_| CheckpointError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> CheckpointResult<Option<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM runs ORDER BY id DESC LIMIT 1",
            RUN_COLUMNS
        ))?;

        Ok(stmt.query_row([], row_to_run).optional()?)
    }

    fn complete_run(&mut self, run_id: i64) -> CheckpointResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    fn set_run_coverage(
        &mut self,
        run_id: i64,
        achieved: f64,
        target: f64,
    ) -> CheckpointResult<()> {
        self.conn.execute(
            "UPDATE runs SET coverage_achieved = ?1, coverage_target = ?2 WHERE id = ?3",
            params![achieved, target, run_id],
        )?;
        Ok(())
    }

    // ===== Unit Lifecycle =====

    fn insert_unit(&mut self, store: &StoreId, category: CategoryId) -> CheckpointResult<bool> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO units (store_id, category_id, state, next_cursor, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                store.as_str(),
                category.0 as i64,
                UnitState::Pending.to_db_string(),
                FIRST_PAGE as i64,
                now
            ],
        )?;
        Ok(inserted > 0)
    }

    fn get_unit(
        &self,
        store: &StoreId,
        category: CategoryId,
    ) -> CheckpointResult<Option<UnitRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM units WHERE store_id = ?1 AND category_id = ?2",
            UNIT_COLUMNS
        ))?;

        Ok(stmt
            .query_row(params![store.as_str(), category.0 as i64], row_to_unit)
            .optional()?)
    }

    fn next_pending(
        &self,
        store: &StoreId,
        category: CategoryId,
    ) -> CheckpointResult<Option<u32>> {
        let unit = self.require_unit(store, category)?;
        match unit.state {
            UnitState::Pending => Ok(Some(unit.next_cursor)),
            _ => Ok(None),
        }
    }

    fn mark_in_flight(&mut self, store: &StoreId, category: CategoryId) -> CheckpointResult<()> {
        let unit = self.require_unit(store, category)?;
        if !unit.state.may_advance_to(UnitState::InFlight) {
            return Err(CheckpointError::InvalidTransition {
                from: unit.state,
                to: UnitState::InFlight,
            });
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE units SET state = ?1, updated_at = ?2 WHERE store_id = ?3 AND category_id = ?4",
            params![
                UnitState::InFlight.to_db_string(),
                now,
                store.as_str(),
                category.0 as i64
            ],
        )?;
        Ok(())
    }

    fn mark_done(
        &mut self,
        store: &StoreId,
        category: CategoryId,
        cursor: u32,
        has_more: bool,
    ) -> CheckpointResult<()> {
        let unit = self.require_unit(store, category)?;
        let to = if has_more {
            UnitState::Pending
        } else {
            UnitState::Done
        };
        if unit.state != UnitState::InFlight || !unit.state.may_advance_to(to) {
            return Err(CheckpointError::InvalidTransition {
                from: unit.state,
                to,
            });
        }
        if cursor != unit.next_cursor {
            return Err(CheckpointError::CursorGap {
                expected: unit.next_cursor,
                got: cursor,
            });
        }

        let now = Utc::now().to_rfc3339();
        let next_cursor = if has_more { cursor + 1 } else { cursor };
        self.conn.execute(
            "UPDATE units SET state = ?1, next_cursor = ?2, retry_count = 0,
             error_message = NULL, updated_at = ?3
             WHERE store_id = ?4 AND category_id = ?5",
            params![
                to.to_db_string(),
                next_cursor as i64,
                now,
                store.as_str(),
                category.0 as i64
            ],
        )?;
        Ok(())
    }

    fn mark_failed(
        &mut self,
        store: &StoreId,
        category: CategoryId,
        error: &str,
    ) -> CheckpointResult<u32> {
        let unit = self.require_unit(store, category)?;
        if !unit.state.may_advance_to(UnitState::Failed) {
            return Err(CheckpointError::InvalidTransition {
                from: unit.state,
                to: UnitState::Failed,
            });
        }

        let now = Utc::now().to_rfc3339();
        let retries = unit.retry_count + 1;
        self.conn.execute(
            "UPDATE units SET state = ?1, retry_count = ?2, error_message = ?3, updated_at = ?4
             WHERE store_id = ?5 AND category_id = ?6",
            params![
                UnitState::Failed.to_db_string(),
                retries as i64,
                error,
                now,
                store.as_str(),
                category.0 as i64
            ],
        )?;
        Ok(retries)
    }

    fn requeue_for_retry(
        &mut self,
        store: &StoreId,
        category: CategoryId,
    ) -> CheckpointResult<()> {
        let unit = self.require_unit(store, category)?;
        if unit.state != UnitState::Failed {
            return Err(CheckpointError::InvalidTransition {
                from: unit.state,
                to: UnitState::Pending,
            });
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE units SET state = ?1, updated_at = ?2 WHERE store_id = ?3 AND category_id = ?4",
            params![
                UnitState::Pending.to_db_string(),
                now,
                store.as_str(),
                category.0 as i64
            ],
        )?;
        Ok(())
    }

    fn mark_skipped(
        &mut self,
        store: &StoreId,
        category: CategoryId,
        reason: &str,
    ) -> CheckpointResult<()> {
        let unit = self.require_unit(store, category)?;
        if !unit.state.may_advance_to(UnitState::Skipped) {
            return Err(CheckpointError::InvalidTransition {
                from: unit.state,
                to: UnitState::Skipped,
            });
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE units SET state = ?1, error_message = ?2, updated_at = ?3
             WHERE store_id = ?4 AND category_id = ?5",
            params![
                UnitState::Skipped.to_db_string(),
                reason,
                now,
                store.as_str(),
                category.0 as i64
            ],
        )?;
        Ok(())
    }

    fn requeue_in_flight(&mut self) -> CheckpointResult<u64> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE units SET state = ?1, updated_at = ?2 WHERE state = ?3",
            params![
                UnitState::Pending.to_db_string(),
                now,
                UnitState::InFlight.to_db_string()
            ],
        )?;
        Ok(changed as u64)
    }

    fn reset(&mut self) -> CheckpointResult<()> {
        self.conn.execute_batch(
            "DELETE FROM sightings;
             DELETE FROM products;
             DELETE FROM page_origins;
             DELETE FROM units;",
        )?;
        Ok(())
    }

    // ===== Product Recording =====

    fn record_products(
        &mut self,
        origin: &CrawlUnit,
        products: &[RawProduct],
    ) -> CheckpointResult<IngestCounts> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO page_origins (store_id, category_id, cursor, product_count, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                origin.store.as_str(),
                origin.category.0 as i64,
                origin.cursor as i64,
                products.len() as i64,
                now
            ],
        )?;

        if inserted == 0 {
            tx.commit()?;
            return Ok(IngestCounts {
                replayed: true,
                ..Default::default()
            });
        }

        let mut new_products = 0u64;
        let mut new_sightings = 0u64;
        for product in products {
            new_products += tx.execute(
                "INSERT OR IGNORE INTO products (product_id, title, price_cents, url, first_seen_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    product.product_id,
                    product.title,
                    product.price_cents,
                    product.url,
                    now
                ],
            )? as u64;

            new_sightings += tx.execute(
                "INSERT OR IGNORE INTO sightings (product_id, store_id, category_id)
                 VALUES (?1, ?2, ?3)",
                params![
                    product.product_id,
                    origin.store.as_str(),
                    origin.category.0 as i64
                ],
            )? as u64;
        }

        tx.commit()?;
        Ok(IngestCounts {
            fetched: products.len() as u64,
            new_products,
            new_sightings,
            replayed: false,
        })
    }

    // ===== Aggregates =====

    fn totals(&self) -> CheckpointResult<CrawlTotals> {
        let total_fetched: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(product_count), 0) FROM page_origins",
            [],
            |row| row.get(0),
        )?;
        let unique_products: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;

        Ok(CrawlTotals {
            total_fetched: total_fetched as u64,
            unique_products: unique_products as u64,
        })
    }

    fn units_in_state(&self, state: UnitState) -> CheckpointResult<Vec<UnitRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM units WHERE state = ?1 ORDER BY store_id, category_id",
            UNIT_COLUMNS
        ))?;

        let units = stmt
            .query_map(params![state.to_db_string()], row_to_unit)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(units)
    }

    fn count_units_in_state(&self, state: UnitState) -> CheckpointResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM units WHERE state = ?1",
            params![state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn category_progress(&self) -> CheckpointResult<Vec<CategoryProgress>> {
        let mut stmt = self.conn.prepare(
            "SELECT u.category_id,
                    COUNT(*),
                    SUM(CASE WHEN u.state = 'done' THEN 1 ELSE 0 END),
                    (SELECT COUNT(*) FROM page_origins o WHERE o.category_id = u.category_id),
                    (SELECT COUNT(DISTINCT s.product_id) FROM sightings s
                      WHERE s.category_id = u.category_id)
             FROM units u
             GROUP BY u.category_id
             ORDER BY u.category_id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(CategoryProgress {
                    category: CategoryId(row.get::<_, i64>(0)? as u64),
                    stores_total: row.get::<_, i64>(1)? as u64,
                    stores_done: row.get::<_, i64>(2)? as u64,
                    pages_fetched: row.get::<_, i64>(3)? as u64,
                    products_seen: row.get::<_, i64>(4)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn store_progress(&self) -> CheckpointResult<Vec<StoreProgress>> {
        let mut stmt = self.conn.prepare(
            "SELECT u.store_id,
                    COUNT(*),
                    SUM(CASE WHEN u.state = 'done' THEN 1 ELSE 0 END),
                    (SELECT COUNT(*) FROM page_origins o WHERE o.store_id = u.store_id),
                    (SELECT COUNT(DISTINCT s.product_id) FROM sightings s
                      WHERE s.store_id = u.store_id)
             FROM units u
             GROUP BY u.store_id
             ORDER BY u.store_id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(StoreProgress {
                    store: StoreId::new(row.get::<_, String>(0)?),
                    categories_total: row.get::<_, i64>(1)? as u64,
                    categories_done: row.get::<_, i64>(2)? as u64,
                    pages_fetched: row.get::<_, i64>(3)? as u64,
                    products_seen: row.get::<_, i64>(4)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn snapshot(&self) -> CheckpointResult<CrawlCheckpoint> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM units ORDER BY store_id, category_id",
            UNIT_COLUMNS
        ))?;

        let units = stmt
            .query_map([], row_to_unit)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(CrawlCheckpoint {
            units,
            totals: self.totals()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_id() -> StoreId {
        StoreId::new("4588")
    }

    fn cat() -> CategoryId {
        CategoryId(1203)
    }

    fn product(id: &str) -> RawProduct {
        RawProduct {
            product_id: id.to_string(),
            title: format!("Product {}", id),
            price_cents: Some(1999),
            url: None,
        }
    }

    fn fresh_unit(cp: &mut SqliteCheckpoint) {
        assert!(cp.insert_unit(&store_id(), cat()).unwrap());
    }

    #[test]
    fn test_insert_unit_idempotent() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        assert!(cp.insert_unit(&store_id(), cat()).unwrap());
        assert!(!cp.insert_unit(&store_id(), cat()).unwrap());
    }

    #[test]
    fn test_new_unit_is_pending_at_first_page() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        fresh_unit(&mut cp);

        let unit = cp.get_unit(&store_id(), cat()).unwrap().unwrap();
        assert_eq!(unit.state, UnitState::Pending);
        assert_eq!(unit.next_cursor, FIRST_PAGE);
        assert_eq!(cp.next_pending(&store_id(), cat()).unwrap(), Some(1));
    }

    #[test]
    fn test_pagination_advances_without_gaps() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        fresh_unit(&mut cp);

        cp.mark_in_flight(&store_id(), cat()).unwrap();
        cp.mark_done(&store_id(), cat(), 1, true).unwrap();
        assert_eq!(cp.next_pending(&store_id(), cat()).unwrap(), Some(2));

        cp.mark_in_flight(&store_id(), cat()).unwrap();
        cp.mark_done(&store_id(), cat(), 2, false).unwrap();

        let unit = cp.get_unit(&store_id(), cat()).unwrap().unwrap();
        assert_eq!(unit.state, UnitState::Done);
        assert_eq!(cp.next_pending(&store_id(), cat()).unwrap(), None);
    }

    #[test]
    fn test_cursor_gap_rejected() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        fresh_unit(&mut cp);

        cp.mark_in_flight(&store_id(), cat()).unwrap();
        let result = cp.mark_done(&store_id(), cat(), 3, true);
        assert!(matches!(
            result,
            Err(CheckpointError::CursorGap {
                expected: 1,
                got: 3
            })
        ));
    }

    #[test]
    fn test_done_never_regresses() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        fresh_unit(&mut cp);

        cp.mark_in_flight(&store_id(), cat()).unwrap();
        cp.mark_done(&store_id(), cat(), 1, false).unwrap();

        assert!(matches!(
            cp.mark_in_flight(&store_id(), cat()),
            Err(CheckpointError::InvalidTransition { .. })
        ));
        assert!(matches!(
            cp.mark_failed(&store_id(), cat(), "boom"),
            Err(CheckpointError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_failed_retry_cycle() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        fresh_unit(&mut cp);

        cp.mark_in_flight(&store_id(), cat()).unwrap();
        let retries = cp.mark_failed(&store_id(), cat(), "Fetch timed out").unwrap();
        assert_eq!(retries, 1);

        cp.requeue_for_retry(&store_id(), cat()).unwrap();
        assert_eq!(cp.next_pending(&store_id(), cat()).unwrap(), Some(1));

        cp.mark_in_flight(&store_id(), cat()).unwrap();
        let retries = cp.mark_failed(&store_id(), cat(), "Blocked").unwrap();
        assert_eq!(retries, 2);

        let unit = cp.get_unit(&store_id(), cat()).unwrap().unwrap();
        assert_eq!(unit.error_message.as_deref(), Some("Blocked"));
    }

    #[test]
    fn test_success_resets_retry_count() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        fresh_unit(&mut cp);

        cp.mark_in_flight(&store_id(), cat()).unwrap();
        cp.mark_failed(&store_id(), cat(), "boom").unwrap();
        cp.requeue_for_retry(&store_id(), cat()).unwrap();
        cp.mark_in_flight(&store_id(), cat()).unwrap();
        cp.mark_done(&store_id(), cat(), 1, true).unwrap();

        let unit = cp.get_unit(&store_id(), cat()).unwrap().unwrap();
        assert_eq!(unit.retry_count, 0);
        assert!(unit.error_message.is_none());
    }

    #[test]
    fn test_requeue_in_flight_recovers_crashed_units() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        fresh_unit(&mut cp);
        cp.insert_unit(&StoreId::new("1604"), cat()).unwrap();

        cp.mark_in_flight(&store_id(), cat()).unwrap();

        // Simulated crash: the in-flight unit must come back as pending.
        let requeued = cp.requeue_in_flight().unwrap();
        assert_eq!(requeued, 1);
        assert_eq!(cp.next_pending(&store_id(), cat()).unwrap(), Some(1));
    }

    #[test]
    fn test_mark_skipped() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        fresh_unit(&mut cp);

        cp.mark_skipped(&store_id(), cat(), "store excluded by config")
            .unwrap();

        let unit = cp.get_unit(&store_id(), cat()).unwrap().unwrap();
        assert_eq!(unit.state, UnitState::Skipped);
        assert_eq!(
            unit.error_message.as_deref(),
            Some("store excluded by config")
        );
        assert_eq!(cp.next_pending(&store_id(), cat()).unwrap(), None);
    }

    #[test]
    fn test_record_products_dedups_and_replays() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        let origin = CrawlUnit::new(store_id(), cat(), 1);
        let products = vec![product("p1"), product("p2")];

        let counts = cp.record_products(&origin, &products).unwrap();
        assert_eq!(counts.fetched, 2);
        assert_eq!(counts.new_products, 2);
        assert_eq!(counts.new_sightings, 2);
        assert!(!counts.replayed);

        // Replay of the same origin changes nothing.
        let replay = cp.record_products(&origin, &products).unwrap();
        assert!(replay.replayed);
        assert_eq!(replay.new_products, 0);

        let totals = cp.totals().unwrap();
        assert_eq!(totals.unique_products, 2);
        assert_eq!(totals.total_fetched, 2);
    }

    #[test]
    fn test_sightings_accumulate_without_duplicating_products() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();

        // The same product seen from two categories at two stores.
        let origin_a = CrawlUnit::new(store_id(), CategoryId(1203), 1);
        let origin_b = CrawlUnit::new(StoreId::new("1604"), CategoryId(4577), 1);

        cp.record_products(&origin_a, &[product("p1")]).unwrap();
        let counts = cp.record_products(&origin_b, &[product("p1")]).unwrap();

        assert_eq!(counts.new_products, 0);
        assert_eq!(counts.new_sightings, 1);

        let totals = cp.totals().unwrap();
        assert_eq!(totals.unique_products, 1);
        assert_eq!(totals.total_fetched, 2);
    }

    #[test]
    fn test_reset_clears_units_but_keeps_runs() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        let run_id = cp.create_run("abc").unwrap();
        fresh_unit(&mut cp);
        cp.record_products(&CrawlUnit::new(store_id(), cat(), 1), &[product("p1")])
            .unwrap();

        cp.reset().unwrap();

        assert!(cp.get_unit(&store_id(), cat()).unwrap().is_none());
        assert_eq!(cp.totals().unwrap(), CrawlTotals::default());
        assert!(cp.get_run(run_id).is_ok());
    }

    #[test]
    fn test_run_ledger() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();

        assert!(cp.get_latest_run().unwrap().is_none());

        let run_id = cp.create_run("abc123").unwrap();
        let run = cp.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.config_hash, "abc123");
        assert!(run.finished_at.is_none());

        cp.set_run_coverage(run_id, 0.97, 0.99).unwrap();
        cp.complete_run(run_id).unwrap();

        let run = cp.get_latest_run().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.finished_at.is_some());
        assert_eq!(run.coverage_achieved, Some(0.97));
        assert_eq!(run.coverage_target, Some(0.99));
    }

    #[test]
    fn test_snapshot_and_progress() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        let other_store = StoreId::new("1604");

        cp.insert_unit(&store_id(), CategoryId(1203)).unwrap();
        cp.insert_unit(&store_id(), CategoryId(4577)).unwrap();
        cp.insert_unit(&other_store, CategoryId(1203)).unwrap();

        cp.mark_in_flight(&store_id(), CategoryId(1203)).unwrap();
        cp.record_products(
            &CrawlUnit::new(store_id(), CategoryId(1203), 1),
            &[product("p1"), product("p2")],
        )
        .unwrap();
        cp.mark_done(&store_id(), CategoryId(1203), 1, false).unwrap();

        let snapshot = cp.snapshot().unwrap();
        assert_eq!(snapshot.units.len(), 3);
        assert_eq!(snapshot.totals.unique_products, 2);
        assert_eq!(snapshot.open_units().count(), 2);

        let categories = cp.category_progress().unwrap();
        assert_eq!(categories.len(), 2);
        let c1203 = &categories[0];
        assert_eq!(c1203.category, CategoryId(1203));
        assert_eq!(c1203.stores_total, 2);
        assert_eq!(c1203.stores_done, 1);
        assert_eq!(c1203.pages_fetched, 1);
        assert_eq!(c1203.products_seen, 2);

        let stores = cp.store_progress().unwrap();
        assert_eq!(stores.len(), 2);

        assert_eq!(cp.count_units_in_state(UnitState::Done).unwrap(), 1);
        assert_eq!(cp.units_in_state(UnitState::Pending).unwrap().len(), 2);
    }
}
