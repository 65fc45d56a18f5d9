//! Worklist seeding and lane assignment
//!
//! The worklist is the cross product of the selected categories and the
//! store roster, persisted as one checkpoint unit per pair. On resume the
//! existing units are kept as-is and only roster additions create new ones.

use crate::catalog::{CategoryId, Store, StoreId};
use crate::checkpoint::{CheckpointResult, CheckpointStore, CrawlCheckpoint};
use crate::config::SkipConfig;
use std::collections::BTreeMap;

/// Accounting of one worklist seeding pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedOutcome {
    /// Units that already existed in the checkpoint
    pub restored: usize,

    /// Units newly created and eligible for crawling
    pub discovered: usize,

    /// Units newly created but excluded by skip rules
    pub skipped: usize,
}

/// Seeds the checkpoint with every (store, category) pair
///
/// Existing units are left untouched and counted as restored. New pairs
/// matching a skip rule are recorded as `Skipped` with the rule spelled out,
/// so the checkpoint accounts for the full cross product.
pub fn seed_worklist(
    checkpoint: &mut dyn CheckpointStore,
    stores: &[Store],
    categories: &[CategoryId],
    skip: &SkipConfig,
) -> CheckpointResult<SeedOutcome> {
    let mut outcome = SeedOutcome::default();

    for store in stores {
        let store_skipped = skip.stores.contains(&store.id);
        for &category in categories {
            let newly_created = checkpoint.insert_unit(&store.id, category)?;
            if !newly_created {
                outcome.restored += 1;
                continue;
            }

            let reason = if store_skipped {
                Some("store excluded by config")
            } else if skip.categories.contains(&category.0) {
                Some("category excluded by config")
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    checkpoint.mark_skipped(&store.id, category, reason)?;
                    outcome.skipped += 1;
                }
                None => outcome.discovered += 1,
            }
        }
    }

    Ok(outcome)
}

/// Groups the checkpoint's open units into per-store lanes
///
/// Each store's categories are ordered by canonical id; a lane processes
/// them sequentially, so pagination order inside a pair is preserved by
/// construction.
pub fn lane_assignments(checkpoint: &CrawlCheckpoint) -> BTreeMap<StoreId, Vec<CategoryId>> {
    let mut lanes: BTreeMap<StoreId, Vec<CategoryId>> = BTreeMap::new();
    for unit in checkpoint.open_units() {
        lanes.entry(unit.store.clone()).or_default().push(unit.category);
    }
    for categories in lanes.values_mut() {
        categories.sort();
        categories.dedup();
    }
    lanes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::SqliteCheckpoint;
    use crate::state::UnitState;

    fn store(id: &str) -> Store {
        Store {
            id: StoreId::new(id),
            region: "TX".to_string(),
        }
    }

    #[test]
    fn test_seed_cross_product() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        let stores = vec![store("1"), store("2")];
        let categories = vec![CategoryId(10), CategoryId(20)];

        let outcome =
            seed_worklist(&mut cp, &stores, &categories, &SkipConfig::default()).unwrap();

        assert_eq!(outcome.discovered, 4);
        assert_eq!(outcome.restored, 0);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(cp.count_units_in_state(UnitState::Pending).unwrap(), 4);
    }

    #[test]
    fn test_seed_counts_restored_units() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        let stores = vec![store("1")];
        let categories = vec![CategoryId(10)];

        seed_worklist(&mut cp, &stores, &categories, &SkipConfig::default()).unwrap();

        // Second seeding with one extra store: old unit restored, new one
        // discovered.
        let stores = vec![store("1"), store("2")];
        let outcome =
            seed_worklist(&mut cp, &stores, &categories, &SkipConfig::default()).unwrap();

        assert_eq!(outcome.restored, 1);
        assert_eq!(outcome.discovered, 1);
    }

    #[test]
    fn test_seed_applies_skip_rules() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        let stores = vec![store("1"), store("2")];
        let categories = vec![CategoryId(10), CategoryId(20)];
        let skip = SkipConfig {
            stores: vec![StoreId::new("2")],
            categories: vec![20],
        };

        let outcome = seed_worklist(&mut cp, &stores, &categories, &skip).unwrap();

        // Store 2 contributes two skipped pairs; category 20 at store 1 a third.
        assert_eq!(outcome.skipped, 3);
        assert_eq!(outcome.discovered, 1);
        assert_eq!(cp.count_units_in_state(UnitState::Skipped).unwrap(), 3);

        let unit = cp.get_unit(&StoreId::new("1"), CategoryId(20)).unwrap().unwrap();
        assert_eq!(
            unit.error_message.as_deref(),
            Some("category excluded by config")
        );
    }

    #[test]
    fn test_lane_assignments_group_by_store() {
        let mut cp = SqliteCheckpoint::new_in_memory().unwrap();
        let stores = vec![store("1"), store("2")];
        let categories = vec![CategoryId(20), CategoryId(10)];

        seed_worklist(&mut cp, &stores, &categories, &SkipConfig::default()).unwrap();

        // Close one unit; it must drop out of the lanes.
        cp.mark_in_flight(&StoreId::new("1"), CategoryId(10)).unwrap();
        cp.mark_done(&StoreId::new("1"), CategoryId(10), 1, false)
            .unwrap();

        let lanes = lane_assignments(&cp.snapshot().unwrap());
        assert_eq!(lanes.len(), 2);
        assert_eq!(lanes[&StoreId::new("1")], vec![CategoryId(20)]);
        assert_eq!(
            lanes[&StoreId::new("2")],
            vec![CategoryId(10), CategoryId(20)]
        );
    }
}
