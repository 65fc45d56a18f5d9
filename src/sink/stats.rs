//! Statistics generation from the checkpoint database

use crate::checkpoint::{
    CategoryProgress, CheckpointResult, CheckpointStore, CrawlTotals, RunRecord, StoreProgress,
    UnitRecord,
};
use crate::state::UnitState;
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Total number of (store, category) units
    pub total_units: u64,

    /// Count of units by state
    pub units_by_state: HashMap<UnitState, u64>,

    /// Aggregate product counters
    pub totals: CrawlTotals,

    /// Units that exhausted their retry budget, for operator review
    pub failed_units: Vec<UnitRecord>,

    /// Per-category progress
    pub categories: Vec<CategoryProgress>,

    /// Per-store progress
    pub stores: Vec<StoreProgress>,

    /// The most recent run, when one exists
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from the checkpoint store
pub fn load_statistics(store: &dyn CheckpointStore) -> CheckpointResult<CrawlStatistics> {
    let mut units_by_state = HashMap::new();
    let mut total_units = 0;

    for state in UnitState::all_states() {
        let count = store.count_units_in_state(state)?;
        total_units += count;
        if count > 0 {
            units_by_state.insert(state, count);
        }
    }

    Ok(CrawlStatistics {
        total_units,
        units_by_state,
        totals: store.totals()?,
        failed_units: store.units_in_state(UnitState::Failed)?,
        categories: store.category_progress()?,
        stores: store.store_progress()?,
        latest_run: store.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Total units: {}", stats.total_units);
    println!("  Unique products: {}", stats.totals.unique_products);
    println!("  Listings fetched: {}", stats.totals.total_fetched);
    println!();

    println!("Units by State:");
    let mut state_counts: Vec<_> = stats.units_by_state.iter().collect();
    state_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (state, count) in state_counts {
        let percentage = if stats.total_units > 0 {
            (*count as f64 / stats.total_units as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    if let Some(run) = &stats.latest_run {
        if let (Some(achieved), Some(target)) = (run.coverage_achieved, run.coverage_target) {
            println!(
                "Coverage: {:.1}% achieved vs {:.1}% target{}",
                achieved * 100.0,
                target * 100.0,
                if achieved + 1e-9 < target {
                    " (PARTIAL)"
                } else {
                    ""
                }
            );
            println!();
        }
    }

    if !stats.failed_units.is_empty() {
        println!("Failed Units ({}):", stats.failed_units.len());
        for unit in &stats.failed_units {
            println!(
                "  - store {} / category {} at page {}: {}",
                unit.store,
                unit.category,
                unit.next_cursor,
                unit.error_message.as_deref().unwrap_or("unknown error")
            );
        }
        println!();
    }

    let done = stats.units_by_state.get(&UnitState::Done).unwrap_or(&0);
    let completion = if stats.total_units > 0 {
        (*done as f64 / stats.total_units as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Completion: {:.1}% ({} / {} units closed)",
        completion, done, stats.total_units
    );
}
