//! Bounded sampling pass for set-cover planning
//!
//! Before full-scale scheduling, the planner fetches the first few pages of
//! each representative category against one store to observe which products
//! each category reaches. Planning failures surface before any crawl
//! scheduling happens.

use crate::catalog::{self, CategoryId, CategoryTarget, StoreId};
use crate::config::Config;
use crate::fetch::FetchPort;
use crate::planner::greedy::{plan_excluding, CoveragePlan, CoverageSample};
use crate::state::{CrawlUnit, FIRST_PAGE};
use crate::{PlanningError, Result, ShelfmapError};
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

/// The outcome of the planning phase
#[derive(Debug, Clone)]
pub struct PlannedCrawl {
    /// One representative per canonical category id, ordered by id
    pub representatives: Vec<CategoryTarget>,

    /// The set-cover selection over the sampled categories
    pub plan: CoveragePlan,
}

impl PlannedCrawl {
    /// Categories the crawl will actually schedule
    pub fn selected_categories(&self) -> &[CategoryId] {
        &self.plan.selected
    }
}

/// Samples the leading pages of each representative category
///
/// A fetch failure during sampling is logged and ends that category's
/// sample early; the category still participates in planning with whatever
/// was observed. Requests are paced by the configured lane delay.
pub async fn collect_samples(
    fetch: &dyn FetchPort,
    representatives: &[CategoryTarget],
    sample_store: &StoreId,
    sample_pages: u32,
    delay: Duration,
) -> Vec<CoverageSample> {
    let mut samples = Vec::with_capacity(representatives.len());
    let mut first_request = true;

    for target in representatives {
        let mut observed: BTreeSet<String> = BTreeSet::new();

        for page in FIRST_PAGE..FIRST_PAGE + sample_pages {
            if !first_request {
                tokio::time::sleep(delay).await;
            }
            first_request = false;

            let unit = CrawlUnit::new(sample_store.clone(), target.canonical_id, page);
            match fetch.fetch_page(unit).await {
                Ok(result) => {
                    observed.extend(result.products.into_iter().map(|p| p.product_id));
                    if !result.has_more {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        "Sampling category {} page {} failed: {}",
                        target.canonical_id,
                        page,
                        err
                    );
                    break;
                }
            }
        }

        tracing::debug!(
            "Sampled category {}: {} products observed",
            target.canonical_id,
            observed.len()
        );
        samples.push(CoverageSample {
            canonical_id: target.canonical_id,
            observed_product_ids: observed,
        });
    }

    samples
}

/// Runs the full planning phase: resolve, sample, and select
///
/// Resolves the category universe onto canonical ids, collapses filter
/// variants onto one representative each, samples their leading pages
/// against one store, and computes the covering selection. Skip-listed
/// categories stay in the sampled universe but are barred from selection,
/// so unreachable coverage is reported instead of silently ignored.
pub async fn plan_crawl(config: &Config, fetch: &dyn FetchPort) -> Result<PlannedCrawl> {
    let raw_urls: Vec<String> = config.categories.iter().map(|c| c.url.clone()).collect();
    let groups = catalog::group_by_canonical_id(&raw_urls)?;
    let duplicates: usize = groups.values().map(|v| v.len().saturating_sub(1)).sum();
    let representatives = catalog::select_representatives(groups);

    if representatives.is_empty() {
        return Err(PlanningError::EmptySampleSet.into());
    }
    if duplicates > 0 {
        tracing::info!(
            "Collapsed {} filter-variant URLs onto {} canonical categories",
            duplicates,
            representatives.len()
        );
    }

    let sample_store = match &config.planner.sample_store {
        Some(store) => store.clone(),
        None => {
            config
                .stores
                .first()
                .ok_or_else(|| {
                    ShelfmapError::Config(crate::ConfigError::Validation(
                        "store roster is empty; nothing to sample against".to_string(),
                    ))
                })?
                .id
                .clone()
        }
    };

    tracing::info!(
        "Sampling {} categories against store {} ({} pages each)",
        representatives.len(),
        sample_store,
        config.planner.sample_pages
    );

    let samples = collect_samples(
        fetch,
        &representatives,
        &sample_store,
        config.planner.sample_pages,
        Duration::from_millis(config.crawler.min_request_delay_ms),
    )
    .await;

    let excluded: BTreeSet<CategoryId> = config
        .skip
        .categories
        .iter()
        .map(|id| CategoryId(*id))
        .collect();

    let plan = plan_excluding(&samples, &excluded, config.planner.target_coverage)?;

    if plan.is_partial() {
        tracing::warn!(
            "Coverage target unreachable: {:.1}% achieved vs {:.1}% target ({} of {} products)",
            plan.achieved * 100.0,
            plan.target * 100.0,
            plan.covered_size,
            plan.universe_size
        );
    } else {
        tracing::info!(
            "Selected {} of {} categories for {:.1}% coverage",
            plan.selected.len(),
            representatives.len(),
            plan.achieved * 100.0
        );
    }

    // Keep representatives the scheduler may need: selected plus the skip
    // listed ones, which are seeded as skipped rows for the record.
    let keep: HashSet<CategoryId> = plan
        .selected
        .iter()
        .copied()
        .chain(excluded.iter().copied())
        .collect();
    let representatives = representatives
        .into_iter()
        .filter(|t| keep.contains(&t.canonical_id))
        .collect();

    Ok(PlannedCrawl {
        representatives,
        plan,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, FetchFuture, FetchedPage, RawProduct};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted fetch port: maps (category, page) to a canned result
    struct ScriptedPort {
        pages: HashMap<(u64, u32), FetchedPage>,
        calls: Mutex<Vec<(u64, u32)>>,
    }

    impl ScriptedPort {
        fn new(pages: HashMap<(u64, u32), FetchedPage>) -> Self {
            Self {
                pages,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl FetchPort for ScriptedPort {
        fn fetch_page(&self, unit: CrawlUnit) -> FetchFuture<'_> {
            Box::pin(async move {
                let key = (unit.category.0, unit.cursor);
                self.calls.lock().unwrap().push(key);
                self.pages
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| FetchError::BrowserCrash("no scripted page".to_string()))
            })
        }
    }

    fn page(ids: &[&str], has_more: bool) -> FetchedPage {
        FetchedPage {
            products: ids
                .iter()
                .map(|id| RawProduct {
                    product_id: id.to_string(),
                    title: id.to_string(),
                    price_cents: None,
                    url: None,
                })
                .collect(),
            has_more,
        }
    }

    fn target(id: u64) -> CategoryTarget {
        crate::catalog::resolve(&format!("https://shop.example.com/c/things/{}", id)).unwrap()
    }

    #[tokio::test]
    async fn test_collect_samples_accumulates_pages() {
        let mut pages = HashMap::new();
        pages.insert((10, 1), page(&["p1", "p2"], true));
        pages.insert((10, 2), page(&["p3"], false));
        let port = ScriptedPort::new(pages);

        let samples = collect_samples(
            &port,
            &[target(10)],
            &StoreId::new("4588"),
            5,
            Duration::from_millis(0),
        )
        .await;

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].observed_product_ids.len(), 3);
        // has_more=false stops before the page budget is spent
        assert_eq!(port.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_collect_samples_respects_page_budget() {
        let mut pages = HashMap::new();
        pages.insert((10, 1), page(&["p1"], true));
        pages.insert((10, 2), page(&["p2"], true));
        pages.insert((10, 3), page(&["p3"], true));
        let port = ScriptedPort::new(pages);

        let samples = collect_samples(
            &port,
            &[target(10)],
            &StoreId::new("4588"),
            2,
            Duration::from_millis(0),
        )
        .await;

        assert_eq!(samples[0].observed_product_ids.len(), 2);
        assert_eq!(port.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_collect_samples_survives_fetch_failure() {
        // Category 20 has no scripted pages at all: its sample is empty but
        // sampling proceeds to the next category.
        let mut pages = HashMap::new();
        pages.insert((30, 1), page(&["p9"], false));
        let port = ScriptedPort::new(pages);

        let samples = collect_samples(
            &port,
            &[target(20), target(30)],
            &StoreId::new("4588"),
            2,
            Duration::from_millis(0),
        )
        .await;

        assert_eq!(samples.len(), 2);
        assert!(samples[0].observed_product_ids.is_empty());
        assert_eq!(samples[1].observed_product_ids.len(), 1);
    }
}
