use crate::catalog::CategoryId;
use crate::fetch::ProductId;
use crate::PlanningError;
use std::collections::BTreeSet;

/// Products observed in one sampled category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageSample {
    /// The sampled category
    pub canonical_id: CategoryId,

    /// Product ids seen in the bounded sampling pass for this category
    pub observed_product_ids: BTreeSet<ProductId>,
}

/// The outcome of set-cover planning
///
/// Partial coverage (`achieved < target`) is a reported outcome, not an
/// error — whether to proceed is the operator's call.
#[derive(Debug, Clone, PartialEq)]
pub struct CoveragePlan {
    /// Selected categories, in selection order
    pub selected: Vec<CategoryId>,

    /// Fraction of the sampled product universe the selection covers
    pub achieved: f64,

    /// The coverage fraction that was asked for
    pub target: f64,

    /// Size of the sampled product universe
    pub universe_size: usize,

    /// Number of universe products covered by the selection
    pub covered_size: usize,
}

impl CoveragePlan {
    /// Whether the selection fell short of the target
    pub fn is_partial(&self) -> bool {
        self.achieved + 1e-9 < self.target
    }
}

/// Computes a minimal covering category subset via greedy set cover
///
/// Repeatedly picks the sample contributing the most not-yet-covered
/// products, stopping once the target coverage fraction is reached or no
/// sample adds coverage. Ties are broken by canonical id ascending, so the
/// selection is deterministic. Greedy is a (1 - 1/e)-approximation of the
/// optimal cover, which is sufficient here: the goal is minimizing fetch
/// cost subject to a coverage floor, not exact minimality.
///
/// # Errors
///
/// Returns `PlanningError::EmptySampleSet` if `samples` is empty.
pub fn plan(
    samples: &[CoverageSample],
    target_coverage: f64,
) -> Result<CoveragePlan, PlanningError> {
    plan_excluding(samples, &BTreeSet::new(), target_coverage)
}

/// Set-cover planning with some categories barred from selection
///
/// Excluded categories (operator skip rules) still contribute their observed
/// products to the universe; products reachable only through an excluded
/// category then make the target unreachable, and the returned plan reports
/// the residual via [`CoveragePlan::is_partial`] rather than silently
/// under-covering.
pub fn plan_excluding(
    samples: &[CoverageSample],
    excluded: &BTreeSet<CategoryId>,
    target_coverage: f64,
) -> Result<CoveragePlan, PlanningError> {
    if samples.is_empty() {
        return Err(PlanningError::EmptySampleSet);
    }

    let universe: BTreeSet<&ProductId> = samples
        .iter()
        .flat_map(|s| s.observed_product_ids.iter())
        .collect();
    let universe_size = universe.len();

    // A fully-empty universe is vacuously covered.
    if universe_size == 0 {
        return Ok(CoveragePlan {
            selected: Vec::new(),
            achieved: 1.0,
            target: target_coverage,
            universe_size: 0,
            covered_size: 0,
        });
    }

    let mut covered: BTreeSet<&ProductId> = BTreeSet::new();
    let mut selected: Vec<CategoryId> = Vec::new();
    let mut remaining: Vec<&CoverageSample> = samples
        .iter()
        .filter(|s| !excluded.contains(&s.canonical_id))
        .collect();

    loop {
        if covered.len() as f64 / universe_size as f64 >= target_coverage {
            break;
        }

        // Largest uncovered contribution wins; canonical id ascending on ties.
        let best = remaining
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let gain = s
                    .observed_product_ids
                    .iter()
                    .filter(|p| !covered.contains(p))
                    .count();
                (i, s.canonical_id, gain)
            })
            .max_by(|a, b| a.2.cmp(&b.2).then_with(|| b.1.cmp(&a.1)));

        match best {
            Some((index, _, gain)) if gain > 0 => {
                let sample = remaining.swap_remove(index);
                covered.extend(sample.observed_product_ids.iter());
                selected.push(sample.canonical_id);
            }
            // No selectable sample adds coverage; the target is unreachable.
            _ => break,
        }
    }

    let covered_size = covered.len();
    Ok(CoveragePlan {
        selected,
        achieved: covered_size as f64 / universe_size as f64,
        target: target_coverage,
        universe_size,
        covered_size,
    })
}
