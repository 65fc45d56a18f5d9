use crate::PlanningError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// The backing-catalog identifier shared by filter-variant URLs of the same
/// product pool
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CategoryId(pub u64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resolved category URL
///
/// Two CategoryTargets with the same `canonical_id` are backing-pool
/// equivalent; only one representative per id is ever scheduled. Immutable
/// once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTarget {
    /// The URL as supplied in the category universe
    pub raw_url: Url,

    /// The trailing numeric catalog identifier from the URL path
    pub canonical_id: CategoryId,

    /// Path segments between the category name and the id — filter variants
    pub filter_tags: Vec<String>,
}

/// Resolves a raw category URL into a CategoryTarget
///
/// The canonical id is the trailing numeric segment of the URL path. Path
/// segments between the leading category name and the id are filter tags
/// (e.g. `/bathtubs/clawfoot/1203` carries the tag `clawfoot`).
///
/// # Errors
///
/// Returns `PlanningError::UnparseableUrl` when the URL is malformed or its
/// path does not end in a numeric id.
///
/// # Examples
///
/// ```
/// use shelfmap::catalog::resolve;
///
/// let target = resolve("https://shop.example.com/c/bathtubs/1203").unwrap();
/// assert_eq!(target.canonical_id.0, 1203);
/// ```
pub fn resolve(raw_url: &str) -> Result<CategoryTarget, PlanningError> {
    let url =
        Url::parse(raw_url).map_err(|_| PlanningError::UnparseableUrl(raw_url.to_string()))?;

    let segments: Vec<String> = url
        .path_segments()
        .map(|s| {
            s.filter(|seg| !seg.is_empty())
                .map(|seg| seg.to_string())
                .collect()
        })
        .unwrap_or_default();

    let last = segments
        .last()
        .ok_or_else(|| PlanningError::UnparseableUrl(raw_url.to_string()))?;

    let id: u64 = last
        .parse()
        .map_err(|_| PlanningError::UnparseableUrl(raw_url.to_string()))?;

    // Everything between the first segment (the category name) and the
    // trailing id is a filter refinement.
    let filter_tags = if segments.len() > 2 {
        segments[1..segments.len() - 1].to_vec()
    } else {
        Vec::new()
    };

    Ok(CategoryTarget {
        raw_url: url,
        canonical_id: CategoryId(id),
        filter_tags,
    })
}

/// Groups a collection of raw URLs by their canonical category id
///
/// # Errors
///
/// Fails on the first URL that cannot be resolved; planning aborts before
/// any crawling starts.
pub fn group_by_canonical_id(
    raw_urls: &[String],
) -> Result<BTreeMap<CategoryId, Vec<CategoryTarget>>, PlanningError> {
    let mut groups: BTreeMap<CategoryId, Vec<CategoryTarget>> = BTreeMap::new();
    for raw in raw_urls {
        let target = resolve(raw)?;
        groups.entry(target.canonical_id).or_default().push(target);
    }
    Ok(groups)
}

/// Selects one representative CategoryTarget per canonical id
///
/// Filter-variant URLs are pool duplicates; the representative is the parent
/// URL — fewest path segments, tie-broken lexicographically on the raw URL.
/// The result is ordered by canonical id for determinism.
pub fn select_representatives(
    groups: BTreeMap<CategoryId, Vec<CategoryTarget>>,
) -> Vec<CategoryTarget> {
    groups
        .into_values()
        .filter_map(|mut variants| {
            variants.sort_by(|a, b| {
                segment_count(&a.raw_url)
                    .cmp(&segment_count(&b.raw_url))
                    .then_with(|| a.raw_url.as_str().cmp(b.raw_url.as_str()))
            });
            variants.into_iter().next()
        })
        .collect()
}

fn segment_count(url: &Url) -> usize {
    url.path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).count())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_all(urls: &[&str]) -> Vec<CategoryTarget> {
        let owned: Vec<String> = urls.iter().map(|u| u.to_string()).collect();
        select_representatives(group_by_canonical_id(&owned).unwrap())
    }

    #[test]
    fn test_resolve_plain_category() {
        let target = resolve("https://shop.example.com/c/bathtubs/1203").unwrap();
        assert_eq!(target.canonical_id, CategoryId(1203));
        assert_eq!(target.filter_tags, vec!["bathtubs".to_string()]);
    }

    #[test]
    fn test_resolve_filtered_category() {
        let target = resolve("https://shop.example.com/c/bathtubs/clawfoot/1203").unwrap();
        assert_eq!(target.canonical_id, CategoryId(1203));
        assert_eq!(
            target.filter_tags,
            vec!["bathtubs".to_string(), "clawfoot".to_string()]
        );
    }

    #[test]
    fn test_resolve_rejects_non_numeric_tail() {
        let result = resolve("https://shop.example.com/c/bathtubs");
        assert!(matches!(result, Err(PlanningError::UnparseableUrl(_))));
    }

    #[test]
    fn test_resolve_rejects_empty_path() {
        let result = resolve("https://shop.example.com/");
        assert!(matches!(result, Err(PlanningError::UnparseableUrl(_))));
    }

    #[test]
    fn test_resolve_rejects_malformed_url() {
        let result = resolve("not a url");
        assert!(matches!(result, Err(PlanningError::UnparseableUrl(_))));
    }

    #[test]
    fn test_filter_variants_share_canonical_id() {
        let a = resolve("https://shop.example.com/c/bathtubs/1203").unwrap();
        let b = resolve("https://shop.example.com/c/bathtubs/clawfoot/1203").unwrap();
        assert_eq!(a.canonical_id, b.canonical_id);
    }

    #[test]
    fn test_group_by_canonical_id() {
        let urls = vec![
            "https://shop.example.com/c/bathtubs/1203".to_string(),
            "https://shop.example.com/c/bathtubs/clawfoot/1203".to_string(),
            "https://shop.example.com/c/exterior-stains/2291".to_string(),
        ];
        let groups = group_by_canonical_id(&urls).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&CategoryId(1203)].len(), 2);
        assert_eq!(groups[&CategoryId(2291)].len(), 1);
    }

    #[test]
    fn test_documented_duplicate_groups() {
        // The three duplicate groups observed in production: each pair of
        // filter-variant URLs must collapse to one scheduled representative.
        let reps = resolve_all(&[
            "https://shop.example.com/c/bathroom-safety-accessories/4577",
            "https://shop.example.com/c/bathroom-safety-accessories/grab-bars/4577",
            "https://shop.example.com/c/bathtubs/1203",
            "https://shop.example.com/c/bathtubs/clawfoot/1203",
            "https://shop.example.com/c/exterior-stains/2291",
            "https://shop.example.com/c/exterior-stains/semi-transparent/2291",
        ]);

        assert_eq!(reps.len(), 3);
        for rep in &reps {
            // The parent (least filtered) URL wins in every group
            assert_eq!(segment_count(&rep.raw_url), 3);
        }
    }

    #[test]
    fn test_representative_prefers_fewest_segments() {
        let reps = resolve_all(&[
            "https://shop.example.com/c/bathtubs/clawfoot/1203",
            "https://shop.example.com/c/bathtubs/1203",
        ]);
        assert_eq!(reps.len(), 1);
        assert_eq!(
            reps[0].raw_url.as_str(),
            "https://shop.example.com/c/bathtubs/1203"
        );
    }

    #[test]
    fn test_representative_tie_breaks_lexicographically() {
        let reps = resolve_all(&[
            "https://shop.example.com/c/tubs-b/1203",
            "https://shop.example.com/c/tubs-a/1203",
        ]);
        assert_eq!(reps.len(), 1);
        assert_eq!(
            reps[0].raw_url.as_str(),
            "https://shop.example.com/c/tubs-a/1203"
        );
    }

    #[test]
    fn test_representatives_ordered_by_canonical_id() {
        let reps = resolve_all(&[
            "https://shop.example.com/c/z/900",
            "https://shop.example.com/c/a/100",
            "https://shop.example.com/c/m/500",
        ]);
        let ids: Vec<u64> = reps.iter().map(|r| r.canonical_id.0).collect();
        assert_eq!(ids, vec![100, 500, 900]);
    }
}
