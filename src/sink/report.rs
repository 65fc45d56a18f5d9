//! Markdown run report generation

use crate::sink::stats::CrawlStatistics;
use crate::state::UnitState;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a markdown report of the crawl to the given path
pub fn write_report(stats: &CrawlStatistics, output_path: &Path) -> std::io::Result<()> {
    let markdown = format_report(stats);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats crawl statistics as markdown
pub fn format_report(stats: &CrawlStatistics) -> String {
    let mut md = String::new();

    md.push_str("# Shelfmap Crawl Report\n\n");

    if let Some(run) = &stats.latest_run {
        md.push_str("## Run Information\n\n");
        md.push_str(&format!("- **Run ID**: {}\n", run.id));
        md.push_str(&format!("- **Started**: {}\n", run.started_at));
        if let Some(finished) = &run.finished_at {
            md.push_str(&format!("- **Finished**: {}\n", finished));
        }
        md.push_str(&format!("- **Status**: {}\n", run.status.to_db_string()));
        md.push_str(&format!("- **Config Hash**: {}\n", run.config_hash));
        if let (Some(achieved), Some(target)) = (run.coverage_achieved, run.coverage_target) {
            md.push_str(&format!(
                "- **Coverage**: {:.1}% achieved vs {:.1}% target{}\n",
                achieved * 100.0,
                target * 100.0,
                if achieved + 1e-9 < target {
                    " (partial)"
                } else {
                    ""
                }
            ));
        }
        md.push('\n');
    }

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Total Units**: {}\n", stats.total_units));
    md.push_str(&format!(
        "- **Unique Products**: {}\n",
        stats.totals.unique_products
    ));
    md.push_str(&format!(
        "- **Listings Fetched**: {}\n\n",
        stats.totals.total_fetched
    ));

    md.push_str("## Units by State\n\n");
    md.push_str("| State | Count |\n");
    md.push_str("|-------|-------|\n");
    for state in UnitState::all_states() {
        let count = stats.units_by_state.get(&state).unwrap_or(&0);
        md.push_str(&format!("| {} | {} |\n", state, count));
    }
    md.push('\n');

    if !stats.failed_units.is_empty() {
        md.push_str("## Permanently Failed Units\n\n");
        md.push_str("| Store | Category | Page | Error |\n");
        md.push_str("|-------|----------|------|-------|\n");
        for unit in &stats.failed_units {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                unit.store,
                unit.category,
                unit.next_cursor,
                unit.error_message.as_deref().unwrap_or("unknown")
            ));
        }
        md.push('\n');
    }

    if !stats.categories.is_empty() {
        md.push_str("## Category Progress\n\n");
        md.push_str("| Category | Stores Done | Pages | Products |\n");
        md.push_str("|----------|-------------|-------|----------|\n");
        for progress in &stats.categories {
            md.push_str(&format!(
                "| {} | {}/{} | {} | {} |\n",
                progress.category,
                progress.stores_done,
                progress.stores_total,
                progress.pages_fetched,
                progress.products_seen
            ));
        }
        md.push('\n');
    }

    if !stats.stores.is_empty() {
        md.push_str("## Store Progress\n\n");
        md.push_str("| Store | Categories Done | Pages | Products |\n");
        md.push_str("|-------|-----------------|-------|----------|\n");
        for progress in &stats.stores {
            md.push_str(&format!(
                "| {} | {}/{} | {} | {} |\n",
                progress.store,
                progress.categories_done,
                progress.categories_total,
                progress.pages_fetched,
                progress.products_seen
            ));
        }
        md.push('\n');
    }

    md
}
