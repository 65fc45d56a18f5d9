//! Work scheduling and crawl coordination
//!
//! Drives the cross product of selected categories and the store roster
//! as per-store lanes: pagination is sequential within a (store, category)
//! pair, stores run in parallel up to the concurrency ceiling, and failures
//! back off without blocking the rest of the run.

mod coordinator;
mod worklist;

pub use coordinator::{CancelHandle, Coordinator, RunSummary};
pub use worklist::{lane_assignments, seed_worklist, SeedOutcome};
