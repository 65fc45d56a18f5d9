//! Crawl state tracking
//!
//! Defines the crawl unit state machine and the per-store lane pacing state.

mod lane_state;
mod unit_state;

pub use lane_state::{backoff_delay, LaneState};
pub use unit_state::{CrawlUnit, UnitState, FIRST_PAGE};
