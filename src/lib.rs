//! Shelfmap: a resumable retail catalog crawl orchestrator
//!
//! This crate schedules a product-catalog crawl over a {store x category x page}
//! space: it collapses filter-variant category URLs onto their canonical ids,
//! plans a minimal covering category subset, and drives a checkpointed,
//! lane-serialized crawl that survives process restarts.

pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod fetch;
pub mod planner;
pub mod scheduler;
pub mod sink;
pub mod state;

use thiserror::Error;

/// Main error type for shelfmap operations
#[derive(Debug, Error)]
pub enum ShelfmapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Planning error: {0}")]
    Planning(#[from] PlanningError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] checkpoint::CheckpointError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::UnitState,
        to: state::UnitState,
    },

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors fatal to the planning phase, surfaced before any crawling starts
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanningError {
    #[error("No coverage samples provided")]
    EmptySampleSet,

    #[error("No numeric category id in URL path: {0}")]
    UnparseableUrl(String),
}

/// Result type alias for shelfmap operations
pub type Result<T> = std::result::Result<T, ShelfmapError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for planning operations
pub type PlanningResult<T> = std::result::Result<T, PlanningError>;

// Re-export commonly used types
pub use catalog::{CategoryId, CategoryTarget, StoreId};
pub use config::Config;
pub use fetch::{FetchError, FetchPort, FetchedPage, RawProduct};
pub use state::{CrawlUnit, LaneState, UnitState};
