//! Fetch port: the boundary to the page-fetching collaborator
//!
//! The orchestration core never renders pages itself. It drives a
//! [`FetchPort`], which executes one page fetch for a crawl unit and returns
//! the raw extracted listings or a failure signal. The production
//! implementation is the external browser-automation layer; this crate ships
//! an HTTP reference adapter used by the integration tests.

mod http;

pub use http::{build_http_client, HttpFetchPort};

use crate::state::CrawlUnit;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Product identifier, the global dedup key
pub type ProductId = String;

/// One product listing as extracted from a category page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProduct {
    /// The product identifier used for global deduplication
    pub product_id: ProductId,

    /// Display title
    pub title: String,

    /// Listed price in cents, when extracted
    #[serde(default)]
    pub price_cents: Option<i64>,

    /// Product detail URL, when extracted
    #[serde(default)]
    pub url: Option<String>,
}

/// The result of one successful page fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedPage {
    /// Listings extracted from the page
    pub products: Vec<RawProduct>,

    /// Whether the category reports further pages after this one
    pub has_more: bool,
}

/// Per-unit fetch failures
///
/// All variants are treated identically for retry purposes; they are logged
/// distinctly for operator diagnosis.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request blocked by bot detection")]
    Blocked,

    #[error("Fetch timed out")]
    Timeout,

    #[error("Browser session crashed: {0}")]
    BrowserCrash(String),

    #[error("Failed to parse listing payload: {0}")]
    ParseError(String),
}

/// Result type for fetch operations
pub type FetchResult = Result<FetchedPage, FetchError>;

/// Boxed future returned by [`FetchPort::fetch_page`]
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = FetchResult> + Send + 'a>>;

/// Executes one page fetch for a crawl unit
///
/// Implementations own their session context; the scheduler guarantees that
/// all units sharing a store are fetched from one lane at a time, so an
/// implementation may keep one session per store without further locking.
pub trait FetchPort: Send + Sync {
    fn fetch_page(&self, unit: CrawlUnit) -> FetchFuture<'_>;
}
