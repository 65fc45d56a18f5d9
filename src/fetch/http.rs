//! HTTP reference implementation of the fetch port
//!
//! Fetches category listing pages from a JSON endpoint of the form
//! `{base}/stores/{store}/categories/{category}/products?page={cursor}`.
//! The production deployment swaps this for the browser-automation port;
//! this adapter defines the boundary concretely and backs the integration
//! tests.
//!
//! # Error classification
//!
//! | Condition                  | FetchError   |
//! |----------------------------|--------------|
//! | HTTP 403 / 429             | Blocked      |
//! | Request timeout            | Timeout      |
//! | Connection / 5xx failure   | BrowserCrash |
//! | Undecodable JSON payload   | ParseError   |

use crate::fetch::{FetchError, FetchFuture, FetchPort, FetchedPage};
use crate::state::CrawlUnit;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Builds the HTTP client used by the reference fetch port
///
/// The user agent is whatever the operator configured; the anti-bot posture
/// of the real browser layer is out of scope here.
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetch port backed by a plain HTTP JSON endpoint
pub struct HttpFetchPort {
    client: Client,
    base_url: String,
}

impl HttpFetchPort {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    fn page_url(&self, unit: &CrawlUnit) -> String {
        format!(
            "{}/stores/{}/categories/{}/products?page={}",
            self.base_url, unit.store, unit.category, unit.cursor
        )
    }
}

impl FetchPort for HttpFetchPort {
    fn fetch_page(&self, unit: CrawlUnit) -> FetchFuture<'_> {
        Box::pin(async move {
            let url = self.page_url(&unit);

            let response = match self.client.get(&url).send().await {
                Ok(r) => r,
                Err(e) if e.is_timeout() => return Err(FetchError::Timeout),
                Err(e) => return Err(FetchError::BrowserCrash(e.to_string())),
            };

            let status = response.status();
            if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
                return Err(FetchError::Blocked);
            }
            if status.is_server_error() {
                return Err(FetchError::BrowserCrash(format!("HTTP {}", status.as_u16())));
            }
            if !status.is_success() {
                return Err(FetchError::ParseError(format!(
                    "Unexpected HTTP {} from {}",
                    status.as_u16(),
                    url
                )));
            }

            match response.json::<FetchedPage>().await {
                Ok(page) => Ok(page),
                Err(e) if e.is_timeout() => Err(FetchError::Timeout),
                Err(e) => Err(FetchError::ParseError(e.to_string())),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CategoryId, StoreId};

    #[test]
    fn test_page_url_format() {
        let client = build_http_client("TestAgent/1.0").unwrap();
        let port = HttpFetchPort::new(client, "https://shop.example.com/api/");

        let unit = CrawlUnit::new(StoreId::new("4588"), CategoryId(1203), 2);
        assert_eq!(
            port.page_url(&unit),
            "https://shop.example.com/api/stores/4588/categories/1203/products?page=2"
        );
    }

    #[test]
    fn test_fetched_page_deserializes() {
        let payload = r#"{
            "products": [
                {"productId": "p1", "title": "Clawfoot Tub", "priceCents": 89900},
                {"productId": "p2", "title": "Grab Bar", "url": "https://shop.example.com/p/p2"}
            ],
            "hasMore": true
        }"#;

        let page: FetchedPage = serde_json::from_str(payload).unwrap();
        assert_eq!(page.products.len(), 2);
        assert!(page.has_more);
        assert_eq!(page.products[0].price_cents, Some(89900));
        assert_eq!(page.products[1].price_cents, None);
    }
}
