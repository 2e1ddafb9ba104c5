//! HTTP client for the upstream product catalog.
//!
//! The upstream exposes a single bulk endpoint returning the whole catalog
//! under a `products` field. The client fetches it exactly once per call and
//! validates the response shape; everything after that first load is served
//! from the local store.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{ApiError, CatalogSource};
use crate::models::Product;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL for the catalog API.
pub const DEFAULT_BASE_URL: &str = "https://dummyjson.com";

/// HTTP request timeout in seconds.
/// The bulk read is a single large response; 30s covers slow links while
/// still failing fast enough for an interactive caller.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// `limit` parameter for the bulk read. Large enough to cover the whole
/// upstream catalog in one call.
const FETCH_LIMIT: u32 = 1000;

/// Bulk response wrapper: the catalog arrives under a `products` field.
#[derive(Debug, Deserialize)]
struct ProductsResponse {
    products: Vec<Product>,
}

/// Read-only client for the upstream catalog.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct RemoteCatalog {
    client: Client,
    base_url: String,
}

impl RemoteCatalog {
    /// Create a client against the default upstream.
    pub fn new() -> Result<Self, ApiError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client against a custom base URL (used by the config layer
    /// and by tests running against a local fixture server).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn fetch_all_inner(&self) -> Result<Vec<Product>, ApiError> {
        let url = format!("{}/products?limit={}", self.base_url, FETCH_LIMIT);
        debug!(%url, "Fetching full catalog");

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        let body = response.text().await?;
        let parsed: ProductsResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::Format(format!("not a product sequence: {}", e)))?;

        validate_catalog(&parsed.products)?;

        debug!(count = parsed.products.len(), "Fetched catalog");
        Ok(parsed.products)
    }
}

impl CatalogSource for RemoteCatalog {
    async fn fetch_all(&self) -> Result<Vec<Product>, ApiError> {
        self.fetch_all_inner().await
    }
}

/// Check the invariants the rest of the system relies on: ids are unique
/// across the snapshot.
fn validate_catalog(products: &[Product]) -> Result<(), ApiError> {
    let mut seen = HashSet::with_capacity(products.len());
    for product in products {
        if !seen.insert(product.id) {
            return Err(ApiError::Format(format!(
                "duplicate product id {} in catalog response",
                product.id
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductDraft;

    fn product(id: i64) -> Product {
        ProductDraft {
            title: format!("P{}", id),
            price: 1.0,
            ..Default::default()
        }
        .into_product(id)
    }

    #[test]
    fn test_validate_catalog_accepts_unique_ids() {
        assert!(validate_catalog(&[product(1), product(2), product(3)]).is_ok());
    }

    #[test]
    fn test_validate_catalog_rejects_duplicate_ids() {
        let err = validate_catalog(&[product(1), product(2), product(1)]).unwrap_err();
        match err {
            ApiError::Format(msg) => assert!(msg.contains("duplicate product id 1")),
            _ => panic!("expected format error"),
        }
    }

    #[test]
    fn test_response_wrapper_parses() {
        let body = r#"{"products":[{"id":1,"title":"T","price":2.5}],"total":1,"skip":0,"limit":1000}"#;
        let parsed: ProductsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.products.len(), 1);
        assert_eq!(parsed.products[0].id, 1);
    }

    #[test]
    fn test_non_sequence_body_is_a_format_error() {
        let body = r#"{"products":"nope"}"#;
        assert!(serde_json::from_str::<ProductsResponse>(body).is_err());
    }
}
