//! Remote catalog source.
//!
//! This module provides the `RemoteCatalog` client for the one-shot bulk
//! read of the upstream product catalog, and the `CatalogSource` trait the
//! cache coordinator consumes so tests can substitute a scripted source.
//!
//! The remote is read-only: local mutations are never propagated upstream.

pub mod client;
pub mod error;

pub use client::RemoteCatalog;
pub use error::ApiError;

use crate::models::Product;

/// The seam between the cache coordinator and the upstream catalog.
///
/// Implementations perform exactly one bulk read per call and never retry on
/// their own - retry policy belongs to the caller.
pub trait CatalogSource {
    fn fetch_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Product>, ApiError>> + Send;
}
