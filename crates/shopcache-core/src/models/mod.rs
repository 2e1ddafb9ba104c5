//! Data models for the product catalog.
//!
//! This module contains the data structures shared by every layer:
//!
//! - `Product`: a single catalog entry, as served by the upstream API
//! - `ProductDraft`: a product-to-be, before an id has been assigned
//! - `ProductPatch`: a partial update applied to an existing product
//! - `Snapshot`: the full catalog, the single source of truth for reads

pub mod product;

pub use product::{DraftError, Product, ProductDraft, ProductPatch, Snapshot};
