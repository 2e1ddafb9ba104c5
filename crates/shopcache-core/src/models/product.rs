//! Domain model for catalog products.
//!
//! Field names follow the upstream API's camelCase on the wire; everything
//! except the identity fields is defaulted because the upstream omits
//! attributes (notably `brand`) on some records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The full catalog held in memory. Cloning is cheap; mutations build a new
/// `Vec` and swap the `Arc` so outstanding readers keep a consistent view.
pub type Snapshot = Arc<Vec<Product>>;

/// Upper bound for the `rating` attribute.
pub const RATING_MAX: f64 = 5.0;

/// Upper bound for the `discountPercentage` attribute.
pub const DISCOUNT_MAX: f64 = 100.0;

/// A single catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(rename = "discountPercentage", default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Product {
    /// Price formatted for display, e.g. `$12.99`.
    pub fn price_display(&self) -> String {
        format!("${:.2}", self.price)
    }

    /// True if the product carries a discount worth showing.
    pub fn has_discount(&self) -> bool {
        self.discount_percentage > 0.0
    }
}

/// A product draft submitted through the create flow, before an id exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(rename = "discountPercentage", default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Why a draft or patch was rejected before touching the snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("description must not be empty")]
    EmptyDescription,

    #[error("brand must not be empty")]
    EmptyBrand,

    #[error("price must not be negative")]
    NegativePrice,

    #[error("rating must be between 0 and {}", RATING_MAX)]
    RatingOutOfRange,

    #[error("discount percentage must be between 0 and {}", DISCOUNT_MAX)]
    DiscountOutOfRange,

    #[error("stock must not be negative")]
    NegativeStock,
}

impl ProductDraft {
    /// Validate the field constraints the create form enforces.
    pub fn validate(&self) -> Result<(), DraftError> {
        check_title(&self.title)?;
        check_description(&self.description)?;
        check_brand(&self.brand)?;
        check_numbers(self.price, self.rating, self.discount_percentage, self.stock)
    }

    /// Turn the draft into a product once an id has been assigned.
    pub fn into_product(self, id: i64) -> Product {
        Product {
            id,
            title: self.title,
            description: self.description,
            price: self.price,
            discount_percentage: self.discount_percentage,
            rating: self.rating,
            stock: self.stock,
            brand: self.brand,
            category: self.category,
            thumbnail: self.thumbnail,
            images: self.images,
        }
    }
}

/// A partial update for an existing product. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    #[serde(rename = "discountPercentage")]
    pub discount_percentage: Option<f64>,
    pub rating: Option<f64>,
    pub stock: Option<i64>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub thumbnail: Option<String>,
    pub images: Option<Vec<String>>,
}

impl ProductPatch {
    /// Merge the set fields into `product`, leaving the rest untouched.
    pub fn apply(&self, product: &mut Product) {
        if let Some(ref title) = self.title {
            product.title = title.clone();
        }
        if let Some(ref description) = self.description {
            product.description = description.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(discount) = self.discount_percentage {
            product.discount_percentage = discount;
        }
        if let Some(rating) = self.rating {
            product.rating = rating;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(ref brand) = self.brand {
            product.brand = brand.clone();
        }
        if let Some(ref category) = self.category {
            product.category = category.clone();
        }
        if let Some(ref thumbnail) = self.thumbnail {
            product.thumbnail = thumbnail.clone();
        }
        if let Some(ref images) = self.images {
            product.images = images.clone();
        }
    }

    /// Validate the fields this patch sets. Unset fields are not judged, so
    /// records the upstream ships without a brand stay editable.
    pub fn validate(&self) -> Result<(), DraftError> {
        if let Some(ref title) = self.title {
            check_title(title)?;
        }
        if let Some(ref description) = self.description {
            check_description(description)?;
        }
        if let Some(ref brand) = self.brand {
            check_brand(brand)?;
        }
        check_numbers(
            self.price.unwrap_or(0.0),
            self.rating.unwrap_or(0.0),
            self.discount_percentage.unwrap_or(0.0),
            self.stock.unwrap_or(0),
        )
    }
}

fn check_title(title: &str) -> Result<(), DraftError> {
    if title.trim().is_empty() {
        return Err(DraftError::EmptyTitle);
    }
    Ok(())
}

fn check_description(description: &str) -> Result<(), DraftError> {
    if description.trim().is_empty() {
        return Err(DraftError::EmptyDescription);
    }
    Ok(())
}

fn check_brand(brand: &str) -> Result<(), DraftError> {
    if brand.trim().is_empty() {
        return Err(DraftError::EmptyBrand);
    }
    Ok(())
}

fn check_numbers(price: f64, rating: f64, discount: f64, stock: i64) -> Result<(), DraftError> {
    if price < 0.0 {
        return Err(DraftError::NegativePrice);
    }
    if !(0.0..=RATING_MAX).contains(&rating) {
        return Err(DraftError::RatingOutOfRange);
    }
    if !(0.0..=DISCOUNT_MAX).contains(&discount) {
        return Err(DraftError::DiscountOutOfRange);
    }
    if stock < 0 {
        return Err(DraftError::NegativeStock);
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
