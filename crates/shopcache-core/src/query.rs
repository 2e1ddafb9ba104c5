//! Pure page derivation over the catalog snapshot.
//!
//! The snapshot has no native query capability, so every list view goes
//! through `derive`: one tested filter-sort-paginate pipeline, parameterized
//! by `QuerySpec`, instead of per-view comparison logic. The function is
//! deterministic and side-effect free - invalidation simply means calling it
//! again with the fresh snapshot.

use std::cmp::Ordering;

use thiserror::Error;

use crate::models::Product;

/// Page size used when a caller does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueryError {
    #[error("page size must be positive")]
    InvalidPageSize,
}

/// Sortable product attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Id,
    Title,
    Description,
    Price,
    DiscountPercentage,
    Rating,
    Stock,
    Brand,
    Category,
}

impl SortKey {
    /// Parse an attribute name as it appears on the wire or on the command
    /// line. Case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "id" => Some(SortKey::Id),
            "title" => Some(SortKey::Title),
            "description" => Some(SortKey::Description),
            "price" => Some(SortKey::Price),
            "discount" | "discountpercentage" => Some(SortKey::DiscountPercentage),
            "rating" => Some(SortKey::Rating),
            "stock" => Some(SortKey::Stock),
            "brand" => Some(SortKey::Brand),
            "category" => Some(SortKey::Category),
            _ => None,
        }
    }
}

/// A read-side query: transient, recomputed from UI state on every render.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    /// Case-insensitive substring matched against title and brand.
    pub search: String,
    pub sort: Option<SortKey>,
    pub descending: bool,
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            search: String::new(),
            sort: None,
            descending: false,
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One derived page plus the post-filter total the caller needs for
/// navigation bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Product>,
    pub total_count: usize,
}

impl Page {
    /// Number of pages at `page_size` items each.
    pub fn page_count(&self, page_size: usize) -> usize {
        if page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(page_size)
    }
}

/// Derive a displayable page from the full snapshot.
///
/// Fixed pipeline: filter, then stable sort, then paginate. A page index
/// past the end yields an empty item list with the `total_count` intact.
pub fn derive(products: &[Product], spec: &QuerySpec) -> Result<Page, QueryError> {
    if spec.page_size == 0 {
        return Err(QueryError::InvalidPageSize);
    }

    let mut matched: Vec<&Product> = if spec.search.is_empty() {
        products.iter().collect()
    } else {
        let needle = spec.search.to_lowercase();
        products
            .iter()
            .filter(|p| {
                contains_ignore_case(&p.title, &needle) || contains_ignore_case(&p.brand, &needle)
            })
            .collect()
    };

    if let Some(key) = spec.sort {
        // Stable sort: ties keep snapshot order
        matched.sort_by(|a, b| {
            let ordering = compare(a, b, key);
            if spec.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }

    let total_count = matched.len();
    let start = spec.page_index.saturating_mul(spec.page_size);
    let items = if start >= total_count {
        Vec::new()
    } else {
        let end = (start + spec.page_size).min(total_count);
        matched[start..end].iter().map(|p| (*p).clone()).collect()
    };

    Ok(Page { items, total_count })
}

/// Compare two products by one attribute's natural ordering: numeric for
/// numbers, lexicographic for strings.
fn compare(a: &Product, b: &Product, key: SortKey) -> Ordering {
    match key {
        SortKey::Id => a.id.cmp(&b.id),
        SortKey::Title => a.title.cmp(&b.title),
        SortKey::Description => a.description.cmp(&b.description),
        SortKey::Price => a.price.total_cmp(&b.price),
        SortKey::DiscountPercentage => a.discount_percentage.total_cmp(&b.discount_percentage),
        SortKey::Rating => a.rating.total_cmp(&b.rating),
        SortKey::Stock => a.stock.cmp(&b.stock),
        SortKey::Brand => a.brand.cmp(&b.brand),
        SortKey::Category => a.category.cmp(&b.category),
    }
}

/// Check if `haystack` contains `needle`. Needle must already be lowercased.
fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

// ============================================================================
// Tests
// ============================================================================
