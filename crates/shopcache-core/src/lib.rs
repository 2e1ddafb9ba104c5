//! shopcache-core - offline-first product catalog cache.
//!
//! The catalog is materialized from the remote source into a durable local
//! store on first use; every read after that is answered from the in-memory
//! snapshot. Mutations rewrite the snapshot atomically (durable write first)
//! and broadcast an invalidation so every derived view re-derives from the
//! fresh snapshot.
//!
//! Component map:
//!
//! - [`models`]: `Product` and friends
//! - [`store`]: durable single-entry snapshot persistence
//! - [`api`]: one-shot bulk loader from the upstream catalog
//! - [`cache`]: the coordinator (snapshot-vs-fetch, load coalescing) and the
//!   mutation service (serialized create/update/delete)
//! - [`query`]: pure filter-sort-paginate derivation
//! - [`bus`]: invalidation fan-out to page consumers
//! - [`debounce`]: quiescence delay for search input

pub mod api;
pub mod bus;
pub mod cache;
pub mod config;
pub mod debounce;
pub mod models;
pub mod query;
pub mod store;

pub use api::{ApiError, CatalogSource, RemoteCatalog};
pub use bus::{InvalidationBus, Invalidations, PRODUCTS_TOPIC};
pub use cache::{CacheCoordinator, LoadError, MutationError, MutationService};
pub use config::Config;
pub use debounce::{Debouncer, SEARCH_DEBOUNCE};
pub use models::{Product, ProductDraft, ProductPatch, Snapshot};
pub use query::{derive, Page, QueryError, QuerySpec, SortKey};
pub use store::{LocalStore, StorageError};
