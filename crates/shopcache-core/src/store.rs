//! Durable local persistence for the catalog snapshot.
//!
//! The store holds exactly one entry: the full catalog, serialized as a
//! plain JSON array of products under the fixed key `products`. The snapshot
//! is always written and read wholesale - callers produce the complete new
//! catalog before calling `save`.

use std::io::ErrorKind;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Product;

/// The single well-known key the snapshot lives under.
const SNAPSHOT_KEY: &str = "products";

/// Errors from the durable store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// File-backed key-value store for the catalog snapshot.
pub struct LocalStore {
    cache_dir: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `cache_dir`, creating the directory if needed.
    pub fn new(cache_dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.cache_dir.join(format!("{}.json", SNAPSHOT_KEY))
    }

    /// Load the persisted snapshot, if any.
    ///
    /// A value that is present but does not parse as a product array is
    /// treated as absent (the caller falls through to the remote source); the
    /// catalog never fails to load because an external writer corrupted it.
    pub fn load(&self) -> Result<Option<Vec<Product>>, StorageError> {
        let path = self.snapshot_path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Vec<Product>>(&contents) {
            Ok(products) => {
                debug!(count = products.len(), "Loaded snapshot from local store");
                Ok(Some(products))
            }
            Err(e) => {
                warn!(error = %e, "Persisted snapshot is not a valid product array; treating as absent");
                Ok(None)
            }
        }
    }

    /// Replace the persisted snapshot with `products`.
    ///
    /// The write goes through a temporary file renamed over the key, so a
    /// failure leaves the prior value intact - there are no partial writes.
    pub fn save(&self, products: &[Product]) -> Result<(), StorageError> {
        let contents = serde_json::to_string(products)?;
        let path = self.snapshot_path();
        let tmp = self.cache_dir.join(format!("{}.json.tmp", SNAPSHOT_KEY));

        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &path)?;

        debug!(count = products.len(), "Saved snapshot to local store");
        Ok(())
    }

    /// Remove the persisted snapshot. Removing an absent entry succeeds.
    pub fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(self.snapshot_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
