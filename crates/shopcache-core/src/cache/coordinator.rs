//! Snapshot lifecycle and load coalescing.
//!
//! The coordinator is the exclusive owner of the cache state machine
//! (`Empty -> Loading -> Ready | Failed`). Every other component receives
//! the snapshot from here: the query engine reads it, the mutation service
//! commits replacements through `commit`. Nothing else touches the local
//! store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::api::{ApiError, CatalogSource};
use crate::models::{Product, Snapshot};
use crate::store::{LocalStore, StorageError};

/// Why the snapshot could not be produced.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("remote catalog load failed: {0}")]
    Remote(#[from] ApiError),

    #[error("local store failed: {0}")]
    Storage(#[from] StorageError),

    /// The load this caller coalesced onto failed while the caller was
    /// queued; the message is that load's shared outcome.
    #[error("catalog load failed: {0}")]
    Unavailable(String),
}

/// The cache state machine. Single instance, owned by the coordinator.
pub enum CacheState {
    Empty,
    Loading,
    Ready(ReadySnapshot),
    Failed(String),
}

/// A materialized snapshot plus the time it was adopted, for age display.
pub struct ReadySnapshot {
    pub snapshot: Snapshot,
    pub loaded_at: DateTime<Utc>,
}

/// Decides snapshot-vs-fetch and owns the "is the snapshot present" state.
pub struct CacheCoordinator<S> {
    source: S,
    store: LocalStore,
    state: RwLock<CacheState>,
    /// Serializes first loads so N concurrent callers share one
    /// fetch-and-persist instead of issuing N remote calls.
    load_lock: Mutex<()>,
    /// Completed load cycles. Lets a caller queued on the load lock tell
    /// "the load I waited on failed" apart from "some earlier call failed",
    /// so a concurrent burst shares one failure instead of fetching N times.
    load_seq: AtomicU64,
}

impl<S: CatalogSource> CacheCoordinator<S> {
    pub fn new(source: S, store: LocalStore) -> Self {
        Self {
            source,
            store,
            state: RwLock::new(CacheState::Empty),
            load_lock: Mutex::new(()),
            load_seq: AtomicU64::new(0),
        }
    }

    /// Return the current snapshot, materializing it on first use.
    ///
    /// When `Ready` this is a pure in-memory read. Otherwise one caller runs
    /// the load (store first, remote on a miss, persist the result) while
    /// concurrent callers queue on the load lock and adopt the same outcome,
    /// success or failure. Only a call issued *after* a failed load re-enters
    /// the load path - retry *policy* stays with the caller, who decides
    /// whether and when to call again.
    pub async fn get_snapshot(&self) -> Result<Snapshot, LoadError> {
        if let CacheState::Ready(ref ready) = *self.state.read().await {
            return Ok(ready.snapshot.clone());
        }

        let seq_before = self.load_seq.load(Ordering::Acquire);
        let _guard = self.load_lock.lock().await;

        // A coalesced caller adopts whatever the load it queued behind
        // produced. The sequence check distinguishes that shared failure
        // from a stale one left by an earlier call.
        match *self.state.read().await {
            CacheState::Ready(ref ready) => return Ok(ready.snapshot.clone()),
            CacheState::Failed(ref reason)
                if self.load_seq.load(Ordering::Acquire) != seq_before =>
            {
                return Err(LoadError::Unavailable(reason.clone()));
            }
            _ => {}
        }

        *self.state.write().await = CacheState::Loading;

        let result = self.load().await;
        self.load_seq.fetch_add(1, Ordering::Release);

        match result {
            Ok(products) => {
                let snapshot: Snapshot = Arc::new(products);
                *self.state.write().await = CacheState::Ready(ReadySnapshot {
                    snapshot: snapshot.clone(),
                    loaded_at: Utc::now(),
                });
                Ok(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "Snapshot load failed");
                *self.state.write().await = CacheState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Store-first load: adopt a persisted snapshot when present, otherwise
    /// perform the one bulk remote read and persist it.
    async fn load(&self) -> Result<Vec<Product>, LoadError> {
        if let Some(products) = self.store.load()? {
            info!(count = products.len(), "Adopted persisted snapshot");
            return Ok(products);
        }

        let products = self.source.fetch_all().await?;
        self.store.save(&products)?;
        info!(count = products.len(), "Fetched and persisted catalog");
        Ok(products)
    }

    /// Commit a mutated catalog: persist first, then swap the in-memory
    /// snapshot. A failed persist leaves the prior snapshot in place, so
    /// memory and durable store never disagree.
    pub(crate) async fn commit(&self, products: Vec<Product>) -> Result<Snapshot, StorageError> {
        self.store.save(&products)?;

        let snapshot: Snapshot = Arc::new(products);
        let mut state = self.state.write().await;
        let loaded_at = match *state {
            CacheState::Ready(ref ready) => ready.loaded_at,
            _ => Utc::now(),
        };
        *state = CacheState::Ready(ReadySnapshot {
            snapshot: snapshot.clone(),
            loaded_at,
        });
        Ok(snapshot)
    }

    /// Look up a single product in the snapshot. Detail reads are answered
    /// from the snapshot only - it is the sole authority once loaded.
    pub async fn find(&self, id: i64) -> Result<Option<Product>, LoadError> {
        let snapshot = self.get_snapshot().await?;
        Ok(snapshot.iter().find(|p| p.id == id).cloned())
    }

    /// Clear the durable store and return the state machine to `Empty`.
    pub async fn reset(&self) -> Result<(), StorageError> {
        let _guard = self.load_lock.lock().await;
        self.store.clear()?;
        *self.state.write().await = CacheState::Empty;
        debug!("Cache reset");
        Ok(())
    }

    /// Discard the snapshot and reload from the remote source.
    pub async fn refresh(&self) -> Result<Snapshot, LoadError> {
        self.reset().await?;
        self.get_snapshot().await
    }

    /// Human-readable age of the current snapshot, if one is held.
    pub async fn age_display(&self) -> Option<String> {
        match *self.state.read().await {
            CacheState::Ready(ref ready) => Some(age_display(ready.loaded_at)),
            _ => None,
        }
    }
}

/// Format how long ago `loaded_at` was, rounded for display.
fn age_display(loaded_at: DateTime<Utc>) -> String {
    let minutes = (Utc::now() - loaded_at).num_minutes();
    if minutes < 1 {
        // Covers clock skew (negative ages) as well
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / 1440)
    }
}

// ============================================================================
// Tests
// ============================================================================
