//! Create/update/delete against the catalog snapshot.
//!
//! Every mutation is a whole-snapshot read-modify-persist-replace cycle:
//! clone the current snapshot, apply the change, commit through the
//! coordinator (durable write first, memory swap second), then publish the
//! fresh snapshot on the invalidation bus.
//!
//! The latch serializes those cycles. Two concurrent mutations both reading
//! the pre-mutation snapshot and writing back would silently drop one of
//! them - this is the one correctness-critical race in the system.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use super::coordinator::{CacheCoordinator, LoadError};
use crate::api::CatalogSource;
use crate::bus::{InvalidationBus, PRODUCTS_TOPIC};
use crate::models::{DraftError, Product, ProductDraft, ProductPatch};
use crate::store::StorageError;

#[derive(Error, Debug)]
pub enum MutationError {
    #[error("product {0} not found")]
    NotFound(i64),

    #[error("invalid product: {0}")]
    Invalid(#[from] DraftError),

    #[error("failed to persist mutation: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Serialized mutations over the snapshot held by the coordinator.
pub struct MutationService<S> {
    coordinator: Arc<CacheCoordinator<S>>,
    bus: Arc<InvalidationBus>,
    /// At-most-one-writer latch around the read-modify-persist-replace cycle.
    latch: Mutex<()>,
}

impl<S: CatalogSource> MutationService<S> {
    pub fn new(coordinator: Arc<CacheCoordinator<S>>, bus: Arc<InvalidationBus>) -> Self {
        Self {
            coordinator,
            bus,
            latch: Mutex::new(()),
        }
    }

    /// Create a product from `draft`. The new id is one past the highest id
    /// in the snapshot (1 on an empty catalog) and the record is prepended,
    /// so the most recent entry lists first.
    pub async fn create(&self, draft: ProductDraft) -> Result<Product, MutationError> {
        draft.validate()?;

        let _guard = self.latch.lock().await;
        let snapshot = self.coordinator.get_snapshot().await?;

        let next_id = snapshot.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let product = draft.into_product(next_id);

        let mut products = Vec::with_capacity(snapshot.len() + 1);
        products.push(product.clone());
        products.extend(snapshot.iter().cloned());

        let committed = self.coordinator.commit(products).await?;
        self.bus.publish(PRODUCTS_TOPIC, committed);

        info!(id = product.id, title = %product.title, "Created product");
        Ok(product)
    }

    /// Merge `patch` into the product with `id`, preserving its position in
    /// the snapshot. Returns the merged record.
    pub async fn update(&self, id: i64, patch: ProductPatch) -> Result<Product, MutationError> {
        let _guard = self.latch.lock().await;
        let snapshot = self.coordinator.get_snapshot().await?;

        let index = snapshot
            .iter()
            .position(|p| p.id == id)
            .ok_or(MutationError::NotFound(id))?;
        patch.validate()?;

        let mut products: Vec<Product> = snapshot.iter().cloned().collect();
        patch.apply(&mut products[index]);
        let merged = products[index].clone();

        let committed = self.coordinator.commit(products).await?;
        self.bus.publish(PRODUCTS_TOPIC, committed);

        info!(id, "Updated product");
        Ok(merged)
    }

    /// Remove the product with `id` from the snapshot.
    pub async fn delete(&self, id: i64) -> Result<(), MutationError> {
        let _guard = self.latch.lock().await;
        let snapshot = self.coordinator.get_snapshot().await?;

        if !snapshot.iter().any(|p| p.id == id) {
            return Err(MutationError::NotFound(id));
        }

        let products: Vec<Product> = snapshot.iter().filter(|p| p.id != id).cloned().collect();

        let committed = self.coordinator.commit(products).await?;
        self.bus.publish(PRODUCTS_TOPIC, committed);

        info!(id, "Deleted product");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::store::LocalStore;
    use std::collections::HashSet;

    struct FixedSource(Vec<Product>);

    impl CatalogSource for FixedSource {
        async fn fetch_all(&self) -> Result<Vec<Product>, ApiError> {
            Ok(self.0.clone())
        }
    }

    fn draft(title: &str, price: f64) -> ProductDraft {
        ProductDraft {
            title: title.to_string(),
            price,
            rating: 4.0,
            brand: "Acme".to_string(),
            description: "d".to_string(),
            ..Default::default()
        }
    }

    fn service(
        initial: Vec<Product>,
    ) -> (
        tempfile::TempDir,
        Arc<CacheCoordinator<FixedSource>>,
        MutationService<FixedSource>,
        Arc<InvalidationBus>,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf()).unwrap();
        let coordinator = Arc::new(CacheCoordinator::new(FixedSource(initial), store));
        let bus = Arc::new(InvalidationBus::new());
        let service = MutationService::new(coordinator.clone(), bus.clone());
        (dir, coordinator, service, bus)
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids_from_one() {
        let (_dir, _coordinator, service, _bus) = service(Vec::new());

        let first = service.create(draft("A", 5.0)).await.unwrap();
        assert_eq!(first.id, 1);

        let second = service.create(draft("B", 6.0)).await.unwrap();
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_create_prepends_most_recent_first() {
        let (_dir, coordinator, service, _bus) = service(Vec::new());

        service.create(draft("First", 1.0)).await.unwrap();
        service.create(draft("Second", 2.0)).await.unwrap();

        let snapshot = coordinator.get_snapshot().await.unwrap();
        assert_eq!(snapshot[0].title, "Second");
        assert_eq!(snapshot[1].title, "First");
    }

    #[tokio::test]
    async fn test_create_never_duplicates_ids() {
        let initial = vec![draft("Seed", 1.0).into_product(41)];
        let (_dir, coordinator, service, _bus) = service(initial);

        for i in 0..5 {
            service.create(draft(&format!("P{}", i), 1.0)).await.unwrap();
        }

        let snapshot = coordinator.get_snapshot().await.unwrap();
        let ids: HashSet<i64> = snapshot.iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), snapshot.len());
        // Ids continue past the highest existing id
        assert!(ids.contains(&42));
        assert!(ids.contains(&46));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_draft() {
        let (_dir, coordinator, service, _bus) = service(Vec::new());

        let result = service.create(draft("", 5.0)).await;
        assert!(matches!(
            result,
            Err(MutationError::Invalid(DraftError::EmptyTitle))
        ));
        assert!(coordinator.get_snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_and_preserves_position() {
        let initial = vec![
            draft("A", 1.0).into_product(1),
            draft("B", 2.0).into_product(2),
            draft("C", 3.0).into_product(3),
        ];
        let (_dir, coordinator, service, _bus) = service(initial);

        let patch = ProductPatch {
            price: Some(9.5),
            ..Default::default()
        };
        let merged = service.update(2, patch).await.unwrap();
        assert_eq!(merged.price, 9.5);
        assert_eq!(merged.title, "B");

        let snapshot = coordinator.get_snapshot().await.unwrap();
        assert_eq!(snapshot[1].id, 2);
        assert_eq!(snapshot[1].price, 9.5);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_patch() {
        let initial = vec![draft("A", 1.0).into_product(1)];
        let (_dir, coordinator, service, _bus) = service(initial);

        let patch = ProductPatch {
            price: Some(-2.0),
            ..Default::default()
        };
        assert!(matches!(
            service.update(1, patch).await,
            Err(MutationError::Invalid(DraftError::NegativePrice))
        ));

        let snapshot = coordinator.get_snapshot().await.unwrap();
        assert_eq!(snapshot[0].price, 1.0);
    }

    #[tokio::test]
    async fn test_update_leaves_unset_fields_unjudged() {
        // Upstream records sometimes arrive without a brand; a patch that
        // does not touch the brand must still go through.
        let mut seed = draft("Brandless", 1.0).into_product(1);
        seed.brand = String::new();
        let (_dir, _coordinator, service, _bus) = service(vec![seed]);

        let patch = ProductPatch {
            price: Some(4.25),
            ..Default::default()
        };
        let merged = service.update(1, patch).await.unwrap();
        assert_eq!(merged.price, 4.25);
        assert_eq!(merged.brand, "");
    }

    #[tokio::test]
    async fn test_delete_then_update_is_not_found() {
        let initial = vec![draft("Gone", 1.0).into_product(7)];
        let (_dir, _coordinator, service, _bus) = service(initial);

        service.delete(7).await.unwrap();

        let patch = ProductPatch {
            title: Some("Back".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update(7, patch).await,
            Err(MutationError::NotFound(7))
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_id_is_not_found() {
        let (_dir, _coordinator, service, _bus) = service(Vec::new());
        assert!(matches!(
            service.delete(99).await,
            Err(MutationError::NotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_mutations_are_persisted() {
        let (dir, _coordinator, service, _bus) = service(Vec::new());

        service.create(draft("Durable", 3.0)).await.unwrap();

        let store = LocalStore::new(dir.path().to_path_buf()).unwrap();
        let persisted = store.load().unwrap().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].title, "Durable");
    }

    #[tokio::test]
    async fn test_mutation_publishes_fresh_snapshot() {
        let (_dir, _coordinator, service, bus) = service(Vec::new());
        let mut sub = bus.subscribe(PRODUCTS_TOPIC);

        service.create(draft("Announce", 1.0)).await.unwrap();

        let snapshot = sub.try_recv().expect("invalidation published");
        assert_eq!(snapshot[0].title, "Announce");
    }

    #[tokio::test]
    async fn test_concurrent_creates_do_not_lose_updates() {
        let (_dir, coordinator, service, _bus) = service(Vec::new());

        let (a, b) = futures::future::join(
            service.create(draft("A", 1.0)),
            service.create(draft("B", 2.0)),
        )
        .await;

        let a = a.unwrap();
        let b = b.unwrap();
        assert_ne!(a.id, b.id);

        let snapshot = coordinator.get_snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_persist_rolls_the_mutation_back() {
        use std::os::unix::fs::PermissionsExt;

        let initial = vec![draft("Keep", 1.0).into_product(1)];
        let (dir, coordinator, service, bus) = service(initial);
        let mut sub = bus.subscribe(PRODUCTS_TOPIC);

        // Load the snapshot, then make the cache directory unwritable so the
        // next durable write fails.
        coordinator.get_snapshot().await.unwrap();
        let readonly = std::fs::Permissions::from_mode(0o555);
        std::fs::set_permissions(dir.path(), readonly).unwrap();

        // Permission bits do not bind root (e.g. CI containers); the write
        // cannot be made to fail there, so there is nothing to observe.
        if std::fs::write(dir.path().join("canary"), b"x").is_ok() {
            return;
        }

        let result = service.create(draft("Lost", 2.0)).await;
        assert!(matches!(result, Err(MutationError::Storage(_))));

        // Neither memory nor the durable store changed, and nothing was
        // published.
        let snapshot = coordinator.get_snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].title, "Keep");
        assert!(sub.try_recv().is_none());

        let writable = std::fs::Permissions::from_mode(0o755);
        std::fs::set_permissions(dir.path(), writable).unwrap();
    }
}
