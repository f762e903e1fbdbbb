//! The cart store.
//!
//! [`CartStore`] owns the client-side cart and is the only way to change it.
//! Every mutation follows the same shape:
//!
//! 1. take the per-product lock, so calls for the same product run one at a
//!    time and each sees the previous one's result,
//! 2. query the catalog (stock always, product record when adding a new item),
//! 3. apply the change to the current cart under a short synchronous lock,
//! 4. persist the full snapshot and notify subscribers.
//!
//! Any failure before step 3 leaves the cart untouched. Failures are reported
//! through the [`Notifier`], never returned.
//!
//! Storage adapters are synchronous, so snapshots are written on Tokio's
//! blocking pool. A revision counter keeps the stored snapshot from ever
//! going back to an older cart.
//!
//! # Example
//!
//! ```rust,ignore
//! use rocketshoes_cart::{CartConfig, CartStore, TracingNotifier};
//!
//! let config = CartConfig::from_env()?;
//! let store = CartStore::from_config(&config, TracingNotifier)?;
//!
//! store.subscribe(|cart| println!("{} items", cart.item_count()));
//! store.add_product(ProductId::new(1)).await;
//! ```

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rocketshoes_core::{Cart, CartItem, ProductId};
use tokio::sync::OwnedMutexGuard;
use tracing::instrument;

use crate::catalog::{ApiError, CatalogApi, HttpCatalog};
use crate::config::CartConfig;
use crate::error::{CartError, Result};
use crate::notify::{Notice, Notifier};
use crate::persistence::{self, DEFAULT_STORAGE_KEY};
use crate::storage::{CartStorage, FileStorage};

/// Arguments of [`CartStore::update_product_amount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateProductAmount {
    /// Product to change.
    pub product_id: ProductId,
    /// New quantity. Zero or negative values are ignored.
    pub amount: i64,
}

/// Handle returned by [`CartStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = dyn Fn(&Cart) + Send + Sync;

/// Client-side cart with stock-checked mutations.
///
/// Cheaply cloneable via `Arc`; clones share the same cart.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    catalog: Box<dyn CatalogApi>,
    storage: Box<dyn CartStorage>,
    notifier: Box<dyn Notifier>,
    storage_key: String,
    cart: Mutex<Cart>,
    /// Bumped under the `cart` lock on every commit.
    revision: AtomicU64,
    /// Last revision written to storage.
    persisted: tokio::sync::Mutex<u64>,
    product_locks: Mutex<HashMap<ProductId, Arc<tokio::sync::Mutex<()>>>>,
    subscribers: Mutex<Vec<(SubscriptionId, Arc<Subscriber>)>>,
    next_subscription: AtomicU64,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("storage_key", &self.inner.storage_key)
            .field("items", &self.lock_cart().len())
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Create a store persisting under the default key.
    ///
    /// The stored cart is read immediately; nothing is written until the
    /// first successful mutation.
    pub fn new(
        catalog: impl CatalogApi + 'static,
        storage: impl CartStorage + 'static,
        notifier: impl Notifier + 'static,
    ) -> Self {
        Self::with_storage_key(catalog, storage, notifier, DEFAULT_STORAGE_KEY)
    }

    /// Create a store persisting under `storage_key`.
    pub fn with_storage_key(
        catalog: impl CatalogApi + 'static,
        storage: impl CartStorage + 'static,
        notifier: impl Notifier + 'static,
        storage_key: impl Into<String>,
    ) -> Self {
        let storage_key = storage_key.into();
        let cart = persistence::load_cart(&storage, &storage_key);
        tracing::debug!(key = %storage_key, items = cart.len(), "Cart store initialized");

        Self {
            inner: Arc::new(CartStoreInner {
                catalog: Box::new(catalog),
                storage: Box::new(storage),
                notifier: Box::new(notifier),
                storage_key,
                cart: Mutex::new(cart),
                revision: AtomicU64::new(0),
                persisted: tokio::sync::Mutex::new(0),
                product_locks: Mutex::new(HashMap::new()),
                subscribers: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(0),
            }),
        }
    }

    /// Create a store backed by the HTTP catalog and file storage from
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the HTTP client cannot be built.
    pub fn from_config(
        config: &CartConfig,
        notifier: impl Notifier + 'static,
    ) -> std::result::Result<Self, ApiError> {
        let catalog = HttpCatalog::new(&config.api)?;
        let storage = FileStorage::new(&config.storage_path);
        Ok(Self::with_storage_key(
            catalog,
            storage,
            notifier,
            config.storage_key.clone(),
        ))
    }

    /// A snapshot of the current cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.lock_cart().clone()
    }

    /// Key the cart is persisted under.
    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.inner.storage_key
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of a product.
    ///
    /// Increments the existing entry, or fetches the product record and
    /// appends it with amount 1. Notifies [`Notice::OutOfStock`] when the new
    /// quantity exceeds stock and [`Notice::AddFailed`] on lookup failure.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_product(&self, product_id: ProductId) {
        if let Err(e) = self.try_add_product(product_id).await {
            self.report(&e, Notice::AddFailed);
        }
    }

    /// Remove a product's entry.
    ///
    /// Notifies [`Notice::RemoveFailed`] if the product is not in the cart.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_product(&self, product_id: ProductId) {
        if let Err(e) = self.try_remove_product(product_id).await {
            self.report(&e, Notice::RemoveFailed);
        }
    }

    /// Set a product's quantity.
    ///
    /// Amounts of zero or less are ignored without any notice. Notifies
    /// [`Notice::OutOfStock`] when the amount exceeds stock and
    /// [`Notice::UpdateFailed`] on lookup failure or if the product is not in
    /// the cart.
    #[instrument(
        skip(self, update),
        fields(product_id = %update.product_id, amount = update.amount)
    )]
    pub async fn update_product_amount(&self, update: UpdateProductAmount) {
        if update.amount <= 0 {
            tracing::debug!("Ignoring non-positive amount");
            return;
        }
        if let Err(e) = self.try_update_product_amount(update).await {
            self.report(&e, Notice::UpdateFailed);
        }
    }

    /// Empty the cart.
    ///
    /// Does not wait for in-flight mutations. An [`add_product`] whose entry
    /// is cleared while its lookup is pending adds the product back with
    /// amount 1.
    ///
    /// [`add_product`]: Self::add_product
    #[instrument(skip(self))]
    pub async fn clear(&self) {
        let cleared = self
            .commit(|cart| {
                cart.clear();
                Ok(())
            })
            .await;
        if let Err(e) = cleared {
            tracing::error!(error = %e, "Failed to clear cart");
        }
    }

    async fn try_add_product(&self, product_id: ProductId) -> Result<()> {
        let _guard = self.lock_product(product_id).await;

        let existing = self.lock_cart().get(product_id).cloned();
        let current = existing.as_ref().map_or(0, |item| item.amount.get());
        let requested = u64::from(current) + 1;

        let stock = self.inner.catalog.stock(product_id).await?;
        let Some(amount) = u32::try_from(requested)
            .ok()
            .and_then(NonZeroU32::new)
            .filter(|_| stock.covers(requested))
        else {
            return Err(CartError::OutOfStock {
                product_id,
                requested,
                available: stock.amount,
            });
        };

        let product = match existing {
            Some(item) => item.product,
            None => self.inner.catalog.product(product_id).await?,
        };

        self.commit(|cart| {
            if !cart.set_amount(product_id, amount) {
                // New to the cart, or cleared while the lookup was pending
                cart.insert(CartItem::single(product))?;
            }
            Ok(())
        })
        .await
    }

    async fn try_remove_product(&self, product_id: ProductId) -> Result<()> {
        let _guard = self.lock_product(product_id).await;

        self.commit(|cart| {
            cart.remove(product_id)
                .map(|_| ())
                .ok_or(CartError::NotFound(product_id))
        })
        .await
    }

    async fn try_update_product_amount(&self, update: UpdateProductAmount) -> Result<()> {
        let UpdateProductAmount { product_id, amount } = update;
        let _guard = self.lock_product(product_id).await;

        let stock = self.inner.catalog.stock(product_id).await?;
        let requested = amount.unsigned_abs();
        let Some(amount) = u32::try_from(amount)
            .ok()
            .and_then(NonZeroU32::new)
            .filter(|_| stock.covers(requested))
        else {
            return Err(CartError::OutOfStock {
                product_id,
                requested,
                available: stock.amount,
            });
        };

        self.commit(|cart| {
            if cart.set_amount(product_id, amount) {
                Ok(())
            } else {
                Err(CartError::NotFound(product_id))
            }
        })
        .await
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Call `callback` with the new cart after every committed mutation.
    pub fn subscribe(&self, callback: impl Fn(&Cart) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Stop calling a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn lock_cart(&self) -> std::sync::MutexGuard<'_, Cart> {
        self.inner
            .cart
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn lock_product(&self, product_id: ProductId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .inner
                .product_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on are only referenced by the map
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(product_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Apply `mutate` to a copy of the current cart and, if it succeeds,
    /// make the copy current, persist it and notify subscribers.
    async fn commit(&self, mutate: impl FnOnce(&mut Cart) -> Result<()>) -> Result<()> {
        let snapshot = {
            let mut cart = self.lock_cart();
            let mut next = cart.clone();
            mutate(&mut next)?;
            *cart = next.clone();
            self.inner.revision.fetch_add(1, Ordering::AcqRel);
            next
        };

        tracing::debug!(
            items = snapshot.len(),
            count = snapshot.item_count(),
            "Cart committed"
        );

        self.persist().await;

        let subscribers: Vec<Arc<Subscriber>> = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in subscribers {
            callback(&snapshot);
        }

        Ok(())
    }

    /// Write the current cart unless a newer or equal revision is stored.
    async fn persist(&self) {
        let mut persisted = self.inner.persisted.lock().await;
        let (snapshot, revision) = {
            let cart = self.lock_cart();
            (cart.clone(), self.inner.revision.load(Ordering::Acquire))
        };
        if revision <= *persisted {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let written = tokio::task::spawn_blocking(move || {
            persistence::save_cart(&*inner.storage, &inner.storage_key, &snapshot)
        })
        .await;

        match written {
            Ok(Ok(())) => *persisted = revision,
            Ok(Err(e)) => tracing::error!(
                key = %self.inner.storage_key,
                error = %e,
                "Failed to persist cart"
            ),
            Err(e) => tracing::error!(error = %e, "Cart persistence task failed"),
        }
    }

    fn report(&self, err: &CartError, fallback: Notice) {
        let notice = Notice::for_error(err, fallback);
        if err.is_lookup() {
            tracing::warn!(error = %err, notice = ?notice, "Catalog lookup failed");
        } else {
            tracing::info!(error = %err, notice = ?notice, "Cart operation rejected");
        }
        self.inner.notifier.notify(notice);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use rocketshoes_core::{Price, Product, StockQuote};

    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::storage::{MemoryStorage, StorageError};

    #[derive(Default)]
    struct FakeCatalog {
        stock: Mutex<HashMap<ProductId, i64>>,
        products: Mutex<HashMap<ProductId, Product>>,
        fail_stock: bool,
        fail_products: bool,
        /// Holds stock lookups until notified.
        pause: Option<Arc<tokio::sync::Notify>>,
        stock_calls: AtomicUsize,
        product_calls: AtomicUsize,
    }

    impl FakeCatalog {
        fn with(self, id: i32, stock: i64, cents: i64) -> Self {
            let id = ProductId::new(id);
            self.stock.lock().unwrap().insert(id, stock);
            self.products
                .lock()
                .unwrap()
                .insert(id, Product::new(id, format!("Tênis {id}"), Price::from_cents(cents)));
            self
        }

        fn stock_calls(&self) -> usize {
            self.stock_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CatalogApi for FakeCatalog {
        async fn stock(&self, id: ProductId) -> std::result::Result<StockQuote, ApiError> {
            self.stock_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(pause) = &self.pause {
                pause.notified().await;
            }
            // Let other tasks interleave, as a real request would
            tokio::task::yield_now().await;
            if self.fail_stock {
                return Err(ApiError::Status {
                    status: 500,
                    path: format!("stock/{id}"),
                });
            }
            let amount = self
                .stock
                .lock()
                .unwrap()
                .get(&id)
                .copied()
                .ok_or_else(|| ApiError::NotFound(format!("stock/{id}")))?;
            Ok(StockQuote {
                id: Some(id),
                amount,
            })
        }

        async fn product(&self, id: ProductId) -> std::result::Result<Product, ApiError> {
            self.product_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_products {
                return Err(ApiError::NotFound(format!("products/{id}")));
            }
            self.products
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("products/{id}")))
        }
    }

    struct FailingStorage;

    impl CartStorage for FailingStorage {
        fn get_item(&self, _key: &str) -> std::result::Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set_item(&self, _key: &str, _value: &str) -> std::result::Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::other("disk full")))
        }

        fn remove_item(&self, _key: &str) -> std::result::Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::other("disk full")))
        }
    }

    struct Harness {
        store: CartStore,
        catalog: Arc<FakeCatalog>,
        storage: Arc<MemoryStorage>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(catalog: FakeCatalog, storage: MemoryStorage) -> Harness {
        let catalog = Arc::new(catalog);
        let storage = Arc::new(storage);
        let notifier = Arc::new(RecordingNotifier::new());
        let store = CartStore::new(
            Arc::clone(&catalog),
            Arc::clone(&storage),
            Arc::clone(&notifier),
        );
        Harness {
            store,
            catalog,
            storage,
            notifier,
        }
    }

    fn stored(h: &Harness) -> Option<String> {
        h.storage.get_item(DEFAULT_STORAGE_KEY).unwrap()
    }

    fn id(raw: i32) -> ProductId {
        ProductId::new(raw)
    }

    #[tokio::test]
    async fn test_add_new_product_appends_single_unit() {
        let h = harness(FakeCatalog::default().with(5, 10, 10_000), MemoryStorage::new());

        h.store.add_product(id(5)).await;

        let cart = h.store.cart();
        assert_eq!(cart.len(), 1);
        let item = cart.get(id(5)).unwrap();
        assert_eq!(item.amount.get(), 1);
        assert_eq!(item.product.price, Price::from_cents(10_000));
        assert!(h.notifier.notices().is_empty());
        assert_eq!(persistence::decode_cart(&stored(&h).unwrap()).unwrap(), cart);
    }

    #[tokio::test]
    async fn test_add_existing_product_increments() {
        let h = harness(FakeCatalog::default().with(1, 3, 17_990), MemoryStorage::new());

        h.store.add_product(id(1)).await;
        h.store.add_product(id(1)).await;

        let cart = h.store.cart();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.amount_of(id(1)), 2);
        // Product record is only fetched for the first unit
        assert_eq!(h.catalog.product_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_add_beyond_stock_is_rejected() {
        let raw = r#"[{"id":1,"title":"Tênis","price":179.9,"amount":2}]"#;
        let h = harness(
            FakeCatalog::default().with(1, 2, 17_990),
            MemoryStorage::with_item(DEFAULT_STORAGE_KEY, raw),
        );
        let before = h.store.cart();

        h.store.add_product(id(1)).await;

        assert_eq!(h.store.cart(), before);
        assert_eq!(h.notifier.notices(), vec![Notice::OutOfStock]);
        assert_eq!(stored(&h).as_deref(), Some(raw));
        assert_eq!(h.storage.write_count(), 0);
    }

    #[tokio::test]
    async fn test_add_with_zero_stock_is_rejected() {
        let h = harness(FakeCatalog::default().with(4, 0, 100), MemoryStorage::new());

        h.store.add_product(id(4)).await;

        assert!(h.store.cart().is_empty());
        assert_eq!(h.notifier.notices(), vec![Notice::OutOfStock]);
        assert_eq!(h.catalog.product_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_add_with_negative_stock_is_rejected() {
        let raw = r#"[{"id":4,"title":"Tênis","price":1,"amount":1}]"#;
        let h = harness(
            FakeCatalog::default().with(4, -3, 100),
            MemoryStorage::with_item(DEFAULT_STORAGE_KEY, raw),
        );

        h.store.add_product(id(4)).await;
        h.store
            .update_product_amount(UpdateProductAmount {
                product_id: id(4),
                amount: 1,
            })
            .await;

        assert_eq!(h.store.cart().amount_of(id(4)), 1);
        assert_eq!(
            h.notifier.notices(),
            vec![Notice::OutOfStock, Notice::OutOfStock]
        );
        assert_eq!(h.storage.write_count(), 0);
    }

    #[tokio::test]
    async fn test_add_stock_lookup_failure() {
        let catalog = FakeCatalog {
            fail_stock: true,
            ..FakeCatalog::default()
        }
        .with(1, 5, 100);
        let h = harness(catalog, MemoryStorage::new());

        h.store.add_product(id(1)).await;

        assert!(h.store.cart().is_empty());
        assert_eq!(h.notifier.notices(), vec![Notice::AddFailed]);
        assert_eq!(h.storage.write_count(), 0);
    }

    #[tokio::test]
    async fn test_add_product_lookup_failure() {
        let catalog = FakeCatalog {
            fail_products: true,
            ..FakeCatalog::default()
        }
        .with(1, 5, 100);
        let h = harness(catalog, MemoryStorage::new());

        h.store.add_product(id(1)).await;

        assert!(h.store.cart().is_empty());
        assert_eq!(h.notifier.notices(), vec![Notice::AddFailed]);
    }

    #[tokio::test]
    async fn test_add_unknown_product() {
        let h = harness(FakeCatalog::default(), MemoryStorage::new());

        h.store.add_product(id(99)).await;

        assert!(h.store.cart().is_empty());
        assert_eq!(h.notifier.notices(), vec![Notice::AddFailed]);
    }

    #[tokio::test]
    async fn test_remove_present_product() {
        let catalog = FakeCatalog::default()
            .with(1, 5, 100)
            .with(2, 5, 200)
            .with(3, 5, 300);
        let h = harness(catalog, MemoryStorage::new());
        for raw in [1, 2, 3, 3] {
            h.store.add_product(id(raw)).await;
        }

        h.store.remove_product(id(2)).await;

        let cart = h.store.cart();
        let ids: Vec<i32> = cart.items().iter().map(|i| i.id().as_i32()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(cart.amount_of(id(1)), 1);
        assert_eq!(cart.amount_of(id(3)), 2);
        assert!(h.notifier.notices().is_empty());
        // Removal never touches the catalog
        assert_eq!(h.catalog.stock_calls(), 4);
    }

    #[tokio::test]
    async fn test_remove_absent_product() {
        let h = harness(FakeCatalog::default().with(1, 5, 100), MemoryStorage::new());
        h.store.add_product(id(1)).await;
        let writes = h.storage.write_count();

        h.store.remove_product(id(2)).await;

        assert_eq!(h.store.cart().len(), 1);
        assert_eq!(h.notifier.notices(), vec![Notice::RemoveFailed]);
        assert_eq!(h.storage.write_count(), writes);
    }

    #[tokio::test]
    async fn test_update_non_positive_is_noop() {
        let h = harness(FakeCatalog::default().with(1, 5, 100), MemoryStorage::new());
        h.store.add_product(id(1)).await;
        let writes = h.storage.write_count();
        let calls = h.catalog.stock_calls();

        for amount in [0, -1, i64::MIN] {
            h.store
                .update_product_amount(UpdateProductAmount {
                    product_id: id(1),
                    amount,
                })
                .await;
        }

        assert_eq!(h.store.cart().amount_of(id(1)), 1);
        assert!(h.notifier.notices().is_empty());
        assert_eq!(h.storage.write_count(), writes);
        assert_eq!(h.catalog.stock_calls(), calls);
    }

    #[tokio::test]
    async fn test_update_within_stock() {
        let h = harness(FakeCatalog::default().with(1, 5, 100), MemoryStorage::new());
        h.store.add_product(id(1)).await;

        h.store
            .update_product_amount(UpdateProductAmount {
                product_id: id(1),
                amount: 5,
            })
            .await;

        assert_eq!(h.store.cart().amount_of(id(1)), 5);
        assert!(h.notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_update_beyond_stock() {
        let h = harness(FakeCatalog::default().with(1, 5, 100), MemoryStorage::new());
        h.store.add_product(id(1)).await;

        for amount in [6, i64::MAX] {
            h.store
                .update_product_amount(UpdateProductAmount {
                    product_id: id(1),
                    amount,
                })
                .await;
        }

        assert_eq!(h.store.cart().amount_of(id(1)), 1);
        assert_eq!(
            h.notifier.notices(),
            vec![Notice::OutOfStock, Notice::OutOfStock]
        );
    }

    #[tokio::test]
    async fn test_update_absent_product() {
        let h = harness(FakeCatalog::default().with(1, 5, 100), MemoryStorage::new());

        h.store
            .update_product_amount(UpdateProductAmount {
                product_id: id(1),
                amount: 2,
            })
            .await;

        assert!(h.store.cart().is_empty());
        assert_eq!(h.notifier.notices(), vec![Notice::UpdateFailed]);
        assert_eq!(h.storage.write_count(), 0);
    }

    #[tokio::test]
    async fn test_update_lookup_failure() {
        let h = harness(FakeCatalog::default(), MemoryStorage::new());

        h.store
            .update_product_amount(UpdateProductAmount {
                product_id: id(1),
                amount: 2,
            })
            .await;

        assert_eq!(h.notifier.notices(), vec![Notice::UpdateFailed]);
    }

    #[tokio::test]
    async fn test_initialization_reads_without_writing() {
        let raw = r#"[{"id":2,"title":"Tênis VR Caminhada","price":139.9,"amount":3}]"#;
        let h = harness(
            FakeCatalog::default(),
            MemoryStorage::with_item(DEFAULT_STORAGE_KEY, raw),
        );

        assert_eq!(h.store.cart().amount_of(id(2)), 3);
        assert_eq!(h.storage.write_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_adds_for_same_product_are_serialized() {
        let h = harness(FakeCatalog::default().with(7, 10, 100), MemoryStorage::new());

        tokio::join!(
            h.store.add_product(id(7)),
            h.store.add_product(id(7)),
            h.store.add_product(id(7)),
        );

        let cart = h.store.cart();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.amount_of(id(7)), 3);
        assert!(h.notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_adds_for_different_products_are_kept() {
        let catalog = FakeCatalog::default().with(1, 1, 100).with(2, 1, 200);
        let h = harness(catalog, MemoryStorage::new());

        tokio::join!(h.store.add_product(id(1)), h.store.add_product(id(2)));

        let cart = h.store.cart();
        assert!(cart.contains(id(1)));
        assert!(cart.contains(id(2)));
        assert_eq!(persistence::decode_cart(&stored(&h).unwrap()).unwrap(), cart);
    }

    #[tokio::test]
    async fn test_concurrent_adds_respect_stock() {
        let h = harness(FakeCatalog::default().with(7, 1, 100), MemoryStorage::new());

        tokio::join!(h.store.add_product(id(7)), h.store.add_product(id(7)));

        assert_eq!(h.store.cart().amount_of(id(7)), 1);
        assert_eq!(h.notifier.notices(), vec![Notice::OutOfStock]);
    }

    #[tokio::test]
    async fn test_subscribers_fire_on_commit_only() {
        let h = harness(FakeCatalog::default().with(1, 1, 100), MemoryStorage::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = h.store.subscribe(move |cart| {
            sink.lock().unwrap().push(cart.item_count());
        });

        h.store.add_product(id(1)).await; // commit
        h.store.add_product(id(1)).await; // out of stock
        h.store.remove_product(id(9)).await; // not in cart
        h.store
            .update_product_amount(UpdateProductAmount {
                product_id: id(1),
                amount: 0,
            })
            .await; // ignored
        h.store.remove_product(id(1)).await; // commit

        assert_eq!(*seen.lock().unwrap(), vec![1, 0]);

        assert!(h.store.unsubscribe(subscription));
        assert!(!h.store.unsubscribe(subscription));
        h.store.add_product(id(1)).await;
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_subscriber_can_read_store() {
        let h = harness(FakeCatalog::default().with(1, 1, 100), MemoryStorage::new());
        let store = h.store.clone();
        let lens = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lens);
        h.store.subscribe(move |_| {
            sink.lock().unwrap().push(store.cart().len());
        });

        h.store.add_product(id(1)).await;

        assert_eq!(*lens.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_in_memory_cart() {
        let notifier = Arc::new(RecordingNotifier::new());
        let store = CartStore::new(
            FakeCatalog::default().with(1, 5, 100),
            FailingStorage,
            Arc::clone(&notifier),
        );

        store.add_product(id(1)).await;

        assert_eq!(store.cart().amount_of(id(1)), 1);
        assert!(notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_clear_persists_empty_cart() {
        let h = harness(FakeCatalog::default().with(1, 5, 100), MemoryStorage::new());
        h.store.add_product(id(1)).await;

        h.store.clear().await;

        assert!(h.store.cart().is_empty());
        assert_eq!(stored(&h).as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_add_survives_concurrent_clear() {
        let raw = r#"[{"id":1,"title":"Tênis","price":1,"amount":2}]"#;
        let pause = Arc::new(tokio::sync::Notify::new());
        let catalog = FakeCatalog {
            pause: Some(Arc::clone(&pause)),
            ..FakeCatalog::default()
        }
        .with(1, 5, 100);
        let h = harness(catalog, MemoryStorage::with_item(DEFAULT_STORAGE_KEY, raw));

        tokio::join!(h.store.add_product(id(1)), async {
            tokio::task::yield_now().await;
            h.store.clear().await;
            pause.notify_one();
        });

        let cart = h.store.cart();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.amount_of(id(1)), 1);
        assert!(h.notifier.notices().is_empty());
        assert_eq!(persistence::decode_cart(&stored(&h).unwrap()).unwrap(), cart);
    }

    /// Storage that blocks in `set_item` until released.
    struct GatedStorage {
        entered: tokio::sync::Notify,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
        stalled: std::sync::atomic::AtomicBool,
    }

    impl CartStorage for GatedStorage {
        fn get_item(&self, _key: &str) -> std::result::Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set_item(&self, _key: &str, _value: &str) -> std::result::Result<(), StorageError> {
            self.entered.notify_one();
            let released = self
                .release
                .lock()
                .unwrap()
                .recv_timeout(std::time::Duration::from_secs(5));
            self.stalled.store(released.is_err(), Ordering::SeqCst);
            Ok(())
        }

        fn remove_item(&self, _key: &str) -> std::result::Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_storage_writes_run_off_the_runtime() {
        let (release, gate) = std::sync::mpsc::channel();
        let storage = Arc::new(GatedStorage {
            entered: tokio::sync::Notify::new(),
            release: Mutex::new(gate),
            stalled: std::sync::atomic::AtomicBool::new(false),
        });
        let store = CartStore::new(
            FakeCatalog::default().with(1, 5, 100),
            Arc::clone(&storage),
            RecordingNotifier::new(),
        );

        let adding = tokio::spawn({
            let store = store.clone();
            async move { store.add_product(id(1)).await }
        });

        // Only reachable while the write is blocked if it runs elsewhere
        storage.entered.notified().await;
        assert_eq!(store.cart().amount_of(id(1)), 1);
        release.send(()).unwrap();
        adding.await.unwrap();

        assert!(!storage.stalled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stored_snapshot_never_goes_back() {
        let catalog = FakeCatalog::default()
            .with(1, 9, 100)
            .with(2, 9, 100)
            .with(3, 9, 100);
        let h = harness(catalog, MemoryStorage::new());

        tokio::join!(
            h.store.add_product(id(1)),
            h.store.add_product(id(2)),
            h.store.add_product(id(3)),
            h.store.add_product(id(1)),
        );

        let cart = h.store.cart();
        assert_eq!(cart.item_count(), 4);
        assert_eq!(persistence::decode_cart(&stored(&h).unwrap()).unwrap(), cart);
        assert!(h.storage.write_count() <= 4);
    }

    #[tokio::test]
    async fn test_custom_storage_key() {
        let storage = Arc::new(MemoryStorage::new());
        let store = CartStore::with_storage_key(
            FakeCatalog::default().with(1, 5, 100),
            Arc::clone(&storage),
            RecordingNotifier::new(),
            "shop:cart",
        );

        store.add_product(id(1)).await;

        assert_eq!(store.storage_key(), "shop:cart");
        assert!(storage.get_item("shop:cart").unwrap().is_some());
        assert!(storage.get_item(DEFAULT_STORAGE_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_product_locks_are_released() {
        let catalog = FakeCatalog::default().with(1, 5, 100).with(2, 5, 100);
        let h = harness(catalog, MemoryStorage::new());
        h.store.add_product(id(1)).await;
        h.store.add_product(id(2)).await;
        h.store.add_product(id(1)).await;

        let locks = h.store.inner.product_locks.lock().unwrap();
        assert!(locks.values().all(|lock| Arc::strong_count(lock) == 1));
        assert!(locks.len() <= 2);
    }
}
