//! Integration tests for the RocketShoes cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p rocketshoes-integration-tests
//! ```
//!
//! Tests run the real [`HttpCatalog`] against a `mockito` server, so no
//! catalog API needs to be running.
//!
//! # Test Categories
//!
//! - `cart_store_http` - Store operations through the HTTP catalog
//! - `file_persistence` - Cart survival across store instances on disk

use std::sync::Arc;

use mockito::{Mock, ServerGuard};
use rocketshoes_cart::{
    CartStore, CatalogApiConfig, HttpCatalog, MemoryStorage, RecordingNotifier,
};
use url::Url;

/// A store wired to a mock catalog server and in-memory storage.
pub struct TestContext {
    pub server: ServerGuard,
    pub store: CartStore,
    pub storage: Arc<MemoryStorage>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestContext {
    /// Start a mock server and an empty store.
    pub async fn new() -> Self {
        Self::with_storage(MemoryStorage::new()).await
    }

    /// Start a mock server and a store over `storage`.
    ///
    /// # Panics
    ///
    /// Panics if the catalog client cannot be built.
    #[allow(clippy::unwrap_used)]
    pub async fn with_storage(storage: MemoryStorage) -> Self {
        let server = mockito::Server::new_async().await;
        let catalog = HttpCatalog::new(&catalog_config(&server.url())).unwrap();
        let storage = Arc::new(storage);
        let notifier = Arc::new(RecordingNotifier::new());
        let store = CartStore::new(catalog, Arc::clone(&storage), Arc::clone(&notifier));

        Self {
            server,
            store,
            storage,
            notifier,
        }
    }

    /// Serve `GET /stock/{id}` with the given amount.
    pub async fn mock_stock(&mut self, id: i32, amount: u32) -> Mock {
        mock_stock(&mut self.server, id, amount).create_async().await
    }

    /// Serve `GET /products/{id}` with `body`.
    pub async fn mock_product(&mut self, id: i32, body: &serde_json::Value) -> Mock {
        mock_product(&mut self.server, id, body).create_async().await
    }
}

/// Catalog configuration pointing at `server_url`.
///
/// # Panics
///
/// Panics if `server_url` is not a valid URL.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn catalog_config(server_url: &str) -> CatalogApiConfig {
    CatalogApiConfig::new(Url::parse(server_url).unwrap())
}

/// A `GET /stock/{id}` mock returning the given amount, not yet created.
pub fn mock_stock(server: &mut ServerGuard, id: i32, amount: u32) -> Mock {
    server
        .mock("GET", format!("/stock/{id}").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::json!({ "id": id, "amount": amount }).to_string())
}

/// A `GET /products/{id}` mock returning `body`, not yet created.
pub fn mock_product(server: &mut ServerGuard, id: i32, body: &serde_json::Value) -> Mock {
    server
        .mock("GET", format!("/products/{id}").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
}
