//! Catalog API: remote stock and product lookups.
//!
//! # Architecture
//!
//! - [`CatalogApi`] is the seam the cart store talks to
//! - [`HttpCatalog`] is the `reqwest` implementation against the REST API
//! - Product records are cached in memory via `moka`; stock quotes never are
//!
//! # Endpoints
//!
//! - `GET {base}/stock/{id}` - `{ "id": 1, "amount": 3 }`
//! - `GET {base}/products/{id}` - full product record

mod http;

pub use http::HttpCatalog;

use async_trait::async_trait;
use rocketshoes_core::{Product, ProductId, StockQuote};
use thiserror::Error;

/// Errors that can occur when talking to the catalog API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-success status other than 404.
    #[error("Unexpected status {status} from {path}")]
    Status { status: u16, path: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Remote lookups the cart store depends on.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Current stock for a product. Must not be served from a cache.
    async fn stock(&self, id: ProductId) -> Result<StockQuote, ApiError>;

    /// The full product record.
    async fn product(&self, id: ProductId) -> Result<Product, ApiError>;
}

#[async_trait]
impl<C: CatalogApi + ?Sized> CatalogApi for std::sync::Arc<C> {
    async fn stock(&self, id: ProductId) -> Result<StockQuote, ApiError> {
        (**self).stock(id).await
    }

    async fn product(&self, id: ProductId) -> Result<Product, ApiError> {
        (**self).product(id).await
    }
}
