//! RocketShoes cart library.
//!
//! A client-side shopping cart that checks every quantity change against the
//! catalog's stock API and keeps the cart in durable key-value storage.
//!
//! # Modules
//!
//! - [`store`] - [`CartStore`], the only way to read or change the cart
//! - [`catalog`] - Stock and product lookups ([`HttpCatalog`])
//! - [`storage`] - Key-value adapters ([`MemoryStorage`], [`FileStorage`])
//! - [`persistence`] - Snapshot encoding and validated loading
//! - [`notify`] - User-facing failure notices
//! - [`config`] - Environment configuration
//! - [`telemetry`] - Tracing and Sentry setup for binaries

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod error;
pub mod notify;
pub mod persistence;
pub mod storage;
pub mod store;
pub mod telemetry;

pub use catalog::{ApiError, CatalogApi, HttpCatalog};
pub use config::{CartConfig, CatalogApiConfig, ConfigError};
pub use error::CartError;
pub use notify::{Notice, Notifier, RecordingNotifier, TracingNotifier};
pub use persistence::DEFAULT_STORAGE_KEY;
pub use storage::{CartStorage, FileStorage, MemoryStorage, StorageError};
pub use store::{CartStore, SubscriptionId, UpdateProductAmount};

pub use rocketshoes_core::{Cart, CartItem, Price, Product, ProductId, StockQuote};
