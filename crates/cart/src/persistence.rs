//! Cart snapshot encoding and storage.
//!
//! The cart is stored as a JSON array of items under a single key. Loading is
//! forgiving: a missing, unreadable or malformed snapshot yields an empty cart
//! and a warning, never an error.

use rocketshoes_core::Cart;
use thiserror::Error;

use crate::storage::{CartStorage, StorageError};

/// Key the cart is stored under unless configured otherwise.
pub const DEFAULT_STORAGE_KEY: &str = "@RocketShoes:cart";

/// Errors raised while writing a snapshot.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Serialize a cart to its stored form.
///
/// # Errors
///
/// Returns a `serde_json::Error` if the cart cannot be serialized.
pub fn encode_cart(cart: &Cart) -> Result<String, serde_json::Error> {
    serde_json::to_string(cart)
}

/// Parse and validate a stored snapshot.
///
/// Besides the JSON shape this rejects zero or negative amounts and repeated
/// product IDs.
///
/// # Errors
///
/// Returns a `serde_json::Error` describing the first problem found.
pub fn decode_cart(raw: &str) -> Result<Cart, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Read the cart stored under `key`, falling back to an empty cart.
pub fn load_cart(storage: &dyn CartStorage, key: &str) -> Cart {
    let raw = match storage.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            tracing::debug!(key, "No stored cart, starting empty");
            return Cart::new();
        }
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to read stored cart, starting empty");
            return Cart::new();
        }
    };

    match decode_cart(&raw) {
        Ok(cart) => {
            tracing::debug!(key, items = cart.len(), "Loaded stored cart");
            cart
        }
        Err(e) => {
            tracing::warn!(
                key,
                error = %e,
                snapshot = %raw.chars().take(200).collect::<String>(),
                "Stored cart is invalid, starting empty"
            );
            Cart::new()
        }
    }
}

/// Write `cart` under `key`.
///
/// # Errors
///
/// Returns `PersistError` if encoding or the storage write fails.
pub fn save_cart(storage: &dyn CartStorage, key: &str, cart: &Cart) -> Result<(), PersistError> {
    let raw = encode_cart(cart)?;
    storage.set_item(key, &raw)?;
    Ok(())
}
