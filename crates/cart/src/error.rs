//! Cart operation errors.
//!
//! Every [`CartStore`](crate::CartStore) mutation runs as a fallible inner
//! step returning [`CartError`]. The public methods catch the error at the
//! operation boundary, log it, and translate it into a user-facing
//! [`Notice`](crate::Notice). Callers never see these values directly.

use rocketshoes_core::{CartValidationError, ProductId};
use thiserror::Error;

use crate::catalog::ApiError;

/// Failure of a single cart mutation.
#[derive(Debug, Error)]
pub enum CartError {
    /// Requested quantity exceeds the remote stock.
    #[error("Out of stock: product {product_id} requested {requested}, available {available}")]
    OutOfStock {
        product_id: ProductId,
        requested: u64,
        available: i64,
    },

    /// A stock or product lookup failed.
    #[error("Lookup failed: {0}")]
    Lookup(#[from] ApiError),

    /// The product is not in the cart.
    #[error("Not in cart: product {0}")]
    NotFound(ProductId),

    /// The mutation would break a cart invariant.
    #[error("Invalid cart: {0}")]
    Invalid(#[from] CartValidationError),
}

impl CartError {
    /// Whether the failure came from the catalog API rather than a cart rule.
    #[must_use]
    pub const fn is_lookup(&self) -> bool {
        matches!(self, Self::Lookup(_))
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
