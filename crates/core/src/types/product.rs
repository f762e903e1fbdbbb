//! Catalog records and cart line items.

use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Price, ProductId};

/// A product record as served by `GET /products/{id}`.
///
/// Fields the storefront does not model are kept in `extra` so a product read
/// from the API and written to storage comes back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog identifier.
    pub id: ProductId,
    /// Display name. Records without one stay without one when stored.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Unit price.
    pub price: Price,
    /// Image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Any other fields from the API.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    /// Create a product with no extra fields.
    #[must_use]
    pub fn new(id: ProductId, title: impl Into<String>, price: Price) -> Self {
        Self {
            id,
            title: title.into(),
            price,
            image: None,
            extra: Map::new(),
        }
    }

    /// Set the image URL.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// A product in the cart together with the selected quantity.
///
/// Serializes flat, i.e. `{"id": 1, "title": "...", "price": 99.9, "amount": 2}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// The product record captured when the item was first added.
    #[serde(flatten)]
    pub product: Product,
    /// Selected quantity. Never zero.
    pub amount: NonZeroU32,
}

impl CartItem {
    /// Create a cart item.
    ///
    /// A stray `amount` key in the product's extra fields is dropped so it
    /// cannot shadow the item quantity when serialized.
    #[must_use]
    pub fn new(mut product: Product, amount: NonZeroU32) -> Self {
        product.extra.remove("amount");
        Self { product, amount }
    }

    /// Create a cart item with quantity one.
    #[must_use]
    pub fn single(product: Product) -> Self {
        Self::new(product, NonZeroU32::MIN)
    }

    /// The product ID.
    #[must_use]
    pub const fn id(&self) -> ProductId {
        self.product.id
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.product.price.times(self.amount.get())
    }
}

/// Available stock for a product as reported by `GET /stock/{id}`.
///
/// This is a snapshot at query time and is never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockQuote {
    /// Product the quote is for. Some APIs omit it from the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ProductId>,
    /// Units available. Zero or negative means none.
    pub amount: i64,
}

impl StockQuote {
    /// Whether `requested` units can be satisfied by this quote.
    #[must_use]
    pub fn covers(&self, requested: u64) -> bool {
        i64::try_from(requested).is_ok_and(|requested| requested <= self.amount)
    }
}
