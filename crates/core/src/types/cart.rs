//! The cart: an ordered list of items, unique by product ID.

use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{CartItem, Price, ProductId};

/// Errors raised when a list of items does not form a valid cart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartValidationError {
    /// Two entries share the same product ID.
    #[error("product {0} appears more than once")]
    DuplicateItem(ProductId),
}

/// The user's in-progress selection of products.
///
/// Serializes as a bare JSON array of [`CartItem`]. Deserialization rejects
/// arrays that repeat a product ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CartItem>", into = "Vec<CartItem>")]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Number of distinct products.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart has no items.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The item for `id`, if present.
    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Whether `id` is in the cart.
    #[must_use]
    pub fn contains(&self, id: ProductId) -> bool {
        self.get(id).is_some()
    }

    /// Quantity of `id` in the cart, zero when absent.
    #[must_use]
    pub fn amount_of(&self, id: ProductId) -> u32 {
        self.get(id).map_or(0, |item| item.amount.get())
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items
            .iter()
            .map(|item| u64::from(item.amount.get()))
            .sum()
    }

    /// Sum of all line subtotals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    /// Append a new item.
    ///
    /// # Errors
    ///
    /// Returns [`CartValidationError::DuplicateItem`] if the product is
    /// already in the cart; the cart is left unchanged.
    pub fn insert(&mut self, item: CartItem) -> Result<(), CartValidationError> {
        if self.contains(item.id()) {
            return Err(CartValidationError::DuplicateItem(item.id()));
        }
        self.items.push(item);
        Ok(())
    }

    /// Set the quantity of an existing item in place.
    ///
    /// Returns `false` if the product is not in the cart.
    pub fn set_amount(&mut self, id: ProductId, amount: NonZeroU32) -> bool {
        match self.items.iter_mut().find(|item| item.id() == id) {
            Some(item) => {
                item.amount = amount;
                true
            }
            None => false,
        }
    }

    /// Remove the item for `id`, keeping the order of the rest.
    pub fn remove(&mut self, id: ProductId) -> Option<CartItem> {
        let index = self.items.iter().position(|item| item.id() == id)?;
        Some(self.items.remove(index))
    }

    /// Remove every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl TryFrom<Vec<CartItem>> for Cart {
    type Error = CartValidationError;

    fn try_from(items: Vec<CartItem>) -> Result<Self, Self::Error> {
        let mut cart = Self::new();
        for item in items {
            cart.insert(item)?;
        }
        Ok(cart)
    }
}

impl From<Cart> for Vec<CartItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}

impl<'a> IntoIterator for &'a Cart {
    type Item = &'a CartItem;
    type IntoIter = core::slice::Iter<'a, CartItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
