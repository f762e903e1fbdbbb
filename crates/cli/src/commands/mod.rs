//! Cart commands.
//!
//! Each command opens the store from configuration, runs one operation, and
//! turns any notice the store raised into a [`CommandError`].

use std::io::Write;
use std::sync::Arc;

use rocketshoes_cart::{
    ApiError, Cart, CartConfig, CartStore, Notice, ProductId, RecordingNotifier,
    UpdateProductAmount,
};
use thiserror::Error;

/// Errors that end a command with a non-zero exit status.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The catalog client could not be created.
    #[error("Catalog client error: {0}")]
    Catalog(#[from] ApiError),

    /// The store rejected the operation.
    #[error("{0}")]
    Rejected(Notice),

    /// Writing to the terminal failed.
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}

/// A store opened for a single command.
pub struct Session {
    store: CartStore,
    notifier: Arc<RecordingNotifier>,
}

impl Session {
    /// Open the store described by `config`.
    pub fn open(config: &CartConfig) -> Result<Self, CommandError> {
        let notifier = Arc::new(RecordingNotifier::new());
        let store = CartStore::from_config(config, Arc::clone(&notifier))?;
        tracing::debug!(path = %config.storage_path.display(), "Opened cart store");
        Ok(Self { store, notifier })
    }

    pub fn show(&self) -> Result<(), CommandError> {
        print_cart(&self.store.cart())
    }

    pub async fn add(&self, id: ProductId) -> Result<(), CommandError> {
        self.store.add_product(id).await;
        self.finish()
    }

    pub async fn remove(&self, id: ProductId) -> Result<(), CommandError> {
        self.store.remove_product(id).await;
        self.finish()
    }

    pub async fn set(&self, id: ProductId, amount: i64) -> Result<(), CommandError> {
        self.store
            .update_product_amount(UpdateProductAmount {
                product_id: id,
                amount,
            })
            .await;
        self.finish()
    }

    pub async fn clear(&self) -> Result<(), CommandError> {
        self.store.clear().await;
        self.finish()
    }

    /// Report raised notices, or print the cart if there were none.
    fn finish(&self) -> Result<(), CommandError> {
        let notices = self.notifier.take();
        if let Some(&first) = notices.first() {
            let mut stderr = std::io::stderr().lock();
            for notice in &notices {
                writeln!(stderr, "{notice}")?;
            }
            return Err(CommandError::Rejected(first));
        }
        print_cart(&self.store.cart())
    }
}

fn print_cart(cart: &Cart) -> Result<(), CommandError> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(render_cart(cart).as_bytes())?;
    Ok(())
}

/// Render the cart as a plain-text table.
pub fn render_cart(cart: &Cart) -> String {
    if cart.is_empty() {
        return "Carrinho vazio\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:>5}  {:<40} {:>6} {:>14} {:>14}\n",
        "ID", "PRODUTO", "QTD", "PREÇO", "SUBTOTAL"
    ));
    for item in cart {
        out.push_str(&format!(
            "{:>5}  {:<40} {:>6} {:>14} {:>14}\n",
            item.id(),
            truncate(&item.product.title, 40),
            item.amount,
            item.product.price.to_string(),
            item.subtotal().to_string(),
        ));
    }
    out.push_str(&format!(
        "\nItens: {}  Total: {}\n",
        cart.item_count(),
        cart.total()
    ));
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
