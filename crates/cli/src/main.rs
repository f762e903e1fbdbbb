//! RocketShoes CLI - Drive the cart from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! rs-cart show
//!
//! # Add one unit of product 1
//! rs-cart add 1
//!
//! # Set product 1 to three units
//! rs-cart set 1 3
//!
//! # Remove product 1
//! rs-cart remove 1
//!
//! # Empty the cart
//! rs-cart clear
//! ```
//!
//! Configuration comes from the environment (see `rocketshoes_cart::config`).
//! A rejected operation prints its notice to stderr and exits with status 1.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rocketshoes_cart::{CartConfig, ProductId};

mod commands;

#[derive(Parser)]
#[command(name = "rs-cart")]
#[command(author, version, about = "RocketShoes cart tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cart contents and total
    Show,
    /// Add one unit of a product
    Add {
        /// Product ID
        id: ProductId,
    },
    /// Remove a product from the cart
    Remove {
        /// Product ID
        id: ProductId,
    },
    /// Set the quantity of a product already in the cart
    Set {
        /// Product ID
        id: ProductId,
        /// New quantity; zero or less is ignored
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },
    /// Remove every product from the cart
    Clear,
}

#[tokio::main]
async fn main() {
    // Parsed first so --help and usage errors never depend on the environment
    let cli = Cli::parse();

    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            rocketshoes_cart::telemetry::init_tracing("rocketshoes_cart=info,rs_cart=info");
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = rocketshoes_cart::telemetry::init_sentry(config.sentry_dsn.as_deref());
    rocketshoes_cart::telemetry::init_tracing("rocketshoes_cart=warn,rs_cart=info");

    if let Err(e) = run(cli, &config).await {
        tracing::debug!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartConfig) -> Result<(), commands::CommandError> {
    let session = commands::Session::open(config)?;

    match cli.command {
        Commands::Show => session.show(),
        Commands::Add { id } => session.add(id).await,
        Commands::Remove { id } => session.remove(id).await,
        Commands::Set { id, amount } => session.set(id, amount).await,
        Commands::Clear => session.clear().await,
    }
}
