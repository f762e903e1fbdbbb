//! RocketShoes Core - Shared types library.
//!
//! This crate provides the types used across all RocketShoes components:
//! - `cart` - Client-side cart store, catalog client and persistence
//! - `cli` - Command-line front end for the cart store
//!
//! # Architecture
//!
//! The core crate contains only types and pure cart rules - no I/O, no
//! persistence, no HTTP clients. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Product IDs, prices, products, stock quotes and the cart itself

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
