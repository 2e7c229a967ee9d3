//! Chef Server REST client
//!
//! Covers the endpoints berkflow needs: environments, node search,
//! cookbook lookup/download and cookbook upload through sandboxes.

mod auth;
mod client;

pub use auth::{canonical_path, RequestSigner};
pub use client::ChefClient;
