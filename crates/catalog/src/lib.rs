//! Catalog records: products and their prices.
//!
//! Both kinds are append-only with soft deletion. The harness never creates
//! them; it only bulk-marks whole collections deleted inside a transaction.

pub mod price;
pub mod product;

pub use price::Price;
pub use product::Product;

use txduel_core::{DomainError, DomainResult};

/// Shared name rule: required, and not just whitespace.
pub(crate) fn validate_name(kind: &str, name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation(format!("{kind} name cannot be empty")));
    }
    Ok(())
}
