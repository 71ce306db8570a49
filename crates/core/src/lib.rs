//! `txduel-core` — domain building blocks shared by the harness.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::{Entity, SoftDelete};
pub use error::{DomainError, DomainResult};
pub use id::{PriceId, ProductId};
