use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use txduel_core::{DomainResult, Entity, ProductId, SoftDelete};

/// Product record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Product {
    /// Create a live (not deleted) product.
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> DomainResult<Self> {
        Self::with_id(ProductId::new(), name, now)
    }

    pub fn with_id(id: ProductId, name: impl Into<String>, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = name.into();
        crate::validate_name("product", &name)?;

        Ok(Self {
            id,
            name,
            deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild a record read back from storage, re-checking its invariants.
    pub fn restore(
        id: ProductId,
        name: String,
        deleted: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        crate::validate_name("product", &name)?;
        Ok(Self {
            id,
            name,
            deleted,
            created_at,
            updated_at,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl SoftDelete for Product {
    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.deleted = true;
        self.updated_at = at;
    }
}
