use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use txduel_core::{DomainError, DomainResult, Entity, PriceId, SoftDelete};

/// Price record.
///
/// `amount` is a plain number with no currency attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    id: PriceId,
    name: String,
    amount: f64,
    deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Price {
    pub fn new(name: impl Into<String>, amount: f64, now: DateTime<Utc>) -> DomainResult<Self> {
        Self::with_id(PriceId::new(), name, amount, now)
    }

    pub fn with_id(
        id: PriceId,
        name: impl Into<String>,
        amount: f64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        crate::validate_name("price", &name)?;
        validate_amount(amount)?;

        Ok(Self {
            id,
            name,
            amount,
            deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn restore(
        id: PriceId,
        name: String,
        amount: f64,
        deleted: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        crate::validate_name("price", &name)?;
        validate_amount(amount)?;
        Ok(Self {
            id,
            name,
            amount,
            deleted,
            created_at,
            updated_at,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

fn validate_amount(amount: f64) -> DomainResult<()> {
    if !amount.is_finite() {
        return Err(DomainError::validation(format!(
            "price amount must be a finite number (got {amount})"
        )));
    }
    Ok(())
}

impl Entity for Price {
    type Id = PriceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl SoftDelete for Price {
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
