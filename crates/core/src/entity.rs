//! Entity traits: identity plus logical (soft) deletion.

use chrono::{DateTime, Utc};

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Records that are never physically removed.
///
/// Deletion flips a flag and bumps the update timestamp; the record stays in
/// its collection. Marking an already-deleted record is not an error.
pub trait SoftDelete: Entity {
    fn is_deleted(&self) -> bool;

    fn updated_at(&self) -> DateTime<Utc>;

    /// Mark the record deleted as of `at`.
    fn mark_deleted(&mut self, at: DateTime<Utc>);
}
