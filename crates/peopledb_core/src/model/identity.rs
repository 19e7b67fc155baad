//! Store-managed identity contract shared by every persisted entity.
//!
//! # Responsibility
//! - Name the single identity attribute of each entity type.
//! - Let anyone read that attribute while only the persistence layer can
//!   write it.
//!
//! # Invariants
//! - An identity is `None` until the first successful save.
//! - Once assigned, the identity is a positive store-generated integer.

use std::fmt::Display;

/// Store-generated primary key of a persisted entity.
pub type EntityId = i64;

/// Proof that an identity write originates from the persistence layer.
///
/// Only this crate can construct a grant, so `Entity::assign_identity` is
/// callable from repositories but not from user code.
#[derive(Debug)]
pub struct IdentityGrant(());

impl IdentityGrant {
    pub(crate) fn new() -> Self {
        Self(())
    }
}

/// Persisted domain value with exactly one store-managed identity attribute.
///
/// `Display` is used to describe the entity in save failures.
pub trait Entity: Display {
    /// Stable type label used in errors and log events, e.g. `person`.
    const ENTITY_NAME: &'static str;

    /// Returns the identity, or `None` when the entity was never saved.
    fn identity(&self) -> Option<EntityId>;

    /// Writes the store-generated identity back into the entity.
    ///
    /// Identities are immutable once assigned: implementations must leave
    /// an existing identity untouched.
    fn assign_identity(&mut self, id: EntityId, grant: IdentityGrant);
}
