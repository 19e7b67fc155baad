//! Domain model for the people store.
//!
//! # Responsibility
//! - Define the persisted entities (`Person`, `Address`) and the closed
//!   `Region` classification.
//! - Define the identity contract repositories rely on.
//!
//! # Invariants
//! - Every entity has exactly one store-managed identity attribute.
//! - Owned relations are held by value; non-owning relations by identity.

pub mod address;
pub mod identity;
pub mod person;
pub mod region;
