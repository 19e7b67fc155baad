//! Repository layer: the generic CRUD engine and its concrete instances.
//!
//! # Responsibility
//! - Resolve per-operation SQL from declared statements or defaults.
//! - Keep SQL text and row decoding inside the persistence boundary.
//!
//! # Invariants
//! - Saves fail loudly; other store failures degrade to empty results.
//! - Identities are written back only by the engine after an insert.

pub mod address_repo;
pub mod crud;
pub mod people_repo;
mod row;
pub mod statement;
