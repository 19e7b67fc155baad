//! Core persistence engine for the people store.
//! Maps `Person` / `Address` graphs onto SQLite through declared SQL.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use model::address::Address;
pub use model::identity::{Entity, EntityId, IdentityGrant};
pub use model::person::{ParentLink, Person, SpouseLink};
pub use model::region::{Region, UnknownRegion};
pub use repo::address_repo::AddressRepository;
pub use repo::crud::{require_identity, CrudRepository, RepoError, RepoResult};
pub use repo::people_repo::PeopleRepository;
pub use repo::statement::{StatementKind, StatementRegistry, IDS_PLACEHOLDER};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
