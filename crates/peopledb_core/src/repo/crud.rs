//! Generic CRUD engine shared by every entity repository.
//!
//! # Responsibility
//! - Run the seven statement kinds against one entity type, resolving the
//!   SQL through the repository's `StatementRegistry`.
//! - Bind and extract entity fields through the concrete repository's
//!   hooks, and stamp generated identities back into saved entities.
//!
//! # Invariants
//! - Write failures from `save` always surface as `UnableToSave`.
//! - Store failures on every other operation are logged and degrade to an
//!   empty/zero result; configuration and data errors still surface.
//! - Update/delete paths require an identity before touching the store.
//! - Identities are only assigned by an insert; `save` on a stored entity
//!   writes nothing and never re-stamps it.

use crate::db::DbError;
use crate::model::identity::{Entity, EntityId, IdentityGrant};
use crate::model::region::UnknownRegion;
use crate::repo::statement::{StatementKind, StatementRegistry, IDS_PLACEHOLDER};
use log::{debug, error};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::borrow::Cow;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error type for every repository operation.
#[derive(Debug)]
pub enum RepoError {
    /// Store-level failure (SQLite transport, constraint, syntax).
    Db(DbError),
    /// Neither a declared nor a default statement exists.
    StatementNotDefined {
        entity: &'static str,
        kind: StatementKind,
    },
    /// Resolved statement text cannot be used for its operation.
    InvalidStatement {
        entity: &'static str,
        kind: StatementKind,
        reason: String,
    },
    /// Operation needs an identity the entity does not have.
    NoIdentity { entity: &'static str },
    /// Insert, or one of the cascades it triggered, failed.
    UnableToSave {
        entity: String,
        source: Box<RepoError>,
    },
    UnknownRegion(UnknownRegion),
    InvalidData(String),
}

impl RepoError {
    /// Whether the failure came from the store rather than from
    /// configuration or decoded data.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Db(_) | Self::UnableToSave { .. })
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::StatementNotDefined { entity, kind } => {
                write!(f, "no {kind} statement defined for {entity}")
            }
            Self::InvalidStatement {
                entity,
                kind,
                reason,
            } => write!(f, "invalid {kind} statement for {entity}: {reason}"),
            Self::NoIdentity { entity } => write!(f, "{entity} has no identity"),
            Self::UnableToSave { entity, .. } => write!(f, "tried to save entity: {entity}"),
            Self::UnknownRegion(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::UnableToSave { source, .. } => Some(source.as_ref()),
            Self::UnknownRegion(err) => Some(err),
            Self::StatementNotDefined { .. }
            | Self::InvalidStatement { .. }
            | Self::NoIdentity { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<UnknownRegion> for RepoError {
    fn from(value: UnknownRegion) -> Self {
        Self::UnknownRegion(value)
    }
}

/// Reads the identity an update/delete needs.
///
/// # Errors
/// - `NoIdentity` when the entity was never saved.
pub fn require_identity<E: Entity>(entity: &E) -> RepoResult<EntityId> {
    entity.identity().ok_or(RepoError::NoIdentity {
        entity: E::ENTITY_NAME,
    })
}

/// CRUD engine over one entity type.
///
/// Implementors supply the connection, the declared statements, and the
/// `bind_for_save` and `extract_from_row` hooks; every operation is
/// provided.
pub trait CrudRepository {
    type Entity: Entity;

    fn connection(&self) -> &Connection;

    fn statements(&self) -> &StatementRegistry;

    /// Programmatic SQL used when no statement is declared for `kind`.
    fn default_sql(&self, _kind: StatementKind) -> Option<Cow<'static, str>> {
        None
    }

    /// Returns the positional parameters of the SAVE statement.
    ///
    /// Runs before the entity has an identity; owned relations that the
    /// row references must be persisted here.
    fn bind_for_save(&self, entity: &mut Self::Entity) -> RepoResult<Vec<Value>>;

    /// Returns the positional parameters of the UPDATE statement, without
    /// the trailing identity.
    fn bind_for_update(&self, _entity: &Self::Entity) -> RepoResult<Vec<Value>> {
        Ok(Vec::new())
    }

    fn extract_from_row(&self, row: &Row<'_>) -> RepoResult<Self::Entity>;

    /// Decodes one FIND_ALL row. Listing statements may select fewer
    /// columns than FIND_BY_ID; by default both share `extract_from_row`.
    fn extract_listed_row(&self, row: &Row<'_>) -> RepoResult<Self::Entity> {
        self.extract_from_row(row)
    }

    /// Folds the entity decoded from a later row of the same FIND_BY_ID
    /// result into the accumulated one. By default the later row wins.
    fn merge_rows(&self, _accumulated: Self::Entity, next: Self::Entity) -> Self::Entity {
        next
    }

    /// Cascade hook, called once the entity's own row and identity exist.
    fn after_save(&self, _entity: &mut Self::Entity) -> RepoResult<()> {
        Ok(())
    }

    fn resolve_sql(&self, kind: StatementKind) -> RepoResult<Cow<'static, str>> {
        self.statements().resolve(kind, || self.default_sql(kind))
    }

    /// Inserts `entity`, stamps its generated identity and runs
    /// `after_save`.
    ///
    /// An entity that already has an identity is stored; its identity is
    /// returned unchanged and nothing is written. Use `update` to change
    /// its row.
    ///
    /// # Errors
    /// - `UnableToSave` wrapping the store failure of the insert or of any
    ///   cascade step.
    /// - `StatementNotDefined` / `NoIdentity` unchanged.
    fn save(&self, entity: &mut Self::Entity) -> RepoResult<EntityId> {
        if let Some(id) = entity.identity() {
            debug!(
                "event=repo_save module=repo status=skipped entity={} id={} reason=already_stored",
                <Self::Entity as Entity>::ENTITY_NAME,
                id
            );
            return Ok(id);
        }

        let sql = self.resolve_sql(StatementKind::Save)?;
        let started_at = Instant::now();

        match insert_and_cascade(self, &sql, entity) {
            Ok(id) => {
                debug!(
                    "event=repo_save module=repo status=ok entity={} id={} duration_ms={}",
                    <Self::Entity as Entity>::ENTITY_NAME,
                    id,
                    started_at.elapsed().as_millis()
                );
                Ok(id)
            }
            Err(err) if err.is_store_failure() => {
                error!(
                    "event=repo_save module=repo status=error entity={} duration_ms={} error={}",
                    <Self::Entity as Entity>::ENTITY_NAME,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(RepoError::UnableToSave {
                    entity: entity.to_string(),
                    source: Box::new(err),
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Loads at most one logical entity; zero rows yields `None`.
    fn find_by_id(&self, id: EntityId) -> RepoResult<Option<Self::Entity>> {
        let sql = self.resolve_sql(StatementKind::FindById)?;
        let found = (|| -> RepoResult<Option<Self::Entity>> {
            let mut stmt = self.connection().prepare(&sql)?;
            let rows = stmt.query([id])?;
            let entity = rows.and_then(|row| self.extract_from_row(row)).try_fold(
                None,
                |accumulated, next: RepoResult<Self::Entity>| -> RepoResult<Option<Self::Entity>> {
                    let next = next?;
                    Ok(Some(match accumulated {
                        Some(accumulated) => self.merge_rows(accumulated, next),
                        None => next,
                    }))
                },
            )?;
            Ok(entity)
        })();
        degrade::<Self::Entity, _>(StatementKind::FindById, found, None)
    }

    /// Loads every row of the FIND_ALL statement in result order.
    fn find_all(&self) -> RepoResult<Vec<Self::Entity>> {
        let sql = self.resolve_sql(StatementKind::FindAll)?;
        let found = (|| -> RepoResult<Vec<Self::Entity>> {
            let mut stmt = self.connection().prepare(&sql)?;
            let rows = stmt.query([])?;
            let entities = rows
                .and_then(|row| self.extract_listed_row(row))
                .collect::<RepoResult<Vec<_>>>()?;
            Ok(entities)
        })();
        degrade::<Self::Entity, _>(StatementKind::FindAll, found, Vec::new())
    }

    /// Returns the single aggregate of the COUNT statement; no rows is 0.
    fn count(&self) -> RepoResult<i64> {
        let sql = self.resolve_sql(StatementKind::Count)?;
        let counted = (|| -> RepoResult<i64> {
            let mut stmt = self.connection().prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let count = match rows.next()? {
                Some(row) => row.get::<_, i64>(0)?,
                None => 0,
            };
            Ok(count)
        })();
        degrade::<Self::Entity, _>(StatementKind::Count, counted, 0)
    }

    /// Deletes one entity by identity and reports the affected rows.
    fn delete(&self, entity: &Self::Entity) -> RepoResult<usize> {
        let sql = self.resolve_sql(StatementKind::DeleteOne)?;
        let id = require_identity(entity)?;
        let deleted = self
            .connection()
            .execute(&sql, [id])
            .map_err(RepoError::from);
        degrade::<Self::Entity, _>(StatementKind::DeleteOne, deleted, 0)
    }

    /// Deletes several entities with one statement.
    ///
    /// Identities are inlined as a decimal list in place of `:ids`; the
    /// statement is not parameterized.
    fn delete_many(&self, entities: &[Self::Entity]) -> RepoResult<usize> {
        let sql = self.resolve_sql(StatementKind::DeleteMany)?;
        if !sql.contains(IDS_PLACEHOLDER) {
            return Err(RepoError::InvalidStatement {
                entity: <Self::Entity as Entity>::ENTITY_NAME,
                kind: StatementKind::DeleteMany,
                reason: format!("missing `{IDS_PLACEHOLDER}` token"),
            });
        }

        let ids = entities
            .iter()
            .map(|entity| require_identity(entity).map(|id| id.to_string()))
            .collect::<RepoResult<Vec<_>>>()?;
        if ids.is_empty() {
            return Ok(0);
        }

        let sql = sql.replace(IDS_PLACEHOLDER, &ids.join(","));
        let deleted = self.connection().execute(&sql, []).map_err(RepoError::from);
        degrade::<Self::Entity, _>(StatementKind::DeleteMany, deleted, 0)
    }

    /// Updates the fields `bind_for_update` selects; the identity is bound
    /// last.
    fn update(&self, entity: &Self::Entity) -> RepoResult<usize> {
        let sql = self.resolve_sql(StatementKind::Update)?;
        let id = require_identity(entity)?;
        let mut params = self.bind_for_update(entity)?;
        params.push(Value::Integer(id));

        let updated = self
            .connection()
            .execute(&sql, params_from_iter(params))
            .map_err(RepoError::from);
        degrade::<Self::Entity, _>(StatementKind::Update, updated, 0)
    }
}

fn insert_and_cascade<R>(repo: &R, sql: &str, entity: &mut R::Entity) -> RepoResult<EntityId>
where
    R: CrudRepository + ?Sized,
{
    let params = repo.bind_for_save(entity)?;
    let conn = repo.connection();
    conn.execute(sql, params_from_iter(params))?;

    let id = conn.last_insert_rowid();
    entity.assign_identity(id, IdentityGrant::new());
    repo.after_save(entity)?;
    Ok(id)
}

/// Turns a store failure into `fallback`, logging it.
fn degrade<E: Entity, T>(kind: StatementKind, result: RepoResult<T>, fallback: T) -> RepoResult<T> {
    match result {
        Err(RepoError::Db(err)) => {
            let event = match kind {
                StatementKind::FindById | StatementKind::FindAll | StatementKind::Count => {
                    "repo_read"
                }
                _ => "repo_write",
            };
            error!(
                "event={event} module=repo status=degraded entity={} statement={kind} error={err}",
                E::ENTITY_NAME
            );
            Ok(fallback)
        }
        other => other,
    }
}
