//! Schema steps for the people store and the runner that applies them.
//!
//! # Responsibility
//! - List every schema step with a version and a short name.
//! - Bring a connection from its recorded `user_version` up to the newest
//!   step, reporting which step failed.
//!
//! # Invariants
//! - Step versions start at 1 and increase by exactly one.
//! - All pending steps commit together or not at all; `user_version`
//!   always names the last committed step.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::{Connection, Transaction};

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "people_and_addresses",
    sql: include_str!("0001_init.sql"),
}];

const LATEST_SCHEMA_VERSION: u32 = SCHEMA_STEPS[SCHEMA_STEPS.len() - 1].version;

/// Newest schema version this binary can write.
pub fn latest_version() -> u32 {
    LATEST_SCHEMA_VERSION
}

/// Reads the schema version recorded in `PRAGMA user_version`.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Applies every step newer than the recorded schema version.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file is newer than this binary.
/// - `MigrationFailed` naming the first step whose SQL did not apply;
///   nothing from this run is kept in that case.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let recorded = schema_version(conn)?;
    if recorded > LATEST_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: recorded,
            latest_supported: LATEST_SCHEMA_VERSION,
        });
    }

    let pending = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > recorded)
        .collect::<Vec<_>>();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending {
        apply_step(&tx, step)?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={recorded} to_version={LATEST_SCHEMA_VERSION}"
    );
    Ok(())
}

fn apply_step(tx: &Transaction<'_>, step: &SchemaStep) -> DbResult<()> {
    tx.execute_batch(step.sql)
        .and_then(|()| tx.pragma_update(None, "user_version", step.version))
        .map_err(|source| DbError::MigrationFailed {
            version: step.version,
            name: step.name,
            source,
        })?;
    debug!(
        "event=db_migrate module=db status=step version={} name={}",
        step.version, step.name
    );
    Ok(())
}
