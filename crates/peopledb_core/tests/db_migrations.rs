use peopledb_core::db::migrations::{latest_version, schema_version};
use peopledb_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert_table_exists(&conn, "PEOPLE");
    assert_table_exists(&conn, "ADDRESSES");
}

#[test]
fn connections_enforce_foreign_keys() {
    let conn = open_db_in_memory().unwrap();

    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let err = conn
        .execute(
            "INSERT INTO PEOPLE (FIRST_NAME, LAST_NAME, DOB, HOME_ADDRESS)
             VALUES ('Ghost', 'Address', '2000-01-01T00:00:00Z', 999)",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"));
}

#[test]
fn reopening_a_file_database_keeps_schema_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.db");

    let conn = open_db(&path).unwrap();
    conn.execute(
        "INSERT INTO PEOPLE (FIRST_NAME, LAST_NAME, DOB) VALUES ('John', 'Smith', '1980-11-15T21:15:00Z')",
        [],
    )
    .unwrap();
    drop(conn);

    let reopened = open_db(&path).unwrap();
    assert_eq!(schema_version(&reopened).unwrap(), latest_version());
    let count: i64 = reopened
        .query_row("SELECT COUNT(*) FROM PEOPLE", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failing_schema_step_is_named_and_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE PEOPLE (ID INTEGER PRIMARY KEY, NAME TEXT);")
        .unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    assert!(matches!(err, DbError::MigrationFailed { version: 1, .. }));
    assert!(std::error::Error::source(&err).is_some());

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn).unwrap(), 0);
    let addresses: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'ADDRESSES'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(addresses, 0);
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
