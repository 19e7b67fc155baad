//! Address repository.
//!
//! # Responsibility
//! - Insert addresses on behalf of the person cascade.
//! - Decode address blocks, both standalone and inside joined person rows.
//!
//! # Invariants
//! - Region text is matched case-insensitively; unknown text is an
//!   `UnknownRegion` error, never a default.
//! - A block whose `ID` is NULL decodes to "no address".

use crate::model::address::Address;
use crate::model::region::Region;
use crate::repo::crud::{CrudRepository, RepoError, RepoResult};
use crate::repo::row::Block;
use crate::repo::statement::{StatementKind, StatementRegistry};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::borrow::Cow;

const SAVE_ADDRESS_SQL: &str = "INSERT INTO ADDRESSES
    (STREET_ADDRESS, ADDRESS2, CITY, STATE, POSTCODE, COUNTY, REGION, COUNTRY)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

const FIND_ADDRESS_BY_ID_SQL: &str = "SELECT
    ID, STREET_ADDRESS, ADDRESS2, CITY, STATE, POSTCODE, COUNTRY, COUNTY, REGION
FROM ADDRESSES
WHERE ID = ?1";

/// SQLite-backed address repository.
pub struct AddressRepository<'conn> {
    conn: &'conn Connection,
    statements: StatementRegistry,
}

impl<'conn> AddressRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        let statements = StatementRegistry::new("address")
            .declare(StatementKind::Save, SAVE_ADDRESS_SQL)
            .declare(StatementKind::FindById, FIND_ADDRESS_BY_ID_SQL);
        Self { conn, statements }
    }
}

impl CrudRepository for AddressRepository<'_> {
    type Entity = Address;

    fn connection(&self) -> &Connection {
        self.conn
    }

    fn statements(&self) -> &StatementRegistry {
        &self.statements
    }

    fn default_sql(&self, kind: StatementKind) -> Option<Cow<'static, str>> {
        let sql = match kind {
            StatementKind::FindAll => {
                "SELECT ID, STREET_ADDRESS, ADDRESS2, CITY, STATE, POSTCODE, COUNTRY, COUNTY, REGION
                 FROM ADDRESSES ORDER BY ID LIMIT 100"
            }
            StatementKind::Count => "SELECT COUNT(*) AS COUNT FROM ADDRESSES",
            StatementKind::DeleteOne => "DELETE FROM ADDRESSES WHERE ID = ?1",
            StatementKind::DeleteMany => "DELETE FROM ADDRESSES WHERE ID IN (:ids)",
            StatementKind::Save | StatementKind::FindById | StatementKind::Update => return None,
        };
        Some(Cow::Borrowed(sql))
    }

    fn bind_for_save(&self, entity: &mut Address) -> RepoResult<Vec<Value>> {
        Ok(vec![
            Value::from(entity.street_address().to_string()),
            Value::from(entity.address2().map(str::to_string)),
            Value::from(entity.city().to_string()),
            Value::from(entity.state().to_string()),
            Value::from(entity.postcode().to_string()),
            Value::from(entity.county().to_string()),
            Value::from(entity.region().as_str().to_string()),
            Value::from(entity.country().to_string()),
        ])
    }

    fn extract_from_row(&self, row: &Row<'_>) -> RepoResult<Address> {
        decode_address(row, Block::BARE)?.ok_or_else(|| {
            RepoError::InvalidData("address row without ID in ADDRESSES.ID".to_string())
        })
    }
}

/// Decodes the address block `block` of `row`.
pub(crate) fn decode_address(row: &Row<'_>, block: Block) -> RepoResult<Option<Address>> {
    let Some(id) = block.get_opt::<i64>(row, "ID")? else {
        return Ok(None);
    };

    let region_text: String = block.get(row, "REGION")?;
    let region: Region = region_text.parse()?;

    let address = Address::new(
        block.get::<String>(row, "STREET_ADDRESS")?,
        block.get::<Option<String>>(row, "ADDRESS2")?,
        block.get::<String>(row, "CITY")?,
        block.get::<String>(row, "STATE")?,
        block.get::<String>(row, "POSTCODE")?,
        block.get::<String>(row, "COUNTRY")?,
        block.get::<String>(row, "COUNTY")?,
        region,
    );
    Ok(Some(Address::persisted(id, address)))
}

#[cfg(test)]
mod tests {
    use super::AddressRepository;
    use crate::db::open_db_in_memory;
    use crate::model::address::Address;
    use crate::model::region::Region;
    use crate::repo::crud::{CrudRepository, RepoError};

    fn beale_street() -> Address {
        Address::new(
            "123 Beale St.",
            Some("Apt. 1A".to_string()),
            "Wala Wala",
            "WA",
            "90210",
            "United States",
            "Fulton County",
            Region::West,
        )
    }

    #[test]
    fn save_and_find_by_id_roundtrip() {
        let conn = open_db_in_memory().unwrap();
        let repo = AddressRepository::new(&conn);

        let mut address = beale_street();
        let id = repo.save(&mut address).unwrap();
        assert!(id > 0);
        assert_eq!(address.id(), Some(id));

        let loaded = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(loaded, address);
        assert_eq!(loaded.region(), Region::West);
    }

    #[test]
    fn region_text_is_read_case_insensitively() {
        let conn = open_db_in_memory().unwrap();
        conn.execute(
            "INSERT INTO ADDRESSES
                (STREET_ADDRESS, CITY, STATE, POSTCODE, COUNTY, REGION, COUNTRY)
             VALUES ('1 Main St.', 'Boston', 'MA', '02101', 'Suffolk', 'east', 'United States')",
            [],
        )
        .unwrap();
        let repo = AddressRepository::new(&conn);

        let loaded = repo.find_by_id(conn.last_insert_rowid()).unwrap().unwrap();
        assert_eq!(loaded.region(), Region::East);
        assert_eq!(loaded.address2(), None);
    }

    #[test]
    fn unknown_region_is_a_decode_error() {
        let conn = open_db_in_memory().unwrap();
        conn.execute(
            "INSERT INTO ADDRESSES
                (STREET_ADDRESS, CITY, STATE, POSTCODE, COUNTY, REGION, COUNTRY)
             VALUES ('1 Main St.', 'Boston', 'MA', '02101', 'Suffolk', 'midwest', 'United States')",
            [],
        )
        .unwrap();
        let repo = AddressRepository::new(&conn);

        let err = repo.find_by_id(conn.last_insert_rowid()).unwrap_err();
        assert!(matches!(err, RepoError::UnknownRegion(ref region) if region.0 == "midwest"));
    }

    #[test]
    fn fallback_statements_cover_listing_counting_and_deleting() {
        let conn = open_db_in_memory().unwrap();
        let repo = AddressRepository::new(&conn);

        let mut first = beale_street();
        let mut second = beale_street();
        let mut third = beale_street();
        repo.save(&mut first).unwrap();
        repo.save(&mut second).unwrap();
        repo.save(&mut third).unwrap();
        assert_eq!(repo.count().unwrap(), 3);
        assert_eq!(repo.find_all().unwrap().len(), 3);

        assert_eq!(repo.delete(&first).unwrap(), 1);
        assert_eq!(repo.delete_many(&[second, third]).unwrap(), 2);
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn update_is_not_defined_for_addresses() {
        let conn = open_db_in_memory().unwrap();
        let repo = AddressRepository::new(&conn);

        let mut address = beale_street();
        repo.save(&mut address).unwrap();

        let err = repo.update(&address).unwrap_err();
        assert_eq!(err.to_string(), "no UPDATE statement defined for address");
    }
}
