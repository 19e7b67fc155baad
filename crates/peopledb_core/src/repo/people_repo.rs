//! People repository: person rows plus their relation graph.
//!
//! # Responsibility
//! - Cascade a person's owned relations into the store around its own
//!   insert.
//! - Fold the joined parent/child/address rows of one lookup back into a
//!   single person tree.
//!
//! # Invariants
//! - Addresses and a pending spouse are stored before the person row, so
//!   the insert can carry their foreign keys.
//! - Children are stored after the person row, once their parent
//!   back-reference carries the new identity. A child that is already
//!   stored is re-pointed at the new parent, never inserted again.
//! - Relations that already have an identity are bound by that identity.
//! - A NULL child block contributes no child.
//!
//! # Known limitation
//! - Spouse links are followed without cycle detection. Boxed ownership
//!   keeps unsaved spouse chains acyclic, but two stored people cannot be
//!   linked to each other through `save` alone.

use crate::model::address::Address;
use crate::model::identity::EntityId;
use crate::model::person::{Person, SpouseLink};
use crate::repo::address_repo::{decode_address, AddressRepository};
use crate::repo::crud::{require_identity, CrudRepository, RepoError, RepoResult};
use crate::repo::row::Block;
use crate::repo::statement::{StatementKind, StatementRegistry};
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use rust_decimal::Decimal;
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

const PARENT: Block = Block("PARENT_");
const CHILD: Block = Block("CHILD_");
const HOME: Block = Block("HOME_");
const BUSINESS: Block = Block("BUSINESS_");

const SAVE_PERSON_SQL: &str = "INSERT INTO PEOPLE
    (FIRST_NAME, LAST_NAME, DOB, SALARY, EMAIL, HOME_ADDRESS, BUSINESS_ADDRESS, SPOUSE, PARENT)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

const FIND_PERSON_BY_ID_SQL: &str = "SELECT
    PARENT.ID AS PARENT_ID, PARENT.FIRST_NAME AS PARENT_FIRST_NAME,
    PARENT.LAST_NAME AS PARENT_LAST_NAME, PARENT.DOB AS PARENT_DOB,
    PARENT.SALARY AS PARENT_SALARY, PARENT.EMAIL AS PARENT_EMAIL,
    PARENT.SPOUSE AS PARENT_SPOUSE, PARENT.PARENT AS PARENT_PARENT,
    CHILD.ID AS CHILD_ID, CHILD.FIRST_NAME AS CHILD_FIRST_NAME,
    CHILD.LAST_NAME AS CHILD_LAST_NAME, CHILD.DOB AS CHILD_DOB,
    CHILD.SALARY AS CHILD_SALARY, CHILD.EMAIL AS CHILD_EMAIL,
    CHILD.SPOUSE AS CHILD_SPOUSE, CHILD.PARENT AS CHILD_PARENT,
    HOME.ID AS HOME_ID, HOME.STREET_ADDRESS AS HOME_STREET_ADDRESS,
    HOME.ADDRESS2 AS HOME_ADDRESS2, HOME.CITY AS HOME_CITY, HOME.STATE AS HOME_STATE,
    HOME.POSTCODE AS HOME_POSTCODE, HOME.COUNTRY AS HOME_COUNTRY,
    HOME.COUNTY AS HOME_COUNTY, HOME.REGION AS HOME_REGION,
    BUSINESS.ID AS BUSINESS_ID, BUSINESS.STREET_ADDRESS AS BUSINESS_STREET_ADDRESS,
    BUSINESS.ADDRESS2 AS BUSINESS_ADDRESS2, BUSINESS.CITY AS BUSINESS_CITY,
    BUSINESS.STATE AS BUSINESS_STATE, BUSINESS.POSTCODE AS BUSINESS_POSTCODE,
    BUSINESS.COUNTRY AS BUSINESS_COUNTRY, BUSINESS.COUNTY AS BUSINESS_COUNTY,
    BUSINESS.REGION AS BUSINESS_REGION
FROM PEOPLE AS PARENT
LEFT OUTER JOIN PEOPLE AS CHILD ON PARENT.ID = CHILD.PARENT
LEFT OUTER JOIN ADDRESSES AS HOME ON PARENT.HOME_ADDRESS = HOME.ID
LEFT OUTER JOIN ADDRESSES AS BUSINESS ON PARENT.BUSINESS_ADDRESS = BUSINESS.ID
WHERE PARENT.ID = ?1
ORDER BY CHILD.ID";

// Listing skips the joins to bound result size.
const FIND_ALL_PEOPLE_SQL: &str = "SELECT
    ID AS PARENT_ID, FIRST_NAME AS PARENT_FIRST_NAME, LAST_NAME AS PARENT_LAST_NAME,
    DOB AS PARENT_DOB, SALARY AS PARENT_SALARY, EMAIL AS PARENT_EMAIL
FROM PEOPLE
ORDER BY ID
LIMIT 100";

const COUNT_PEOPLE_SQL: &str = "SELECT COUNT(*) AS COUNT FROM PEOPLE";
const DELETE_PERSON_SQL: &str = "DELETE FROM PEOPLE WHERE ID = ?1";
const DELETE_PEOPLE_SQL: &str = "DELETE FROM PEOPLE WHERE ID IN (:ids)";
const UPDATE_PERSON_SQL: &str =
    "UPDATE PEOPLE SET FIRST_NAME = ?1, LAST_NAME = ?2, DOB = ?3, SALARY = ?4 WHERE ID = ?5";
const ADOPT_CHILD_SQL: &str = "UPDATE PEOPLE SET PARENT = ?1 WHERE ID = ?2";

/// SQLite-backed person repository with address/spouse/child cascades.
pub struct PeopleRepository<'conn> {
    conn: &'conn Connection,
    statements: StatementRegistry,
    addresses: AddressRepository<'conn>,
}

impl<'conn> PeopleRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        let statements = StatementRegistry::new("person")
            .declare(StatementKind::Save, SAVE_PERSON_SQL)
            .declare_bundle(&[
                (StatementKind::FindById, FIND_PERSON_BY_ID_SQL),
                (StatementKind::FindAll, FIND_ALL_PEOPLE_SQL),
                (StatementKind::Count, COUNT_PEOPLE_SQL),
                (StatementKind::DeleteOne, DELETE_PERSON_SQL),
                (StatementKind::DeleteMany, DELETE_PEOPLE_SQL),
            ])
            .declare(StatementKind::Update, UPDATE_PERSON_SQL);
        Self {
            conn,
            statements,
            addresses: AddressRepository::new(conn),
        }
    }

    fn save_address(&self, address: Option<&mut Address>) -> RepoResult<Option<EntityId>> {
        match address {
            Some(address) => match address.id() {
                Some(id) => Ok(Some(id)),
                None => self.addresses.save(address).map(Some),
            },
            None => Ok(None),
        }
    }

    fn save_spouse(&self, spouse: Option<&mut SpouseLink>) -> RepoResult<Option<EntityId>> {
        match spouse {
            Some(SpouseLink::Pending(spouse)) => match spouse.id() {
                Some(id) => Ok(Some(id)),
                None => self.save(spouse).map(Some),
            },
            Some(SpouseLink::Existing(id)) => Ok(Some(*id)),
            None => Ok(None),
        }
    }
}

impl CrudRepository for PeopleRepository<'_> {
    type Entity = Person;

    fn connection(&self) -> &Connection {
        self.conn
    }

    fn statements(&self) -> &StatementRegistry {
        &self.statements
    }

    fn bind_for_save(&self, entity: &mut Person) -> RepoResult<Vec<Value>> {
        let (home, business) = entity.addresses_mut();
        let home_id = self.save_address(home)?;
        let business_id = self.save_address(business)?;
        let spouse_id = self.save_spouse(entity.spouse_mut())?;

        Ok(vec![
            Value::from(entity.first_name().to_string()),
            Value::from(entity.last_name().to_string()),
            dob_to_db(entity.dob()),
            salary_to_db(entity.salary()),
            Value::from(entity.email().map(str::to_string)),
            Value::from(home_id),
            Value::from(business_id),
            Value::from(spouse_id),
            Value::from(entity.parent_id()),
        ])
    }

    fn bind_for_update(&self, entity: &Person) -> RepoResult<Vec<Value>> {
        Ok(vec![
            Value::from(entity.first_name().to_string()),
            Value::from(entity.last_name().to_string()),
            dob_to_db(entity.dob()),
            salary_to_db(entity.salary()),
        ])
    }

    fn extract_from_row(&self, row: &Row<'_>) -> RepoResult<Person> {
        let mut person = decode_person(row, PARENT, Links::Read)?.ok_or_else(|| {
            RepoError::InvalidData("person row without PARENT_ID".to_string())
        })?;
        person.set_home_address(decode_address(row, HOME)?);
        person.set_business_address(decode_address(row, BUSINESS)?);

        if let Some(child) = decode_person(row, CHILD, Links::Read)? {
            person.add_child(child);
        }
        Ok(person)
    }

    fn extract_listed_row(&self, row: &Row<'_>) -> RepoResult<Person> {
        decode_person(row, PARENT, Links::Skip)?
            .ok_or_else(|| RepoError::InvalidData("person row without PARENT_ID".to_string()))
    }

    /// Scalars and addresses come from the first row; every later row only
    /// contributes its child.
    fn merge_rows(&self, mut accumulated: Person, next: Person) -> Person {
        for child in next.into_children() {
            accumulated.add_child(child);
        }
        accumulated
    }

    fn after_save(&self, entity: &mut Person) -> RepoResult<()> {
        let parent_id = require_identity(&*entity)?;
        for child in entity.children_mut() {
            match child.id() {
                Some(child_id) => {
                    self.conn
                        .execute(ADOPT_CHILD_SQL, params![parent_id, child_id])?;
                }
                None => {
                    self.save(child)?;
                }
            }
        }
        Ok(())
    }
}

/// Whether a block's own `SPOUSE` / `PARENT` foreign keys are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Links {
    Read,
    Skip,
}

fn decode_person(row: &Row<'_>, block: Block, links: Links) -> RepoResult<Option<Person>> {
    let Some(id) = block.get_opt::<i64>(row, "ID")? else {
        return Ok(None);
    };

    let dob_text: String = block.get(row, "DOB")?;
    let dob = DateTime::parse_from_rfc3339(&dob_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid dob `{dob_text}` in PEOPLE.DOB: {err}"))
    })?;

    let salary_text: String = block.get(row, "SALARY")?;
    let salary = salary_text.parse::<Decimal>().map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid salary `{salary_text}` in PEOPLE.SALARY: {err}"
        ))
    })?;

    let mut person = Person::persisted(
        id,
        block.get(row, "FIRST_NAME")?,
        block.get(row, "LAST_NAME")?,
        dob,
        salary,
        block.get_opt(row, "EMAIL")?,
    );
    if links == Links::Skip {
        return Ok(Some(person));
    }
    if let Some(spouse_id) = block.get_opt::<i64>(row, "SPOUSE")? {
        person.link_spouse(spouse_id);
    }
    if let Some(parent_id) = block.get_opt::<i64>(row, "PARENT")? {
        person.set_parent_id(parent_id);
    }
    Ok(Some(person))
}

/// Birth instants are stored normalized to UTC.
fn dob_to_db(dob: DateTime<FixedOffset>) -> Value {
    Value::Text(
        dob.with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::AutoSi, true),
    )
}

fn salary_to_db(salary: Decimal) -> Value {
    Value::Text(salary.to_string())
}

#[cfg(test)]
mod tests {
    use super::{dob_to_db, PeopleRepository, FIND_PERSON_BY_ID_SQL, SAVE_PERSON_SQL};
    use crate::db::open_db_in_memory;
    use crate::model::person::Person;
    use crate::repo::crud::{CrudRepository, RepoError};
    use crate::repo::statement::{StatementKind, StatementRegistry};
    use chrono::{FixedOffset, TimeZone};
    use rusqlite::types::Value;

    #[test]
    fn dob_is_stored_as_utc_text() {
        let dob = FixedOffset::west_opt(6 * 3600)
            .unwrap()
            .with_ymd_and_hms(1980, 11, 15, 15, 15, 0)
            .unwrap();
        assert_eq!(
            dob_to_db(dob),
            Value::Text("1980-11-15T21:15:00Z".to_string())
        );
    }

    #[test]
    fn childless_person_decodes_without_spurious_child() {
        let conn = open_db_in_memory().unwrap();
        let repo = PeopleRepository::new(&conn);
        let dob = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
            .unwrap();

        let mut person = Person::new("test", "testtest", dob);
        let id = repo.save(&mut person).unwrap();

        let found = repo.find_by_id(id).unwrap().unwrap();
        assert!(found.children().is_empty());
        assert!(found.home_address().is_none());
        assert!(found.business_address().is_none());
        assert!(found.spouse().is_none());
    }

    #[test]
    fn misspelled_block_alias_is_a_decode_error() {
        let conn = open_db_in_memory().unwrap();
        let mut repo = PeopleRepository::new(&conn);
        let misspelled: &'static str = Box::leak(
            FIND_PERSON_BY_ID_SQL
                .replace("HOME.ID AS HOME_ID", "HOME.ID AS HOMEID")
                .into_boxed_str(),
        );
        repo.statements = StatementRegistry::new("person")
            .declare(StatementKind::Save, SAVE_PERSON_SQL)
            .declare(StatementKind::FindById, misspelled);
        let dob = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
            .unwrap();
        let id = repo.save(&mut Person::new("test", "testtest", dob)).unwrap();

        let err = repo.find_by_id(id).unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(ref message) if message.contains("HOME_ID")));
    }

    #[test]
    fn find_all_rows_carry_no_relations() {
        let conn = open_db_in_memory().unwrap();
        let repo = PeopleRepository::new(&conn);
        let dob = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
            .unwrap();

        let mut parent = Person::new("John", "Smith", dob);
        parent.add_child(Person::new("Jimmy", "Smith", dob));
        repo.save(&mut parent).unwrap();

        let listed = repo.find_all().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|person| person.children().is_empty()));
        assert!(listed.iter().all(|person| person.parent().is_none()));
    }
}
