//! Person aggregate: scalar fields plus owned and referential relations.
//!
//! # Responsibility
//! - Own the strictly-owned edges (home/business address, children) by
//!   value.
//! - Hold non-owning edges (spouse that is already stored, parent
//!   back-reference) as identities.
//!
//! # Invariants
//! - `parent` is only ever set by `add_child`, and always names the person
//!   that adopted the child.
//! - When a person receives its identity, every child's back-reference is
//!   re-pointed at that identity.
//! - Equality ignores identity: two persons are equal when names match and
//!   the birth instants match after normalizing to UTC.

use crate::model::address::Address;
use crate::model::identity::{Entity, EntityId, IdentityGrant};
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Relation to a spouse.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpouseLink {
    /// Spouse saved by cascade before the owning person row is written.
    Pending(Box<Person>),
    /// Spouse that already exists in the store; bound by id, never re-saved.
    Existing(EntityId),
}

impl SpouseLink {
    /// Identity of the spouse, if it has one yet.
    pub fn id(&self) -> Option<EntityId> {
        match self {
            Self::Pending(person) => person.identity(),
            Self::Existing(id) => Some(*id),
        }
    }
}

/// Back-reference from a child to the person whose child set holds it.
///
/// `id` is `None` while the parent itself is unsaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
    id: Option<EntityId>,
}

impl ParentLink {
    pub fn id(&self) -> Option<EntityId> {
        self.id
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Person {
    id: Option<EntityId>,
    first_name: String,
    last_name: String,
    dob: DateTime<FixedOffset>,
    salary: Decimal,
    email: Option<String>,
    home_address: Option<Address>,
    business_address: Option<Address>,
    spouse: Option<SpouseLink>,
    children: Vec<Person>,
    #[serde(skip)]
    parent: Option<ParentLink>,
}

impl Person {
    /// Creates an unsaved person with zero salary and no relations.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        dob: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            dob,
            salary: Decimal::ZERO,
            email: None,
            home_address: None,
            business_address: None,
            spouse: None,
            children: Vec::new(),
            parent: None,
        }
    }

    /// Rebuilds a stored person's scalar state decoded from a row.
    pub(crate) fn persisted(
        id: EntityId,
        first_name: String,
        last_name: String,
        dob: DateTime<FixedOffset>,
        salary: Decimal,
        email: Option<String>,
    ) -> Self {
        Self {
            id: Some(id),
            salary,
            email,
            ..Self::new(first_name, last_name, dob)
        }
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn set_first_name(&mut self, first_name: impl Into<String>) {
        self.first_name = first_name.into();
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn set_last_name(&mut self, last_name: impl Into<String>) {
        self.last_name = last_name.into();
    }

    pub fn dob(&self) -> DateTime<FixedOffset> {
        self.dob
    }

    pub fn set_dob(&mut self, dob: DateTime<FixedOffset>) {
        self.dob = dob;
    }

    pub fn salary(&self) -> Decimal {
        self.salary
    }

    pub fn set_salary(&mut self, salary: Decimal) {
        self.salary = salary;
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn set_email(&mut self, email: Option<String>) {
        self.email = email;
    }

    pub fn home_address(&self) -> Option<&Address> {
        self.home_address.as_ref()
    }

    pub fn set_home_address(&mut self, address: Option<Address>) {
        self.home_address = address;
    }

    pub fn business_address(&self) -> Option<&Address> {
        self.business_address.as_ref()
    }

    pub fn set_business_address(&mut self, address: Option<Address>) {
        self.business_address = address;
    }

    pub(crate) fn addresses_mut(&mut self) -> (Option<&mut Address>, Option<&mut Address>) {
        (self.home_address.as_mut(), self.business_address.as_mut())
    }

    pub fn spouse(&self) -> Option<&SpouseLink> {
        self.spouse.as_ref()
    }

    /// Links a not-yet-stored spouse; saving this person saves the spouse
    /// first.
    pub fn set_spouse(&mut self, spouse: Person) {
        self.spouse = Some(SpouseLink::Pending(Box::new(spouse)));
    }

    /// Links a spouse that already has a store identity.
    pub fn link_spouse(&mut self, spouse_id: EntityId) {
        self.spouse = Some(SpouseLink::Existing(spouse_id));
    }

    pub fn clear_spouse(&mut self) {
        self.spouse = None;
    }

    pub(crate) fn spouse_mut(&mut self) -> Option<&mut SpouseLink> {
        self.spouse.as_mut()
    }

    pub fn children(&self) -> &[Person] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut [Person] {
        &mut self.children
    }

    pub(crate) fn into_children(self) -> Vec<Person> {
        self.children
    }

    /// Adds `child` to this person's child set and points its parent
    /// back-reference here.
    ///
    /// Returns `false` when an equal child is already present. The set is
    /// left unchanged and the rejected `child` is dropped, so no
    /// back-reference is recorded for it; the child already in the set
    /// keeps pointing here.
    pub fn add_child(&mut self, mut child: Person) -> bool {
        if self.children.contains(&child) {
            return false;
        }
        child.parent = Some(ParentLink { id: self.id });
        self.children.push(child);
        true
    }

    pub fn parent(&self) -> Option<ParentLink> {
        self.parent
    }

    /// Identity of the parent, when both a parent exists and it is stored.
    pub fn parent_id(&self) -> Option<EntityId> {
        self.parent.and_then(|link| link.id)
    }

    pub(crate) fn set_parent_id(&mut self, parent_id: EntityId) {
        self.parent = Some(ParentLink {
            id: Some(parent_id),
        });
    }

    fn dob_utc(&self) -> DateTime<Utc> {
        self.dob.with_timezone(&Utc)
    }
}

impl PartialEq for Person {
    fn eq(&self, other: &Self) -> bool {
        self.first_name == other.first_name
            && self.last_name == other.last_name
            && self.dob_utc() == other.dob_utc()
    }
}

impl Eq for Person {}

impl Hash for Person {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.first_name.hash(state);
        self.last_name.hash(state);
        self.dob_utc().hash(state);
    }
}

impl Display for Person {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "Person#{id}")?,
            None => f.write_str("Person#unsaved")?,
        }
        write!(
            f,
            "({} {}, dob={})",
            self.first_name,
            self.last_name,
            self.dob.to_rfc3339()
        )
    }
}

impl Entity for Person {
    const ENTITY_NAME: &'static str = "person";

    fn identity(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_identity(&mut self, id: EntityId, _grant: IdentityGrant) {
        if self.id.is_some() {
            return;
        }
        self.id = Some(id);
        for child in &mut self.children {
            child.set_parent_id(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Person, SpouseLink};
    use crate::model::identity::{Entity, IdentityGrant};
    use chrono::{DateTime, FixedOffset, TimeZone};
    use std::collections::HashSet;

    fn at(offset_hours: i32, hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(offset_hours * 3600)
            .unwrap()
            .with_ymd_and_hms(1980, 11, 15, hour, 15, 0)
            .unwrap()
    }

    #[test]
    fn equality_normalizes_birth_instant_across_offsets() {
        let chicago = Person::new("John", "Smith", at(-6, 15));
        let utc = Person::new("John", "Smith", at(0, 21));
        assert_eq!(chicago, utc);

        let mut set = HashSet::new();
        set.insert(chicago);
        assert!(set.contains(&utc));
    }

    #[test]
    fn equality_ignores_identity_and_salary() {
        let mut saved = Person::new("John", "Smith", at(-6, 15));
        saved.assign_identity(7, IdentityGrant::new());
        saved.set_salary("10.5".parse().unwrap());
        assert_eq!(saved, Person::new("John", "Smith", at(-6, 15)));
        assert_ne!(saved, Person::new("Johnny", "Smith", at(-6, 15)));
    }

    #[test]
    fn add_child_sets_back_reference_and_keeps_set_semantics() {
        let mut parent = Person::new("John", "Smith", at(-6, 15));
        assert!(parent.add_child(Person::new("Jimmy", "Smith", at(-6, 1))));
        assert!(!parent.add_child(Person::new("Jimmy", "Smith", at(-6, 1))));
        assert_eq!(parent.children().len(), 1);

        let link = parent.children()[0].parent().expect("child should have a parent");
        assert_eq!(link.id(), None);
    }

    #[test]
    fn assigning_identity_repoints_children() {
        let mut parent = Person::new("John", "Smith", at(-6, 15));
        parent.add_child(Person::new("Jimmy", "Smith", at(-6, 1)));
        parent.add_child(Person::new("Jenny", "Smith", at(-6, 2)));

        parent.assign_identity(42, IdentityGrant::new());

        assert!(parent
            .children()
            .iter()
            .all(|child| child.parent_id() == Some(42)));
        assert_eq!(parent.parent_id(), None);
    }

    #[test]
    fn duplicate_child_leaves_existing_back_reference_in_place() {
        let mut parent = Person::new("John", "Smith", at(-6, 15));
        parent.assign_identity(42, IdentityGrant::new());
        parent.add_child(Person::new("Jimmy", "Smith", at(-6, 1)));

        let mut duplicate = Person::new("Jimmy", "Smith", at(-6, 1));
        duplicate.assign_identity(7, IdentityGrant::new());
        assert!(!parent.add_child(duplicate));

        assert_eq!(parent.children().len(), 1);
        assert_eq!(parent.children()[0].parent_id(), Some(42));
        assert_eq!(parent.children()[0].id(), None);
    }

    #[test]
    fn identity_is_never_overwritten() {
        let mut person = Person::new("John", "Smith", at(-6, 15));
        person.add_child(Person::new("Jimmy", "Smith", at(-6, 1)));
        person.assign_identity(3, IdentityGrant::new());
        person.assign_identity(9, IdentityGrant::new());

        assert_eq!(person.id(), Some(3));
        assert_eq!(person.children()[0].parent_id(), Some(3));
    }

    #[test]
    fn spouse_link_reports_identity() {
        let mut john = Person::new("John", "Smith", at(-6, 15));
        john.set_spouse(Person::new("June", "Smith", at(-6, 10)));
        assert_eq!(john.spouse().and_then(SpouseLink::id), None);

        john.link_spouse(9);
        assert_eq!(john.spouse().and_then(SpouseLink::id), Some(9));
    }
}
