//! Address value object.
//!
//! # Invariants
//! - Fields are fixed at construction; only the store-managed `id` changes,
//!   and only through the repository engine.

use crate::model::identity::{Entity, EntityId, IdentityGrant};
use crate::model::region::Region;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Postal address owned by a person (home or business).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(skip_deserializing)]
    id: Option<EntityId>,
    street_address: String,
    address2: Option<String>,
    city: String,
    state: String,
    postcode: String,
    country: String,
    county: String,
    region: Region,
}

impl Address {
    /// Creates an unsaved address.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        street_address: impl Into<String>,
        address2: Option<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        postcode: impl Into<String>,
        country: impl Into<String>,
        county: impl Into<String>,
        region: Region,
    ) -> Self {
        Self {
            id: None,
            street_address: street_address.into(),
            address2,
            city: city.into(),
            state: state.into(),
            postcode: postcode.into(),
            country: country.into(),
            county: county.into(),
            region,
        }
    }

    /// Rebuilds a stored address decoded from a row.
    pub(crate) fn persisted(id: EntityId, unsaved: Address) -> Self {
        Self {
            id: Some(id),
            ..unsaved
        }
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    pub fn street_address(&self) -> &str {
        &self.street_address
    }

    pub fn address2(&self) -> Option<&str> {
        self.address2.as_deref()
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn postcode(&self) -> &str {
        &self.postcode
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn county(&self) -> &str {
        &self.county
    }

    pub fn region(&self) -> Region {
        self.region
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "Address#{id}")?,
            None => f.write_str("Address#unsaved")?,
        }
        write!(
            f,
            "({}, {}, {} {})",
            self.street_address, self.city, self.state, self.region
        )
    }
}

impl Entity for Address {
    const ENTITY_NAME: &'static str = "address";

    fn identity(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_identity(&mut self, id: EntityId, _grant: IdentityGrant) {
        self.id.get_or_insert(id);
    }
}
