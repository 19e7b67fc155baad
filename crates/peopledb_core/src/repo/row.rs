//! Prefixed column access for joined, denormalized result rows.
//!
//! Joined queries alias every column of a table block with a prefix such
//! as `HOME_` or `CHILD_`. Every column a decoder reads must be selected:
//! a missing or misspelled alias is a decode error, never an absent value.

use crate::repo::crud::{RepoError, RepoResult};
use rusqlite::types::FromSql;
use rusqlite::Row;

/// Column-name prefix of one table block in a result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block(pub &'static str);

impl Block {
    pub(crate) const BARE: Block = Block("");

    fn column(self, name: &str) -> String {
        format!("{}{}", self.0, name)
    }

    /// Reads a column of this block.
    ///
    /// Column lookup and conversion failures describe the statement or the
    /// stored data, not the store, so they surface as `InvalidData`.
    pub(crate) fn get<T: FromSql>(self, row: &Row<'_>, name: &str) -> RepoResult<T> {
        let column = self.column(name);
        row.get(column.as_str())
            .map_err(|err| RepoError::InvalidData(format!("cannot read column `{column}`: {err}")))
    }

    /// Reads a nullable column; SQL NULL reads as `None`.
    pub(crate) fn get_opt<T: FromSql>(self, row: &Row<'_>, name: &str) -> RepoResult<Option<T>> {
        self.get::<Option<T>>(row, name)
    }
}
