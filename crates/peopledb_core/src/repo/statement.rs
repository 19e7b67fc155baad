//! Per-repository statement registry.
//!
//! # Responsibility
//! - Map each `StatementKind` to the SQL text a concrete repository
//!   declared for it.
//! - Fall back to the repository's programmatic default only when nothing
//!   was declared.
//!
//! # Invariants
//! - Declared text is returned verbatim; the registry never inspects it.
//! - The fallback is not evaluated when a declaration matches.

use crate::repo::crud::{RepoError, RepoResult};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};

/// Token a `DeleteMany` statement carries in place of the id list.
pub const IDS_PLACEHOLDER: &str = ":ids";

/// Operation a statement is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Save,
    FindById,
    FindAll,
    Count,
    Update,
    DeleteOne,
    DeleteMany,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Save => "SAVE",
            Self::FindById => "FIND_BY_ID",
            Self::FindAll => "FIND_ALL",
            Self::Count => "COUNT",
            Self::Update => "UPDATE",
            Self::DeleteOne => "DELETE_ONE",
            Self::DeleteMany => "DELETE_MANY",
        }
    }
}

impl Display for StatementKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
struct Declared {
    kind: StatementKind,
    sql: &'static str,
}

/// Declared SQL for one entity type, built once at repository construction.
#[derive(Debug, Clone)]
pub struct StatementRegistry {
    entity: &'static str,
    declared: Vec<Declared>,
}

impl StatementRegistry {
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            declared: Vec::new(),
        }
    }

    /// Declares one statement.
    pub fn declare(mut self, kind: StatementKind, sql: &'static str) -> Self {
        self.declared.push(Declared { kind, sql });
        self
    }

    /// Declares several statements as one bundle.
    ///
    /// Bundled and single declarations are searched together, in the order
    /// they were added.
    pub fn declare_bundle(mut self, bundle: &[(StatementKind, &'static str)]) -> Self {
        self.declared
            .extend(bundle.iter().map(|&(kind, sql)| Declared { kind, sql }));
        self
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// Returns whether any declaration exists for `kind`.
    pub fn is_declared(&self, kind: StatementKind) -> bool {
        self.declared.iter().any(|declared| declared.kind == kind)
    }

    /// Resolves the SQL text for `kind`.
    ///
    /// # Errors
    /// - `StatementNotDefined` when nothing was declared and `fallback`
    ///   returns `None`.
    pub fn resolve<F>(&self, kind: StatementKind, fallback: F) -> RepoResult<Cow<'static, str>>
    where
        F: FnOnce() -> Option<Cow<'static, str>>,
    {
        if let Some(declared) = self.declared.iter().find(|declared| declared.kind == kind) {
            return Ok(Cow::Borrowed(declared.sql));
        }

        fallback().ok_or(RepoError::StatementNotDefined {
            entity: self.entity,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{StatementKind, StatementRegistry};
    use crate::repo::crud::RepoError;
    use std::borrow::Cow;
    use std::cell::Cell;

    #[test]
    fn declared_statement_wins_and_skips_fallback() {
        let registry =
            StatementRegistry::new("widget").declare(StatementKind::Count, "SELECT 1 AS COUNT");
        let calls = Cell::new(0);

        let sql = registry
            .resolve(StatementKind::Count, || {
                calls.set(calls.get() + 1);
                Some(Cow::Borrowed("SELECT 2 AS COUNT"))
            })
            .unwrap();

        assert_eq!(sql, "SELECT 1 AS COUNT");
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn bundle_covers_several_kinds_and_first_match_wins() {
        let registry = StatementRegistry::new("widget")
            .declare_bundle(&[
                (StatementKind::FindAll, "SELECT * FROM W"),
                (StatementKind::DeleteOne, "DELETE FROM W WHERE ID = ?"),
            ])
            .declare(StatementKind::FindAll, "SELECT ID FROM W");

        assert_eq!(
            registry.resolve(StatementKind::FindAll, || None).unwrap(),
            "SELECT * FROM W"
        );
        assert_eq!(
            registry.resolve(StatementKind::DeleteOne, || None).unwrap(),
            "DELETE FROM W WHERE ID = ?"
        );
        assert!(registry.is_declared(StatementKind::DeleteOne));
        assert!(!registry.is_declared(StatementKind::Update));
    }

    #[test]
    fn fallback_is_used_when_nothing_declared() {
        let registry = StatementRegistry::new("widget");
        let sql = registry
            .resolve(StatementKind::Save, || {
                Some(Cow::Owned("INSERT INTO W DEFAULT VALUES".to_string()))
            })
            .unwrap();
        assert_eq!(sql, "INSERT INTO W DEFAULT VALUES");
    }

    #[test]
    fn missing_statement_names_kind_and_entity() {
        let registry = StatementRegistry::new("widget");
        let err = registry.resolve(StatementKind::Update, || None).unwrap_err();

        assert!(matches!(
            err,
            RepoError::StatementNotDefined {
                entity: "widget",
                kind: StatementKind::Update
            }
        ));
        assert_eq!(err.to_string(), "no UPDATE statement defined for widget");
    }
}
