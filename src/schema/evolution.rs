//! Additive schema evolution: diff the desired catalog against what the
//! destination table already has. Nothing here touches the database; the
//! plan is applied by [`super::ensure`].

use std::collections::HashMap;
use tracing::debug;

use super::catalog::Layout;
use super::types::ColumnDef;

/// A column as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingColumn {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
}

/// A primary-key or unique constraint and the columns it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConstraint {
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
}

/// What it takes to make `ON CONFLICT (key)` valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// A primary key or unique constraint on exactly the key column exists.
    Satisfied,
    /// No primary key at all: add one on the key column.
    AddPrimaryKey,
    /// The primary key covers other columns: add a unique index instead.
    AddUniqueIndex,
}

/// An existing catalog column whose storage type differs from the catalog.
/// Reported, never altered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub column: &'static str,
    pub expected: &'static str,
    pub found: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPlan {
    pub additions: Vec<&'static ColumnDef>,
    pub mismatches: Vec<TypeMismatch>,
    pub key_action: KeyAction,
}

impl SchemaPlan {
    /// True when applying the plan changes nothing but comments.
    pub fn is_noop(&self) -> bool {
        self.additions.is_empty() && self.key_action == KeyAction::Satisfied
    }
}

/// Catalog columns missing from `existing`, in catalog order, plus type
/// mismatches for those present. Columns not in the catalog are ignored.
pub fn plan_columns(
    existing: &[ExistingColumn],
    desired: &'static [ColumnDef],
) -> (Vec<&'static ColumnDef>, Vec<TypeMismatch>) {
    let by_name: HashMap<&str, &str> = existing
        .iter()
        .map(|c| (c.name.as_str(), c.data_type.as_str()))
        .collect();

    let mut additions = Vec::new();
    let mut mismatches = Vec::new();
    for def in desired {
        match by_name.get(def.column) {
            None => additions.push(def),
            Some(found) if !found.eq_ignore_ascii_case(def.kind.reported_type()) => {
                mismatches.push(TypeMismatch {
                    column: def.column,
                    expected: def.kind.sql_type(),
                    found: found.to_string(),
                });
            }
            Some(_) => {}
        }
    }
    (additions, mismatches)
}

/// Decide how to guarantee uniqueness of `key_column`.
pub fn plan_key(constraints: &[KeyConstraint], key_column: &str) -> KeyAction {
    let covers_key_only = |c: &KeyConstraint| c.columns.len() == 1 && c.columns[0] == key_column;
    if constraints.iter().any(covers_key_only) {
        return KeyAction::Satisfied;
    }
    if constraints
        .iter()
        .any(|c| c.kind == ConstraintKind::PrimaryKey)
    {
        KeyAction::AddUniqueIndex
    } else {
        KeyAction::AddPrimaryKey
    }
}

/// Full plan for `layout` keyed on column index `key`.
pub fn plan(
    existing: &[ExistingColumn],
    constraints: &[KeyConstraint],
    layout: &Layout,
    key: usize,
) -> SchemaPlan {
    let (additions, mismatches) = plan_columns(existing, layout.columns());
    let key_action = plan_key(constraints, layout.column(key).column);
    debug!(
        additions = additions.len(),
        mismatches = mismatches.len(),
        ?key_action,
        "planned schema changes"
    );
    SchemaPlan {
        additions,
        mismatches,
        key_action,
    }
}
