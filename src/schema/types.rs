// src/schema/types.rs

/// Semantic type of a catalog column. Decides both the cell normalizer and
/// the Postgres storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Plain integer (the publication's sequence number).
    Sequence,
    /// 13-digit corporate number.
    CorporateNumber,
    /// Free text; blank becomes NULL.
    Text,
    /// Calendar date in one of the accepted textual forms.
    Date,
    /// 7-digit postal code.
    PostalCode,
    /// Boolean flag such as "1"/"0".
    Flag,
}

impl ColumnKind {
    /// Storage type used in `CREATE TABLE` / `ALTER TABLE .. ADD COLUMN`.
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Sequence => "BIGINT",
            ColumnKind::CorporateNumber => "CHAR(13)",
            ColumnKind::Text => "TEXT",
            ColumnKind::Date => "DATE",
            ColumnKind::PostalCode => "CHAR(7)",
            ColumnKind::Flag => "BOOLEAN",
        }
    }

    /// The `information_schema.columns.data_type` Postgres reports for `sql_type()`.
    pub fn reported_type(self) -> &'static str {
        match self {
            ColumnKind::Sequence => "bigint",
            ColumnKind::CorporateNumber | ColumnKind::PostalCode => "character",
            ColumnKind::Text => "text",
            ColumnKind::Date => "date",
            ColumnKind::Flag => "boolean",
        }
    }
}

/// One entry of a fixed column catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Item number in the ordinance table this column comes from.
    pub item: u16,
    /// camelCase key used by the publication's own header row.
    pub field: &'static str,
    /// Destination column name.
    pub column: &'static str,
    /// Japanese label, also accepted as a header cell.
    pub label: &'static str,
    pub kind: ColumnKind,
    /// Further header spellings seen in the wild.
    pub aliases: &'static [&'static str],
}

impl ColumnDef {
    /// Comment persisted with `COMMENT ON COLUMN`. Item 0 marks a column
    /// with no counterpart in the ordinance table.
    pub fn comment(&self) -> String {
        match self.item {
            0 => self.label.to_string(),
            n => format!("命令規則別表 項{}: {}", n, self.label),
        }
    }

    /// Every name this column answers to in a header row or on the command line.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        [self.field, self.column, self.label]
            .into_iter()
            .chain(self.aliases.iter().copied())
    }

    /// Case-insensitive match against any of `names()`.
    pub fn answers_to(&self, name: &str) -> bool {
        self.names().any(|n| n == name || n.eq_ignore_ascii_case(name))
    }
}
