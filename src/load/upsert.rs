// src/load/upsert.rs

use sqlx::{Postgres, QueryBuilder};

use crate::process::NormalizedRecord;
use crate::schema::sql::quote_ident;
use crate::schema::{ColumnKind, Layout, TableName};

/// Bind parameters Postgres accepts in one statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Multi-row `INSERT .. ON CONFLICT (key) DO UPDATE` for one layout.
#[derive(Debug, Clone)]
pub struct UpsertStatement {
    layout: &'static Layout,
    head: String,
    tail: String,
}

impl UpsertStatement {
    pub fn new(table: &TableName, layout: &'static Layout, key: usize) -> Self {
        let columns: Vec<String> = layout
            .columns()
            .iter()
            .map(|c| quote_ident(c.column))
            .collect();
        let head = format!("INSERT INTO {} ({}) ", table.quoted(), columns.join(", "));

        let key_column = quote_ident(layout.column(key).column);
        let updates: Vec<String> = columns
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != key)
            .map(|(_, c)| format!("{c} = EXCLUDED.{c}"))
            .collect();
        let tail = if updates.is_empty() {
            format!(" ON CONFLICT ({key_column}) DO NOTHING")
        } else {
            format!(
                " ON CONFLICT ({key_column}) DO UPDATE SET {}",
                updates.join(", ")
            )
        };

        Self { layout, head, tail }
    }

    /// Most rows one statement can carry.
    pub fn max_rows(&self) -> usize {
        MAX_BIND_PARAMS / self.layout.len().max(1)
    }

    /// Build the statement for `records`, binding each value with the SQL
    /// type of its column so NULLs are typed too.
    pub fn build<'a, I>(&self, records: I) -> QueryBuilder<'static, Postgres>
    where
        I: IntoIterator<Item = &'a NormalizedRecord>,
    {
        let mut qb = QueryBuilder::new(self.head.as_str());
        qb.push_values(records, |mut row, record| {
            for (def, value) in self.layout.columns().iter().zip(record.values()) {
                match def.kind {
                    ColumnKind::Sequence => row.push_bind(value.as_int()),
                    ColumnKind::CorporateNumber | ColumnKind::PostalCode | ColumnKind::Text => {
                        row.push_bind(value.as_text().map(str::to_owned))
                    }
                    ColumnKind::Date => row.push_bind(value.as_date()),
                    ColumnKind::Flag => row.push_bind(value.as_bool()),
                };
            }
        });
        qb.push(self.tail.as_str());
        qb
    }
}
