// src/schema/ensure.rs

use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, instrument, warn};

use super::catalog::Layout;
use super::evolution::{self, ConstraintKind, ExistingColumn, KeyAction, KeyConstraint, SchemaPlan};
use super::sql::{quote_ident, quote_literal, TableName};

const EXISTING_COLUMNS_SQL: &str = r#"
    SELECT column_name::text, data_type::text
    FROM information_schema.columns
    WHERE table_schema = COALESCE($1, current_schema()) AND table_name = $2
    ORDER BY ordinal_position
"#;

const KEY_CONSTRAINTS_SQL: &str = r#"
    SELECT tc.constraint_type::text,
           array_agg(kcu.column_name::text ORDER BY kcu.ordinal_position)
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
        ON tc.constraint_name = kcu.constraint_name
        AND tc.table_schema = kcu.table_schema
        AND tc.table_name = kcu.table_name
    WHERE tc.table_schema = COALESCE($1, current_schema())
        AND tc.table_name = $2
        AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')
    GROUP BY tc.constraint_name, tc.constraint_type
"#;

/// Make sure `table` exists and carries every column of `layout`, with
/// comments and a uniqueness guarantee on the key column.
///
/// Runs in one transaction: either the whole plan applies or nothing does.
/// Columns outside the catalog are never touched. Safe to run repeatedly.
#[instrument(level = "info", skip(pool, layout), fields(table = %table, layout = layout.name()))]
pub async fn ensure_table(
    pool: &PgPool,
    table: &TableName,
    layout: &Layout,
    key: usize,
) -> Result<SchemaPlan> {
    let key_def = layout.column(key);
    let mut tx = pool.begin().await.context("starting schema transaction")?;

    // 1) create a bare table keyed on the corporate number if there is none
    let create = format!(
        "CREATE TABLE IF NOT EXISTS {} ({} {} PRIMARY KEY)",
        table.quoted(),
        quote_ident(key_def.column),
        key_def.kind.sql_type()
    );
    sqlx::query(&create)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("creating table {}", table))?;

    // 2) introspect and plan
    let existing = existing_columns(&mut tx, table).await?;
    let constraints = key_constraints(&mut tx, table).await?;
    let plan = evolution::plan(&existing, &constraints, layout, key);

    for m in &plan.mismatches {
        warn!(
            column = m.column,
            expected = m.expected,
            found = %m.found,
            "existing column has a different type; leaving it unchanged"
        );
    }

    // 3) additive changes only
    for def in &plan.additions {
        let alter = format!(
            "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
            table.quoted(),
            quote_ident(def.column),
            def.kind.sql_type()
        );
        sqlx::query(&alter)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("adding column {} to {}", def.column, table))?;
        info!(column = def.column, ty = def.kind.sql_type(), "added column");
    }

    match plan.key_action {
        KeyAction::Satisfied => {}
        KeyAction::AddPrimaryKey => {
            let sql = format!(
                "ALTER TABLE {} ADD PRIMARY KEY ({})",
                table.quoted(),
                quote_ident(key_def.column)
            );
            sqlx::query(&sql)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("adding primary key to {}", table))?;
            info!(column = key_def.column, "added primary key");
        }
        KeyAction::AddUniqueIndex => {
            let index = format!("{}_{}_key", table.name, key_def.column);
            let sql = format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                quote_ident(&index),
                table.quoted(),
                quote_ident(key_def.column)
            );
            sqlx::query(&sql)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("adding unique index on {}", key_def.column))?;
            info!(index = %index, "added unique index");
        }
    }

    // 4) (re)write comments for every catalog column
    for def in layout.columns() {
        let sql = format!(
            "COMMENT ON COLUMN {}.{} IS {}",
            table.quoted(),
            quote_ident(def.column),
            quote_literal(&def.comment())
        );
        sqlx::query(&sql)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("commenting column {}", def.column))?;
    }

    tx.commit().await.context("committing schema changes")?;
    info!(
        added = plan.additions.len(),
        columns = layout.len(),
        "table ready"
    );
    Ok(plan)
}

async fn existing_columns(
    tx: &mut Transaction<'_, Postgres>,
    table: &TableName,
) -> Result<Vec<ExistingColumn>> {
    let rows: Vec<(String, String)> = sqlx::query_as(EXISTING_COLUMNS_SQL)
        .bind(table.schema.as_deref())
        .bind(&table.name)
        .fetch_all(&mut **tx)
        .await
        .with_context(|| format!("listing columns of {}", table))?;
    Ok(rows
        .into_iter()
        .map(|(name, data_type)| ExistingColumn { name, data_type })
        .collect())
}

async fn key_constraints(
    tx: &mut Transaction<'_, Postgres>,
    table: &TableName,
) -> Result<Vec<KeyConstraint>> {
    let rows: Vec<(String, Vec<String>)> = sqlx::query_as(KEY_CONSTRAINTS_SQL)
        .bind(table.schema.as_deref())
        .bind(&table.name)
        .fetch_all(&mut **tx)
        .await
        .with_context(|| format!("listing key constraints of {}", table))?;
    Ok(rows
        .into_iter()
        .map(|(kind, columns)| KeyConstraint {
            kind: if kind == "PRIMARY KEY" {
                ConstraintKind::PrimaryKey
            } else {
                ConstraintKind::Unique
            },
            columns,
        })
        .collect())
}
