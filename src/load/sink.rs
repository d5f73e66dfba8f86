use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use super::upsert::UpsertStatement;
use crate::process::NormalizedRecord;

/// Destination of flushed batches.
#[async_trait]
pub trait UpsertSink: Send {
    /// Write `records` as one all-or-nothing unit, inserting new keys and
    /// overwriting existing ones. Returns the number of rows written.
    async fn upsert(&mut self, records: &[NormalizedRecord]) -> Result<u64>;

    /// Largest batch this sink can take in one call, if limited.
    fn max_batch_rows(&self) -> Option<usize> {
        None
    }
}

/// Writes batches to Postgres, one statement per batch.
pub struct PgUpsertSink {
    pool: PgPool,
    statement: UpsertStatement,
}

impl PgUpsertSink {
    pub fn new(pool: PgPool, statement: UpsertStatement) -> Self {
        Self { pool, statement }
    }
}

#[async_trait]
impl UpsertSink for PgUpsertSink {
    async fn upsert(&mut self, records: &[NormalizedRecord]) -> Result<u64> {
        let mut qb = self.statement.build(records);
        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .with_context(|| format!("upserting {} records", records.len()))?;
        Ok(result.rows_affected())
    }

    fn max_batch_rows(&self) -> Option<usize> {
        Some(self.statement.max_rows())
    }
}

/// Accepts everything and writes nothing (`--dry-run`).
#[derive(Debug, Default)]
pub struct DryRunSink {
    pub records: u64,
}

#[async_trait]
impl UpsertSink for DryRunSink {
    async fn upsert(&mut self, records: &[NormalizedRecord]) -> Result<u64> {
        self.records += records.len() as u64;
        Ok(records.len() as u64)
    }
}
