use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use super::sink::UpsertSink;
use super::stats::ImportStats;
use crate::process::NormalizedRecord;

/// Holds the current batch and flushes it to the sink when it reaches
/// `batch_size` or when the input ends.
///
/// Within one batch each corporate number appears once: a later row with the
/// same key replaces the earlier one in place, matching row-by-row upsert
/// order. A failed flush is logged and counted, then loading carries on.
pub struct BatchLoader<S> {
    sink: S,
    batch_size: usize,
    records: Vec<NormalizedRecord>,
    lines: Vec<u64>,
    positions: HashMap<String, usize>,
    batch_index: u64,
}

impl<S: UpsertSink> BatchLoader<S> {
    pub fn new(sink: S, batch_size: usize) -> Self {
        let requested = batch_size.max(1);
        let batch_size = match sink.max_batch_rows() {
            Some(cap) if cap < requested => {
                warn!(requested, cap, "batch size exceeds the statement parameter limit; lowering");
                cap
            }
            _ => requested,
        };
        BatchLoader {
            sink,
            batch_size,
            records: Vec::with_capacity(batch_size),
            lines: Vec::with_capacity(batch_size),
            positions: HashMap::with_capacity(batch_size),
            batch_index: 0,
        }
    }

    /// Effective batch size after applying the sink's limit.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn pending(&self) -> usize {
        self.records.len()
    }

    /// Add one record read from `line`; flush if the batch is full.
    pub async fn push(&mut self, line: u64, record: NormalizedRecord, stats: &mut ImportStats) {
        match self.positions.get(record.corporate_number()) {
            Some(&pos) => {
                debug!(
                    corporate_number = record.corporate_number(),
                    replaced_line = self.lines[pos],
                    line,
                    "duplicate key in batch; keeping the later row"
                );
                stats.duplicate_rows += 1;
                self.records[pos] = record;
                self.lines[pos] = line;
            }
            None => {
                self.positions
                    .insert(record.corporate_number().to_string(), self.records.len());
                self.records.push(record);
                self.lines.push(line);
            }
        }

        if self.records.len() >= self.batch_size {
            self.flush(stats).await;
        }
    }

    /// Write out whatever is pending. Errors are recorded, not returned.
    pub async fn flush(&mut self, stats: &mut ImportStats) {
        if self.records.is_empty() {
            return;
        }
        self.batch_index += 1;
        let n = self.records.len() as u64;

        match self.sink.upsert(&self.records).await {
            Ok(_) => {
                stats.batches_flushed += 1;
                stats.records_upserted += n;
                info!(
                    batch = self.batch_index,
                    records = n,
                    total = stats.records_upserted,
                    "upserted batch"
                );
            }
            Err(err) => {
                stats.batches_failed += 1;
                stats.records_failed += n;
                error!(
                    batch = self.batch_index,
                    records = n,
                    first_line = self.lines.first().copied(),
                    last_line = self.lines.last().copied(),
                    first = self.records.first().map(|r| r.corporate_number()),
                    last = self.records.last().map(|r| r.corporate_number()),
                    error = %format!("{err:#}"),
                    "batch write failed; continuing with the next batch"
                );
                let reason = format!("batch {} failed: {:#}", self.batch_index, err);
                for (record, line) in self.records.iter().zip(&self.lines) {
                    stats.record_skip(*line, Some(record.corporate_number()), &reason);
                }
            }
        }

        self.records.clear();
        self.lines.clear();
        self.positions.clear();
    }

    /// Flush the remainder and hand the sink back.
    pub async fn finish(mut self, stats: &mut ImportStats) -> S {
        self.flush(stats).await;
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::testing::{compact_record, MemorySink};

    #[tokio::test]
    async fn flushes_at_batch_size_and_at_finish() {
        let mut stats = ImportStats::default();
        let mut loader = BatchLoader::new(MemorySink::default(), 2);
        for i in 0..5u64 {
            let number = format!("{}", 1_000_000_000_000 + i);
            loader.push(i + 1, compact_record(&number, "A"), &mut stats).await;
        }
        assert_eq!(loader.pending(), 1);
        let sink = loader.finish(&mut stats).await;

        assert_eq!(sink.batches.len(), 3);
        assert_eq!(sink.batches, vec![2, 2, 1]);
        assert_eq!(sink.rows.len(), 5);
        assert_eq!(stats.batches_flushed, 3);
        assert_eq!(stats.records_upserted, 5);
    }

    #[tokio::test]
    async fn later_duplicate_replaces_earlier_in_batch() {
        let mut stats = ImportStats::default();
        let mut loader = BatchLoader::new(MemorySink::default(), 10);
        loader.push(1, compact_record("1234567890123", "Old"), &mut stats).await;
        loader.push(2, compact_record("2234567890123", "Other"), &mut stats).await;
        loader.push(3, compact_record("1234567890123", "New"), &mut stats).await;
        let sink = loader.finish(&mut stats).await;

        assert_eq!(sink.batches, vec![2]);
        assert_eq!(stats.duplicate_rows, 1);
        assert_eq!(sink.name_of("1234567890123").as_deref(), Some("New"));
    }

    #[tokio::test]
    async fn failed_batch_is_counted_and_loading_continues() {
        let mut stats = ImportStats::default();
        let sink = MemorySink {
            fail_batch: Some(1),
            ..Default::default()
        };
        let mut loader = BatchLoader::new(sink, 2);
        for (line, number) in ["1000000000001", "1000000000002", "1000000000003"]
            .iter()
            .enumerate()
        {
            loader
                .push(line as u64 + 1, compact_record(number, "A"), &mut stats)
                .await;
        }
        let sink = loader.finish(&mut stats).await;

        assert_eq!(stats.batches_failed, 1);
        assert_eq!(stats.records_failed, 2);
        assert_eq!(stats.batches_flushed, 1);
        assert_eq!(stats.records_upserted, 1);
        assert_eq!(sink.rows.len(), 1);
        assert_eq!(stats.skipped.len(), 2);
        assert_eq!(stats.skipped[0].corporate_number.as_deref(), Some("1000000000001"));
        assert!(stats.skipped[0].reason.starts_with("batch 1 failed"));
    }

    #[tokio::test]
    async fn sink_limit_lowers_batch_size() {
        let sink = MemorySink {
            max_rows: Some(3),
            ..Default::default()
        };
        let loader = BatchLoader::new(sink, 500);
        assert_eq!(loader.batch_size(), 3);
        let loader = BatchLoader::new(MemorySink::default(), 0);
        assert_eq!(loader.batch_size(), 1);
    }
}
