use serde::Serialize;
use tracing::info;

/// Upper bound on per-row skip details kept for the summary report.
pub const MAX_SKIPPED_SAMPLES: usize = 1_000;

/// A row left out of the load, for the summary report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based line in the input file.
    pub line: u64,
    pub corporate_number: Option<String>,
    pub reason: String,
}

/// Running counters for one import.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Data rows seen, header excluded.
    pub rows_read: u64,
    pub header_rows: u64,
    /// Wrong cell count or unreadable CSV.
    pub malformed_rows: u64,
    /// Unparseable corporate number, date or other field.
    pub invalid_rows: u64,
    /// Type code outside the accepted set. Not an error.
    pub filtered_rows: u64,
    /// Rows superseded by a later row with the same key in the same batch.
    pub duplicate_rows: u64,
    pub batches_flushed: u64,
    pub batches_failed: u64,
    pub records_upserted: u64,
    pub records_failed: u64,
    /// First `MAX_SKIPPED_SAMPLES` skipped or failed rows.
    pub skipped: Vec<SkippedRow>,
}

impl ImportStats {
    pub fn record_skip(&mut self, line: u64, corporate_number: Option<&str>, reason: impl ToString) {
        if self.skipped.len() < MAX_SKIPPED_SAMPLES {
            self.skipped.push(SkippedRow {
                line,
                corporate_number: corporate_number.map(str::to_string),
                reason: reason.to_string(),
            });
        }
    }

    /// Rows excluded because of bad data (not type filtering).
    pub fn skipped_rows(&self) -> u64 {
        self.malformed_rows + self.invalid_rows
    }

    pub fn log_summary(&self) {
        info!(
            rows_read = self.rows_read,
            header_rows = self.header_rows,
            upserted = self.records_upserted,
            batches = self.batches_flushed,
            failed_batches = self.batches_failed,
            failed_records = self.records_failed,
            malformed = self.malformed_rows,
            invalid = self.invalid_rows,
            filtered = self.filtered_rows,
            duplicates = self.duplicate_rows,
            "import finished"
        );
    }
}
