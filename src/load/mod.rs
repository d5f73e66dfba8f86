// src/load/mod.rs
pub mod batch;
pub mod sink;
pub mod stats;
pub mod upsert;

pub use batch::BatchLoader;
pub use sink::{DryRunSink, PgUpsertSink, UpsertSink};
pub use stats::{ImportStats, SkippedRow};
pub use upsert::UpsertStatement;
