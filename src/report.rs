use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::config::ImportConfig;
use crate::load::ImportStats;
use crate::schema::Layout;

/// What `--summary` writes.
#[derive(Debug, Serialize)]
pub struct ImportSummary<'a> {
    pub source: &'a Path,
    pub table: String,
    pub layout: &'static str,
    pub dry_run: bool,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub stats: &'a ImportStats,
}

impl<'a> ImportSummary<'a> {
    pub fn new(config: &'a ImportConfig, layout: &'static Layout, stats: &'a ImportStats) -> Self {
        Self {
            source: &config.csv_path,
            table: config.table.to_string(),
            layout: layout.name(),
            dry_run: config.dry_run,
            finished_at: Utc::now(),
            stats,
        }
    }
}

/// Write `summary` as pretty JSON to `path`.
///
/// 1) serialize into a hidden temp file next to `path`
/// 2) rename it over `path`, so readers never see a partial file
pub fn write_summary(path: &Path, summary: &ImportSummary<'_>) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .with_context(|| format!("summary path {:?} has no file name", path))?
        .to_string_lossy();
    let tmp_path = dir.join(format!(".{}.tmp", file_name));

    let mut tmp = fs::File::create(&tmp_path)
        .with_context(|| format!("creating {:?}", tmp_path))?;
    serde_json::to_writer_pretty(&mut tmp, summary).context("serializing summary")?;
    tmp.write_all(b"\n")?;
    tmp.sync_all()?;
    drop(tmp);

    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {:?} -> {:?}", tmp_path, path))?;
    info!(path = %path.display(), "wrote summary");
    Ok(())
}
