// src/process/mod.rs
use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use encoding_rs::Encoding;
use std::{fs, path::Path};
use tracing::{info, instrument, warn};

pub mod convert;
pub mod date_parser;
pub mod filter;
pub mod mapper;
pub mod record;
pub mod utils;

pub use convert::FieldError;
pub use filter::CorporationFilter;
pub use mapper::{ColumnRoles, HeaderKind, MappedRow, RowError, RowMapper};
pub use record::{NormalizedRecord, Value};

/// Look up an encoding by WHATWG label (`shift_jis`, `windows-31j`, `utf-8`, ...).
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| anyhow!("unknown text encoding '{}'", label))
}

/// Decode raw file bytes. A byte order mark wins over `encoding`; malformed
/// sequences are replaced and reported once.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, used, had_errors) = encoding.decode(bytes);
    if used != encoding {
        info!(
            configured = encoding.name(),
            detected = used.name(),
            "byte order mark overrides configured encoding"
        );
    }
    if had_errors {
        warn!(
            encoding = used.name(),
            "input contains byte sequences invalid in this encoding; replaced with U+FFFD"
        );
    }
    text.into_owned()
}

/// Read and decode the whole file. Everything downstream works on text.
#[instrument(level = "info", skip(path, encoding), fields(path = %path.as_ref().display(), encoding = encoding.name()))]
pub fn read_decoded<P: AsRef<Path>>(path: P, encoding: &'static Encoding) -> Result<String> {
    let bytes = fs::read(&path)
        .with_context(|| format!("failed to read CSV file {:?}", path.as_ref()))?;
    info!(bytes = bytes.len(), "read input");
    Ok(decode_bytes(&bytes, encoding))
}

/// Headerless, flexible reader: header handling and width checks belong to
/// [`RowMapper`].
pub fn csv_reader(text: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes())
}
