use thiserror::Error;

use crate::process::date_parser;
use crate::process::record::Value;
use crate::process::utils;
use crate::schema::{ColumnDef, ColumnKind};

const CORPORATE_NUMBER_LEN: usize = 13;
const POSTAL_CODE_LEN: usize = 7;

/// Why a cell could not be normalized. Any of these excludes the whole row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("invalid {column}: expected {expected} digits, got '{raw}'")]
    InvalidDigits {
        column: &'static str,
        expected: usize,
        raw: String,
    },
    #[error("invalid {column}: {source}")]
    InvalidDate {
        column: &'static str,
        source: date_parser::UnrecognizedDate,
    },
    #[error("invalid {column}: expected integer, got '{raw}'")]
    InvalidInteger { column: &'static str, raw: String },
    #[error("invalid {column}: expected boolean flag, got '{raw}'")]
    InvalidFlag { column: &'static str, raw: String },
    #[error("missing {column}")]
    Missing { column: &'static str },
}

impl FieldError {
    pub fn column(&self) -> &'static str {
        match self {
            FieldError::InvalidDigits { column, .. }
            | FieldError::InvalidDate { column, .. }
            | FieldError::InvalidInteger { column, .. }
            | FieldError::InvalidFlag { column, .. }
            | FieldError::Missing { column } => *column,
        }
    }
}

fn digits(def: &ColumnDef, raw: &str, len: usize) -> Result<Value, FieldError> {
    if utils::clean_str(raw).is_empty() {
        return Ok(Value::Null);
    }
    utils::normalize_digits(raw, len)
        .map(Value::Text)
        .ok_or_else(|| FieldError::InvalidDigits {
            column: def.column,
            expected: len,
            raw: utils::clean_str(raw).to_string(),
        })
}

/// Normalize one raw cell according to its column kind. A missing cell
/// (`None`, e.g. a header that lacks the column) is NULL.
pub fn convert_cell(def: &ColumnDef, raw: Option<&str>) -> Result<Value, FieldError> {
    let Some(raw) = raw else {
        return Ok(Value::Null);
    };
    match def.kind {
        ColumnKind::Text => Ok(utils::normalize_text(raw).map_or(Value::Null, Value::Text)),
        ColumnKind::CorporateNumber => digits(def, raw, CORPORATE_NUMBER_LEN),
        ColumnKind::PostalCode => digits(def, raw, POSTAL_CODE_LEN),
        ColumnKind::Date => date_parser::normalize_date(raw)
            .map(|d| d.map_or(Value::Null, Value::Date))
            .map_err(|source| FieldError::InvalidDate {
                column: def.column,
                source,
            }),
        ColumnKind::Sequence => utils::normalize_int(raw)
            .map(|n| n.map_or(Value::Null, Value::Int))
            .map_err(|_| FieldError::InvalidInteger {
                column: def.column,
                raw: utils::clean_str(raw).to_string(),
            }),
        ColumnKind::Flag => utils::normalize_flag(raw)
            .map(|b| b.map_or(Value::Null, Value::Bool))
            .map_err(|_| FieldError::InvalidFlag {
                column: def.column,
                raw: utils::clean_str(raw).to_string(),
            }),
    }
}
