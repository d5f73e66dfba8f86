use chrono::NaiveDate;
use thiserror::Error;

use super::utils::clean_str;

/// Separated forms accepted besides the compact `YYYYMMDD`.
const SEPARATED_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized date '{0}'")]
pub struct UnrecognizedDate(pub String);

/// Fast path for `YYYYMMDD`.
fn parse_compact(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = s[0..4].parse().ok()?;
    let month: u32 = s[4..6].parse().ok()?;
    let day: u32 = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYY.MM.DD` or `YYYYMMDD`.
///
/// Blank input is `Ok(None)`; anything else that is not a real calendar date
/// in one of those forms is an error for the caller to log and skip.
pub fn normalize_date(raw: &str) -> Result<Option<NaiveDate>, UnrecognizedDate> {
    let s = clean_str(raw);
    if s.is_empty() {
        return Ok(None);
    }
    if let Some(date) = parse_compact(s) {
        return Ok(Some(date));
    }
    SEPARATED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(Some)
        .ok_or_else(|| UnrecognizedDate(s.to_string()))
}
