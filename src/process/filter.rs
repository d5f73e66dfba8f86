use std::collections::BTreeSet;

use super::mapper::MappedRow;
use super::utils::clean_str;

/// Type codes treated as general corporations unless overridden.
pub const DEFAULT_GENERAL_TYPE_CODES: [&str; 5] = ["301", "302", "303", "304", "305"];

/// `true` when `code` (trimmed) is one of `accepted`. An empty accepted set
/// lets every row through; a blank code never matches a non-empty set.
pub fn is_general(code: Option<&str>, accepted: &BTreeSet<String>) -> bool {
    if accepted.is_empty() {
        return true;
    }
    match code.map(clean_str) {
        Some(code) if !code.is_empty() => accepted.contains(code),
        _ => false,
    }
}

/// The "general corporation" predicate over the run's designated type column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorporationFilter {
    accepted: BTreeSet<String>,
}

impl CorporationFilter {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let accepted = codes
            .into_iter()
            .map(|c| clean_str(c.as_ref()).to_string())
            .filter(|c| !c.is_empty())
            .collect();
        Self { accepted }
    }

    pub fn accepted(&self) -> &BTreeSet<String> {
        &self.accepted
    }

    pub fn is_general(&self, row: &MappedRow<'_>) -> bool {
        is_general(row.type_code(), &self.accepted)
    }
}

impl Default for CorporationFilter {
    fn default() -> Self {
        Self::new(DEFAULT_GENERAL_TYPE_CODES)
    }
}
