//! Header detection and positional mapping of raw CSV rows onto a [`Layout`].

use anyhow::{bail, Result};
use csv::StringRecord;
use thiserror::Error;
use tracing::{info, warn};

use super::convert::{convert_cell, FieldError};
use super::record::{NormalizedRecord, Value};
use super::utils::clean_str;
use crate::schema::Layout;

/// Columns with a designated role in this run, as indices into the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRoles {
    /// Conflict key; must be a corporate-number column.
    pub key: usize,
    /// Legal name; required.
    pub name: usize,
    /// Corporation type code, read by the filter.
    pub kind: usize,
}

/// A row that cannot be mapped at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("malformed row: expected {expected} cells, found {found}")]
    WrongCellCount { expected: usize, found: usize },
    #[error("malformed row: {0}")]
    Unreadable(String),
}

/// What the first row of the file turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// First row is data; columns follow the fixed layout order.
    Absent,
    /// Header whose cells name catalog columns; columns follow the header.
    Named,
    /// Header we could not read; discarded, columns follow the fixed order.
    Unrecognized,
}

/// Decide whether `first` is a header row.
///
/// A first cell made only of digits is a sequence number, so the row is data.
/// Otherwise the row is a header when any cell names a catalog column, or
/// when its first cell is non-blank text.
pub fn detect_header(first: &StringRecord, layout: &Layout) -> HeaderKind {
    let lead = first.get(0).map(clean_str).unwrap_or("");
    if !lead.is_empty() && lead.chars().all(|c| c.is_ascii_digit()) {
        return HeaderKind::Absent;
    }
    if first.iter().any(|cell| layout.resolve(cell).is_some()) {
        HeaderKind::Named
    } else if !lead.is_empty() {
        HeaderKind::Unrecognized
    } else {
        HeaderKind::Absent
    }
}

/// Maps raw rows to layout columns and normalizes them.
#[derive(Debug, Clone)]
pub struct RowMapper {
    layout: &'static Layout,
    roles: ColumnRoles,
    header: HeaderKind,
    /// layout column → cell index in the row
    positions: Vec<Option<usize>>,
    expected_cells: usize,
}

impl RowMapper {
    /// Fixed published order, no header.
    pub fn positional(layout: &'static Layout, roles: ColumnRoles) -> Self {
        Self {
            layout,
            roles,
            header: HeaderKind::Absent,
            positions: (0..layout.len()).map(Some).collect(),
            expected_cells: layout.len(),
        }
    }

    /// Build a mapper from the first row of the file. When that row is a
    /// header the caller must not feed it to [`RowMapper::map`].
    pub fn detect(
        layout: &'static Layout,
        roles: ColumnRoles,
        first: &StringRecord,
    ) -> Result<Self> {
        let header = detect_header(first, layout);
        let mut mapper = Self::positional(layout, roles);
        mapper.header = header;

        match header {
            HeaderKind::Absent => {
                info!(layout = layout.name(), "no header row; using fixed column order");
            }
            HeaderKind::Unrecognized => {
                if first.len() != layout.len() {
                    warn!(
                        cells = first.len(),
                        expected = layout.len(),
                        "unrecognized header has a different width than the layout"
                    );
                }
                info!(layout = layout.name(), "header row not recognized; using fixed column order");
            }
            HeaderKind::Named => {
                let mut positions = vec![None; layout.len()];
                for (cell_idx, cell) in first.iter().enumerate() {
                    match layout.resolve(cell) {
                        Some(col) if positions[col].is_none() => positions[col] = Some(cell_idx),
                        Some(col) => warn!(
                            column = layout.column(col).column,
                            cell = cell_idx,
                            "duplicate header cell ignored"
                        ),
                        None => warn!(header = cell, "unknown header cell ignored"),
                    }
                }
                for (role, idx) in [("corporate number", roles.key), ("name", roles.name)] {
                    if positions[idx].is_none() {
                        bail!(
                            "header row has no {} column '{}'",
                            role,
                            layout.column(idx).column
                        );
                    }
                }
                if positions[roles.kind].is_none() {
                    warn!(
                        column = layout.column(roles.kind).column,
                        "header row has no type code column"
                    );
                }
                let mapped = positions.iter().filter(|p| p.is_some()).count();
                info!(mapped, of = layout.len(), "mapping columns by header names");
                mapper.positions = positions;
                mapper.expected_cells = first.len();
            }
        }
        Ok(mapper)
    }

    pub fn header(&self) -> HeaderKind {
        self.header
    }

    pub fn has_header(&self) -> bool {
        self.header != HeaderKind::Absent
    }

    /// Check the cell count and expose the row by layout column.
    pub fn map<'r>(&'r self, row: &'r StringRecord) -> Result<MappedRow<'r>, RowError> {
        if row.len() != self.expected_cells {
            return Err(RowError::WrongCellCount {
                expected: self.expected_cells,
                found: row.len(),
            });
        }
        Ok(MappedRow { mapper: self, row })
    }
}

/// A raw row whose cells are addressable by layout column.
#[derive(Debug, Clone, Copy)]
pub struct MappedRow<'r> {
    mapper: &'r RowMapper,
    row: &'r StringRecord,
}

impl<'r> MappedRow<'r> {
    /// Raw cell for layout column `col`; `None` when the header lacks it.
    pub fn cell(&self, col: usize) -> Option<&'r str> {
        self.mapper.positions[col].and_then(|idx| self.row.get(idx))
    }

    pub fn type_code(&self) -> Option<&'r str> {
        self.cell(self.mapper.roles.kind)
    }

    /// Best-effort corporate number for log lines, before validation.
    pub fn corporate_number_hint(&self) -> Option<&'r str> {
        self.cell(self.mapper.roles.key)
            .map(clean_str)
            .filter(|s| !s.is_empty())
    }

    pub fn name_hint(&self) -> Option<&'r str> {
        self.cell(self.mapper.roles.name)
            .map(clean_str)
            .filter(|s| !s.is_empty())
    }

    /// Normalize every column. The first failing cell rejects the row.
    pub fn normalize(&self) -> Result<NormalizedRecord, FieldError> {
        let layout = self.mapper.layout;
        let roles = self.mapper.roles;
        let mut values = Vec::with_capacity(layout.len());
        for (col, def) in layout.columns().iter().enumerate() {
            let value = convert_cell(def, self.cell(col))?;
            if value.is_null() && (col == roles.key || col == roles.name) {
                return Err(FieldError::Missing { column: def.column });
            }
            values.push(value);
        }
        debug_assert!(matches!(values[roles.key], Value::Text(_)));
        Ok(NormalizedRecord::new(layout, roles.key, values))
    }
}
