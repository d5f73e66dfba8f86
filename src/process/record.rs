use chrono::NaiveDate;

use crate::schema::Layout;

/// A normalized cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Text(String),
    Int(i64),
    Bool(bool),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

/// One fully normalized row: a value for every column of its layout, in
/// layout order. The key column always holds a 13-digit corporate number.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    layout: &'static Layout,
    key: usize,
    values: Vec<Value>,
}

impl NormalizedRecord {
    /// Callers (the converter) guarantee `values` matches `layout` and that
    /// `values[key]` is a validated corporate number.
    pub(crate) fn new(layout: &'static Layout, key: usize, values: Vec<Value>) -> Self {
        debug_assert_eq!(values.len(), layout.len());
        debug_assert!(values[key].as_text().is_some());
        Self { layout, key, values }
    }

    pub fn layout(&self) -> &'static Layout {
        self.layout
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of the column named `column` (any catalog spelling).
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.layout.resolve(column).map(|idx| &self.values[idx])
    }

    pub fn corporate_number(&self) -> &str {
        self.values[self.key].as_text().unwrap_or_default()
    }
}
