//! Extracted cell and record types

use chrono::{NaiveDateTime, Timelike};
use std::collections::BTreeMap;
use std::fmt;

/// Date rendering used in reports
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Date rendering used in reports when seconds are present
pub const DATE_FORMAT_SECONDS: &str = "%Y-%m-%d %H:%M:%S";

/// A single normalized cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Missing or blank
    #[default]
    Empty,
    /// Free text (never blank)
    Text(String),
    /// Parsed number
    Number(f64),
    /// Parsed date and time
    Date(NaiveDateTime),
}

impl CellValue {
    /// Text cell; blank input becomes `Empty`
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    /// Whether the cell is `Empty`
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Numeric value, if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text value, if this is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render for a report cell
    pub fn render(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Date(d) if d.second() == 0 => d.format(DATE_FORMAT).to_string(),
            Self::Date(d) => d.format(DATE_FORMAT_SECONDS).to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Date(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

/// One output row: column name to cell
///
/// Records are built from a column list so that every column is present
/// from the start. Missing data stays an explicit `Empty`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedRecord {
    values: BTreeMap<String, CellValue>,
}

impl ExtractedRecord {
    /// A record with no columns
    pub fn new() -> Self {
        Self::default()
    }

    /// A record with every column set to `Empty`
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            values: columns
                .into_iter()
                .map(|c| (c.as_ref().to_string(), CellValue::Empty))
                .collect(),
        }
    }

    /// Set a column, returning self for chaining
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        self.values.insert(column.into(), value.into());
    }

    /// Cell for a column
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values.get(column)
    }

    /// Cell for a column, `Empty` when absent
    pub fn value(&self, column: &str) -> CellValue {
        self.get(column).cloned().unwrap_or_default()
    }

    /// Text rendering of a column, empty when absent
    pub fn render(&self, column: &str) -> String {
        self.get(column).map(CellValue::render).unwrap_or_default()
    }

    /// Column names in sorted order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
