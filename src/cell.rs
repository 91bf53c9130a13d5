use serde::{Deserialize, Serialize};
use std::fmt;

/// A single spreadsheet value. Blank cells are normalized to `Empty` on
/// ingestion and stringify to `""`.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Canonical string form used by search, filtering, sorting and diffing.
    pub fn stringify(&self) -> String {
        self.to_string()
    }

    /// True for `Empty` and for text that is blank after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// True for values the sort treats as missing: `Empty` or `""`.
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(_) => false,
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => CellValue::Empty,
            serde_json::Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
            serde_json::Value::String(s) => CellValue::Text(s.clone()),
            serde_json::Value::Bool(b) => CellValue::Text(b.to_string()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            // Integral numbers print without a trailing ".0"
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<Option<CellValue>> for CellValue {
    fn from(value: Option<CellValue>) -> Self {
        value.unwrap_or_default()
    }
}

/// One data record: an ordered header -> value mapping plus the position it
/// had when the file was loaded.
///
/// Keys are unique. Setting an existing key overwrites the value in place and
/// keeps the key's original position.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Row {
    pub row_index: usize,
    pub values: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new(row_index: usize) -> Self {
        Row {
            row_index,
            values: Vec::new(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values
            .iter()
            .find(|(key, _)| key == column)
            .map(|(_, value)| value)
    }

    pub fn set(&mut self, column: &str, value: CellValue) {
        match self.values.iter_mut().find(|(key, _)| key == column) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((column.to_string(), value)),
        }
    }

    /// Stringified value of `column`; absent columns read as `""`.
    pub fn text(&self, column: &str) -> String {
        self.get(column).map(CellValue::stringify).unwrap_or_default()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(key, _)| key.as_str())
    }

    /// Copy of this row with `column` replaced.
    pub fn with(&self, column: &str, value: CellValue) -> Row {
        let mut row = self.clone();
        row.set(column, value);
        row
    }
}
