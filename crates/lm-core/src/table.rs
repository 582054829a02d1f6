//! Core table types: cell values, rows and loaded sources

use crate::error::{Error, Result};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A row of one source: header name -> value, in header order.
///
/// A header missing from the map means the original cell was empty.
pub type Row = IndexMap<String, CellValue>;

/// A row of the merged table: display column name -> value.
pub type MergedRow = IndexMap<String, CellValue>;

/// A scalar cell value with type detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Integer value
    Integer(i64),
    /// Floating-point value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// String value
    String(String),
    /// Explicit null, used for placeholders in merged rows
    Null,
}

impl CellValue {
    /// Parse a string into a CellValue, detecting the type.
    ///
    /// Returns `None` for blank input so callers can leave the cell absent.
    /// Text only becomes a number when nothing is lost: `007` and integers
    /// beyond `i64` stay strings, so distinct ids never collapse together.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return None;
        }

        if is_integer_text(trimmed) {
            return Some(match trimmed.parse::<i64>() {
                Ok(i) if i.to_string() == trimmed => CellValue::Integer(i),
                _ => CellValue::String(trimmed.to_string()),
            });
        }

        if !has_leading_zero(trimmed) {
            if let Ok(f) = trimmed.parse::<f64>() {
                if f.is_finite() {
                    return Some(CellValue::Float(f));
                }
            }
        }

        if trimmed.eq_ignore_ascii_case("true") {
            return Some(CellValue::Bool(true));
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Some(CellValue::Bool(false));
        }

        Some(CellValue::String(trimmed.to_string()))
    }

    /// Check if the cell is null
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Convert to a display string (null becomes an empty string)
    pub fn to_string_value(&self) -> String {
        self.to_string()
    }
}

/// Optional sign followed by ASCII digits only
fn is_integer_text(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `0` followed by another digit, as in `007.5`
fn has_leading_zero(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s).as_bytes();
    digits.len() > 1 && digits[0] == b'0' && digits[1].is_ascii_digit()
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Float(fl) => write!(f, "{}", fl),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Null => Ok(()),
        }
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

/// Hashable form of a key-column value used to match rows across sources.
///
/// Integral floats compare equal to integers, so a spreadsheet `1.0` and a
/// CSV `1` land on the same merged row. Strings never match numbers.
#[derive(Debug, Clone)]
pub enum RowKey {
    Integer(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl RowKey {
    /// Build a key from a cell value; null values cannot be matched
    pub fn from_cell(value: &CellValue) -> Option<Self> {
        match value {
            CellValue::Integer(i) => Some(RowKey::Integer(*i)),
            CellValue::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    Some(RowKey::Integer(*f as i64))
                } else {
                    Some(RowKey::Float(*f))
                }
            }
            CellValue::Bool(b) => Some(RowKey::Bool(*b)),
            CellValue::String(s) => Some(RowKey::String(s.clone())),
            CellValue::Null => None,
        }
    }
}

impl PartialEq for RowKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RowKey::Integer(a), RowKey::Integer(b)) => a == b,
            (RowKey::Float(a), RowKey::Float(b)) => a.to_bits() == b.to_bits(),
            (RowKey::Bool(a), RowKey::Bool(b)) => a == b,
            (RowKey::String(a), RowKey::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for RowKey {}

impl Hash for RowKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            RowKey::Integer(i) => i.hash(state),
            RowKey::Float(f) => f.to_bits().hash(state),
            RowKey::Bool(b) => b.hash(state),
            RowKey::String(s) => s.hash(state),
        }
    }
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowKey::Integer(i) => write!(f, "{}", i),
            RowKey::Float(fl) => write!(f, "{}", fl),
            RowKey::Bool(b) => write!(f, "{}", b),
            RowKey::String(s) => write!(f, "{}", s),
        }
    }
}

/// One loaded tabular file.
///
/// Immutable once built; a reloaded slot gets a whole new source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabularSource {
    id: String,
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl TabularSource {
    /// Create a source from an explicit header list and rows.
    ///
    /// Duplicate headers keep their first occurrence. Row entries whose key is
    /// not a header are dropped.
    pub fn new(id: impl Into<String>, headers: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        let id = id.into();

        let headers: IndexSet<String> = headers.into_iter().collect();
        if headers.is_empty() {
            return Err(Error::NoHeaders { id });
        }
        if rows.is_empty() {
            return Err(Error::EmptySource { id });
        }

        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.retain(|name, _| headers.contains(name));
                row
            })
            .collect();

        Ok(Self {
            id,
            headers: headers.into_iter().collect(),
            rows,
        })
    }

    /// Create a source whose headers are the row keys in first-seen order
    pub fn from_rows(id: impl Into<String>, rows: Vec<Row>) -> Result<Self> {
        let mut headers: IndexSet<String> = IndexSet::new();
        for row in &rows {
            for name in row.keys() {
                if !headers.contains(name) {
                    headers.insert(name.clone());
                }
            }
        }
        Self::new(id, headers.into_iter().collect(), rows)
    }

    /// Source label, usually the file name
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Headers in file order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Rows in file order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Check whether the source has a header
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Build a row from `(header, value)` pairs
pub fn row<K, V, I>(cells: I) -> Row
where
    K: Into<String>,
    V: Into<CellValue>,
    I: IntoIterator<Item = (K, V)>,
{
    cells
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_parse_integer() {
        assert_eq!(CellValue::parse("42"), Some(CellValue::Integer(42)));
        assert_eq!(CellValue::parse("-123"), Some(CellValue::Integer(-123)));
    }

    #[test]
    fn test_cell_value_parse_keeps_id_text() {
        assert_eq!(CellValue::parse("007"), Some(CellValue::from("007")));
        assert_eq!(CellValue::parse("+7"), Some(CellValue::from("+7")));
        assert_eq!(CellValue::parse("-0"), Some(CellValue::from("-0")));
        assert_eq!(CellValue::parse("0"), Some(CellValue::Integer(0)));
        assert_eq!(CellValue::parse("007.5"), Some(CellValue::from("007.5")));
        assert_eq!(CellValue::parse("0.5"), Some(CellValue::Float(0.5)));

        let big = "12345678901234567890";
        let next = "12345678901234567891";
        assert_eq!(CellValue::parse(big), Some(CellValue::from(big)));
        assert_ne!(CellValue::parse(big), CellValue::parse(next));
        assert_eq!(
            CellValue::parse("9223372036854775807"),
            Some(CellValue::Integer(i64::MAX))
        );
    }

    #[test]
    fn test_cell_value_parse_float() {
        assert_eq!(CellValue::parse("3.5"), Some(CellValue::Float(3.5)));
        assert_eq!(CellValue::parse(" -2.5 "), Some(CellValue::Float(-2.5)));
    }

    #[test]
    fn test_cell_value_parse_bool_and_string() {
        assert_eq!(CellValue::parse("TRUE"), Some(CellValue::Bool(true)));
        assert_eq!(CellValue::parse("false"), Some(CellValue::Bool(false)));
        assert_eq!(
            CellValue::parse("hello"),
            Some(CellValue::String("hello".to_string()))
        );
        assert_eq!(
            CellValue::parse("NaN"),
            Some(CellValue::String("NaN".to_string()))
        );
    }

    #[test]
    fn test_cell_value_parse_empty() {
        assert_eq!(CellValue::parse(""), None);
        assert_eq!(CellValue::parse("   "), None);
    }

    #[test]
    fn test_cell_value_json_is_untagged() {
        let r = row([("a", CellValue::Integer(1)), ("b", CellValue::Null)]);
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"a":1,"b":null}"#);

        let back: Row = serde_json::from_str(r#"{"a":1,"b":null,"c":"x","d":2.5}"#).unwrap();
        assert_eq!(back["a"], CellValue::Integer(1));
        assert_eq!(back["b"], CellValue::Null);
        assert_eq!(back["c"], CellValue::String("x".to_string()));
        assert_eq!(back["d"], CellValue::Float(2.5));
    }

    #[test]
    fn test_row_key_integral_float_matches_integer() {
        let a = RowKey::from_cell(&CellValue::Float(1.0)).unwrap();
        let b = RowKey::from_cell(&CellValue::Integer(1)).unwrap();
        assert_eq!(a, b);

        let s = RowKey::from_cell(&CellValue::String("1".to_string())).unwrap();
        assert_ne!(a, s);
        assert!(RowKey::from_cell(&CellValue::Null).is_none());
    }

    #[test]
    fn test_source_rejects_empty() {
        let err = TabularSource::new("a.csv", vec!["ID".to_string()], vec![]).unwrap_err();
        assert!(matches!(err, Error::EmptySource { .. }));

        let err = TabularSource::new("a.csv", vec![], vec![row([("ID", 1i64)])]).unwrap_err();
        assert!(matches!(err, Error::NoHeaders { .. }));
    }

    #[test]
    fn test_source_from_rows_collects_headers() {
        let source = TabularSource::from_rows(
            "a.csv",
            vec![row([("ID", 1i64)]), row([("ID", 2i64), ("Name", 7i64)])],
        )
        .unwrap();

        assert_eq!(source.headers(), &["ID".to_string(), "Name".to_string()]);
        assert_eq!(source.row_count(), 2);
        assert!(source.has_header("Name"));
    }

    #[test]
    fn test_source_drops_unknown_columns() {
        let source = TabularSource::new(
            "a.csv",
            vec!["ID".to_string(), "ID".to_string()],
            vec![row([("ID", 1i64), ("Stray", 2i64)])],
        )
        .unwrap();

        assert_eq!(source.column_count(), 1);
        assert!(!source.rows()[0].contains_key("Stray"));
    }
}
