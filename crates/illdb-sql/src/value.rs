//! Column values and result rows.

use std::fmt;
use std::hash::{Hash, Hasher};

/// A single column value as returned by (or bound to) a statement.
#[derive(Debug, Clone)]
pub enum SqlValue {
    Null,
    Int(i64),
    /// Unsigned values that do not fit in `i64`.
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Integer view; text and byte columns holding digits are parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            SqlValue::UInt(v) => i64::try_from(*v).ok(),
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
            SqlValue::Null | SqlValue::Float(_) => None,
        }
    }

    /// Text view; byte columns must be valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            SqlValue::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Raw byte view of text or binary columns.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Text(s) => Some(s.as_bytes()),
            SqlValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl PartialEq for SqlValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SqlValue::Null, SqlValue::Null) => true,
            (SqlValue::Int(a), SqlValue::Int(b)) => a == b,
            (SqlValue::UInt(a), SqlValue::UInt(b)) => a == b,
            (SqlValue::Float(a), SqlValue::Float(b)) => a.to_bits() == b.to_bits(),
            (SqlValue::Text(a), SqlValue::Text(b)) => a == b,
            (SqlValue::Bytes(a), SqlValue::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for SqlValue {}

impl Hash for SqlValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            SqlValue::Null => {}
            SqlValue::Int(v) => v.hash(state),
            SqlValue::UInt(v) => v.hash(state),
            SqlValue::Float(v) => v.to_bits().hash(state),
            SqlValue::Text(s) => s.hash(state),
            SqlValue::Bytes(b) => b.hash(state),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Int(v) => write!(f, "{v}"),
            SqlValue::UInt(v) => write!(f, "{v}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Text(s) => write!(f, "{s:?}"),
            SqlValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// A result row: column names and values in select order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    pub fn push(&mut self, name: &str, value: SqlValue) {
        self.columns.push((name.to_string(), value));
    }

    /// Builder method: append a column.
    pub fn with(mut self, name: &str, value: impl Into<SqlValue>) -> Self {
        self.push(name, value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// Replace the value of an existing column. Returns false if absent.
    pub fn set(&mut self, name: &str, value: SqlValue) -> bool {
        match self.columns.iter_mut().find(|(column, _)| column == name) {
            Some((_, slot)) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn integer_views() {
        assert_eq!(SqlValue::Int(-4).as_i64(), Some(-4));
        assert_eq!(SqlValue::UInt(7).as_i64(), Some(7));
        assert_eq!(SqlValue::UInt(u64::MAX).as_i64(), None);
        assert_eq!(SqlValue::from("12").as_i64(), Some(12));
        assert_eq!(SqlValue::Bytes(b"64".to_vec()).as_i64(), Some(64));
        assert_eq!(SqlValue::Null.as_i64(), None);
    }

    #[test]
    fn text_and_byte_views() {
        assert_eq!(SqlValue::from("abc").as_bytes(), Some(&b"abc"[..]));
        assert_eq!(SqlValue::Bytes(b"abc".to_vec()).as_str(), Some("abc"));
        assert_eq!(SqlValue::Bytes(vec![0xff, 0xfe]).as_str(), None);
        assert_eq!(SqlValue::Int(1).as_bytes(), None);
    }

    #[test]
    fn values_usable_as_map_keys() {
        let mut map = HashMap::new();
        map.insert(SqlValue::Int(1), "one");
        map.insert(SqlValue::from("1"), "text one");
        assert_eq!(map.get(&SqlValue::Int(1)), Some(&"one"));
        assert_eq!(map.get(&SqlValue::from("1")), Some(&"text one"));
        assert_eq!(SqlValue::Float(1.5), SqlValue::Float(1.5));
    }

    #[test]
    fn display_hides_binary_content() {
        assert_eq!(SqlValue::Bytes(vec![1, 2, 3]).to_string(), "<3 bytes>");
        assert_eq!(SqlValue::from("x").to_string(), "\"x\"");
        assert_eq!(SqlValue::from(None::<i64>).to_string(), "NULL");
    }

    #[test]
    fn row_access() {
        let mut row = Row::new().with("id", 1i64).with("host", "db1");
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("host"), Some(&SqlValue::from("db1")));
        assert!(row.get("port").is_none());
        assert!(row.set("host", SqlValue::from("db2")));
        assert!(!row.set("port", SqlValue::Int(1)));
        let names: Vec<&str> = row.columns().map(|(name, _)| name).collect();
        assert_eq!(names, ["id", "host"]);
    }
}
