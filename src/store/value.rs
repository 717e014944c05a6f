//! Backend-agnostic SQL values, rows, and statements.
//!
//! Queries are written once in the SQLite `?` placeholder style; the
//! PostgreSQL adapters rewrite them to `$1..$n` with [`numbered_placeholders`].

use crate::error::StorageError;

/// An owned SQL parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Self::Null,
        }
    }
}

/// A fetched row: column name → value, in select order.
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    /// Raw value by column name, if the column exists.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, value)| value)
    }

    /// Required text column.
    pub fn text(&self, name: &str) -> Result<&str, StorageError> {
        match self.get(name) {
            Some(Value::Text(s)) => Ok(s),
            other => Err(column_error(name, "text", other)),
        }
    }

    /// Required integer column.
    pub fn integer(&self, name: &str) -> Result<i64, StorageError> {
        match self.get(name) {
            Some(Value::Integer(i)) => Ok(*i),
            other => Err(column_error(name, "integer", other)),
        }
    }

    /// Nullable integer column.
    pub fn opt_integer(&self, name: &str) -> Result<Option<i64>, StorageError> {
        match self.get(name) {
            Some(Value::Integer(i)) => Ok(Some(*i)),
            Some(Value::Null) | None => Ok(None),
            other => Err(column_error(name, "integer", other)),
        }
    }
}

fn column_error(name: &str, expected: &str, got: Option<&Value>) -> StorageError {
    StorageError::Serialization(format!(
        "column {name}: expected {expected}, got {got:?}"
    ))
}

/// A single parameterized statement, used for transactional batches.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Rewrite `?` placeholders to PostgreSQL's `$1..$n`.
///
/// Crate-internal queries never contain a literal `?`, so no quote-state
/// tracking is needed.
pub fn numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0;
    for ch in sql.chars() {
        if ch == '?' {
            n += 1;
            out.push('$');
            out.push_str(&n.to_string());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_positionally() {
        assert_eq!(
            numbered_placeholders("SELECT * FROM t WHERE a = ? AND b = ?"),
            "SELECT * FROM t WHERE a = $1 AND b = $2"
        );
        assert_eq!(numbered_placeholders("SELECT 1"), "SELECT 1");
        assert_eq!(
            numbered_placeholders("INSERT INTO t VALUES (?, ?, ?)"),
            "INSERT INTO t VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn row_accessors() {
        let row = Row::new(vec![
            ("id".to_string(), Value::Integer(7)),
            ("phone".to_string(), Value::Text("+15551230000".to_string())),
            ("user_id".to_string(), Value::Null),
        ]);
        assert_eq!(row.integer("id").unwrap(), 7);
        assert_eq!(row.text("phone").unwrap(), "+15551230000");
        assert_eq!(row.opt_integer("user_id").unwrap(), None);
        assert!(row.text("missing").is_err());
        assert!(row.integer("phone").is_err());
    }

    #[test]
    fn value_conversions() {
        assert_eq!(Value::from(3i64), Value::Integer(3));
        assert_eq!(Value::from("x"), Value::Text("x".to_string()));
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(
            Value::from(Some("y".to_string())),
            Value::Text("y".to_string())
        );
    }
}
