//! Column conversion helpers shared by the DAOs

use libsql::{Row, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Nullable text parameter
pub fn text_or_null(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

/// Boolean parameter stored as INTEGER 0/1
pub fn flag(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

/// JSON-encoded list parameter
pub fn json_text<T: Serialize>(value: &T) -> Result<Value> {
    Ok(Value::Text(serde_json::to_string(value)?))
}

/// Read a nullable text column
pub fn opt_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(Error::Database(format!(
            "expected TEXT or NULL in column {idx}, found {other:?}"
        ))),
    }
}

/// Read an INTEGER 0/1 column as a boolean
pub fn get_flag(row: &Row, idx: i32) -> Result<bool> {
    Ok(row.get::<i64>(idx)? != 0)
}

/// Read a JSON-encoded list column, tolerating corrupt values as empty
pub fn get_json_list<T: DeserializeOwned>(row: &Row, idx: i32) -> Result<Vec<T>> {
    let raw: String = row.get(idx)?;
    Ok(serde_json::from_str(&raw).unwrap_or_else(|error| {
        tracing::warn!("Ignoring corrupt cached list in column {idx}: {error}");
        Vec::new()
    }))
}

/// Parse an id column
pub fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::Database(format!("invalid {what} id in cache: {raw}")))
}

/// SQLite uses i64 for LIMIT/OFFSET
pub fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_or_null_maps_none() {
        assert_eq!(text_or_null(None), Value::Null);
        assert_eq!(text_or_null(Some("x")), Value::Text("x".to_string()));
    }
}
