//! Conversion between plain JSON and Firestore's typed `Value` encoding

use serde_json::{json, Map, Value};

use super::document::Fields;
use crate::error::{Error, Result};

pub fn encode(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(flag) => json!({ "booleanValue": flag }),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                json!({ "integerValue": int.to_string() })
            } else if let Some(uint) = number.as_u64() {
                json!({ "integerValue": uint.to_string() })
            } else {
                json!({ "doubleValue": number.as_f64() })
            }
        }
        Value::String(text) => json!({ "stringValue": text }),
        Value::Array(items) => {
            if items.is_empty() {
                json!({ "arrayValue": {} })
            } else {
                let values: Vec<Value> = items.iter().map(encode).collect();
                json!({ "arrayValue": { "values": values } })
            }
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), encode(value)))
            .collect(),
    )
}

pub fn decode(value: &Value) -> Result<Value> {
    let Some((kind, inner)) = value.as_object().and_then(|map| map.iter().next()) else {
        return Err(malformed(value));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner.as_bool().map(Value::Bool).ok_or_else(|| malformed(value)),
        "integerValue" => {
            let parsed = match inner {
                Value::String(text) => text.parse::<i64>().ok(),
                Value::Number(number) => number.as_i64(),
                _ => None,
            };
            parsed.map(Value::from).ok_or_else(|| malformed(value))
        }
        "doubleValue" => match inner {
            Value::Number(_) => Ok(inner.clone()),
            // NaN and infinities arrive as strings and have no JSON form
            Value::String(_) => Ok(Value::Null),
            _ => Err(malformed(value)),
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|text| Value::String(text.to_string()))
            .ok_or_else(|| malformed(value)),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let items = match inner.get("values") {
                None => Vec::new(),
                Some(Value::Array(items)) => items.iter().map(decode).collect::<Result<_>>()?,
                Some(_) => return Err(malformed(value)),
            };
            Ok(Value::Array(items))
        }
        "mapValue" => match inner.get("fields") {
            None => Ok(Value::Object(Map::new())),
            Some(fields) => Ok(Value::Object(decode_fields(fields)?)),
        },
        _ => Err(malformed(value)),
    }
}

pub fn decode_fields(fields: &Value) -> Result<Fields> {
    let Some(map) = fields.as_object() else {
        return Err(malformed(fields));
    };
    map.iter()
        .map(|(key, value)| Ok((key.clone(), decode(value)?)))
        .collect()
}

fn malformed(value: &Value) -> Error {
    Error::Remote(format!("unrecognized Firestore value: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encodes_nested_document() {
        let encoded = encode(&json!({
            "username": "alice",
            "postsCount": 3,
            "isPrivate": false,
            "followers": ["u2"],
            "bio": null
        }));
        assert_eq!(
            encoded,
            json!({
                "mapValue": {"fields": {
                    "username": {"stringValue": "alice"},
                    "postsCount": {"integerValue": "3"},
                    "isPrivate": {"booleanValue": false},
                    "followers": {"arrayValue": {"values": [{"stringValue": "u2"}]}},
                    "bio": {"nullValue": null}
                }}
            })
        );
    }

    #[test]
    fn decodes_server_payloads() {
        let fields = decode_fields(&json!({
            "likesCount": {"integerValue": "12"},
            "score": {"doubleValue": 1.5},
            "tags": {"arrayValue": {}},
            "createdAt": {"timestampValue": "2024-01-01T00:00:00Z"},
            "meta": {"mapValue": {}}
        }))
        .unwrap();

        assert_eq!(fields["likesCount"], json!(12));
        assert_eq!(fields["score"], json!(1.5));
        assert_eq!(fields["tags"], json!([]));
        assert_eq!(fields["createdAt"], json!("2024-01-01T00:00:00Z"));
        assert_eq!(fields["meta"], json!({}));
    }

    #[test]
    fn rejects_unknown_kinds() {
        assert!(decode(&json!({"mysteryValue": 1})).is_err());
        assert!(decode(&json!("bare")).is_err());
        assert!(decode(&json!({"integerValue": "twelve"})).is_err());
    }
}
