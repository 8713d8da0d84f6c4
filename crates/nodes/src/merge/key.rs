//! Field lookup and match-key computation.
//!
//! Only a closed set of JSON values can take part in field matching; see
//! [`MatchValue`]. Objects and arrays never match anything.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use tracing::warn;

/// A field value that can be compared across items.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchValue {
    String(String),
    Number(Number),
    Boolean(bool),
    /// RFC 3339 timestamp, normalised to UTC.
    Date(DateTime<Utc>),
    Null,
}

impl MatchValue {
    /// Classify a JSON value. `None` for objects and arrays.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Boolean(*b)),
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) => Some(match DateTime::parse_from_rfc3339(s) {
                Ok(date) => Self::Date(date.with_timezone(&Utc)),
                Err(_) => Self::String(s.clone()),
            }),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// String form used for equality. `Null` has no key and matches nothing.
    pub fn comparison_key(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Number(n) => Some(number_key(n)),
            Self::Boolean(b) => Some(b.to_string()),
            Self::Date(date) => Some(date.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::Null => None,
        }
    }
}

/// `1`, `1.0` and `"1"` all compare equal.
fn number_key(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Resolve `path` inside an item's json. With dot notation enabled,
/// `a.b.0` walks nested objects and array indices.
pub fn lookup<'a>(json: &'a Map<String, Value>, path: &str, dot_notation: bool) -> Option<&'a Value> {
    if !dot_notation {
        return json.get(path);
    }
    if let Some(value) = json.get(path) {
        return Some(value);
    }

    let mut segments = path.split('.');
    let mut current = json.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(list) => list.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Result of computing an item's match key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKey {
    Key(String),
    /// A field is absent from the item.
    Unset,
    /// A field is null, an object or an array.
    Unusable,
}

impl FieldKey {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key),
            Self::Unset | Self::Unusable => None,
        }
    }
}

/// Composite key over several fields of one item.
///
/// Parts are JSON-encoded as a list so `["a.b", "c"]` and `["a", "b.c"]`
/// never collide.
pub fn composite_key<'f>(
    json: &Map<String, Value>,
    fields: impl IntoIterator<Item = &'f str>,
    dot_notation: bool,
) -> FieldKey {
    let mut parts = Vec::new();
    for field in fields {
        let Some(value) = lookup(json, field, dot_notation) else {
            return FieldKey::Unset;
        };
        let Some(matchable) = MatchValue::from_json(value) else {
            warn!(
                field,
                "field holds an object or array and cannot be compared; item treated as unmatched"
            );
            return FieldKey::Unusable;
        };
        match matchable.comparison_key() {
            Some(part) => parts.push(part),
            None => return FieldKey::Unusable,
        }
    }

    if parts.len() == 1 {
        return FieldKey::Key(parts.remove(0));
    }
    match serde_json::to_string(&parts) {
        Ok(key) => FieldKey::Key(key),
        Err(_) => FieldKey::Unusable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn numbers_and_numeric_strings_share_a_key() {
        let a = MatchValue::from_json(&json!(1)).unwrap().comparison_key();
        let b = MatchValue::from_json(&json!(1.0)).unwrap().comparison_key();
        let c = MatchValue::from_json(&json!("1")).unwrap().comparison_key();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(
            MatchValue::from_json(&json!(2.5)).unwrap().comparison_key().as_deref(),
            Some("2.5")
        );
    }

    #[test]
    fn dates_normalise_to_utc_millis() {
        let a = MatchValue::from_json(&json!("2024-01-01T02:00:00+02:00")).unwrap();
        let b = MatchValue::from_json(&json!("2024-01-01T00:00:00.000Z")).unwrap();
        assert!(matches!(a, MatchValue::Date(_)));
        assert_eq!(a.comparison_key().as_deref(), Some("2024-01-01T00:00:00.000Z"));
        assert_eq!(a.comparison_key(), b.comparison_key());
    }

    #[test]
    fn null_objects_and_arrays_have_no_key() {
        assert_eq!(MatchValue::Null.comparison_key(), None);
        assert_eq!(MatchValue::from_json(&json!({ "a": 1 })), None);
        assert_eq!(MatchValue::from_json(&json!([1])), None);
    }

    #[test]
    fn dot_notation_walks_objects_and_arrays() {
        let json = obj(json!({ "user": { "ids": [7, 8] }, "a.b": "literal" }));
        assert_eq!(lookup(&json, "user.ids.1", true), Some(&json!(8)));
        assert_eq!(lookup(&json, "a.b", true), Some(&json!("literal")));
        assert_eq!(lookup(&json, "user.ids.1", false), None);
    }

    #[test]
    fn composite_key_reports_missing_and_unusable_fields() {
        let json = obj(json!({ "id": 1, "meta": { "x": 1 }, "gone": null }));
        assert_eq!(composite_key(&json, ["id"], true), FieldKey::Key("1".into()));
        assert_eq!(composite_key(&json, ["id", "name"], true), FieldKey::Unset);
        assert_eq!(composite_key(&json, ["meta"], true), FieldKey::Unusable);
        assert_eq!(composite_key(&json, ["gone"], true), FieldKey::Unusable);
    }

    #[test]
    fn composite_parts_do_not_collide() {
        let left = obj(json!({ "a": "x,y", "b": "z" }));
        let right = obj(json!({ "a": "x", "b": "y,z" }));
        assert_ne!(
            composite_key(&left, ["a", "b"], true),
            composite_key(&right, ["a", "b"], true)
        );
    }
}
