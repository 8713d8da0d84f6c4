//! The item envelope that flows along every connection.
//!
//! An [`Item`] is one unit of data: a JSON object, optional named binary
//! attachments, and the provenance (`pairedItem`) that links it back to the
//! upstream item(s) it was produced from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One input connection's ordered item sequence.
pub type InputBranch = Vec<Item>;

/// All input branches of a node invocation, indexed by input connection.
pub type NodeInputs = Vec<InputBranch>;

// ---------------------------------------------------------------------------
// PairedItem
// ---------------------------------------------------------------------------

/// Reference to the upstream item an item was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairedItem {
    /// Index of the input connection the source item arrived on.
    #[serde(rename = "sourceInputIndex", alias = "input", default)]
    pub input: usize,
    /// Position of the source item within that input.
    #[serde(rename = "itemIndex", alias = "item")]
    pub item: usize,
}

impl PairedItem {
    pub fn new(input: usize, item: usize) -> Self {
        Self { input, item }
    }
}

// ---------------------------------------------------------------------------
// BinaryData
// ---------------------------------------------------------------------------

/// Metadata plus payload reference of a binary attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryData {
    /// Base64 payload or a storage reference; opaque to the merge logic.
    pub data: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// A single item flowing between nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub json: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub binary: BTreeMap<String, BinaryData>,
    #[serde(
        rename = "pairedItem",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub paired_item: Vec<PairedItem>,
}

impl Item {
    /// Build an item from a JSON value. Non-object values are wrapped under
    /// a `data` key so the payload is always an object.
    pub fn from_json(value: Value) -> Self {
        let json = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("data".into(), other);
                map
            }
        };
        Self {
            json,
            ..Self::default()
        }
    }

    /// Item with an empty JSON object and nothing else.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_paired_item(mut self, input: usize, item: usize) -> Self {
        self.paired_item.push(PairedItem::new(input, item));
        self
    }

    pub fn with_binary(mut self, name: impl Into<String>, data: BinaryData) -> Self {
        self.binary.insert(name.into(), data);
        self
    }

    /// Wrap a list of JSON values as items of one input, stamping each with
    /// its own position as provenance.
    pub fn branch_from_values(input: usize, values: Vec<Value>) -> InputBranch {
        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| Self::from_json(value).with_paired_item(input, index))
            .collect()
    }
}

/// `pairedItem` may be a single object, a list, or a bare item index on
/// input 0.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<PairedItem>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Index(usize),
        One(PairedItem),
        Many(Vec<PairedItem>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::Index(item)) => vec![PairedItem::new(0, item)],
        Some(OneOrMany::One(p)) => vec![p],
        Some(OneOrMany::Many(list)) => list,
        None => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_object_payload_is_wrapped() {
        let item = Item::from_json(json!(42));
        assert_eq!(Value::Object(item.json), json!({ "data": 42 }));
    }

    #[test]
    fn paired_item_accepts_single_object() {
        let item: Item = serde_json::from_value(json!({
            "json": { "a": 1 },
            "pairedItem": { "item": 3 }
        }))
        .unwrap();
        assert_eq!(item.paired_item, vec![PairedItem::new(0, 3)]);
    }

    #[test]
    fn paired_item_accepts_bare_index() {
        let item: Item = serde_json::from_value(json!({
            "json": { "a": 1 },
            "pairedItem": 4
        }))
        .unwrap();
        assert_eq!(item.paired_item, vec![PairedItem::new(0, 4)]);
    }

    #[test]
    fn serialises_with_wire_names() {
        let item = Item::from_json(json!({ "a": 1 })).with_paired_item(1, 2);
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({
                "json": { "a": 1 },
                "pairedItem": [{ "sourceInputIndex": 1, "itemIndex": 2 }]
            })
        );
    }
}
