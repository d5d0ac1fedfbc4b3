use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::object::ObjectId;

/// A single element of a record's attribute payload.
///
/// The wire form is untagged JSON: primitives serialize as themselves,
/// detached children as `{"referenceId": "<hex id>"}` placeholders, inline
/// nested containers as `{"typeTag": ..., "attributes": {...}}`, and ordered
/// sequences as arrays. Variant order matters for deserialization: the two
/// object shapes are tried before the primitives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    /// A placeholder for a detached child, addressed by content id.
    Reference {
        #[serde(rename = "referenceId")]
        reference_id: ObjectId,
    },
    /// A nested container embedded in place (non-detached).
    Inline(InlineNode),
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<WireValue>),
    Null,
}

impl WireValue {
    /// Convenience constructor for a reference placeholder.
    pub fn reference(id: ObjectId) -> Self {
        Self::Reference { reference_id: id }
    }

    /// The referenced id, if this is a reference placeholder.
    pub fn as_reference(&self) -> Option<&ObjectId> {
        match self {
            Self::Reference { reference_id } => Some(reference_id),
            _ => None,
        }
    }
}

/// A non-detached nested container, embedded inside its parent's payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InlineNode {
    /// Polymorphic discriminator of the embedded container.
    #[serde(rename = "typeTag")]
    pub type_tag: String,
    /// Attribute payload, keyed by bare attribute name.
    pub attributes: BTreeMap<String, WireValue>,
}

/// The serialized form of one node: a flat, independently addressable,
/// deduplicated record.
///
/// Detached attributes are replaced by [`WireValue::Reference`] placeholders,
/// so a record never embeds another record. `total_child_count` is the size
/// of the reachable closure below this node; a store can use it to decide
/// fetch depth without walking the graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Content id of this record (hex digest on the wire).
    pub id: ObjectId,
    /// Polymorphic discriminator, used for reconstruction dispatch.
    #[serde(rename = "typeTag")]
    pub type_tag: String,
    /// Number of reference ids transitively reachable below this node.
    #[serde(rename = "totalChildCount")]
    pub total_child_count: u64,
    /// Attribute payload, keyed by bare attribute name.
    pub attributes: BTreeMap<String, WireValue>,
}

impl Record {
    /// Encode to the canonical JSON wire form.
    pub fn to_json(&self) -> Result<String, TypeError> {
        serde_json::to_string(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Decode from the JSON wire form.
    pub fn from_json(json: &str) -> Result<Self, TypeError> {
        serde_json::from_str(json).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Record {
        let child = ObjectId::from_bytes(b"child");
        let mut attributes = BTreeMap::new();
        attributes.insert("name".to_string(), WireValue::Text("beam".into()));
        attributes.insert("span".to_string(), WireValue::Float(12.5));
        attributes.insert("count".to_string(), WireValue::Int(3));
        attributes.insert("active".to_string(), WireValue::Bool(true));
        attributes.insert("notes".to_string(), WireValue::Null);
        attributes.insert("material".to_string(), WireValue::reference(child));
        attributes.insert(
            "offsets".to_string(),
            WireValue::List(vec![WireValue::Int(1), WireValue::Int(2)]),
        );
        Record {
            id: ObjectId::from_bytes(b"record"),
            type_tag: "Objects.Geometry.Line".to_string(),
            total_child_count: 1,
            attributes,
        }
    }

    #[test]
    fn record_json_roundtrip() {
        let record = sample_record();
        let json = record.to_json().unwrap();
        let decoded = Record::from_json(&json).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn wire_field_names_are_exact() {
        let record = sample_record();
        let json = record.to_json().unwrap();
        assert!(json.contains("\"typeTag\""));
        assert!(json.contains("\"totalChildCount\""));
        assert!(json.contains("\"referenceId\""));
        assert!(!json.contains("type_tag"));
    }

    #[test]
    fn reference_wire_shape() {
        let id = ObjectId::from_bytes(b"ref");
        let json = serde_json::to_string(&WireValue::reference(id)).unwrap();
        assert_eq!(json, format!("{{\"referenceId\":\"{}\"}}", id.to_hex()));
    }

    #[test]
    fn untagged_decoding_picks_the_right_variant() {
        let cases = [
            ("true", WireValue::Bool(true)),
            ("42", WireValue::Int(42)),
            ("42.5", WireValue::Float(42.5)),
            ("\"hi\"", WireValue::Text("hi".into())),
            ("null", WireValue::Null),
            ("[1,\"a\"]", WireValue::List(vec![WireValue::Int(1), WireValue::Text("a".into())])),
        ];
        for (json, expected) in cases {
            let decoded: WireValue = serde_json::from_str(json).unwrap();
            assert_eq!(decoded, expected, "input {json}");
        }
    }

    #[test]
    fn reference_decodes_before_inline() {
        let id = ObjectId::from_bytes(b"x");
        let json = format!("{{\"referenceId\":\"{}\"}}", id.to_hex());
        let decoded: WireValue = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, WireValue::reference(id));
    }

    #[test]
    fn inline_node_roundtrip() {
        let mut attributes = BTreeMap::new();
        attributes.insert("x".to_string(), WireValue::Float(1.0));
        let inline = WireValue::Inline(InlineNode {
            type_tag: "Objects.Geometry.Point".to_string(),
            attributes,
        });
        let json = serde_json::to_string(&inline).unwrap();
        let decoded: WireValue = serde_json::from_str(&json).unwrap();
        assert_eq!(inline, decoded);
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(Record::from_json("{\"nope\": 1}").is_err());
    }

    #[test]
    fn as_reference_accessor() {
        let id = ObjectId::from_bytes(b"r");
        assert_eq!(WireValue::reference(id).as_reference(), Some(&id));
        assert_eq!(WireValue::Int(1).as_reference(), None);
    }
}
