//! Conversion of a parsed label into a tree of storage primitives.
//!
//! The primitive tree keeps every unit: a quantity becomes a `(number, unit)`
//! pair rather than a bare number, so a consumer can rebuild the physical
//! value. Groups keep their key order.

use serde::ser::{SerializeMap, SerializeSeq, SerializeTuple};
use serde::{Serialize, Serializer};

use crate::label::Label;
use crate::value::{Group, Number, Value};

/// A value made only of strings, numbers, lists, pairs and ordered maps.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    String(String),
    /// A number with its unit, serialized as a two-element tuple.
    Quantity(Number, String),
    List(Vec<Primitive>),
    /// Key/value pairs in label order.
    Map(Vec<(String, Primitive)>),
}

impl Primitive {
    pub fn get(&self, key: &str) -> Option<&Primitive> {
        match self {
            Primitive::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Primitive::String(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for Primitive {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Primitive::String(s) => serializer.serialize_str(s),
            Primitive::Quantity(value, unit) => {
                let mut tuple = serializer.serialize_tuple(2)?;
                tuple.serialize_element(value)?;
                tuple.serialize_element(unit)?;
                tuple.end()
            }
            Primitive::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Primitive::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Number::Integer(n) => serializer.serialize_i64(n),
            Number::Real(r) => serializer.serialize_f64(r),
        }
    }
}

/// Serialize the root group of `label`.
pub fn serialize_label(label: &Label) -> Primitive {
    serialize_group(label.root())
}

/// Serialize one label value.
///
/// Scalars and pointers become their string form; see the `Display` impls
/// of [`Scalar`](crate::value::Scalar) and [`Pointer`](crate::value::Pointer).
pub fn serialize_value(value: &Value) -> Primitive {
    match value {
        Value::Scalar(s) => Primitive::String(s.to_string()),
        Value::Quantity { value, unit } => Primitive::Quantity(*value, unit.clone()),
        Value::Sequence(items) => Primitive::List(items.iter().map(serialize_value).collect()),
        Value::Group(g) => serialize_group(g),
        Value::Pointer(p) => Primitive::String(p.to_string()),
    }
}

fn serialize_group(group: &Group) -> Primitive {
    Primitive::Map(
        group
            .iter()
            .map(|(k, v)| (k.to_string(), serialize_value(v)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_json(text: &str) -> serde_json::Value {
        let label = Label::parse(text).unwrap();
        serde_json::to_value(serialize_label(&label)).unwrap()
    }

    #[test]
    fn quantity_is_value_unit_pair() {
        let v = to_json("EXPOSURE_DURATION = 0.25 <s>\nEND\n");
        assert_eq!(v, json!({"EXPOSURE_DURATION": [0.25, "s"]}));
    }

    #[test]
    fn integer_quantity_keeps_integer() {
        let v = to_json("RECORD_BYTES = 512 <BYTES>\nEND\n");
        assert_eq!(v["RECORD_BYTES"][0], json!(512));
    }

    #[test]
    fn scalars_become_strings() {
        let v = to_json("A = 5\nB = 2.5\nC = \"some text\"\nD = SYMBOL\nE = 'LIT'\nF = 3.0\nEND\n");
        assert_eq!(
            v,
            json!({"A": "5", "B": "2.5", "C": "some text", "D": "SYMBOL", "E": "LIT", "F": "3.0"})
        );
    }

    #[test]
    fn pointer_keeps_raw_expression() {
        let v = to_json("^IMAGE = (\"A.IMG\",   3)\nEND\n");
        assert_eq!(v["^IMAGE"], json!("(\"A.IMG\", 3)"));
    }

    #[test]
    fn sequences_and_nested_quantities() {
        let v = to_json("FILTERS = (1 <nm>, 2 <nm>, RED)\nEND\n");
        assert_eq!(v["FILTERS"], json!([[1, "nm"], [2, "nm"], "RED"]));
    }

    #[test]
    fn groups_nest_and_keep_order() {
        let text = "Z = 1\nOBJECT = IMAGE\n  LINES = 2\n  A = 3\nEND_OBJECT = IMAGE\nB = 4\nEND\n";
        let label = Label::parse(text).unwrap();
        let out = serde_json::to_string(&serialize_label(&label)).unwrap();
        assert_eq!(out, r#"{"Z":"1","IMAGE":{"LINES":"2","A":"3"},"B":"4"}"#);
    }

    #[test]
    fn repeated_blocks_become_list() {
        let text = "OBJECT = \"X\"\nA = 1\nEND_OBJECT\nOBJECT = \"X\"\nA = 2\nEND_OBJECT\nEND\n";
        let v = to_json(text);
        assert_eq!(v["X"], json!([{"A": "1"}, {"A": "2"}]));
    }

    #[test]
    fn primitive_lookup() {
        let label = Label::parse("A = 1 <m>\nB = X\nEND\n").unwrap();
        let p = serialize_label(&label);
        assert_eq!(
            p.get("A"),
            Some(&Primitive::Quantity(Number::Integer(1), "m".into()))
        );
        assert_eq!(p.get("B").and_then(Primitive::as_str), Some("X"));
        assert_eq!(p.get("C"), None);
    }
}
