//! Value codec: the logical [`Value`] domain to and from the backend's typed
//! attribute representation.
//!
//! Encoding is deterministic: every value maps to exactly one
//! [`AttributeValue`] variant. Map-shaped payloads are flattened into the
//! record's top-level attributes on write and recognized structurally on
//! read; their read-back is the canonical JSON text of the reconstructed
//! structure, not the structure itself. That asymmetry is a compatibility
//! contract, not an accident.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::backend::{HASH_KEY, Item, ItemKey, SORT_KEY, VALUE_ATTR};
use crate::error::{Error, Result};
use crate::model::{AttributeValue, Value};

/// Encodes one logical value into its attribute representation.
pub fn encode_value(value: &Value) -> AttributeValue {
    match value {
        Value::Bytes(bytes) => AttributeValue::B(bytes.clone()),
        Value::List(items) => AttributeValue::L(items.iter().map(encode_value).collect()),
        Value::Map(members) => AttributeValue::M(
            members
                .iter()
                .map(|(k, v)| (k.clone(), encode_value(v)))
                .collect(),
        ),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(format_number(*n)),
        Value::Null => AttributeValue::Null,
        Value::Text(text) => AttributeValue::S(text.clone()),
    }
}

/// Decodes one attribute into its logical value.
///
/// Maps decode to structured [`Value::Map`]; the text rendering of map-shaped
/// record payloads happens in [`decode_record`], which owns the record-level
/// read path.
pub fn decode_value(attr: &AttributeValue) -> Result<Value> {
    match attr {
        AttributeValue::B(bytes) => Ok(Value::Bytes(bytes.clone())),
        AttributeValue::L(items) => Ok(Value::List(
            items.iter().map(decode_value).collect::<Result<_>>()?,
        )),
        AttributeValue::M(members) => {
            let mut decoded = BTreeMap::new();
            for (k, v) in members {
                decoded.insert(k.clone(), decode_value(v)?);
            }
            Ok(Value::Map(decoded))
        }
        AttributeValue::Bool(b) => Ok(Value::Bool(*b)),
        AttributeValue::N(text) => Ok(Value::Number(parse_number(text)?)),
        AttributeValue::Null => Ok(Value::Null),
        AttributeValue::S(text) => Ok(Value::Text(text.clone())),
    }
}

/// Renders a number as canonical decimal text: integral values carry no
/// fractional part.
pub(crate) fn format_number(n: f64) -> String {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.is_finite() && n.abs() < MAX_SAFE_INTEGER {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn parse_number(text: &str) -> Result<f64> {
    text.parse::<f64>()
        .map_err(|_| Error::Encoding(format!("malformed number attribute: {:?}", text)))
}

/// Renders a sort key as the string the backend stores.
pub(crate) fn sort_key_text(key: &Bytes) -> String {
    String::from_utf8_lossy(key).into_owned()
}

/// Builds the composite primary key for one record.
pub(crate) fn item_key(partition: &str, key: &Bytes) -> ItemKey {
    ItemKey {
        hkey: partition.to_string(),
        rkey: sort_key_text(key),
    }
}

/// Assembles the stored item for one record.
///
/// Map values have their members merged directly into the item's top level
/// alongside the key attributes; every other value nests under the single
/// `value` attribute.
pub fn encode_record(partition: &str, key: &Bytes, value: &Value) -> Item {
    let mut item = Item::new();
    if let Value::Map(members) = value {
        for (k, v) in members {
            item.insert(k.clone(), encode_value(v));
        }
    } else {
        item.insert(VALUE_ATTR.to_string(), encode_value(value));
    }
    item.insert(
        HASH_KEY.to_string(),
        AttributeValue::S(partition.to_string()),
    );
    item.insert(SORT_KEY.to_string(), AttributeValue::S(sort_key_text(key)));
    item
}

/// Reconstructs the logical payload of a stored item.
///
/// An item carrying a `value` attribute decodes that attribute; anything else
/// is a flattened map, recognized structurally: the key attributes are
/// stripped and the remainder decoded member-wise. A map-shaped result, from
/// either path, reads back as its canonical JSON text.
pub fn decode_record(item: &Item) -> Result<Value> {
    let decoded = match item.get(VALUE_ATTR) {
        Some(attr) => decode_value(attr)?,
        None => {
            let mut members = BTreeMap::new();
            for (name, attr) in item {
                if name == HASH_KEY || name == SORT_KEY {
                    continue;
                }
                members.insert(name.clone(), decode_value(attr)?);
            }
            Value::Map(members)
        }
    };
    match decoded {
        Value::Map(_) => Ok(Value::Text(canonical_text(&decoded)?)),
        other => Ok(other),
    }
}

/// Extracts the sort key of a stored item.
pub(crate) fn record_key(item: &Item) -> Result<Bytes> {
    match item.get(SORT_KEY) {
        Some(AttributeValue::S(rkey)) => Ok(Bytes::from(rkey.clone().into_bytes())),
        _ => Err(Error::Encoding(
            "item is missing its string sort key attribute".to_string(),
        )),
    }
}

/// Renders a value as canonical JSON text. Map keys serialize in sorted
/// order; binary members render as lossy UTF-8 strings.
pub fn canonical_text(value: &Value) -> Result<String> {
    let json = value_to_json(value)?;
    serde_json::to_string(&json).map_err(|e| Error::Encoding(e.to_string()))
}

fn value_to_json(value: &Value) -> Result<serde_json::Value> {
    match value {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .ok_or_else(|| Error::Encoding(format!("number {} has no JSON form", n))),
        Value::Text(text) => Ok(serde_json::Value::String(text.clone())),
        Value::Bytes(bytes) => Ok(serde_json::Value::String(
            String::from_utf8_lossy(bytes).into_owned(),
        )),
        Value::List(items) => Ok(serde_json::Value::Array(
            items.iter().map(value_to_json).collect::<Result<_>>()?,
        )),
        Value::Map(members) => {
            let mut object = serde_json::Map::new();
            for (k, v) in members {
                object.insert(k.clone(), value_to_json(v)?);
            }
            Ok(serde_json::Value::Object(object))
        }
    }
}

fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Array(items) => {
            Value::List(items.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(members) => Value::Map(
            members
                .into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect(),
        ),
    }
}

/// Opportunistically parses a text value as structured data.
///
/// Text that parses to a JSON object becomes a [`Value::Map`] (and thus a
/// flattened record); any other text, including JSON arrays and scalars, is
/// kept as raw text. Parse failures are swallowed.
pub(crate) fn sniff_structured_text(value: Value) -> Value {
    if let Value::Text(text) = &value {
        if let Ok(json @ serde_json::Value::Object(_)) = serde_json::from_str(text) {
            return json_to_value(json);
        }
    }
    value
}

/// Coerces a decoded text payload into binary form, for reads that request
/// buffers.
pub(crate) fn coerce_to_bytes(value: Value) -> Value {
    match value {
        Value::Text(text) => Value::Bytes(Bytes::from(text.into_bytes())),
        other => other,
    }
}
