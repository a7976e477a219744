//! Data types for store operations.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A logical value stored under a key.
///
/// This is the store-facing value domain; the codec translates it to and from
/// the backend's typed [`AttributeValue`] representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Bytes(Bytes),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// The backend's typed wire representation of one scalar or composite value.
///
/// Numbers travel as decimal text, as the backend stores them. The serde
/// representation mirrors the backend's externally tagged attribute JSON
/// (`{"S": "..."}`, `{"N": "42"}`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String.
    S(String),
    /// Number, decimal-text encoded.
    N(String),
    /// Binary.
    B(Bytes),
    /// Boolean.
    #[serde(rename = "BOOL")]
    Bool(bool),
    /// Null.
    #[serde(rename = "NULL")]
    Null,
    /// Ordered list of attribute values.
    L(Vec<AttributeValue>),
    /// Map from string keys to attribute values.
    M(BTreeMap<String, AttributeValue>),
}

/// One entry yielded by a [`RangeIterator`](crate::RangeIterator).
///
/// `key` is `None` for values-only iterators and `value` is `None` for
/// keys-only iterators.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEntry {
    pub key: Option<Bytes>,
    pub value: Option<Value>,
}

/// One operation in a batch request.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOperation {
    Put { key: Bytes, value: Value },
    Del { key: Bytes },
}
