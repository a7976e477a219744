//! tablekv - an ordered key-value adapter over a two-key document table.
//!
//! tablekv maps the generic ordered key-value contract (put/get/delete/
//! batch-write/range-iterate) onto a remote document store that addresses
//! records by a hash key plus a range key, letting callers treat a
//! cloud-hosted table as a local-looking sorted key-value store.
//!
//! # Architecture
//!
//! Every adapter instance is scoped to one table and one partition: the
//! partition key is fixed at open time and the user-visible store key becomes
//! the record's sort key. Three subsystems carry the work:
//!
//! - The **codec** ([`codec`]) translates logical [`Value`]s to and from the
//!   backend's typed [`AttributeValue`] representation, flattening map-shaped
//!   payloads into top-level record attributes.
//! - The **batch coalescer** deduplicates same-key operations
//!   (last-write-wins), chunks requests at the backend's 25-operation limit,
//!   and resubmits partially-accepted chunks until drained.
//! - The **range iterator** ([`RangeIterator`]) turns the backend's paginated
//!   query protocol into a key-ordered, cancellable cursor.
//!
//! The backend itself sits behind the [`DocumentStore`] trait;
//! [`InMemoryDocumentStore`] implements it for tests and local development.
//!
//! # Key Concepts
//!
//! - **Map read-back asymmetry**: map-shaped values are written structurally
//!   but read back as their canonical JSON text. This is a deliberate
//!   compatibility contract; see [`codec::decode_record`].
//! - **Registry**: table destruction goes through an explicit
//!   [`StoreRegistry`] rather than global state.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use tablekv::{Config, InMemoryDocumentStore, StoreRegistry, TableKvDb, Value};
//!
//! let backend = Arc::new(InMemoryDocumentStore::new());
//! let registry = StoreRegistry::new();
//! let config = Config {
//!     location: "users$profiles".to_string(),
//!     create_if_missing: true,
//!     ..Config::default()
//! };
//! let db = TableKvDb::open(config, backend, &registry).await?;
//!
//! db.put(Bytes::from("user:123"), Value::Text("alice".into())).await?;
//! let value = db.get(Bytes::from("user:123")).await?;
//!
//! let mut iter = db.iterator(Default::default());
//! while let Some(entry) = iter.advance().await? {
//!     println!("{:?}: {:?}", entry.key, entry.value);
//! }
//!
//! registry.destroy("users$profiles").await?;
//! ```

pub mod backend;
mod batch;
pub mod codec;
mod config;
mod error;
mod iterator;
mod model;
mod registry;
mod store;

pub use backend::in_memory::InMemoryDocumentStore;
pub use backend::{
    BackendError, BackendResult, DocumentStore, Item, ItemKey, MAX_BATCH_SIZE, QueryPage,
    QueryRequest, WriteRequest,
};
pub use config::{BatchPolicy, Config, IteratorOptions, ReadOptions, Throughput};
pub use error::{Error, Result};
pub use iterator::{CloseHandle, RangeIterator};
pub use model::{AttributeValue, BatchOperation, StoreEntry, Value};
pub use registry::StoreRegistry;
pub use store::TableKvDb;
