//! The store facade: one logical table + partition behind the generic
//! ordered key-value contract.

use std::sync::Arc;

use bytes::Bytes;

use crate::backend::{BackendError, DocumentStore, WriteRequest};
use crate::batch::BatchCoalescer;
use crate::codec;
use crate::config::{BatchPolicy, Config, IteratorOptions, ReadOptions};
use crate::error::{Error, Result};
use crate::iterator::RangeIterator;
use crate::model::{BatchOperation, Value};
use crate::registry::StoreRegistry;

/// The key-value adapter for one table + partition.
///
/// All records written through one `TableKvDb` share a partition key; the
/// user-visible store key becomes the record's sort key, so range iteration
/// comes back in byte order. Values round-trip through the attribute codec,
/// with the documented exception that map-shaped payloads read back as
/// canonical JSON text.
///
/// # Example
///
/// ```ignore
/// use tablekv::{Config, InMemoryDocumentStore, StoreRegistry, TableKvDb, Value};
///
/// let backend = Arc::new(InMemoryDocumentStore::new());
/// let registry = StoreRegistry::new();
/// let config = Config {
///     location: "users$profiles".to_string(),
///     create_if_missing: true,
///     ..Config::default()
/// };
/// let db = TableKvDb::open(config, backend, &registry).await?;
///
/// db.put(Bytes::from("user:123"), Value::Text("alice".into())).await?;
/// let value = db.get(Bytes::from("user:123")).await?;
/// ```
pub struct TableKvDb {
    backend: Arc<dyn DocumentStore>,
    table: String,
    partition: String,
    batch_policy: BatchPolicy,
}

impl TableKvDb {
    /// Opens the adapter: resolves the effective table name, optionally
    /// ensures the backend table exists, and registers the handle in the
    /// given registry for the lifecycle destroy path.
    ///
    /// A create finding the table already present is success unless
    /// `error_if_exists` is set.
    pub async fn open(
        config: Config,
        backend: Arc<dyn DocumentStore>,
        registry: &StoreRegistry,
    ) -> Result<Arc<Self>> {
        let (table, partition) = parse_location(&config.location)?;
        let table = match &config.prefix {
            Some(prefix) => table.replacen(prefix.as_str(), "", 1),
            None => table,
        };
        let table = if config.hex_encode_table_name {
            hex_encode_table_name(&table)
        } else {
            table
        };

        if config.create_if_missing {
            match backend.create_table(&table, config.throughput).await {
                Ok(()) => {
                    backend.wait_for_table_active(&table).await?;
                    tracing::debug!(table = %table, "created backend table");
                }
                Err(BackendError::ResourceInUse(msg)) => {
                    if config.error_if_exists {
                        return Err(Error::AlreadyExists(msg));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        let db = Arc::new(Self {
            backend,
            table,
            partition,
            batch_policy: config.batch,
        });
        registry.register(&config.location, &db)?;
        Ok(db)
    }

    /// The resolved backend table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The partition key shared by this adapter's records.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Writes one record. Map values are flattened into the record's
    /// top-level attributes.
    pub async fn put(&self, key: Bytes, value: Value) -> Result<()> {
        let item = codec::encode_record(&self.partition, &key, &value);
        self.backend.put_item(&self.table, item).await?;
        Ok(())
    }

    /// Reads one record, failing with [`Error::NotFound`] if absent.
    pub async fn get(&self, key: Bytes) -> Result<Value> {
        self.get_with_options(key, ReadOptions::default()).await
    }

    /// Reads one record with read options; `as_buffer` coerces a text
    /// payload into binary form.
    pub async fn get_with_options(&self, key: Bytes, options: ReadOptions) -> Result<Value> {
        let item = self
            .backend
            .get_item(&self.table, codec::item_key(&self.partition, &key))
            .await?
            .ok_or(Error::NotFound)?;
        let value = codec::decode_record(&item)?;
        if options.as_buffer {
            Ok(codec::coerce_to_bytes(value))
        } else {
            Ok(value)
        }
    }

    /// Deletes one record. Deleting an absent key is not an error.
    pub async fn del(&self, key: Bytes) -> Result<()> {
        self.backend
            .delete_item(&self.table, codec::item_key(&self.partition, &key))
            .await?;
        Ok(())
    }

    /// Applies a list of put/delete operations through the batch coalescer.
    ///
    /// Text values are opportunistically parsed as structured data: text
    /// holding a JSON object is stored as a flattened map, anything else is
    /// kept as raw text. Parse failures are never surfaced.
    pub async fn batch(&self, operations: Vec<BatchOperation>) -> Result<()> {
        let mut requests = Vec::with_capacity(operations.len());
        for operation in operations {
            match operation {
                BatchOperation::Del { key } => {
                    requests.push(WriteRequest::Delete(codec::item_key(&self.partition, &key)));
                }
                BatchOperation::Put { key, value } => {
                    let value = codec::sniff_structured_text(value);
                    requests.push(WriteRequest::Put(codec::encode_record(
                        &self.partition,
                        &key,
                        &value,
                    )));
                }
            }
        }
        BatchCoalescer::new(
            self.backend.clone(),
            self.table.clone(),
            self.batch_policy.clone(),
        )
        .submit(requests)
        .await
    }

    /// Constructs a range iterator scoped to this adapter's partition.
    pub fn iterator(&self, options: IteratorOptions) -> RangeIterator {
        RangeIterator::new(
            self.backend.clone(),
            self.table.clone(),
            self.partition.clone(),
            options,
        )
    }

    pub(crate) fn backend(&self) -> Arc<dyn DocumentStore> {
        self.backend.clone()
    }
}

/// Splits a location into table name and partition key.
///
/// The partition segment defaults to `"!"` when absent, so a bare table name
/// is a valid location.
fn parse_location(location: &str) -> Result<(String, String)> {
    if location.is_empty() {
        return Err(Error::InvalidInput("location must not be empty".to_string()));
    }
    match location.split_once('$') {
        Some((table, partition)) if !partition.is_empty() => {
            Ok((table.to_string(), partition.to_string()))
        }
        Some((table, _)) => Ok((table.to_string(), "!".to_string())),
        None => Ok((location.to_string(), "!".to_string())),
    }
}

/// Hex-encodes a table name character by character, for backends that reject
/// some table name characters. Reversible.
fn hex_encode_table_name(name: &str) -> String {
    name.chars().map(|c| format!("{:x}", c as u32)).collect()
}
