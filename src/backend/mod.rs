//! The document-store seam consumed by the adapter.
//!
//! [`DocumentStore`] abstracts a remote two-key document table exposing
//! request/response operations: single-item reads and writes, bounded batch
//! writes that may partially succeed, and a paginated range query. The
//! adapter core is written entirely against this trait;
//! [`in_memory::InMemoryDocumentStore`] provides a local implementation for
//! tests.

pub mod in_memory;

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;

use crate::config::Throughput;
use crate::model::AttributeValue;

/// Name of the partition (hash) key attribute.
pub const HASH_KEY: &str = "hkey";

/// Name of the sort (range) key attribute.
pub const SORT_KEY: &str = "rkey";

/// Name of the single value attribute for non-map payloads.
pub const VALUE_ATTR: &str = "value";

/// Hard per-request operation limit for batch writes.
pub const MAX_BATCH_SIZE: usize = 25;

/// A stored document: attribute name to typed value.
pub type Item = BTreeMap<String, AttributeValue>;

/// The composite primary key identifying one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemKey {
    pub hkey: String,
    pub rkey: String,
}

/// One operation in a batch write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRequest {
    Put(Item),
    Delete(ItemKey),
}

impl WriteRequest {
    /// The sort key this request targets, if present.
    ///
    /// Put items produced by the codec always carry a string `rkey`
    /// attribute; items missing it are rejected by the backend.
    pub fn sort_key(&self) -> Option<&str> {
        match self {
            WriteRequest::Put(item) => match item.get(SORT_KEY) {
                Some(AttributeValue::S(rkey)) => Some(rkey.as_str()),
                _ => None,
            },
            WriteRequest::Delete(key) => Some(key.rkey.as_str()),
        }
    }
}

/// A range query over one partition.
///
/// `lower` and `upper` bound the sort key; `scan_forward` selects the
/// traversal direction. `exclusive_start_key` resumes a paginated scan from
/// the continuation token of the previous page.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub table: String,
    pub partition: String,
    pub lower: Bound<String>,
    pub upper: Bound<String>,
    pub scan_forward: bool,
    pub exclusive_start_key: Option<ItemKey>,
    /// Hint for the maximum number of items in the returned page.
    pub page_size: usize,
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub items: Vec<Item>,
    /// Continuation token: present when more of the range remains.
    pub last_evaluated_key: Option<ItemKey>,
}

/// Error type for backend operations.
///
/// `ResourceInUse` and `ResourceNotFound` carry the table lifecycle
/// conditions the adapter treats as non-errors in specific paths; everything
/// else is propagated unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The table already exists (create) or is mid-transition.
    ResourceInUse(String),
    /// The table does not exist.
    ResourceNotFound(String),
    /// The request was rejected for capacity reasons.
    Throttled(String),
    /// Any other backend failure.
    Backend(String),
}

impl std::error::Error for BackendError {}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::ResourceInUse(msg) => write!(f, "Resource in use: {}", msg),
            BackendError::ResourceNotFound(msg) => write!(f, "Resource not found: {}", msg),
            BackendError::Throttled(msg) => write!(f, "Throttled: {}", msg),
            BackendError::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

/// Result type alias for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// A remote two-key document table.
///
/// All operations are asynchronous request/response calls. No retries or
/// timeouts are applied at this seam; partial acceptance of batch writes is
/// reported through the returned unprocessed requests.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads one item, or `None` if absent.
    async fn get_item(&self, table: &str, key: ItemKey) -> BackendResult<Option<Item>>;

    /// Writes one item, replacing any existing item with the same key.
    async fn put_item(&self, table: &str, item: Item) -> BackendResult<()>;

    /// Deletes one item. Deleting an absent item is not an error.
    async fn delete_item(&self, table: &str, key: ItemKey) -> BackendResult<()>;

    /// Applies up to [`MAX_BATCH_SIZE`] write requests in one call.
    ///
    /// Requests the backend did not accept are returned and must be
    /// resubmitted by the caller. No two requests may target the same key.
    async fn batch_write_item(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> BackendResult<Vec<WriteRequest>>;

    /// Returns one page of items in sort-key order for the requested range.
    async fn query(&self, request: QueryRequest) -> BackendResult<QueryPage>;

    /// Creates a table with the two-key schema and the given throughput.
    async fn create_table(&self, table: &str, throughput: Throughput) -> BackendResult<()>;

    /// Deletes a table.
    async fn delete_table(&self, table: &str) -> BackendResult<()>;

    /// Waits until a created table is active.
    async fn wait_for_table_active(&self, table: &str) -> BackendResult<()>;

    /// Waits until a deleted table is gone.
    async fn wait_for_table_gone(&self, table: &str) -> BackendResult<()>;
}
