//! In-memory implementation of the [`DocumentStore`] trait.
//!
//! Tables live in a `BTreeMap` keyed by `(hkey, rkey)`, so queries come back
//! in sort-key order for free. The store also records the calls it receives
//! and supports injecting failures and partially-accepted batch responses,
//! which is what the batch-retry and pagination tests are built on.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    BackendError, BackendResult, DocumentStore, HASH_KEY, Item, ItemKey, MAX_BATCH_SIZE,
    QueryPage, QueryRequest, SORT_KEY, WriteRequest,
};
use crate::config::Throughput;
use crate::model::AttributeValue;

type TableData = BTreeMap<(String, String), Item>;

#[derive(Default)]
struct CallLog {
    total_calls: usize,
    query_calls: usize,
    delete_table_calls: usize,
    /// Sort keys of each submitted batch chunk, in submission order.
    batch_chunks: Vec<Vec<String>>,
}

/// In-memory document store for tests and local development.
pub struct InMemoryDocumentStore {
    tables: Mutex<HashMap<String, TableData>>,
    log: Mutex<CallLog>,
    /// Per-call counts of batch requests to bounce back as unprocessed.
    unprocessed_plan: Mutex<VecDeque<usize>>,
    /// One-shot failures returned by the next batch write calls.
    batch_failures: Mutex<VecDeque<BackendError>>,
    max_page_size: usize,
}

impl InMemoryDocumentStore {
    /// Creates an empty store with no tables.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            log: Mutex::new(CallLog::default()),
            unprocessed_plan: Mutex::new(VecDeque::new()),
            batch_failures: Mutex::new(VecDeque::new()),
            max_page_size: usize::MAX,
        }
    }

    /// Caps the number of items returned per query page, forcing pagination.
    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    /// Makes the next batch write calls bounce back the first `count`
    /// requests of their chunk as unprocessed. Each queued count applies to
    /// one call.
    pub fn queue_unprocessed(&self, count: usize) {
        self.unprocessed_plan
            .lock()
            .expect("lock poisoned")
            .push_back(count);
    }

    /// Makes the next batch write call fail with the given error.
    pub fn fail_next_batch_write(&self, err: BackendError) {
        self.batch_failures
            .lock()
            .expect("lock poisoned")
            .push_back(err);
    }

    /// Sort keys of every batch chunk received so far, in call order.
    pub fn batch_chunks(&self) -> Vec<Vec<String>> {
        self.log.lock().expect("lock poisoned").batch_chunks.clone()
    }

    /// Number of query calls received.
    pub fn query_count(&self) -> usize {
        self.log.lock().expect("lock poisoned").query_calls
    }

    /// Number of delete-table calls received.
    pub fn delete_table_count(&self) -> usize {
        self.log.lock().expect("lock poisoned").delete_table_calls
    }

    /// Total number of backend calls received, across all operations.
    pub fn total_calls(&self) -> usize {
        self.log.lock().expect("lock poisoned").total_calls
    }

    /// Whether the given table exists.
    pub fn table_exists(&self, table: &str) -> bool {
        self.tables
            .lock()
            .expect("lock poisoned")
            .contains_key(table)
    }

    /// Raw stored item, for asserting on the wire shape in tests.
    pub fn raw_item(&self, table: &str, hkey: &str, rkey: &str) -> Option<Item> {
        self.tables
            .lock()
            .expect("lock poisoned")
            .get(table)
            .and_then(|data| data.get(&(hkey.to_string(), rkey.to_string())).cloned())
    }

    fn record_call(&self) {
        self.log.lock().expect("lock poisoned").total_calls += 1;
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts the string primary key attributes from an item.
fn primary_key(item: &Item) -> BackendResult<(String, String)> {
    let hkey = match item.get(HASH_KEY) {
        Some(AttributeValue::S(hkey)) => hkey.clone(),
        _ => {
            return Err(BackendError::Backend(
                "item is missing its string hash key attribute".to_string(),
            ));
        }
    };
    let rkey = match item.get(SORT_KEY) {
        Some(AttributeValue::S(rkey)) => rkey.clone(),
        _ => {
            return Err(BackendError::Backend(
                "item is missing its string sort key attribute".to_string(),
            ));
        }
    };
    Ok((hkey, rkey))
}

fn in_bounds(rkey: &str, lower: &Bound<String>, upper: &Bound<String>) -> bool {
    let above_lower = match lower {
        Bound::Included(low) => rkey >= low.as_str(),
        Bound::Excluded(low) => rkey > low.as_str(),
        Bound::Unbounded => true,
    };
    let below_upper = match upper {
        Bound::Included(high) => rkey <= high.as_str(),
        Bound::Excluded(high) => rkey < high.as_str(),
        Bound::Unbounded => true,
    };
    above_lower && below_upper
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn get_item(&self, table: &str, key: ItemKey) -> BackendResult<Option<Item>> {
        self.record_call();
        let tables = self
            .tables
            .lock()
            .map_err(|e| BackendError::Backend(format!("failed to acquire lock: {}", e)))?;
        let data = tables
            .get(table)
            .ok_or_else(|| BackendError::ResourceNotFound(format!("table {} not found", table)))?;
        Ok(data.get(&(key.hkey, key.rkey)).cloned())
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn put_item(&self, table: &str, item: Item) -> BackendResult<()> {
        self.record_call();
        let key = primary_key(&item)?;
        let mut tables = self
            .tables
            .lock()
            .map_err(|e| BackendError::Backend(format!("failed to acquire lock: {}", e)))?;
        let data = tables
            .get_mut(table)
            .ok_or_else(|| BackendError::ResourceNotFound(format!("table {} not found", table)))?;
        data.insert(key, item);
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn delete_item(&self, table: &str, key: ItemKey) -> BackendResult<()> {
        self.record_call();
        let mut tables = self
            .tables
            .lock()
            .map_err(|e| BackendError::Backend(format!("failed to acquire lock: {}", e)))?;
        let data = tables
            .get_mut(table)
            .ok_or_else(|| BackendError::ResourceNotFound(format!("table {} not found", table)))?;
        data.remove(&(key.hkey, key.rkey));
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn batch_write_item(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> BackendResult<Vec<WriteRequest>> {
        self.record_call();
        {
            let mut log = self
                .log
                .lock()
                .map_err(|e| BackendError::Backend(format!("failed to acquire lock: {}", e)))?;
            log.batch_chunks.push(
                requests
                    .iter()
                    .map(|r| r.sort_key().unwrap_or_default().to_string())
                    .collect(),
            );
        }

        if let Some(err) = self
            .batch_failures
            .lock()
            .map_err(|e| BackendError::Backend(format!("failed to acquire lock: {}", e)))?
            .pop_front()
        {
            return Err(err);
        }

        if requests.len() > MAX_BATCH_SIZE {
            return Err(BackendError::Backend(format!(
                "batch of {} requests exceeds the {}-request limit",
                requests.len(),
                MAX_BATCH_SIZE
            )));
        }
        for (i, request) in requests.iter().enumerate() {
            let key = request.sort_key();
            if requests[..i].iter().any(|other| other.sort_key() == key) {
                return Err(BackendError::Backend(format!(
                    "batch contains duplicate key {:?}",
                    key
                )));
            }
        }

        let bounced = self
            .unprocessed_plan
            .lock()
            .map_err(|e| BackendError::Backend(format!("failed to acquire lock: {}", e)))?
            .pop_front()
            .unwrap_or(0)
            .min(requests.len());

        let mut tables = self
            .tables
            .lock()
            .map_err(|e| BackendError::Backend(format!("failed to acquire lock: {}", e)))?;
        let data = tables
            .get_mut(table)
            .ok_or_else(|| BackendError::ResourceNotFound(format!("table {} not found", table)))?;

        let mut requests = requests;
        let accepted = requests.split_off(bounced);
        for request in accepted {
            match request {
                WriteRequest::Put(item) => {
                    let key = primary_key(&item)?;
                    data.insert(key, item);
                }
                WriteRequest::Delete(key) => {
                    data.remove(&(key.hkey, key.rkey));
                }
            }
        }
        Ok(requests)
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn query(&self, request: QueryRequest) -> BackendResult<QueryPage> {
        self.record_call();
        {
            let mut log = self
                .log
                .lock()
                .map_err(|e| BackendError::Backend(format!("failed to acquire lock: {}", e)))?;
            log.query_calls += 1;
        }

        let tables = self
            .tables
            .lock()
            .map_err(|e| BackendError::Backend(format!("failed to acquire lock: {}", e)))?;
        let data = tables.get(&request.table).ok_or_else(|| {
            BackendError::ResourceNotFound(format!("table {} not found", request.table))
        })?;

        let mut matching: Vec<&Item> = data
            .iter()
            .filter(|((hkey, rkey), _)| {
                hkey == &request.partition && in_bounds(rkey, &request.lower, &request.upper)
            })
            .map(|(_, item)| item)
            .collect();
        if !request.scan_forward {
            matching.reverse();
        }

        // Resume strictly after the continuation token in scan direction.
        if let Some(start) = &request.exclusive_start_key {
            matching.retain(|item| match item.get(SORT_KEY) {
                Some(AttributeValue::S(rkey)) => {
                    if request.scan_forward {
                        rkey.as_str() > start.rkey.as_str()
                    } else {
                        rkey.as_str() < start.rkey.as_str()
                    }
                }
                _ => false,
            });
        }

        let page_size = request.page_size.min(self.max_page_size).max(1);
        let has_more = matching.len() > page_size;
        let items: Vec<Item> = matching.into_iter().take(page_size).cloned().collect();
        let last_evaluated_key = if has_more {
            items.last().and_then(|item| match item.get(SORT_KEY) {
                Some(AttributeValue::S(rkey)) => Some(ItemKey {
                    hkey: request.partition.clone(),
                    rkey: rkey.clone(),
                }),
                _ => None,
            })
        } else {
            None
        };

        Ok(QueryPage {
            items,
            last_evaluated_key,
        })
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn create_table(&self, table: &str, _throughput: Throughput) -> BackendResult<()> {
        self.record_call();
        let mut tables = self
            .tables
            .lock()
            .map_err(|e| BackendError::Backend(format!("failed to acquire lock: {}", e)))?;
        if tables.contains_key(table) {
            return Err(BackendError::ResourceInUse(format!(
                "table {} already exists",
                table
            )));
        }
        tables.insert(table.to_string(), TableData::new());
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn delete_table(&self, table: &str) -> BackendResult<()> {
        self.record_call();
        {
            let mut log = self
                .log
                .lock()
                .map_err(|e| BackendError::Backend(format!("failed to acquire lock: {}", e)))?;
            log.delete_table_calls += 1;
        }
        let mut tables = self
            .tables
            .lock()
            .map_err(|e| BackendError::Backend(format!("failed to acquire lock: {}", e)))?;
        if tables.remove(table).is_none() {
            return Err(BackendError::ResourceNotFound(format!(
                "table {} not found",
                table
            )));
        }
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn wait_for_table_active(&self, _table: &str) -> BackendResult<()> {
        self.record_call();
        // In-memory tables are active as soon as they are created.
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn wait_for_table_gone(&self, _table: &str) -> BackendResult<()> {
        self.record_call();
        Ok(())
    }
}
