//! Key-ordered iteration over one partition's range of records.
//!
//! [`RangeIterator`] wraps the backend's paginated query protocol into a
//! resumable, cancellable sequence: pages are fetched on demand, buffered,
//! decoded through the codec, and stitched together with the backend's
//! continuation tokens. The sequence is finite and not restartable; a new
//! iterator must be constructed to re-scan.

use std::collections::VecDeque;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::{DocumentStore, ItemKey, QueryRequest};
use crate::codec;
use crate::config::IteratorOptions;
use crate::error::Result;
use crate::model::StoreEntry;

/// Number of items requested per backend page, independent of the caller's
/// overall limit.
pub(crate) const QUERY_PAGE_SIZE: usize = 100;

enum IterState {
    /// No query issued yet.
    Idle,
    /// At least one page fetched; `resume_key` holds the continuation token.
    Active,
    /// The range (or the limit) is spent; no further fetches.
    Exhausted,
}

/// A forward or backward cursor over one partition's records.
pub struct RangeIterator {
    backend: Arc<dyn DocumentStore>,
    table: String,
    partition: String,
    options: IteratorOptions,
    state: IterState,
    buffer: VecDeque<StoreEntry>,
    resume_key: Option<ItemKey>,
    remaining: Option<usize>,
    closed: Arc<AtomicBool>,
}

/// Handle for closing a [`RangeIterator`] from another task, e.g. while an
/// `advance` call is awaiting a page fetch.
#[derive(Clone)]
pub struct CloseHandle {
    closed: Arc<AtomicBool>,
}

impl CloseHandle {
    /// Closes the iterator. Subsequent `advance` calls return `None`; the
    /// result of a fetch in flight is discarded.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl RangeIterator {
    pub(crate) fn new(
        backend: Arc<dyn DocumentStore>,
        table: String,
        partition: String,
        options: IteratorOptions,
    ) -> Self {
        let remaining = options.limit;
        Self {
            backend,
            table,
            partition,
            options,
            state: IterState::Idle,
            buffer: VecDeque::new(),
            resume_key: None,
            remaining,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the next entry in key order, or `None` at end of sequence.
    ///
    /// End of sequence is reached when the range is spent, the limit is
    /// reached, or the iterator was closed; it is stable once reported.
    pub async fn advance(&mut self) -> Result<Option<StoreEntry>> {
        loop {
            if self.is_closed() {
                self.buffer.clear();
                self.state = IterState::Exhausted;
                return Ok(None);
            }
            if self.remaining == Some(0) {
                return Ok(None);
            }
            if let Some(entry) = self.buffer.pop_front() {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                return Ok(Some(entry));
            }
            if matches!(self.state, IterState::Exhausted) {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    /// Closes the iterator: discards buffered entries and prevents further
    /// fetches. Safe to call at any time.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// A clonable handle that can close this iterator from another task.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            closed: self.closed.clone(),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let request = QueryRequest {
            table: self.table.clone(),
            partition: self.partition.clone(),
            lower: key_bound(&self.options.start, self.options.start_exclusive),
            upper: key_bound(&self.options.end, self.options.end_exclusive),
            scan_forward: !self.options.reverse,
            exclusive_start_key: self.resume_key.clone(),
            page_size: QUERY_PAGE_SIZE,
        };

        let page = self.backend.query(request).await?;
        if self.is_closed() {
            // A close raced the fetch; drop the page.
            return Ok(());
        }

        for item in &page.items {
            let key = if self.options.values_only {
                None
            } else {
                Some(codec::record_key(item)?)
            };
            let value = if self.options.keys_only {
                None
            } else {
                Some(codec::decode_record(item)?)
            };
            self.buffer.push_back(StoreEntry { key, value });
        }

        self.resume_key = page.last_evaluated_key;
        self.state = if self.resume_key.is_none() {
            IterState::Exhausted
        } else {
            IterState::Active
        };
        Ok(())
    }
}

fn key_bound(endpoint: &Option<bytes::Bytes>, exclusive: bool) -> Bound<String> {
    match endpoint {
        None => Bound::Unbounded,
        Some(key) if exclusive => Bound::Excluded(codec::sort_key_text(key)),
        Some(key) => Bound::Included(codec::sort_key_text(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::in_memory::InMemoryDocumentStore;
    use crate::backend::{BackendResult, Item, QueryPage, WriteRequest};
    use crate::codec::encode_record;
    use crate::config::Throughput;
    use crate::model::Value;
    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::Notify;

    /// Wraps a store so that `query` parks until the test releases it,
    /// letting a close land while the fetch is in flight.
    struct GatedDocumentStore {
        inner: Arc<InMemoryDocumentStore>,
        query_entered: Notify,
        query_released: Notify,
    }

    impl GatedDocumentStore {
        fn new(inner: Arc<InMemoryDocumentStore>) -> Self {
            Self {
                inner,
                query_entered: Notify::new(),
                query_released: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for GatedDocumentStore {
        async fn get_item(&self, table: &str, key: ItemKey) -> BackendResult<Option<Item>> {
            self.inner.get_item(table, key).await
        }

        async fn put_item(&self, table: &str, item: Item) -> BackendResult<()> {
            self.inner.put_item(table, item).await
        }

        async fn delete_item(&self, table: &str, key: ItemKey) -> BackendResult<()> {
            self.inner.delete_item(table, key).await
        }

        async fn batch_write_item(
            &self,
            table: &str,
            requests: Vec<WriteRequest>,
        ) -> BackendResult<Vec<WriteRequest>> {
            self.inner.batch_write_item(table, requests).await
        }

        async fn query(&self, request: QueryRequest) -> BackendResult<QueryPage> {
            self.query_entered.notify_one();
            self.query_released.notified().await;
            self.inner.query(request).await
        }

        async fn create_table(&self, table: &str, throughput: Throughput) -> BackendResult<()> {
            self.inner.create_table(table, throughput).await
        }

        async fn delete_table(&self, table: &str) -> BackendResult<()> {
            self.inner.delete_table(table).await
        }

        async fn wait_for_table_active(&self, table: &str) -> BackendResult<()> {
            self.inner.wait_for_table_active(table).await
        }

        async fn wait_for_table_gone(&self, table: &str) -> BackendResult<()> {
            self.inner.wait_for_table_gone(table).await
        }
    }

    async fn seeded_store(keys: &[&str]) -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .create_table("t", Throughput::default())
            .await
            .unwrap();
        for key in keys {
            store
                .put_item(
                    "t",
                    encode_record(
                        "part",
                        &Bytes::from(key.to_string()),
                        &Value::Text(format!("value-{}", key)),
                    ),
                )
                .await
                .unwrap();
        }
        store
    }

    fn iterator(store: Arc<InMemoryDocumentStore>, options: IteratorOptions) -> RangeIterator {
        RangeIterator::new(store, "t".to_string(), "part".to_string(), options)
    }

    async fn collect_keys(iter: &mut RangeIterator) -> Vec<Bytes> {
        let mut keys = Vec::new();
        while let Some(entry) = iter.advance().await.unwrap() {
            keys.push(entry.key.unwrap());
        }
        keys
    }

    #[tokio::test]
    async fn should_yield_keys_in_ascending_order() {
        // given
        let store = seeded_store(&["a", "b", "c"]).await;
        let mut iter = iterator(store, IteratorOptions::default());

        // when
        let keys = collect_keys(&mut iter).await;

        // then
        assert_eq!(keys, vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]);
    }

    #[tokio::test]
    async fn should_yield_keys_in_descending_order_when_reversed() {
        // given
        let store = seeded_store(&["a", "b", "c"]).await;
        let mut iter = iterator(
            store,
            IteratorOptions {
                reverse: true,
                ..IteratorOptions::default()
            },
        );

        // when
        let keys = collect_keys(&mut iter).await;

        // then
        assert_eq!(keys, vec![Bytes::from("c"), Bytes::from("b"), Bytes::from("a")]);
    }

    #[tokio::test]
    async fn should_stitch_pages_into_one_continuous_sequence() {
        // given - a page size that forces three fetches
        let store = Arc::new(InMemoryDocumentStore::new().with_max_page_size(2));
        store
            .create_table("t", Throughput::default())
            .await
            .unwrap();
        for key in ["a", "b", "c", "d", "e"] {
            store
                .put_item(
                    "t",
                    encode_record("part", &Bytes::from(key.to_string()), &Value::Number(1.0)),
                )
                .await
                .unwrap();
        }
        let mut iter = iterator(store.clone(), IteratorOptions::default());

        // when
        let keys = collect_keys(&mut iter).await;

        // then - no duplicates, no gaps, multiple backend queries
        assert_eq!(
            keys,
            vec![
                Bytes::from("a"),
                Bytes::from("b"),
                Bytes::from("c"),
                Bytes::from("d"),
                Bytes::from("e"),
            ]
        );
        assert_eq!(store.query_count(), 3);
    }

    #[tokio::test]
    async fn should_honor_range_bounds_and_exclusivity() {
        // given
        let store = seeded_store(&["a", "b", "c", "d"]).await;
        let mut iter = iterator(
            store,
            IteratorOptions {
                start: Some(Bytes::from("a")),
                end: Some(Bytes::from("d")),
                start_exclusive: true,
                end_exclusive: true,
                ..IteratorOptions::default()
            },
        );

        // when
        let keys = collect_keys(&mut iter).await;

        // then
        assert_eq!(keys, vec![Bytes::from("b"), Bytes::from("c")]);
    }

    #[tokio::test]
    async fn should_stop_at_the_overall_limit() {
        // given
        let store = seeded_store(&["a", "b", "c", "d"]).await;
        let mut iter = iterator(
            store,
            IteratorOptions {
                limit: Some(2),
                ..IteratorOptions::default()
            },
        );

        // when
        let keys = collect_keys(&mut iter).await;

        // then
        assert_eq!(keys, vec![Bytes::from("a"), Bytes::from("b")]);

        // and the end is stable
        assert_eq!(iter.advance().await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_return_none_after_close() {
        // given
        let store = seeded_store(&["a", "b", "c"]).await;
        let mut iter = iterator(store, IteratorOptions::default());
        let first = iter.advance().await.unwrap();
        assert!(first.is_some());

        // when
        iter.close();

        // then - buffered remainder is discarded
        assert_eq!(iter.advance().await.unwrap(), None);
        assert_eq!(iter.advance().await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_close_via_handle_before_first_fetch() {
        // given
        let store = seeded_store(&["a"]).await;
        let mut iter = iterator(store.clone(), IteratorOptions::default());
        let handle = iter.close_handle();

        // when
        handle.close();

        // then - no fetch is ever issued
        assert_eq!(iter.advance().await.unwrap(), None);
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn should_discard_fetch_that_completes_after_close() {
        // given - a fetch parked inside the backend
        let store = seeded_store(&["a", "b"]).await;
        let gated = Arc::new(GatedDocumentStore::new(store));
        let mut iter = RangeIterator::new(
            gated.clone(),
            "t".to_string(),
            "part".to_string(),
            IteratorOptions::default(),
        );
        let handle = iter.close_handle();
        let pending = tokio::spawn(async move { iter.advance().await });
        gated.query_entered.notified().await;

        // when - the close lands while the fetch is in flight
        handle.close();
        gated.query_released.notify_one();

        // then - the page that came back is dropped
        assert_eq!(pending.await.unwrap().unwrap(), None);
    }

    #[tokio::test]
    async fn should_skip_value_decoding_for_keys_only() {
        // given
        let store = seeded_store(&["a"]).await;
        let mut iter = iterator(
            store,
            IteratorOptions {
                keys_only: true,
                ..IteratorOptions::default()
            },
        );

        // when
        let entry = iter.advance().await.unwrap().unwrap();

        // then
        assert_eq!(entry.key, Some(Bytes::from("a")));
        assert_eq!(entry.value, None);
    }

    #[tokio::test]
    async fn should_omit_keys_for_values_only() {
        // given
        let store = seeded_store(&["a"]).await;
        let mut iter = iterator(
            store,
            IteratorOptions {
                values_only: true,
                ..IteratorOptions::default()
            },
        );

        // when
        let entry = iter.advance().await.unwrap().unwrap();

        // then
        assert_eq!(entry.key, None);
        assert_eq!(entry.value, Some(Value::Text("value-a".to_string())));
    }

    #[tokio::test]
    async fn should_return_empty_sequence_for_empty_range() {
        // given
        let store = seeded_store(&["a", "b"]).await;
        let mut iter = iterator(
            store,
            IteratorOptions {
                start: Some(Bytes::from("x")),
                end: Some(Bytes::from("z")),
                ..IteratorOptions::default()
            },
        );

        // when / then
        assert_eq!(iter.advance().await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_paginate_in_reverse_without_gaps() {
        // given
        let store = Arc::new(InMemoryDocumentStore::new().with_max_page_size(2));
        store
            .create_table("t", Throughput::default())
            .await
            .unwrap();
        for key in ["a", "b", "c", "d", "e"] {
            store
                .put_item(
                    "t",
                    encode_record("part", &Bytes::from(key.to_string()), &Value::Number(1.0)),
                )
                .await
                .unwrap();
        }
        let mut iter = iterator(
            store,
            IteratorOptions {
                reverse: true,
                ..IteratorOptions::default()
            },
        );

        // when
        let keys = collect_keys(&mut iter).await;

        // then
        assert_eq!(
            keys,
            vec![
                Bytes::from("e"),
                Bytes::from("d"),
                Bytes::from("c"),
                Bytes::from("b"),
                Bytes::from("a"),
            ]
        );
    }
}
