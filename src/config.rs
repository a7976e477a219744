//! Configuration options for tablekv operations.

use std::time::Duration;

use bytes::Bytes;

/// Configuration for opening a [`TableKvDb`](crate::TableKvDb).
///
/// The `location` string carries both the table name and the partition key
/// shared by every record the adapter manages, joined by `$`:
/// `"my-table$my-partition"`. A missing partition segment defaults to `"!"`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Table name and partition key, `"tableName$partitionKey"`.
    pub location: String,

    /// Create the backend table on open if it does not exist yet.
    pub create_if_missing: bool,

    /// Fail with [`Error::AlreadyExists`](crate::Error::AlreadyExists) when
    /// `create_if_missing` finds the table already present.
    pub error_if_exists: bool,

    /// Prefix stripped from the configured table name on open.
    pub prefix: Option<String>,

    /// Hex-encode the table name for backends that reject some characters.
    /// The transform is reversible and applied after prefix stripping.
    pub hex_encode_table_name: bool,

    /// Provisioned capacity profile used when creating the table.
    pub throughput: Throughput,

    /// Retry and ordering policy for batch submissions.
    pub batch: BatchPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            location: String::new(),
            create_if_missing: false,
            error_if_exists: false,
            prefix: None,
            hex_encode_table_name: false,
            throughput: Throughput::default(),
            batch: BatchPolicy::default(),
        }
    }
}

impl Config {
    /// Creates a config for the given location with all other options at
    /// their defaults.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }
}

/// Provisioned read/write capacity for table creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throughput {
    pub read: u64,
    pub write: u64,
}

impl Default for Throughput {
    fn default() -> Self {
        Self { read: 1, write: 1 }
    }
}

/// Policy for batch submissions.
///
/// The defaults preserve the adapter's historical behavior: retry until the
/// backend drains all unprocessed items, with no backoff, and a last-write-wins
/// dedup that may perturb the relative order of non-conflicting keys.
#[derive(Debug, Clone, Default)]
pub struct BatchPolicy {
    /// Maximum number of batch calls that may report unprocessed items before
    /// the submission fails with
    /// [`Error::RetriesExhausted`](crate::Error::RetriesExhausted).
    /// `None` (the default) retries until drained.
    pub max_retries: Option<u32>,

    /// Delay slept between a call that reported unprocessed items and the
    /// resubmission. `None` (the default) retries immediately.
    pub retry_backoff: Option<Duration>,

    /// When `true`, deduplication replaces an earlier operation for a
    /// repeated key in place, preserving the relative order of distinct keys.
    ///
    /// When `false` (the default), the earlier operation is removed and the
    /// kept one appended, which moves it behind already-processed keys. Only
    /// at-most-one-operation-per-key is contractual either way.
    pub stable_dedup: bool,
}

/// Options for read operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Coerce a decoded text value into binary form.
    pub as_buffer: bool,
}

/// Options for constructing a [`RangeIterator`](crate::RangeIterator).
///
/// `start` and `end` are the low and high endpoints of the scanned key range
/// regardless of direction; `reverse` only flips traversal order.
#[derive(Debug, Clone, Default)]
pub struct IteratorOptions {
    /// Low endpoint of the range, unbounded when `None`.
    pub start: Option<Bytes>,

    /// High endpoint of the range, unbounded when `None`.
    pub end: Option<Bytes>,

    /// Exclude `start` itself from the range.
    pub start_exclusive: bool,

    /// Exclude `end` itself from the range.
    pub end_exclusive: bool,

    /// Traverse the range in descending key order.
    pub reverse: bool,

    /// Maximum number of entries yielded across all pages.
    pub limit: Option<usize>,

    /// Skip value decoding; yielded entries carry no value.
    pub keys_only: bool,

    /// Omit keys from yielded entries.
    pub values_only: bool,
}
