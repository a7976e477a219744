//! Batch write coalescing: dedup, chunking, and the retry-until-drained loop.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::backend::{DocumentStore, MAX_BATCH_SIZE, WriteRequest};
use crate::config::BatchPolicy;
use crate::error::{Error, Result};

/// Turns a flat list of write requests into correctly-chunked backend batch
/// calls.
///
/// The backend rejects chunks containing two operations for the same key, so
/// requests are deduplicated first, last-write-wins. Chunks are then
/// submitted sequentially; requests a call reports as unprocessed are
/// resubmitted ahead of not-yet-submitted work, and the submission only
/// completes once the queue is empty and a call reports nothing unprocessed.
pub(crate) struct BatchCoalescer {
    backend: Arc<dyn DocumentStore>,
    table: String,
    policy: BatchPolicy,
}

impl BatchCoalescer {
    pub(crate) fn new(backend: Arc<dyn DocumentStore>, table: String, policy: BatchPolicy) -> Self {
        Self {
            backend,
            table,
            policy,
        }
    }

    /// Submits all requests, looping until drained or a hard error.
    ///
    /// Errors other than unprocessed items abort immediately; callers cannot
    /// observe how much of the batch was applied before the failure.
    pub(crate) async fn submit(&self, requests: Vec<WriteRequest>) -> Result<()> {
        let mut queue: VecDeque<WriteRequest> =
            dedup_last_wins(requests, self.policy.stable_dedup).into();
        let mut carry: Vec<WriteRequest> = Vec::new();
        let mut retries: u32 = 0;

        loop {
            // Unprocessed requests from the previous call go first.
            let mut chunk = std::mem::take(&mut carry);
            while chunk.len() < MAX_BATCH_SIZE {
                match queue.pop_front() {
                    Some(request) => chunk.push(request),
                    None => break,
                }
            }
            if chunk.is_empty() {
                return Ok(());
            }

            let unprocessed = self.backend.batch_write_item(&self.table, chunk).await?;
            if unprocessed.is_empty() {
                continue;
            }

            retries += 1;
            if let Some(max_retries) = self.policy.max_retries {
                if retries > max_retries {
                    return Err(Error::RetriesExhausted(format!(
                        "{} requests still unprocessed after {} retries",
                        unprocessed.len(),
                        max_retries
                    )));
                }
            }
            tracing::debug!(
                unprocessed = unprocessed.len(),
                retries,
                "resubmitting unprocessed batch requests"
            );
            if let Some(backoff) = self.policy.retry_backoff {
                tokio::time::sleep(backoff).await;
            }
            carry = unprocessed;
        }
    }
}

/// Deduplicates requests so at most one operation per key survives, keeping
/// the operation that came last in the input for each key.
///
/// With `stable` unset, a repeated key has its earlier surviving operation
/// removed and the kept one appended, which moves the key behind already
/// processed ones and perturbs the relative order of non-conflicting keys.
/// With `stable` set, the earlier operation is replaced in place and relative
/// order is preserved.
pub(crate) fn dedup_last_wins(requests: Vec<WriteRequest>, stable: bool) -> Vec<WriteRequest> {
    let mut out: Vec<WriteRequest> = Vec::with_capacity(requests.len());
    for request in requests {
        let position = out.iter().position(|other| {
            other.sort_key().is_some() && other.sort_key() == request.sort_key()
        });
        match position {
            Some(idx) if stable => out[idx] = request,
            Some(idx) => {
                out.remove(idx);
                out.push(request);
            }
            None => out.push(request),
        }
    }
    out
}
