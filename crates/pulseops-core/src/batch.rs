//! Bulk operation runner
//!
//! Executes N independent sub-operations and collects a per-item ledger.
//! One item's failure never prevents attempting the rest; by the time a
//! batch returns, errors are data in the report, not exceptions.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::debug;

/// Human-readable failure detail for one batch item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub message: String,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorDetail {
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// One successful batch item, tagged with its input position
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem<T, R> {
    pub index: usize,
    pub input: T,
    pub output: R,
}

/// One failed batch item, tagged with its input position
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure<T> {
    pub index: usize,
    pub input: T,
    pub error: ErrorDetail,
}

/// Per-item success/failure ledger for one bulk operation.
///
/// Both buckets preserve input order; merging them back by `index`
/// reconstructs the original input sequence exactly.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport<T, R> {
    pub succeeded: Vec<BatchItem<T, R>>,
    pub failed: Vec<BatchFailure<T>>,
}

impl<T, R> Default for BatchReport<T, R> {
    fn default() -> Self {
        BatchReport {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T, R> BatchReport<T, R> {
    /// Total items attempted
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Some items succeeded and some failed
    pub fn is_partial(&self) -> bool {
        !self.succeeded.is_empty() && !self.failed.is_empty()
    }

    /// Every attempted item failed (an empty batch is not a failure)
    pub fn all_failed(&self) -> bool {
        self.succeeded.is_empty() && !self.failed.is_empty()
    }

    /// `"N succeeded, M failed"` for workflow summaries
    pub fn summary(&self) -> String {
        format!(
            "{} succeeded, {} failed",
            self.succeeded.len(),
            self.failed.len()
        )
    }

    fn record<E: fmt::Display>(
        &mut self,
        index: usize,
        input: T,
        outcome: Result<R, E>,
    ) {
        match outcome {
            Ok(output) => self.succeeded.push(BatchItem {
                index,
                input,
                output,
            }),
            Err(e) => self.failed.push(BatchFailure {
                index,
                input,
                error: ErrorDetail::new(e.to_string()),
            }),
        }
    }
}

/// Cooperative cancellation flag, checked between sub-operations only; an
/// already-started sub-operation runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run one operation per item, sequentially, collecting every outcome.
///
/// Every item is attempted exactly once; no fail-fast.
pub async fn run_batch<T, R, E, F, Fut>(items: Vec<T>, op: F) -> BatchReport<T, R>
where
    T: Clone,
    E: fmt::Display,
    F: Fn(T) -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
{
    run_batch_cancellable(items, &CancelFlag::new(), op).await
}

/// Sequential batch run honoring a cancellation flag.
///
/// On cancellation, items not yet attempted are recorded as failures with a
/// cancellation message so the report still accounts for every input.
pub async fn run_batch_cancellable<T, R, E, F, Fut>(
    items: Vec<T>,
    cancel: &CancelFlag,
    op: F,
) -> BatchReport<T, R>
where
    T: Clone,
    E: fmt::Display,
    F: Fn(T) -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
{
    let mut report = BatchReport::default();

    for (index, input) in items.into_iter().enumerate() {
        if cancel.is_cancelled() {
            report.failed.push(BatchFailure {
                index,
                input,
                error: ErrorDetail::new("cancelled before this item was attempted"),
            });
            continue;
        }
        let outcome = op(input.clone()).await;
        report.record(index, input, outcome);
    }

    debug!("batch finished: {}", report.summary());
    report
}

/// Run one operation per item with bounded concurrency.
///
/// Results are collected by input index, so the report's ordering reflects
/// input order, never completion order.
pub async fn run_batch_concurrent<T, R, E, F, Fut>(
    items: Vec<T>,
    limit: usize,
    op: F,
) -> BatchReport<T, R>
where
    T: Clone,
    E: fmt::Display,
    F: Fn(T) -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
{
    let op = &op;
    let mut results: Vec<(usize, T, Result<R, E>)> =
        stream::iter(items.into_iter().enumerate())
            .map(|(index, input)| async move {
                let outcome = op(input.clone()).await;
                (index, input, outcome)
            })
            .buffer_unordered(limit.max(1))
            .collect()
            .await;

    results.sort_by_key(|(index, ..)| *index);

    let mut report = BatchReport::default();
    for (index, input, outcome) in results {
        report.record(index, input, outcome);
    }

    debug!("concurrent batch finished: {}", report.summary());
    report
}
