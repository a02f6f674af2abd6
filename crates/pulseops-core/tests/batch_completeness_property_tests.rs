//! Property-based tests for bulk batch execution
//!
//! Every batch of N inputs must account for all N exactly once, and the
//! succeeded/failed partitions merged back by original index must
//! reconstruct the input order, sequentially and concurrently alike.

use proptest::prelude::*;
use pulseops_core::{run_batch, run_batch_concurrent, BatchReport};

fn run<F, Fut>(f: F) -> Fut::Output
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(f())
}

/// Each input either succeeds (even) or fails (odd), deterministically.
/// Generators keep inputs below 10_000 so the times-ten output cannot
/// overflow in debug builds.
async fn parity_op(value: u32) -> Result<u32, String> {
    if value % 2 == 0 {
        Ok(value * 10)
    } else {
        Err(format!("odd input {value}"))
    }
}

fn assert_complete(inputs: &[u32], report: &BatchReport<u32, u32>) -> Result<(), TestCaseError> {
    prop_assert_eq!(
        report.succeeded.len() + report.failed.len(),
        inputs.len(),
        "every input accounted for exactly once"
    );

    let mut merged: Vec<(usize, u32)> = report
        .succeeded
        .iter()
        .map(|item| (item.index, item.input))
        .chain(report.failed.iter().map(|item| (item.index, item.input)))
        .collect();
    merged.sort_by_key(|(index, _)| *index);

    let reconstructed: Vec<u32> = merged.into_iter().map(|(_, input)| input).collect();
    prop_assert_eq!(&reconstructed, inputs, "merged partitions rebuild input order");
    Ok(())
}

#[test]
fn prop_sequential_batch_is_complete_and_ordered() {
    proptest!(|(inputs in prop::collection::vec(0u32..10_000, 0..64))| {
        let report = run(|| run_batch(inputs.clone(), parity_op));
        assert_complete(&inputs, &report)?;

        for item in &report.succeeded {
            prop_assert_eq!(item.output, item.input * 10);
        }
        for failure in &report.failed {
            prop_assert!(failure.input % 2 == 1);
        }
    });
}

#[test]
fn prop_concurrent_batch_matches_sequential_partition() {
    proptest!(|(
        inputs in prop::collection::vec(0u32..10_000, 0..64),
        limit in 1usize..8,
    )| {
        let concurrent = run(|| run_batch_concurrent(inputs.clone(), limit, parity_op));
        assert_complete(&inputs, &concurrent)?;

        let sequential = run(|| run_batch(inputs.clone(), parity_op));
        let concurrent_indices: Vec<usize> =
            concurrent.succeeded.iter().map(|item| item.index).collect();
        let sequential_indices: Vec<usize> =
            sequential.succeeded.iter().map(|item| item.index).collect();
        prop_assert_eq!(concurrent_indices, sequential_indices);
    });
}

#[test]
fn prop_partial_flag_reflects_failures() {
    proptest!(|(inputs in prop::collection::vec(0u32..10_000, 1..64))| {
        let report = run(|| run_batch(inputs.clone(), parity_op));
        let has_odd = inputs.iter().any(|v| v % 2 == 1);
        let has_even = inputs.iter().any(|v| v % 2 == 0);

        prop_assert_eq!(report.is_partial(), has_odd && has_even);
        prop_assert_eq!(report.all_failed(), !has_even);
    });
}
