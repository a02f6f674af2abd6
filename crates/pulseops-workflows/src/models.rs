//! Workflow boundary types
//!
//! `WorkflowOutcome` is what every orchestrator hands back to its caller. It
//! deliberately separates "ran clean", "ran with item failures" (partial),
//! and the fatal "could not start" case, which never produces an outcome at
//! all and surfaces as a `WorkflowError` instead.

use pulseops_core::BatchReport;

/// Structured result of a workflow that reached `Done` through execution
#[derive(Debug, Clone)]
pub struct WorkflowOutcome<R> {
    /// Every sub-operation succeeded
    pub success: bool,
    /// Some sub-operations succeeded and some failed
    pub partial: bool,
    /// Human-readable one-line result
    pub summary: String,
    /// Workflow-specific detail, usually carrying a `BatchReport`
    pub detail: R,
}

impl<R> WorkflowOutcome<R> {
    /// Outcome of a workflow with no per-item failure mode
    pub fn clean(summary: impl Into<String>, detail: R) -> Self {
        WorkflowOutcome {
            success: true,
            partial: false,
            summary: summary.into(),
            detail,
        }
    }

}

impl<T, O> WorkflowOutcome<BatchReport<T, O>> {
    /// Derive success/partial flags from the report itself
    pub fn from_report(summary: impl Into<String>, report: BatchReport<T, O>) -> Self {
        WorkflowOutcome {
            success: report.failed.is_empty(),
            partial: report.is_partial(),
            summary: summary.into(),
            detail: report,
        }
    }
}
