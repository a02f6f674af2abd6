//! Workflow phase tracking
//!
//! Every orchestrator moves through the same phase sequence:
//! `Configuring -> ResolvingIdentifiers -> Executing -> Reporting -> Done`.
//! `Done` is always reached. A fatal precondition (failed authentication,
//! unresolvable required identifier, invalid configuration) jumps straight
//! to `Done` with zero items attempted; partial sub-failures never do.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Phases of one workflow execution, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Configuring,
    ResolvingIdentifiers,
    Executing,
    Reporting,
    Done,
}

/// Execution state of one workflow invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Workflow name, e.g. `copy-definitions`
    pub workflow: String,
    pub phase: WorkflowPhase,
    /// Sub-operations attempted so far
    pub attempted: usize,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(workflow: impl Into<String>) -> Self {
        let now = Utc::now();
        WorkflowState {
            workflow: workflow.into(),
            phase: WorkflowPhase::Configuring,
            attempted: 0,
            started_at: now,
            updated_at: now,
        }
    }

    /// Move to a later phase; earlier phases are never re-entered
    pub fn advance(&mut self, phase: WorkflowPhase) {
        debug_assert!(phase >= self.phase, "workflow phases only move forward");
        if phase != self.phase {
            debug!(workflow = %self.workflow, from = ?self.phase, to = ?phase, "phase change");
        }
        self.phase = phase;
        self.updated_at = Utc::now();
    }

    /// Record attempted sub-operations
    pub fn record_attempts(&mut self, count: usize) {
        self.attempted += count;
        self.updated_at = Utc::now();
    }

    /// Terminal jump taken on a fatal precondition, before anything ran
    pub fn abort(&mut self) {
        debug!(workflow = %self.workflow, from = ?self.phase, "aborted with {} attempted", self.attempted);
        self.phase = WorkflowPhase::Done;
        self.updated_at = Utc::now();
    }

    pub fn is_done(&self) -> bool {
        self.phase == WorkflowPhase::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_order_forward() {
        assert!(WorkflowPhase::Configuring < WorkflowPhase::ResolvingIdentifiers);
        assert!(WorkflowPhase::ResolvingIdentifiers < WorkflowPhase::Executing);
        assert!(WorkflowPhase::Executing < WorkflowPhase::Reporting);
        assert!(WorkflowPhase::Reporting < WorkflowPhase::Done);
    }

    #[test]
    fn advance_walks_the_sequence() {
        let mut state = WorkflowState::new("copy-definitions");
        assert_eq!(state.phase, WorkflowPhase::Configuring);

        state.advance(WorkflowPhase::ResolvingIdentifiers);
        state.advance(WorkflowPhase::Executing);
        state.record_attempts(5);
        state.advance(WorkflowPhase::Reporting);
        state.advance(WorkflowPhase::Done);

        assert!(state.is_done());
        assert_eq!(state.attempted, 5);
    }

    #[test]
    fn abort_jumps_to_done_with_zero_attempted() {
        let mut state = WorkflowState::new("swap-datasources");
        state.abort();
        assert!(state.is_done());
        assert_eq!(state.attempted, 0);
    }
}
