//! Bulk administration workflows for PulseOps
//!
//! Each workflow is a self-contained orchestration: it validates its config
//! up front, resolves human-friendly identifiers to ids, drives the
//! operation through an explicit phase sequence, and reports a
//! [`models::WorkflowOutcome`] that keeps "could not start" (an `Err`)
//! apart from "ran with per-item failures" (an `Ok` with `partial` set).
//!
//! Workflows expose two entry points: `execute` owns the session lifecycle
//! (sign-in, run, sign-out), while `run` takes a pre-built [`Session`] so
//! callers can pool sessions across workflows.
//!
//! [`Session`]: pulseops_api::Session

pub mod certification;
pub mod config;
pub mod copy_definitions;
pub mod error;
pub mod export_definitions;
pub mod manage_followers;
pub mod models;
pub mod payload;
pub mod scoped_metrics;
pub mod site_analytics;
pub mod state;
pub mod swap_datasources;
pub mod update_preferences;

pub use certification::{CertificationAudit, CertificationAuditWorkflow, CertifiedDefinition};
pub use config::{
    CertificationAuditConfig, CopyDefinitionsConfig, DefinitionSelection, ExportDefinitionsConfig,
    FollowerAction, ManageFollowersConfig, PreferenceSettings, ScopedMetricRow,
    ScopedMetricsConfig, ScopedMetricsInput, SiteAnalyticsConfig, SwapDatasourcesConfig,
    UpdatePreferencesConfig,
};
pub use copy_definitions::{CopyDefinitionsWorkflow, CopyReport};
pub use error::{WorkflowError, WorkflowResult};
pub use export_definitions::ExportDefinitionsWorkflow;
pub use manage_followers::{EdgeOutcome, FollowerEdge, FollowerReport, ManageFollowersWorkflow};
pub use models::WorkflowOutcome;
pub use scoped_metrics::{ScopedMetricCreated, ScopedMetricsReport, ScopedMetricsWorkflow};
pub use site_analytics::SiteAnalyticsWorkflow;
pub use state::{WorkflowPhase, WorkflowState};
pub use swap_datasources::{SwapDatasourcesWorkflow, SwapReport, SwappedMetric};
pub use update_preferences::{PreferencesReport, UpdatePreferencesWorkflow};
