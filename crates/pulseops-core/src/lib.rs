//! Orchestration primitives for PulseOps
//!
//! The pieces every workflow is built from:
//!
//! - **Identifier resolution** with request-scoped memoization
//!   ([`resolver::IdentifierResolver`])
//! - **Bulk execution** that never lets one item's failure abort the batch
//!   ([`batch`])
//! - **Analytics aggregation** over walked site collections
//!   ([`analytics::SiteAnalytics`])
//! - **Flat export projection** of definitions ([`export`])

pub mod analytics;
pub mod batch;
pub mod export;
pub mod resolver;

pub use analytics::{DatasourceRank, DefinitionRank, MetricRank, SiteAnalytics, SiteTotals, TOP_N};
pub use batch::{
    run_batch, run_batch_cancellable, run_batch_concurrent, BatchFailure, BatchItem, BatchReport,
    CancelFlag, ErrorDetail,
};
pub use export::{export_definitions, ExportMode, ExportTable, VIZ_STATE_PLACEHOLDER};
pub use resolver::{IdentifierResolver, ResolveError};
