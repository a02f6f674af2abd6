//! Scoped-metric fan-out
//!
//! Reads the source metric's filter specification once, then creates one
//! metric per input row with filters = source filters plus a single
//! multi-value equality on the fan-out dimension. Each created metric gets
//! the row's followers through a nested batch, so one bad follower email
//! never blocks the metric creation it rides on.

use std::collections::HashMap;
use std::sync::Arc;

use pulseops_api::{FilterClause, MetricSpecification, Paginator, Session};
use pulseops_core::{run_batch, run_batch_cancellable, BatchReport, CancelFlag, IdentifierResolver};
use pulseops_http::HttpClientTrait;
use tracing::info;

use crate::config::{ScopedMetricRow, ScopedMetricsConfig};
use crate::error::WorkflowResult;
use crate::models::WorkflowOutcome;
use crate::state::{WorkflowPhase, WorkflowState};

/// One created metric and its follower batch
#[derive(Debug)]
pub struct ScopedMetricCreated {
    pub metric_id: String,
    /// Follower email mapped to the subscription outcome
    pub followers: BatchReport<String, ()>,
}

pub type ScopedMetricsReport = BatchReport<ScopedMetricRow, ScopedMetricCreated>;

pub struct ScopedMetricsWorkflow {
    config: ScopedMetricsConfig,
    cancel: CancelFlag,
}

impl ScopedMetricsWorkflow {
    pub fn new(config: ScopedMetricsConfig) -> WorkflowResult<Self> {
        config.validate()?;
        Ok(ScopedMetricsWorkflow {
            config,
            cancel: CancelFlag::new(),
        })
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub async fn execute(
        self,
        client: Arc<dyn HttpClientTrait>,
    ) -> WorkflowResult<WorkflowOutcome<ScopedMetricsReport>> {
        let session = Session::sign_in(&self.config.site, client).await?;
        let outcome = self.run(&session).await;
        session.sign_out().await;
        outcome
    }

    pub async fn run(
        &self,
        session: &Session,
    ) -> WorkflowResult<WorkflowOutcome<ScopedMetricsReport>> {
        let mut state = WorkflowState::new("scoped-metrics");
        let paginator = Paginator::default();

        state.advance(WorkflowPhase::ResolvingIdentifiers);
        // The source metric is required; without its specification there is
        // nothing to fan out
        let source = session.get_metric(&self.config.source_metric_id).await?;
        let rows = self.config.input.clone().into_rows();

        let mut resolver = IdentifierResolver::new(paginator);
        let mut resolved: HashMap<String, Result<String, String>> = HashMap::new();
        for email in rows.iter().flat_map(|row| row.followers.iter()) {
            if resolved.contains_key(email) {
                continue;
            }
            let result = resolver
                .user_id_by_email(session, email)
                .await
                .map_err(|e| e.to_string());
            resolved.insert(email.clone(), result);
        }
        info!("fanning out {} row(s) on {}", rows.len(), self.config.dimension);

        state.advance(WorkflowPhase::Executing);
        let source = &source;
        let resolved = &resolved;
        let dimension = self.config.dimension.as_str();
        let report = run_batch_cancellable(rows, &self.cancel, |row: ScopedMetricRow| async move {
            let mut filters = source.specification.filters.clone();
            filters.push(FilterClause::equals(dimension, row.values.clone()));
            let specification = MetricSpecification {
                filters,
                extra: source.specification.extra.clone(),
            };

            let created = session
                .create_metric(&source.definition_id, &specification)
                .await
                .map_err(|e| e.to_string())?;

            let metric_id = created.id;
            let followers = run_batch(row.followers.clone(), |email: String| {
                let metric_id = metric_id.clone();
                async move {
                    let user_id = resolved
                        .get(&email)
                        .cloned()
                        .unwrap_or_else(|| Err("email not in batch input".to_string()))?;
                    session
                        .add_follower(&metric_id, &user_id)
                        .await
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                }
            })
            .await;

            Ok::<ScopedMetricCreated, String>(ScopedMetricCreated {
                metric_id,
                followers,
            })
        })
        .await;
        state.record_attempts(report.total());

        let follower_failures: usize = report
            .succeeded
            .iter()
            .map(|item| item.output.followers.failed.len())
            .sum();

        state.advance(WorkflowPhase::Reporting);
        let summary = format!("scoped metrics: {}", report.summary());
        let clean = report.failed.is_empty() && follower_failures == 0;
        let partial = !clean && !report.succeeded.is_empty();
        state.advance(WorkflowPhase::Done);
        Ok(WorkflowOutcome {
            success: clean,
            partial,
            summary,
            detail: report,
        })
    }
}
