//! Site-wide adoption analytics
//!
//! Pulls the full definition, metric, and subscription inventories and folds
//! them into totals plus top-N leaderboards. Read-only; any incomplete
//! retrieval is fatal because partial inventories would skew every count.

use std::sync::Arc;

use pulseops_api::{Metric, Paginator, Session};
use pulseops_core::{IdentifierResolver, SiteAnalytics};
use pulseops_http::HttpClientTrait;
use tracing::info;

use crate::config::SiteAnalyticsConfig;
use crate::error::WorkflowResult;
use crate::models::WorkflowOutcome;
use crate::state::{WorkflowPhase, WorkflowState};

pub struct SiteAnalyticsWorkflow {
    config: SiteAnalyticsConfig,
}

impl SiteAnalyticsWorkflow {
    pub fn new(config: SiteAnalyticsConfig) -> WorkflowResult<Self> {
        config.validate()?;
        Ok(SiteAnalyticsWorkflow { config })
    }

    pub async fn execute(
        self,
        client: Arc<dyn HttpClientTrait>,
    ) -> WorkflowResult<WorkflowOutcome<SiteAnalytics>> {
        let session = Session::sign_in(&self.config.site, client).await?;
        let outcome = self.run(&session).await;
        session.sign_out().await;
        outcome
    }

    pub async fn run(&self, session: &Session) -> WorkflowResult<WorkflowOutcome<SiteAnalytics>> {
        let mut state = WorkflowState::new("site-analytics");
        let paginator = Paginator::default();

        state.advance(WorkflowPhase::Executing);
        let definitions = session.list_definitions(&paginator).await?;
        let mut metrics: Vec<Metric> = Vec::new();
        for definition in &definitions {
            metrics.extend(
                session
                    .list_metrics(&definition.metadata.id, &paginator)
                    .await?,
            );
        }
        let subscriptions = session.list_all_subscriptions(&paginator).await?;
        let mut resolver = IdentifierResolver::new(paginator);
        let names = resolver.datasource_name_map(session).await;
        info!(
            definitions = definitions.len(),
            metrics = metrics.len(),
            subscriptions = subscriptions.len(),
            "computing site analytics"
        );

        state.advance(WorkflowPhase::Reporting);
        let analytics = SiteAnalytics::compute(&definitions, &metrics, &subscriptions, &names);
        let summary = format!(
            "{} definition(s), {} metric(s), {} subscription(s)",
            analytics.totals.definitions, analytics.totals.metrics, analytics.totals.subscriptions
        );
        state.advance(WorkflowPhase::Done);
        Ok(WorkflowOutcome::clean(summary, analytics))
    }
}
