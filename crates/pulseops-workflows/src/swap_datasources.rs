//! Clone a definition onto a new datasource and migrate its metrics
//!
//! The old definition is never mutated: a `_copy` clone is created against
//! the new datasource, every non-default metric is recreated under it with
//! its filter specification intact, and each follower is re-subscribed to
//! the new metric. Only after a metric's clone and follower copies are fully
//! done does the optional cleanup strip followers from the old metrics, so a
//! partial failure never leaves a follower subscribed to neither side.

use std::sync::Arc;

use pulseops_api::{Metric, Paginator, Session};
use pulseops_core::{run_batch, run_batch_cancellable, BatchReport, CancelFlag};
use pulseops_http::HttpClientTrait;
use tracing::{info, warn};

use crate::config::SwapDatasourcesConfig;
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::WorkflowOutcome;
use crate::payload;
use crate::state::{WorkflowPhase, WorkflowState};

/// One migrated metric
#[derive(Debug, Clone)]
pub struct SwappedMetric {
    pub new_metric_id: String,
    pub followers_copied: usize,
    pub follower_failures: usize,
}

/// Full result of one swap run
#[derive(Debug)]
pub struct SwapReport {
    pub new_definition_id: String,
    pub new_definition_name: String,
    /// Old metric mapped to its migrated counterpart
    pub metrics: BatchReport<Metric, SwappedMetric>,
    /// Default metrics are recreated by the service itself, so they skip
    pub skipped_default: usize,
    pub followers_copied: usize,
    pub follower_failures: usize,
    pub followers_removed: usize,
    pub cleanup_failures: usize,
}

pub struct SwapDatasourcesWorkflow {
    config: SwapDatasourcesConfig,
    cancel: CancelFlag,
}

impl SwapDatasourcesWorkflow {
    pub fn new(config: SwapDatasourcesConfig) -> WorkflowResult<Self> {
        config.validate()?;
        Ok(SwapDatasourcesWorkflow {
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
    ) -> WorkflowResult<WorkflowOutcome<SwapReport>> {
        let session = Session::sign_in(&self.config.site, client).await?;
        let outcome = self.run(&session).await;
        session.sign_out().await;
        outcome
    }

    pub async fn run(&self, session: &Session) -> WorkflowResult<WorkflowOutcome<SwapReport>> {
        let mut state = WorkflowState::new("swap-datasources");
        let paginator = Paginator::default();

        state.advance(WorkflowPhase::ResolvingIdentifiers);
        // The source definition is a required identifier; failure here is fatal
        let old_definition = session.get_definition(&self.config.definition_id).await?;

        state.advance(WorkflowPhase::Executing);
        let payload = payload::swap_payload(&old_definition, &self.config.new_datasource_id)
            .map_err(WorkflowError::Validation)?;
        let new_definition = session.create_definition(payload).await?;
        let new_definition_id = new_definition.metadata.id.clone();
        info!(
            "created definition {} ({})",
            new_definition.metadata.name, new_definition_id
        );

        let old_metrics = session
            .list_metrics(&self.config.definition_id, &paginator)
            .await?;
        let (defaults, to_migrate): (Vec<Metric>, Vec<Metric>) =
            old_metrics.iter().cloned().partition(|m| m.is_default);
        let skipped_default = defaults.len();

        let new_definition_ref = new_definition_id.as_str();
        let metrics = run_batch_cancellable(to_migrate, &self.cancel, |metric: Metric| async move {
            let created = session
                .create_metric(new_definition_ref, &metric.specification)
                .await?;

            let subscriptions = session
                .list_subscriptions(&metric.id, &paginator)
                .await
                .map_err(WorkflowError::Fetch)?;
            let follower_ids: Vec<String> = subscriptions
                .into_iter()
                .map(|sub| sub.follower.user_id)
                .collect();

            let new_metric_id = created.id;
            let followers = run_batch(follower_ids, |user_id: String| {
                let new_metric_id = new_metric_id.clone();
                async move {
                    session
                        .add_follower(&new_metric_id, &user_id)
                        .await
                        .map(|_| ())
                }
            })
            .await;

            Ok::<SwappedMetric, WorkflowError>(SwappedMetric {
                new_metric_id,
                followers_copied: followers.succeeded.len(),
                follower_failures: followers.failed.len(),
            })
        })
        .await;
        state.record_attempts(metrics.total());

        let followers_copied: usize = metrics
            .succeeded
            .iter()
            .map(|m| m.output.followers_copied)
            .sum();
        let follower_failures: usize = metrics
            .succeeded
            .iter()
            .map(|m| m.output.follower_failures)
            .sum();

        // Cleanup runs strictly after migration so no follower can end up
        // subscribed to neither the old nor the new metric
        let mut followers_removed = 0usize;
        let mut cleanup_failures = 0usize;
        if self.config.remove_old_followers {
            for metric in &old_metrics {
                if metric.id.is_empty() {
                    continue;
                }
                match session.list_subscriptions(&metric.id, &paginator).await {
                    Ok(subscriptions) => {
                        for subscription in subscriptions {
                            match session.remove_subscription(&subscription.id).await {
                                Ok(()) => followers_removed += 1,
                                Err(e) => {
                                    warn!("failed to remove subscription {}: {e}", subscription.id);
                                    cleanup_failures += 1;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!("failed to list followers of metric {}: {e}", metric.id);
                        cleanup_failures += 1;
                    }
                }
            }
        }

        state.advance(WorkflowPhase::Reporting);
        let summary = format!(
            "created definition {} with {} metric(s) and {} follower(s)",
            new_definition.metadata.name,
            metrics.succeeded.len(),
            followers_copied
        );
        let clean = metrics.failed.is_empty() && follower_failures == 0 && cleanup_failures == 0;
        let attempted_any = !metrics.succeeded.is_empty() || followers_copied > 0;
        let report = SwapReport {
            new_definition_id,
            new_definition_name: new_definition.metadata.name,
            metrics,
            skipped_default,
            followers_copied,
            follower_failures,
            followers_removed,
            cleanup_failures,
        };
        state.advance(WorkflowPhase::Done);
        Ok(WorkflowOutcome {
            success: clean,
            partial: !clean && attempted_any,
            summary,
            detail: report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulseops_api::{Credentials, SiteConfig};
    use pulseops_http::{HttpClient, HttpConfig};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session_for(server: &MockServer) -> Session {
        let client: Arc<dyn HttpClientTrait> =
            Arc::new(HttpClient::new(HttpConfig::fast()).unwrap());
        Session::from_parts(client, server.uri(), "3.24", "tok", "site-1", "user-1")
    }

    fn config(remove_old_followers: bool) -> SwapDatasourcesConfig {
        SwapDatasourcesConfig {
            site: SiteConfig::new(
                "https://unused.example.com",
                "",
                Credentials::Password {
                    username: "admin".to_string(),
                    password: "pw".to_string(),
                },
            ),
            definition_id: "d-old".to_string(),
            new_datasource_id: "ds-b".to_string(),
            remove_old_followers,
        }
    }

    async fn mount_swap_fixture(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/-/pulse/definitions/d-old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "definition": {
                    "metadata": {"id": "d-old", "name": "Revenue"},
                    "specification": {
                        "basic_specification": {
                            "measure": {"field": "sales"},
                            "time_dimension": {"field": "order_date"}
                        },
                        "datasource": {"id": "ds-a"}
                    }
                }
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/-/pulse/definitions"))
            .and(body_partial_json(json!({
                "name": "Revenue_copy",
                "specification": {"datasource": {"id": "ds-b"}}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "definition": {
                    "metadata": {"id": "d-new", "name": "Revenue_copy"},
                    "specification": {"datasource": {"id": "ds-b"}}
                }
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/-/pulse/definitions/d-old/metrics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "metrics": [
                    {"id": "m-default", "definition_id": "d-old", "is_default": true},
                    {
                        "id": "m-1",
                        "definition_id": "d-old",
                        "specification": {"filters": [
                            {"field": "region", "operator": "OPERATOR_EQUAL", "values": ["US"]}
                        ]}
                    }
                ]
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/-/pulse/metrics:getOrCreate"))
            .and(body_partial_json(json!({"definition_id": "d-new"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "metric": {"id": "m-2", "definition_id": "d-new"}
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/-/pulse/subscriptions"))
            .and(query_param("metric_id", "m-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "subscriptions": [
                    {"id": "s-1", "metric_id": "m-1", "follower": {"user_id": "u-1"}},
                    {"id": "s-2", "metric_id": "m-1", "follower": {"user_id": "u-2"}}
                ]
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/-/pulse/subscriptions"))
            .and(body_partial_json(json!({"metric_id": "m-2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "s-new", "metric_id": "m-2", "follower": {"user_id": "u-1"}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn migrates_metrics_and_followers_skipping_the_default() {
        let server = MockServer::start().await;
        mount_swap_fixture(&server).await;

        let session = session_for(&server);
        let workflow = SwapDatasourcesWorkflow::new(config(false)).unwrap();
        let outcome = workflow.run(&session).await.unwrap();

        assert!(outcome.success);
        let report = outcome.detail;
        assert_eq!(report.new_definition_id, "d-new");
        assert_eq!(report.skipped_default, 1);
        assert_eq!(report.metrics.succeeded.len(), 1);
        assert_eq!(report.metrics.succeeded[0].output.new_metric_id, "m-2");
        assert_eq!(report.followers_copied, 2);
        assert_eq!(report.followers_removed, 0);
    }

    #[tokio::test]
    async fn cleanup_removes_old_followers_after_migration() {
        let server = MockServer::start().await;
        mount_swap_fixture(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/-/pulse/subscriptions"))
            .and(query_param("metric_id", "m-default"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "subscriptions": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/-/pulse/subscriptions/s-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/-/pulse/subscriptions/s-2"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let session = session_for(&server);
        let workflow = SwapDatasourcesWorkflow::new(config(true)).unwrap();
        let outcome = workflow.run(&session).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.detail.followers_copied, 2);
        assert_eq!(outcome.detail.followers_removed, 2);
        assert_eq!(outcome.detail.cleanup_failures, 0);
    }

    #[tokio::test]
    async fn missing_source_definition_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/-/pulse/definitions/d-old"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let session = session_for(&server);
        let workflow = SwapDatasourcesWorkflow::new(config(false)).unwrap();
        assert!(workflow.run(&session).await.is_err());
    }
}
