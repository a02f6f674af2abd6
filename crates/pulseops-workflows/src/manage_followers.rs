//! Bulk follower add/remove across metrics × emails
//!
//! Every email resolves to a user id once; the batch then covers the
//! cartesian product of metric ids and emails. The subscription edge is
//! idempotent in both directions: adding an existing edge and removing an
//! absent one are recorded as successful no-ops, never as errors.

use std::collections::HashMap;
use std::sync::Arc;

use pulseops_api::{Paginator, Session};
use pulseops_core::{run_batch_cancellable, BatchReport, CancelFlag, IdentifierResolver};
use pulseops_http::HttpClientTrait;
use serde::Serialize;
use tracing::info;

use crate::config::{FollowerAction, ManageFollowersConfig};
use crate::error::WorkflowResult;
use crate::models::WorkflowOutcome;
use crate::state::{WorkflowPhase, WorkflowState};

/// One (metric, email) edge in the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowerEdge {
    pub metric_id: String,
    pub email: String,
}

/// What happened to one edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeOutcome {
    Added,
    /// Add requested but the edge already existed; a no-op success
    AlreadyFollowing,
    Removed,
    /// Remove requested but no edge existed; tolerated
    NotFollowing,
}

pub type FollowerReport = BatchReport<FollowerEdge, EdgeOutcome>;

pub struct ManageFollowersWorkflow {
    config: ManageFollowersConfig,
    cancel: CancelFlag,
}

impl ManageFollowersWorkflow {
    pub fn new(config: ManageFollowersConfig) -> WorkflowResult<Self> {
        config.validate()?;
        Ok(ManageFollowersWorkflow {
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
    ) -> WorkflowResult<WorkflowOutcome<FollowerReport>> {
        let session = Session::sign_in(&self.config.site, client).await?;
        let outcome = self.run(&session).await;
        session.sign_out().await;
        outcome
    }

    pub async fn run(&self, session: &Session) -> WorkflowResult<WorkflowOutcome<FollowerReport>> {
        let mut state = WorkflowState::new("manage-followers");
        let paginator = Paginator::default();

        state.advance(WorkflowPhase::ResolvingIdentifiers);
        let mut resolver = IdentifierResolver::new(paginator);
        // One lookup per distinct email; failures become per-edge failures,
        // never fatal while other emails resolve
        let mut resolved: HashMap<String, Result<String, String>> = HashMap::new();
        for email in &self.config.emails {
            if resolved.contains_key(email) {
                continue;
            }
            let result = resolver
                .user_id_by_email(session, email)
                .await
                .map_err(|e| e.to_string());
            resolved.insert(email.clone(), result);
        }

        // Current followers per metric, for idempotence and for finding the
        // subscription id a removal needs
        let mut existing: HashMap<String, Result<HashMap<String, String>, String>> = HashMap::new();
        for metric_id in &self.config.metric_ids {
            if existing.contains_key(metric_id) {
                continue;
            }
            let result = session
                .list_subscriptions(metric_id, &paginator)
                .await
                .map(|subs| {
                    subs.into_iter()
                        .map(|sub| (sub.follower.user_id, sub.id))
                        .collect::<HashMap<_, _>>()
                })
                .map_err(|e| e.to_string());
            existing.insert(metric_id.clone(), result);
        }

        let edges: Vec<FollowerEdge> = self
            .config
            .metric_ids
            .iter()
            .flat_map(|metric_id| {
                self.config.emails.iter().map(move |email| FollowerEdge {
                    metric_id: metric_id.clone(),
                    email: email.clone(),
                })
            })
            .collect();
        info!(
            "managing {} follower edge(s) ({:?})",
            edges.len(),
            self.config.action
        );

        state.advance(WorkflowPhase::Executing);
        let action = self.config.action;
        let resolved = &resolved;
        let existing = &existing;
        let report = run_batch_cancellable(edges, &self.cancel, |edge: FollowerEdge| async move {
            let user_id = resolved
                .get(&edge.email)
                .cloned()
                .unwrap_or_else(|| Err("email not in batch input".to_string()))?;
            let followers = existing
                .get(&edge.metric_id)
                .ok_or_else(|| "metric not in batch input".to_string())?
                .as_ref()
                .map_err(|e| e.clone())?;

            match action {
                FollowerAction::Add => {
                    if followers.contains_key(&user_id) {
                        Ok::<EdgeOutcome, String>(EdgeOutcome::AlreadyFollowing)
                    } else {
                        session
                            .add_follower(&edge.metric_id, &user_id)
                            .await
                            .map_err(|e| e.to_string())?;
                        Ok(EdgeOutcome::Added)
                    }
                }
                FollowerAction::Remove => match followers.get(&user_id) {
                    Some(subscription_id) => {
                        session
                            .remove_subscription(subscription_id)
                            .await
                            .map_err(|e| e.to_string())?;
                        Ok(EdgeOutcome::Removed)
                    }
                    None => Ok(EdgeOutcome::NotFollowing),
                },
            }
        })
        .await;
        state.record_attempts(report.total());

        state.advance(WorkflowPhase::Reporting);
        let summary = format!("follower edges: {}", report.summary());
        state.advance(WorkflowPhase::Done);
        Ok(WorkflowOutcome::from_report(summary, report))
    }
}
