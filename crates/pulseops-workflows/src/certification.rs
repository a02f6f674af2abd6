//! Certification audit with optional enforcement
//!
//! Walks every definition, partitions the certified ones by whether their
//! certifier belongs to the authorized group, and optionally clears the
//! unauthorized certifications. The partition is exact: a certified
//! definition is unauthorized iff its certifier id is not in the group's
//! member set, and the two subsets together are exactly the certified set.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pulseops_api::{Paginator, Session};
use pulseops_core::{run_batch_cancellable, BatchReport, CancelFlag, IdentifierResolver};
use pulseops_http::HttpClientTrait;
use serde::Serialize;
use tracing::info;

use crate::config::CertificationAuditConfig;
use crate::error::WorkflowResult;
use crate::models::WorkflowOutcome;
use crate::state::{WorkflowPhase, WorkflowState};

/// One certified definition and its audit classification
#[derive(Debug, Clone, Serialize)]
pub struct CertifiedDefinition {
    pub id: String,
    pub name: String,
    pub certified_by: Option<String>,
    pub certified_at: Option<DateTime<Utc>>,
    /// `None` when no group filter was active
    pub authorized: Option<bool>,
}

/// Full audit result, produced whether or not removal was requested
#[derive(Debug)]
pub struct CertificationAudit {
    pub total_definitions: usize,
    pub certified: Vec<CertifiedDefinition>,
    pub authorized_ids: Vec<String>,
    pub unauthorized_ids: Vec<String>,
    /// Per-definition outcome of certification removal, when requested
    pub removal: Option<BatchReport<String, ()>>,
}

pub struct CertificationAuditWorkflow {
    config: CertificationAuditConfig,
    cancel: CancelFlag,
}

impl CertificationAuditWorkflow {
    pub fn new(config: CertificationAuditConfig) -> WorkflowResult<Self> {
        config.validate()?;
        Ok(CertificationAuditWorkflow {
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
    ) -> WorkflowResult<WorkflowOutcome<CertificationAudit>> {
        let session = Session::sign_in(&self.config.site, client).await?;
        let outcome = self.run(&session).await;
        session.sign_out().await;
        outcome
    }

    pub async fn run(
        &self,
        session: &Session,
    ) -> WorkflowResult<WorkflowOutcome<CertificationAudit>> {
        let mut state = WorkflowState::new("certification-audit");
        let paginator = Paginator::default();

        state.advance(WorkflowPhase::ResolvingIdentifiers);
        // The group is a required identifier when named; resolved lazily so
        // an audit without a group filter never walks the group directory
        let mut resolver = IdentifierResolver::new(paginator);
        let member_ids = match self.config.group_name.as_deref().filter(|g| !g.is_empty()) {
            Some(group_name) => {
                let group_id = resolver.group_id_by_name(session, group_name).await?;
                Some(resolver.group_member_ids(session, &group_id).await?)
            }
            None => None,
        };

        // Partial analytics over certification would be misleading, so a
        // failed walk is fatal
        let definitions = session.list_definitions(&paginator).await?;
        let total_definitions = definitions.len();

        let certified: Vec<CertifiedDefinition> = definitions
            .into_iter()
            .filter(|d| d.certification.is_certified)
            .map(|d| {
                let authorized = member_ids.as_ref().map(|members| {
                    d.certification
                        .modified_by
                        .as_deref()
                        .is_some_and(|certifier| members.contains(certifier))
                });
                CertifiedDefinition {
                    id: d.metadata.id,
                    name: d.metadata.name,
                    certified_by: d.certification.modified_by,
                    certified_at: d.certification.modified_at,
                    authorized,
                }
            })
            .collect();

        let authorized_ids: Vec<String> = certified
            .iter()
            .filter(|c| c.authorized == Some(true))
            .map(|c| c.id.clone())
            .collect();
        let unauthorized_ids: Vec<String> = certified
            .iter()
            .filter(|c| c.authorized == Some(false))
            .map(|c| c.id.clone())
            .collect();
        info!(
            "{} certified, {} authorized, {} unauthorized",
            certified.len(),
            authorized_ids.len(),
            unauthorized_ids.len()
        );

        state.advance(WorkflowPhase::Executing);
        let removal = if self.config.remove_unauthorized {
            let report =
                run_batch_cancellable(unauthorized_ids.clone(), &self.cancel, |id: String| async move {
                    session.set_certification(&id, false).await
                })
                .await;
            state.record_attempts(report.total());
            Some(report)
        } else {
            None
        };

        state.advance(WorkflowPhase::Reporting);
        let summary = match &removal {
            Some(report) => format!(
                "{} certified, {} unauthorized, removal: {}",
                certified.len(),
                unauthorized_ids.len(),
                report.summary()
            ),
            None => format!(
                "{} of {} definitions certified",
                certified.len(),
                total_definitions
            ),
        };

        let clean = removal.as_ref().map_or(true, |r| r.failed.is_empty());
        let partial = removal.as_ref().is_some_and(|r| r.is_partial());
        let audit = CertificationAudit {
            total_definitions,
            certified,
            authorized_ids,
            unauthorized_ids,
            removal,
        };
        state.advance(WorkflowPhase::Done);
        Ok(WorkflowOutcome {
            success: clean,
            partial,
            summary,
            detail: audit,
        })
    }
}
