//! Copy definitions across sites with datasource remapping
//!
//! Walks or takes an explicit list of source definitions, rebuilds each
//! creation payload against the destination datasource, and creates them on
//! the destination site. One definition failing never stops its siblings; a
//! failed walk in "all" mode is fatal because a partial copy set would be
//! silently incomplete.

use std::sync::Arc;

use pulseops_api::{Paginator, Session};
use pulseops_core::{run_batch_cancellable, BatchReport, CancelFlag, IdentifierResolver};
use pulseops_http::HttpClientTrait;
use tracing::info;

use crate::config::{CopyDefinitionsConfig, DefinitionSelection};
use crate::error::WorkflowResult;
use crate::models::WorkflowOutcome;
use crate::payload;
use crate::state::{WorkflowPhase, WorkflowState};

/// Input definition id mapped to the id created on the destination
pub type CopyReport = BatchReport<String, String>;

pub struct CopyDefinitionsWorkflow {
    config: CopyDefinitionsConfig,
    cancel: CancelFlag,
}

impl CopyDefinitionsWorkflow {
    pub fn new(config: CopyDefinitionsConfig) -> WorkflowResult<Self> {
        config.validate()?;
        Ok(CopyDefinitionsWorkflow {
            config,
            cancel: CancelFlag::new(),
        })
    }

    /// Flag checked between definitions; the in-flight copy completes
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Sign in to both sites, run, and sign out
    pub async fn execute(
        self,
        client: Arc<dyn HttpClientTrait>,
    ) -> WorkflowResult<WorkflowOutcome<CopyReport>> {
        let source = Session::sign_in(&self.config.source, client.clone()).await?;
        let destination = match Session::sign_in(&self.config.destination, client).await {
            Ok(session) => session,
            Err(e) => {
                source.sign_out().await;
                return Err(e.into());
            }
        };
        let outcome = self.run(&source, &destination).await;
        source.sign_out().await;
        destination.sign_out().await;
        outcome
    }

    /// Run against already-authenticated sessions
    pub async fn run(
        &self,
        source: &Session,
        destination: &Session,
    ) -> WorkflowResult<WorkflowOutcome<CopyReport>> {
        let mut state = WorkflowState::new("copy-definitions");
        let paginator = Paginator::default();

        state.advance(WorkflowPhase::ResolvingIdentifiers);
        let mut source_resolver = IdentifierResolver::new(paginator);
        let mut destination_resolver = IdentifierResolver::new(paginator);
        let source_datasource = source_resolver
            .datasource_id_by_name(source, &self.config.source_datasource)
            .await?;
        let destination_datasource = destination_resolver
            .datasource_id_by_name(destination, &self.config.destination_datasource)
            .await?;

        let definition_ids = match &self.config.selection {
            DefinitionSelection::All => source
                .list_definitions(&paginator)
                .await?
                .into_iter()
                .filter(|d| d.datasource_id() == source_datasource && !d.metadata.id.is_empty())
                .map(|d| d.metadata.id)
                .collect(),
            DefinitionSelection::Ids(ids) => ids
                .iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect::<Vec<_>>(),
        };
        info!("copying {} definition(s)", definition_ids.len());

        state.advance(WorkflowPhase::Executing);
        let destination_datasource = destination_datasource.as_str();
        let report = run_batch_cancellable(definition_ids, &self.cancel, |id: String| async move {
            let definition = source.get_definition(&id).await?;
            let payload = payload::copy_payload(&definition, destination_datasource)
                .map_err(crate::error::WorkflowError::Validation)?;
            let created = destination.create_definition(payload).await?;
            Ok::<String, crate::error::WorkflowError>(created.metadata.id)
        })
        .await;
        state.record_attempts(report.total());

        state.advance(WorkflowPhase::Reporting);
        let summary = format!("copied definitions: {}", report.summary());
        state.advance(WorkflowPhase::Done);
        Ok(WorkflowOutcome::from_report(summary, report))
    }
}
