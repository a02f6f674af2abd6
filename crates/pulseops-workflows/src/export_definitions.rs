//! Definition export
//!
//! Walks every definition on the site, resolves datasource ids to display
//! names, and projects the result into a flat table ready for CSV output.

use std::sync::Arc;

use pulseops_api::{Paginator, Session};
use pulseops_core::{export_definitions, ExportTable, IdentifierResolver};
use pulseops_http::HttpClientTrait;
use tracing::info;

use crate::config::ExportDefinitionsConfig;
use crate::error::WorkflowResult;
use crate::models::WorkflowOutcome;
use crate::state::{WorkflowPhase, WorkflowState};

pub struct ExportDefinitionsWorkflow {
    config: ExportDefinitionsConfig,
}

impl ExportDefinitionsWorkflow {
    pub fn new(config: ExportDefinitionsConfig) -> WorkflowResult<Self> {
        config.validate()?;
        Ok(ExportDefinitionsWorkflow { config })
    }

    pub async fn execute(
        self,
        client: Arc<dyn HttpClientTrait>,
    ) -> WorkflowResult<WorkflowOutcome<ExportTable>> {
        let session = Session::sign_in(&self.config.site, client).await?;
        let outcome = self.run(&session).await;
        session.sign_out().await;
        outcome
    }

    pub async fn run(&self, session: &Session) -> WorkflowResult<WorkflowOutcome<ExportTable>> {
        let mut state = WorkflowState::new("export-definitions");
        let paginator = Paginator::default();

        state.advance(WorkflowPhase::Executing);
        // A partial retrieval would silently truncate the export, so any
        // pagination failure is fatal here
        let definitions = session.list_definitions(&paginator).await?;
        let mut resolver = IdentifierResolver::new(paginator);
        let names = resolver.datasource_name_map(session).await;
        info!(count = definitions.len(), "exporting definitions");

        state.advance(WorkflowPhase::Reporting);
        let table = export_definitions(&definitions, &names, self.config.mode);
        let summary = format!("exported {} definition(s)", table.rows.len());
        state.advance(WorkflowPhase::Done);
        Ok(WorkflowOutcome::clean(summary, table))
    }
}
