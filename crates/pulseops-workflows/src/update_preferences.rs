//! Bulk notification-preference replacement
//!
//! Resolves each email once, then replaces the preference record per user.
//! The service treats the payload as a full replace, so the same settings go
//! to every user; `user_id` rides along only when the target is not the
//! authenticated user, matching the service's addressing rules.

use std::collections::HashMap;
use std::sync::Arc;

use pulseops_api::{Paginator, PreferenceUpdate, Session};
use pulseops_core::{run_batch_cancellable, BatchReport, CancelFlag, IdentifierResolver};
use pulseops_http::HttpClientTrait;
use tracing::info;

use crate::config::UpdatePreferencesConfig;
use crate::error::WorkflowResult;
use crate::models::WorkflowOutcome;
use crate::state::{WorkflowPhase, WorkflowState};

/// Email mapped to the user id whose preferences were replaced
pub type PreferencesReport = BatchReport<String, String>;

pub struct UpdatePreferencesWorkflow {
    config: UpdatePreferencesConfig,
    cancel: CancelFlag,
}

impl UpdatePreferencesWorkflow {
    pub fn new(config: UpdatePreferencesConfig) -> WorkflowResult<Self> {
        config.validate()?;
        Ok(UpdatePreferencesWorkflow {
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
    ) -> WorkflowResult<WorkflowOutcome<PreferencesReport>> {
        let session = Session::sign_in(&self.config.site, client).await?;
        let outcome = self.run(&session).await;
        session.sign_out().await;
        outcome
    }

    pub async fn run(
        &self,
        session: &Session,
    ) -> WorkflowResult<WorkflowOutcome<PreferencesReport>> {
        let mut state = WorkflowState::new("update-preferences");
        let paginator = Paginator::default();

        state.advance(WorkflowPhase::ResolvingIdentifiers);
        let mut resolver = IdentifierResolver::new(paginator);
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
        info!("updating preferences for {} user(s)", resolved.len());

        state.advance(WorkflowPhase::Executing);
        let resolved = &resolved;
        let settings = &self.config.preferences;
        let emails = self.config.emails.clone();
        let report = run_batch_cancellable(emails, &self.cancel, |email: String| async move {
            let user_id = resolved
                .get(&email)
                .cloned()
                .unwrap_or_else(|| Err("email not in batch input".to_string()))?;

            let update = PreferenceUpdate {
                cadence: settings.cadence.clone(),
                channel_preferences_request: settings.channels.clone(),
                metric_grouping_preferences: settings.grouping.clone(),
                // The service infers the authenticated user; an explicit id
                // is only for targeting someone else
                user_id: (user_id != session.user_id()).then(|| user_id.clone()),
            };
            session
                .update_preferences(&update)
                .await
                .map_err(|e| e.to_string())?;
            Ok::<String, String>(user_id)
        })
        .await;
        state.record_attempts(report.total());

        state.advance(WorkflowPhase::Reporting);
        let summary = format!("preference updates: {}", report.summary());
        state.advance(WorkflowPhase::Done);
        Ok(WorkflowOutcome::from_report(summary, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreferenceSettings;
    use pulseops_api::{ChannelPreference, Credentials, SiteConfig};
    use pulseops_http::{HttpClient, HttpConfig};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session_for(server: &MockServer) -> Session {
        let client: Arc<dyn HttpClientTrait> =
            Arc::new(HttpClient::new(HttpConfig::fast()).unwrap());
        Session::from_parts(client, server.uri(), "3.24", "tok", "site-1", "u-me")
    }

    fn config(emails: Vec<&str>) -> UpdatePreferencesConfig {
        UpdatePreferencesConfig {
            site: SiteConfig::new(
                "https://unused.example.com",
                "",
                Credentials::Password {
                    username: "admin".to_string(),
                    password: "pw".to_string(),
                },
            ),
            emails: emails.into_iter().map(String::from).collect(),
            preferences: PreferenceSettings {
                cadence: Some("CADENCE_WEEKLY".to_string()),
                channels: vec![ChannelPreference {
                    channel: "DELIVERY_CHANNEL_EMAIL".to_string(),
                    status: "CHANNEL_STATUS_ENABLED".to_string(),
                }],
                grouping: None,
            },
        }
    }

    async fn mount_users(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/3.24/sites/site-1/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": {"user": [
                    {"id": "u-me", "name": "me", "email": "me@example.com"},
                    {"id": "u-other", "name": "other", "email": "other@example.com"}
                ]},
                "pagination": {"totalAvailable": "2"}
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn other_users_get_an_explicit_user_id() {
        let server = MockServer::start().await;
        mount_users(&server).await;
        Mock::given(method("PATCH"))
            .and(path("/api/-/pulse/user/preferences"))
            .and(body_partial_json(json!({
                "cadence": "CADENCE_WEEKLY",
                "user_id": "u-other"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let session = session_for(&server);
        let workflow =
            UpdatePreferencesWorkflow::new(config(vec!["other@example.com"])).unwrap();
        let outcome = workflow.run(&session).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.detail.succeeded[0].output, "u-other");
    }

    #[tokio::test]
    async fn the_authenticated_user_is_addressed_implicitly() {
        let server = MockServer::start().await;
        mount_users(&server).await;
        // The payload for the session's own user must omit user_id entirely
        Mock::given(method("PATCH"))
            .and(path("/api/-/pulse/user/preferences"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let session = session_for(&server);
        let workflow = UpdatePreferencesWorkflow::new(config(vec!["me@example.com"])).unwrap();
        let outcome = workflow.run(&session).await.unwrap();

        assert!(outcome.success);
        let requests = server.received_requests().await.unwrap();
        let patch = requests
            .iter()
            .find(|r| r.method.to_string() == "PATCH")
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&patch.body).unwrap();
        assert!(body.get("user_id").is_none());
    }

    #[tokio::test]
    async fn unknown_email_is_a_partial_failure() {
        let server = MockServer::start().await;
        mount_users(&server).await;
        Mock::given(method("PATCH"))
            .and(path("/api/-/pulse/user/preferences"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let session = session_for(&server);
        let workflow = UpdatePreferencesWorkflow::new(config(vec![
            "other@example.com",
            "ghost@example.com",
        ]))
        .unwrap();
        let outcome = workflow.run(&session).await.unwrap();

        assert!(outcome.partial);
        assert_eq!(outcome.detail.succeeded.len(), 1);
        assert_eq!(outcome.detail.failed[0].input, "ghost@example.com");
    }
}
