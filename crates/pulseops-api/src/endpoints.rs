//! Typed entity operations on a session
//!
//! One method per service operation the orchestration layer needs. Paginated
//! collections go through the walker; single-item CRUD unwraps the service's
//! response envelopes here so callers only ever see typed entities.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{ApiError, Result};
use crate::models::{
    Datasource, Definition, Group, Metric, MetricSpecification, PreferenceUpdate, Subscription,
    User,
};
use crate::pagination::{FetchError, PageScheme, Paginator};
use crate::session::Session;

impl Session {
    /// All datasources on the site
    pub async fn list_datasources(
        &self,
        paginator: &Paginator,
    ) -> std::result::Result<Vec<Datasource>, FetchError> {
        paginator
            .fetch_all_as(
                self,
                &self.rest_url("datasources"),
                PageScheme::Numbered {
                    group_key: "datasources",
                    item_key: "datasource",
                },
                &[],
            )
            .await
    }

    /// All users on the site
    pub async fn list_users(
        &self,
        paginator: &Paginator,
    ) -> std::result::Result<Vec<User>, FetchError> {
        paginator
            .fetch_all_as(
                self,
                &self.rest_url("users"),
                PageScheme::Numbered {
                    group_key: "users",
                    item_key: "user",
                },
                &[],
            )
            .await
    }

    /// All groups on the site
    pub async fn list_groups(
        &self,
        paginator: &Paginator,
    ) -> std::result::Result<Vec<Group>, FetchError> {
        paginator
            .fetch_all_as(
                self,
                &self.rest_url("groups"),
                PageScheme::Numbered {
                    group_key: "groups",
                    item_key: "group",
                },
                &[],
            )
            .await
    }

    /// Members of one group
    pub async fn list_group_members(
        &self,
        group_id: &str,
        paginator: &Paginator,
    ) -> std::result::Result<Vec<User>, FetchError> {
        paginator
            .fetch_all_as(
                self,
                &self.rest_url(&format!("groups/{group_id}/users")),
                PageScheme::Numbered {
                    group_key: "users",
                    item_key: "user",
                },
                &[],
            )
            .await
    }

    /// All metric definitions on the site
    pub async fn list_definitions(
        &self,
        paginator: &Paginator,
    ) -> std::result::Result<Vec<Definition>, FetchError> {
        paginator
            .fetch_all_as(
                self,
                &self.pulse_url("definitions"),
                PageScheme::Token {
                    items_key: "definitions",
                },
                &[],
            )
            .await
    }

    /// One definition by id
    pub async fn get_definition(&self, definition_id: &str) -> Result<Definition> {
        let body: Value = self
            .get(&self.pulse_url(&format!("definitions/{definition_id}")), &[])
            .await?;
        unwrap_entity(body, "definition")
    }

    /// Create a definition from a prebuilt payload, returning the created
    /// entity
    pub async fn create_definition(&self, payload: Value) -> Result<Definition> {
        let body: Value = self.post(&self.pulse_url("definitions"), payload).await?;
        unwrap_entity(body, "definition")
    }

    /// Set or clear a definition's certification flag
    pub async fn set_certification(&self, definition_id: &str, certified: bool) -> Result<()> {
        self.patch(
            &self.pulse_url(&format!("definitions/{definition_id}")),
            json!({"certification": {"is_certified": certified}}),
        )
        .await
    }

    /// All metrics under one definition
    pub async fn list_metrics(
        &self,
        definition_id: &str,
        paginator: &Paginator,
    ) -> std::result::Result<Vec<Metric>, FetchError> {
        paginator
            .fetch_all_as(
                self,
                &self.pulse_url(&format!("definitions/{definition_id}/metrics")),
                PageScheme::Token {
                    items_key: "metrics",
                },
                &[],
            )
            .await
    }

    /// One metric by id
    pub async fn get_metric(&self, metric_id: &str) -> Result<Metric> {
        let body: Value = self
            .get(&self.pulse_url(&format!("metrics/{metric_id}")), &[])
            .await?;
        unwrap_entity(body, "metric")
    }

    /// Create a metric under a definition, or fetch the existing one with
    /// the same specification (the service call is get-or-create)
    pub async fn create_metric(
        &self,
        definition_id: &str,
        specification: &MetricSpecification,
    ) -> Result<Metric> {
        let body: Value = self
            .post(
                &self.pulse_url("metrics:getOrCreate"),
                json!({
                    "definition_id": definition_id,
                    "specification": specification,
                }),
            )
            .await?;
        unwrap_entity(body, "metric")
    }

    /// All subscriptions for one metric
    pub async fn list_subscriptions(
        &self,
        metric_id: &str,
        paginator: &Paginator,
    ) -> std::result::Result<Vec<Subscription>, FetchError> {
        paginator
            .fetch_all_as(
                self,
                &self.pulse_url("subscriptions"),
                PageScheme::Token {
                    items_key: "subscriptions",
                },
                &[("metric_id", metric_id.to_string())],
            )
            .await
    }

    /// All subscriptions on the site
    pub async fn list_all_subscriptions(
        &self,
        paginator: &Paginator,
    ) -> std::result::Result<Vec<Subscription>, FetchError> {
        paginator
            .fetch_all_as(
                self,
                &self.pulse_url("subscriptions"),
                PageScheme::Token {
                    items_key: "subscriptions",
                },
                &[],
            )
            .await
    }

    /// Subscribe a user to a metric
    pub async fn add_follower(&self, metric_id: &str, user_id: &str) -> Result<Subscription> {
        self.post(
            &self.pulse_url("subscriptions"),
            json!({
                "metric_id": metric_id,
                "follower": {"user_id": user_id},
            }),
        )
        .await
    }

    /// Remove a subscription edge by id
    pub async fn remove_subscription(&self, subscription_id: &str) -> Result<()> {
        self.delete(&self.pulse_url(&format!("subscriptions/{subscription_id}")))
            .await
    }

    /// Replace a user's notification preferences
    pub async fn update_preferences(&self, update: &PreferenceUpdate) -> Result<()> {
        if update.is_empty() {
            return Err(ApiError::invalid_input("no preferences to update"));
        }
        self.patch(
            &self.pulse_url("user/preferences"),
            serde_json::to_value(update)?,
        )
        .await
    }
}

fn unwrap_entity<T: DeserializeOwned>(mut body: Value, key: &str) -> Result<T> {
    let inner = body
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| ApiError::malformed(format!("response missing `{key}` envelope")))?;
    Ok(serde_json::from_value(inner)?)
}
