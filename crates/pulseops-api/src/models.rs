//! Typed entity models
//!
//! Shapes follow the service's JSON payloads. Fields this system only
//! passes through (measure specs, representation options, comparisons) stay
//! as raw `serde_json::Value` so copies are byte-faithful; fields the
//! orchestration logic inspects (filters, certification, datasource id) are
//! fully typed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entity metadata common to definitions and metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Opaque service id
    #[serde(default)]
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
}

/// Reference to a datasource by id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasourceRef {
    pub id: String,
}

/// A single dimension filter clause (dimension + operator + values)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterClause {
    /// Dimension field name
    pub field: String,
    /// Comparison operator (e.g. `OPERATOR_EQUAL`)
    pub operator: String,
    /// Filter values; a multi-value equality carries all values here
    pub values: Vec<String>,
}

impl FilterClause {
    /// Multi-value equality over one dimension
    pub fn equals(field: impl Into<String>, values: Vec<String>) -> Self {
        FilterClause {
            field: field.into(),
            operator: "OPERATOR_EQUAL".to_string(),
            values,
        }
    }
}

/// The queryable half of a definition specification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasicSpecification {
    /// Measure spec; opaque passthrough
    #[serde(default)]
    pub measure: Value,
    /// Time-dimension spec; opaque passthrough
    #[serde(default)]
    pub time_dimension: Value,
    /// Dimension filters
    #[serde(default)]
    pub filters: Vec<FilterClause>,
}

/// Definition specification: either a basic spec or an opaque viz-state spec
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Specification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_specification: Option<BasicSpecification>,
    /// Present when the definition was derived from a visualization; its
    /// measure/filter internals are not independently queryable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viz_state_specification: Option<Value>,
    #[serde(default)]
    pub is_running_total: bool,
    #[serde(default)]
    pub datasource: DatasourceRef,
}

impl Specification {
    /// Whether this spec is viz-state (measure/filters opaque)
    pub fn is_viz_state(&self) -> bool {
        self.viz_state_specification.is_some()
    }
}

/// Certification status of a definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Certification {
    #[serde(default)]
    pub is_certified: bool,
    /// User id of the certifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A named metric template
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definition {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub specification: Specification,
    #[serde(default)]
    pub extension_options: Value,
    #[serde(default)]
    pub representation_options: Value,
    #[serde(default)]
    pub insights_options: Value,
    #[serde(default)]
    pub comparisons: Value,
    #[serde(default)]
    pub datasource_goals: Value,
    #[serde(default)]
    pub related_links: Value,
    #[serde(default)]
    pub certification: Certification,
}

impl Definition {
    /// Datasource this definition reads from
    pub fn datasource_id(&self) -> &str {
        &self.specification.datasource.id
    }
}

/// Scope specification of a metric: filters over its parent definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricSpecification {
    #[serde(default)]
    pub filters: Vec<FilterClause>,
    /// Measurement period and other passthrough fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// An instantiation of a definition scoped by dimension filters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metric {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub definition_id: String,
    #[serde(default)]
    pub specification: MetricSpecification,
    /// The service creates one default metric per definition
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub metadata: Metadata,
}

/// The followed end of a subscription edge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Follower {
    pub user_id: String,
}

/// A (user, metric) subscription edge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub metric_id: String,
    pub follower: Follower,
}

/// A site user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub site_role: String,
    #[serde(default)]
    pub full_name: String,
}

/// A named membership group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A published datasource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Datasource {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Delivery-channel preference (channel + status)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPreference {
    /// e.g. `DELIVERY_CHANNEL_EMAIL`, `DELIVERY_CHANNEL_SLACK`
    pub channel: String,
    /// e.g. `CHANNEL_STATUS_ENABLED`
    pub status: String,
}

/// Metric grouping/sort preferences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricGroupingPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
}

/// Full-replace preference update payload.
///
/// Omitted fields fall back to the service's documented defaults; this is a
/// replace, not a merge. `user_id` is set only when updating a user other
/// than the authenticated one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadence: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channel_preferences_request: Vec<ChannelPreference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_grouping_preferences: Option<MetricGroupingPreferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl PreferenceUpdate {
    /// Whether the update carries anything to send
    pub fn is_empty(&self) -> bool {
        self.cadence.is_none()
            && self.channel_preferences_request.is_empty()
            && self.metric_grouping_preferences.is_none()
    }
}
