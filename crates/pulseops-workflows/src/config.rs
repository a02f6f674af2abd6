//! Per-workflow configuration
//!
//! Each workflow is invoked with a struct enumerating exactly its required
//! fields. `validate()` runs before any remote call and turns a missing
//! field into a `WorkflowError::Validation` so a bad request never opens a
//! session.

use pulseops_api::{ChannelPreference, MetricGroupingPreferences, SiteConfig};
use pulseops_core::ExportMode;
use serde::{Deserialize, Serialize};

use crate::error::{WorkflowError, WorkflowResult};

/// Which definitions a copy run covers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionSelection {
    /// Walk the full definitions collection on the source site
    All,
    /// An explicit id list
    Ids(Vec<String>),
}

/// Whether a follower batch adds or removes edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowerAction {
    Add,
    Remove,
}

/// Copy definitions from one site to another, remapping the datasource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyDefinitionsConfig {
    pub source: SiteConfig,
    pub destination: SiteConfig,
    /// Datasource name on the source site; scopes the "all" selection
    pub source_datasource: String,
    /// Datasource name on the destination site; every copy points here
    pub destination_datasource: String,
    pub selection: DefinitionSelection,
}

impl CopyDefinitionsConfig {
    pub fn validate(&self) -> WorkflowResult<()> {
        require(&self.source.server_url, "source server_url")?;
        require(&self.destination.server_url, "destination server_url")?;
        require(&self.source_datasource, "source_datasource")?;
        require(&self.destination_datasource, "destination_datasource")?;
        if let DefinitionSelection::Ids(ids) = &self.selection {
            if ids.iter().all(|id| id.trim().is_empty()) {
                return Err(WorkflowError::validation(
                    "definition id list must not be empty",
                ));
            }
        }
        Ok(())
    }
}

/// Clone a definition onto a new datasource and migrate its metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapDatasourcesConfig {
    pub site: SiteConfig,
    pub definition_id: String,
    pub new_datasource_id: String,
    /// Strip followers from the old metrics after migration completes
    #[serde(default)]
    pub remove_old_followers: bool,
}

impl SwapDatasourcesConfig {
    pub fn validate(&self) -> WorkflowResult<()> {
        require(&self.site.server_url, "server_url")?;
        require(&self.definition_id, "definition_id")?;
        require(&self.new_datasource_id, "new_datasource_id")
    }
}

/// Add or remove followers across metrics × emails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManageFollowersConfig {
    pub site: SiteConfig,
    pub metric_ids: Vec<String>,
    pub emails: Vec<String>,
    pub action: FollowerAction,
}

impl ManageFollowersConfig {
    pub fn validate(&self) -> WorkflowResult<()> {
        require(&self.site.server_url, "server_url")?;
        if self.metric_ids.is_empty() {
            return Err(WorkflowError::validation("at least one metric id required"));
        }
        if self.emails.is_empty() {
            return Err(WorkflowError::validation("at least one email required"));
        }
        Ok(())
    }
}

/// Notification preference settings applied per user.
///
/// This is a full replace on the service side: anything left unset here
/// reverts to the service's documented default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferenceSettings {
    /// e.g. `CADENCE_DAILY`, `CADENCE_WEEKLY`
    #[serde(default)]
    pub cadence: Option<String>,
    #[serde(default)]
    pub channels: Vec<ChannelPreference>,
    #[serde(default)]
    pub grouping: Option<MetricGroupingPreferences>,
}

impl PreferenceSettings {
    pub fn is_empty(&self) -> bool {
        self.cadence.is_none() && self.channels.is_empty() && self.grouping.is_none()
    }
}

/// Replace notification preferences for a list of users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePreferencesConfig {
    pub site: SiteConfig,
    pub emails: Vec<String>,
    pub preferences: PreferenceSettings,
}

impl UpdatePreferencesConfig {
    pub fn validate(&self) -> WorkflowResult<()> {
        require(&self.site.server_url, "server_url")?;
        if self.emails.is_empty() {
            return Err(WorkflowError::validation("at least one email required"));
        }
        if self.preferences.is_empty() {
            return Err(WorkflowError::validation(
                "at least one preference field required",
            ));
        }
        Ok(())
    }
}

/// Audit certified definitions against a certifier group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificationAuditConfig {
    pub site: SiteConfig,
    /// Group whose members are the authorized certifiers; no group means no
    /// authorized/unauthorized partition
    #[serde(default)]
    pub group_name: Option<String>,
    /// Clear certification on the unauthorized subset
    #[serde(default)]
    pub remove_unauthorized: bool,
}

impl CertificationAuditConfig {
    pub fn validate(&self) -> WorkflowResult<()> {
        require(&self.site.server_url, "server_url")?;
        if self.remove_unauthorized && self.group_name.as_deref().unwrap_or("").trim().is_empty() {
            return Err(WorkflowError::validation(
                "certification removal requires a group name",
            ));
        }
        Ok(())
    }
}

/// One fan-out row: a dimension value-set plus followers for the new metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopedMetricRow {
    /// Values forming a single multi-value equality on the fan-out dimension
    pub values: Vec<String>,
    /// Follower emails subscribed to the created metric
    #[serde(default)]
    pub followers: Vec<String>,
}

/// The two fan-out input modes; both reduce to rows downstream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopedMetricsInput {
    /// Structured rows with per-row followers
    Rows(Vec<ScopedMetricRow>),
    /// Bare single values, no followers
    Values(Vec<String>),
}

impl ScopedMetricsInput {
    /// Normalize either mode to rows
    pub fn into_rows(self) -> Vec<ScopedMetricRow> {
        match self {
            ScopedMetricsInput::Rows(rows) => rows,
            ScopedMetricsInput::Values(values) => values
                .into_iter()
                .map(|value| ScopedMetricRow {
                    values: vec![value],
                    followers: Vec::new(),
                })
                .collect(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            ScopedMetricsInput::Rows(rows) => rows.is_empty(),
            ScopedMetricsInput::Values(values) => values.is_empty(),
        }
    }
}

/// Fan a source metric out across dimension value-sets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopedMetricsConfig {
    pub site: SiteConfig,
    pub source_metric_id: String,
    /// Dimension field the fan-out scopes on
    pub dimension: String,
    pub input: ScopedMetricsInput,
}

impl ScopedMetricsConfig {
    pub fn validate(&self) -> WorkflowResult<()> {
        require(&self.site.server_url, "server_url")?;
        require(&self.source_metric_id, "source_metric_id")?;
        require(&self.dimension, "dimension")?;
        if self.input.is_empty() {
            return Err(WorkflowError::validation("at least one row required"));
        }
        Ok(())
    }
}

/// Export every definition as a flat table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDefinitionsConfig {
    pub site: SiteConfig,
    pub mode: ExportMode,
}

impl ExportDefinitionsConfig {
    pub fn validate(&self) -> WorkflowResult<()> {
        require(&self.site.server_url, "server_url")
    }
}

/// Compute site-wide analytics rankings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteAnalyticsConfig {
    pub site: SiteConfig,
}

impl SiteAnalyticsConfig {
    pub fn validate(&self) -> WorkflowResult<()> {
        require(&self.site.server_url, "server_url")
    }
}

fn require(value: &str, field: &str) -> WorkflowResult<()> {
    if value.trim().is_empty() {
        Err(WorkflowError::Validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulseops_api::Credentials;

    fn site() -> SiteConfig {
        SiteConfig::new(
            "https://tableau.example.com",
            "mysite",
            Credentials::PersonalAccessToken {
                name: "admin".to_string(),
                secret: "s3cret".to_string(),
            },
        )
    }

    #[test]
    fn empty_id_list_fails_validation() {
        let config = CopyDefinitionsConfig {
            source: site(),
            destination: site(),
            source_datasource: "Sales".to_string(),
            destination_datasource: "Sales".to_string(),
            selection: DefinitionSelection::Ids(vec!["  ".to_string()]),
        };
        assert!(matches!(
            config.validate(),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn removal_without_group_fails_validation() {
        let config = CertificationAuditConfig {
            site: site(),
            group_name: None,
            remove_unauthorized: true,
        };
        assert!(config.validate().is_err());

        let audit_only = CertificationAuditConfig {
            site: site(),
            group_name: None,
            remove_unauthorized: false,
        };
        assert!(audit_only.validate().is_ok());
    }

    #[test]
    fn bare_values_normalize_to_single_value_rows() {
        let input = ScopedMetricsInput::Values(vec!["East".to_string(), "West".to_string()]);
        let rows = input.into_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values, vec!["East"]);
        assert!(rows[0].followers.is_empty());
    }

    #[test]
    fn empty_preferences_fail_validation() {
        let config = UpdatePreferencesConfig {
            site: site(),
            emails: vec!["a@example.com".to_string()],
            preferences: PreferenceSettings::default(),
        };
        assert!(config.validate().is_err());
    }
}
