//! Site-wide ranked summaries over walked entity collections
//!
//! Pure aggregation: callers fetch the complete definition, metric, and
//! subscription collections first, then compute here. Partial collections
//! would produce misleading rankings, so a failed walk is fatal upstream and
//! never reaches this module.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use pulseops_api::{Definition, Metric, Subscription};

/// How many entries each ranking keeps
pub const TOP_N: usize = 10;

/// Flat totals for a site
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteTotals {
    pub definitions: usize,
    pub metrics: usize,
    pub subscriptions: usize,
    /// Distinct by user id, not subscription count
    pub distinct_followers: usize,
    pub certified_definitions: usize,
    /// Distinct datasources referenced by at least one definition
    pub datasources: usize,
}

/// One row of the top-metrics ranking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRank {
    pub metric_id: String,
    pub metric_name: String,
    pub definition_id: String,
    pub followers: usize,
}

/// One row of the top-definitions ranking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionRank {
    pub definition_id: String,
    pub definition_name: String,
    pub metric_count: usize,
    /// Sum of follower counts across the definition's child metrics
    pub followers: usize,
}

/// One row of the top-datasources ranking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasourceRank {
    pub datasource_id: String,
    pub datasource_name: String,
    pub definition_count: usize,
    pub metric_count: usize,
    pub followers: usize,
}

/// Ranked summaries and totals for one site
#[derive(Debug, Clone, Default)]
pub struct SiteAnalytics {
    pub totals: SiteTotals,
    pub top_metrics: Vec<MetricRank>,
    pub top_definitions: Vec<DefinitionRank>,
    pub top_datasources: Vec<DatasourceRank>,
}

impl SiteAnalytics {
    /// Compute totals and top-N rankings in one pass per collection.
    ///
    /// `datasource_names` maps datasource ids to display names; ids with no
    /// entry are reported by id. Ranking ties break by ascending id so output
    /// is deterministic.
    pub fn compute(
        definitions: &[Definition],
        metrics: &[Metric],
        subscriptions: &[Subscription],
        datasource_names: &HashMap<String, String>,
    ) -> SiteAnalytics {
        // Follower count per metric from the subscription edges
        let mut followers_by_metric: HashMap<&str, usize> = HashMap::new();
        let mut distinct_followers: HashSet<&str> = HashSet::new();
        for sub in subscriptions {
            *followers_by_metric.entry(sub.metric_id.as_str()).or_insert(0) += 1;
            distinct_followers.insert(sub.follower.user_id.as_str());
        }

        let mut top_metrics: Vec<MetricRank> = metrics
            .iter()
            .map(|m| MetricRank {
                metric_id: m.id.clone(),
                metric_name: m.metadata.name.clone(),
                definition_id: m.definition_id.clone(),
                followers: followers_by_metric.get(m.id.as_str()).copied().unwrap_or(0),
            })
            .collect();
        top_metrics.sort_by(|a, b| {
            Reverse(a.followers)
                .cmp(&Reverse(b.followers))
                .then_with(|| a.metric_id.cmp(&b.metric_id))
        });
        top_metrics.truncate(TOP_N);

        // Roll metric followers up to the parent definition
        let mut metrics_by_definition: HashMap<&str, (usize, usize)> = HashMap::new();
        for m in metrics {
            let followers = followers_by_metric.get(m.id.as_str()).copied().unwrap_or(0);
            let entry = metrics_by_definition
                .entry(m.definition_id.as_str())
                .or_insert((0, 0));
            entry.0 += 1;
            entry.1 += followers;
        }

        let mut top_definitions: Vec<DefinitionRank> = definitions
            .iter()
            .map(|d| {
                let (metric_count, followers) = metrics_by_definition
                    .get(d.metadata.id.as_str())
                    .copied()
                    .unwrap_or((0, 0));
                DefinitionRank {
                    definition_id: d.metadata.id.clone(),
                    definition_name: d.metadata.name.clone(),
                    metric_count,
                    followers,
                }
            })
            .collect();
        top_definitions.sort_by(|a, b| {
            Reverse(a.followers)
                .cmp(&Reverse(b.followers))
                .then_with(|| a.definition_id.cmp(&b.definition_id))
        });
        top_definitions.truncate(TOP_N);

        // Roll definition aggregates up to the datasource they read from
        let mut by_datasource: HashMap<&str, DatasourceRank> = HashMap::new();
        for d in definitions {
            let ds_id = d.datasource_id();
            if ds_id.is_empty() {
                continue;
            }
            let (metric_count, followers) = metrics_by_definition
                .get(d.metadata.id.as_str())
                .copied()
                .unwrap_or((0, 0));
            let entry = by_datasource.entry(ds_id).or_insert_with(|| DatasourceRank {
                datasource_id: ds_id.to_string(),
                datasource_name: datasource_names
                    .get(ds_id)
                    .cloned()
                    .unwrap_or_else(|| ds_id.to_string()),
                definition_count: 0,
                metric_count: 0,
                followers: 0,
            });
            entry.definition_count += 1;
            entry.metric_count += metric_count;
            entry.followers += followers;
        }

        let datasource_total = by_datasource.len();
        let mut top_datasources: Vec<DatasourceRank> = by_datasource.into_values().collect();
        top_datasources.sort_by(|a, b| {
            Reverse(a.followers)
                .cmp(&Reverse(b.followers))
                .then_with(|| a.datasource_id.cmp(&b.datasource_id))
        });
        top_datasources.truncate(TOP_N);

        SiteAnalytics {
            totals: SiteTotals {
                definitions: definitions.len(),
                metrics: metrics.len(),
                subscriptions: subscriptions.len(),
                distinct_followers: distinct_followers.len(),
                certified_definitions: definitions
                    .iter()
                    .filter(|d| d.certification.is_certified)
                    .count(),
                datasources: datasource_total,
            },
            top_metrics,
            top_definitions,
            top_datasources,
        }
    }
}
