//! Flat tabular projection of metric definitions
//!
//! Turns walked definitions into ordered rows ready for CSV serialization.
//! Viz-state definitions keep their measure, time dimension, and filters
//! opaque on the service, so those columns carry a sentinel marker instead of
//! a value that would pretend to be queryable.

use std::collections::HashMap;

use pulseops_api::Definition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder written for columns a viz-state definition cannot expose
pub const VIZ_STATE_PLACEHOLDER: &str = "[viz-state]";

/// Which field projection to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    /// Identity, datasource, measure, and certification columns
    Basic,
    /// Everything in `Basic` plus running-total, viz-state, certifier, and
    /// datasource-id columns
    Verbose,
}

/// An ordered header row plus data rows, one per definition
#[derive(Debug, Clone)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    /// Serialize the table as CSV
    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Project definitions into a flat table, preserving input order.
///
/// `datasource_names` maps datasource ids to display names; unresolvable ids
/// are emitted as the id itself rather than failing the export.
pub fn export_definitions(
    definitions: &[Definition],
    datasource_names: &HashMap<String, String>,
    mode: ExportMode,
) -> ExportTable {
    let mut headers = vec![
        "ID".to_string(),
        "Name".to_string(),
        "Datasource".to_string(),
        "Measure".to_string(),
        "Time Dimension".to_string(),
        "Filters".to_string(),
        "Certified".to_string(),
    ];
    if mode == ExportMode::Verbose {
        headers.extend(
            [
                "Running Total",
                "Viz State",
                "Certified By",
                "Certified At",
                "Datasource ID",
            ]
            .map(String::from),
        );
    }

    let rows = definitions
        .iter()
        .map(|d| {
            let ds_id = d.datasource_id();
            let ds_name = datasource_names
                .get(ds_id)
                .cloned()
                .unwrap_or_else(|| ds_id.to_string());

            let (measure, time_dimension, filters) = if d.specification.is_viz_state() {
                (
                    VIZ_STATE_PLACEHOLDER.to_string(),
                    VIZ_STATE_PLACEHOLDER.to_string(),
                    VIZ_STATE_PLACEHOLDER.to_string(),
                )
            } else {
                match &d.specification.basic_specification {
                    Some(basic) => (
                        compact_value(&basic.measure),
                        compact_value(&basic.time_dimension),
                        basic
                            .filters
                            .iter()
                            .map(|f| format!("{}={}", f.field, f.values.join("|")))
                            .collect::<Vec<_>>()
                            .join("; "),
                    ),
                    None => (String::new(), String::new(), String::new()),
                }
            };

            let mut row = vec![
                d.metadata.id.clone(),
                d.metadata.name.clone(),
                ds_name,
                measure,
                time_dimension,
                filters,
                yes_no(d.certification.is_certified),
            ];
            if mode == ExportMode::Verbose {
                row.push(yes_no(d.specification.is_running_total));
                row.push(yes_no(d.specification.is_viz_state()));
                row.push(d.certification.modified_by.clone().unwrap_or_default());
                row.push(
                    d.certification
                        .modified_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_default(),
                );
                row.push(ds_id.to_string());
            }
            row
        })
        .collect();

    ExportTable { headers, rows }
}

fn yes_no(flag: bool) -> String {
    if flag { "Yes" } else { "No" }.to_string()
}

/// Render a passthrough JSON field compactly: bare strings lose their quotes,
/// structured values serialize whole, absent values go blank.
fn compact_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pulseops_api::{
        BasicSpecification, Certification, DatasourceRef, FilterClause, Metadata, Specification,
    };
    use serde_json::json;

    fn basic_definition() -> Definition {
        Definition {
            metadata: Metadata {
                id: "d-1".to_string(),
                name: "Revenue".to_string(),
            },
            specification: Specification {
                basic_specification: Some(BasicSpecification {
                    measure: json!({"field": "sales", "aggregation": "AGGREGATION_SUM"}),
                    time_dimension: json!({"field": "order_date"}),
                    filters: vec![FilterClause::equals("region", vec!["US".to_string()])],
                }),
                is_running_total: true,
                datasource: DatasourceRef {
                    id: "ds-1".to_string(),
                },
                ..Specification::default()
            },
            certification: Certification {
                is_certified: true,
                modified_by: Some("u-9".to_string()),
                modified_at: Some(Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap()),
                note: None,
            },
            ..Definition::default()
        }
    }

    fn viz_state_definition() -> Definition {
        Definition {
            metadata: Metadata {
                id: "d-2".to_string(),
                name: "Dashboard KPI".to_string(),
            },
            specification: Specification {
                viz_state_specification: Some(json!({"viz_state_string": "opaque"})),
                datasource: DatasourceRef {
                    id: "ds-2".to_string(),
                },
                ..Specification::default()
            },
            ..Definition::default()
        }
    }

    #[test]
    fn basic_projection_flattens_measure_and_filters() {
        let names = HashMap::from([("ds-1".to_string(), "Warehouse".to_string())]);
        let table = export_definitions(&[basic_definition()], &names, ExportMode::Basic);

        assert_eq!(table.headers.len(), 7);
        let row = &table.rows[0];
        assert_eq!(row[0], "d-1");
        assert_eq!(row[2], "Warehouse");
        assert!(row[3].contains("AGGREGATION_SUM"));
        assert!(row[4].contains("order_date"));
        assert_eq!(row[5], "region=US");
        assert_eq!(row[6], "Yes");
    }

    #[test]
    fn viz_state_columns_carry_the_placeholder_in_both_modes() {
        let names = HashMap::new();
        for mode in [ExportMode::Basic, ExportMode::Verbose] {
            let table = export_definitions(&[viz_state_definition()], &names, mode);
            let row = &table.rows[0];
            assert_eq!(row[3], VIZ_STATE_PLACEHOLDER);
            assert_eq!(row[4], VIZ_STATE_PLACEHOLDER);
            assert_eq!(row[5], VIZ_STATE_PLACEHOLDER);
            // Identity columns stay populated
            assert_eq!(row[0], "d-2");
            assert_eq!(row[1], "Dashboard KPI");
        }
    }

    #[test]
    fn verbose_adds_certifier_and_datasource_id() {
        let names = HashMap::new();
        let table = export_definitions(&[basic_definition()], &names, ExportMode::Verbose);

        assert_eq!(table.headers.len(), 12);
        let row = &table.rows[0];
        assert_eq!(row[7], "Yes"); // running total
        assert_eq!(row[8], "No"); // viz state
        assert_eq!(row[9], "u-9");
        assert!(row[10].starts_with("2025-03-14"));
        assert_eq!(row[11], "ds-1");
        // Unresolvable datasource ids fall back to the id
        assert_eq!(row[2], "ds-1");
    }

    #[test]
    fn rows_preserve_input_order() {
        let names = HashMap::new();
        let table = export_definitions(
            &[viz_state_definition(), basic_definition()],
            &names,
            ExportMode::Basic,
        );
        let ids: Vec<&str> = table.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["d-2", "d-1"]);
    }

    #[test]
    fn csv_output_quotes_and_terminates_rows() {
        let names = HashMap::new();
        let mut def = basic_definition();
        def.metadata.name = "Revenue, net".to_string();
        let csv = export_definitions(&[def], &names, ExportMode::Basic)
            .to_csv()
            .unwrap();

        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ID,Name,Datasource,Measure,Time Dimension,Filters,Certified"
        );
        assert!(lines.next().unwrap().contains("\"Revenue, net\""));
    }
}
