//! Definition payload builders for copy and swap
//!
//! The service rejects creation payloads that echo read-side quirks back at
//! it: comparison indexes arrive as strings but must be posted as integers,
//! a structured `viz_state_string` must be re-serialized to a string, and a
//! copy never carries the source's certification. Both builders normalize
//! those here so the orchestrators just post what they get back.

use pulseops_api::Definition;
use serde_json::{json, Map, Value};

/// Build a creation payload copying `definition` onto another site's
/// datasource. Certification is always reset; the destination decides anew.
pub fn copy_payload(definition: &Definition, datasource_id: &str) -> Result<Value, String> {
    let spec = build_specification(definition, datasource_id)?;

    Ok(json!({
        "name": definition.metadata.name,
        "specification": spec,
        "extension_options": normalized_extension_options(&definition.extension_options),
        "representation_options": defaulted(
            &definition.representation_options,
            json!({"type": "NUMBER_FORMAT_TYPE_NUMBER", "sentiment_type": "SENTIMENT_TYPE_NONE"}),
        ),
        "insights_options": defaulted(
            &definition.insights_options,
            json!({"show_insights": true, "settings": []}),
        ),
        "comparisons": {"comparisons": normalized_comparisons(&definition.comparisons)},
        "datasource_goals": defaulted(&definition.datasource_goals, json!([])),
        "related_links": defaulted(&definition.related_links, json!([])),
        "certification": {"is_certified": false},
    }))
}

/// Build a same-site clone payload pointing at a new datasource.
///
/// The clone gets a `_copy` suffix so the two definitions stay
/// distinguishable while both exist.
pub fn swap_payload(definition: &Definition, datasource_id: &str) -> Result<Value, String> {
    let spec = build_specification(definition, datasource_id)?;

    Ok(json!({
        "name": format!("{}_copy", definition.metadata.name),
        "specification": spec,
        "extension_options": defaulted(&definition.extension_options, json!({})),
        "representation_options": defaulted(&definition.representation_options, json!({})),
        "insights_options": defaulted(&definition.insights_options, json!({})),
        "comparisons": defaulted(&definition.comparisons, json!({})),
        "datasource_goals": defaulted(&definition.datasource_goals, json!([])),
        "related_links": defaulted(&definition.related_links, json!([])),
        "certification": {"is_certified": false},
    }))
}

fn build_specification(definition: &Definition, datasource_id: &str) -> Result<Value, String> {
    let source = &definition.specification;
    let mut spec = Map::new();

    if let Some(basic) = &source.basic_specification {
        spec.insert(
            "basic_specification".to_string(),
            serde_json::to_value(basic).map_err(|e| e.to_string())?,
        );
    } else if let Some(viz) = &source.viz_state_specification {
        let mut viz = viz.clone();
        // The read side may expand viz_state_string into an object; the
        // write side only accepts the serialized form
        if let Some(state) = viz.get("viz_state_string") {
            if state.is_object() {
                let serialized = state.to_string();
                viz["viz_state_string"] = Value::String(serialized);
            }
        }
        spec.insert("viz_state_specification".to_string(), viz);
    } else {
        return Err("no recognizable specification in source definition".to_string());
    }

    spec.insert(
        "is_running_total".to_string(),
        Value::Bool(source.is_running_total),
    );
    spec.insert(
        "datasource".to_string(),
        json!({"id": datasource_id}),
    );
    Ok(Value::Object(spec))
}

/// Comparison indexes come back as strings; creation wants integers
fn normalized_comparisons(comparisons: &Value) -> Vec<Value> {
    let list = comparisons
        .get("comparisons")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    list.into_iter()
        .map(|mut comp| {
            let index = comp.get("index").and_then(|v| match v {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse::<i64>().ok(),
                _ => None,
            });
            if let Some(index) = index {
                comp["index"] = Value::Number(index.into());
            }
            comp
        })
        .collect()
}

fn normalized_extension_options(options: &Value) -> Value {
    json!({
        "allowed_dimensions": defaulted(&options["allowed_dimensions"], json!([])),
        "allowed_granularities": defaulted(&options["allowed_granularities"], json!([])),
        "offset_from_today": defaulted(&options["offset_from_today"], json!(0)),
        "correlation_candidate_definition_ids":
            defaulted(&options["correlation_candidate_definition_ids"], json!([])),
        "use_dynamic_offset": defaulted(&options["use_dynamic_offset"], json!(false)),
    })
}

fn defaulted(value: &Value, default: Value) -> Value {
    if value.is_null() {
        default
    } else {
        value.clone()
    }
}
