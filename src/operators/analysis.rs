//! Schema exploration operators: `describe`, `summary`.
//!
//! Both walk the raw members of every grouping and report a per-type view of
//! the data: object counts, contributing sources, property sets. `summary`
//! additionally ranks properties by unique-value count and trims long
//! property lists to the 15 most variable.

use std::collections::{BTreeMap, BTreeSet};

use crate::chain::Operator;
use crate::entity::ObjectList;
use crate::error::QueryError;
use crate::operators::args::ArgumentParser;
use crate::state::QueryState;
use crate::value::{is_absorbing_null, is_valid_primitive, Value};

pub static DESCRIBE: Operator = Operator {
    name: "describe",
    runner: describe,
};

fn describe(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (context, _) = ArgumentParser::new("describe")
        .context(is_valid_primitive, "Requires an evaluated value")
        .parse(context, arguments, state)?;
    if is_absorbing_null(&context) {
        return Ok(Value::AbsorbingNull);
    }
    match &context {
        Value::Objects(list) => Ok(Value::String(render_schema(list, None))),
        other => Ok(Value::String(other.to_string())),
    }
}

pub static SUMMARY: Operator = Operator {
    name: "summary",
    runner: summary,
};

fn summary(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (context, _) = ArgumentParser::new("summary")
        .context(is_valid_primitive, "Requires an evaluated value")
        .parse(context, arguments, state)?;
    if is_absorbing_null(&context) {
        return Ok(Value::AbsorbingNull);
    }
    match &context {
        Value::Objects(list) => {
            let variance = property_variance(list);
            Ok(Value::String(render_schema(list, Some(&variance))))
        }
        other => Ok(Value::String(other.to_string())),
    }
}

/// Properties shown per type before the summary view starts trimming.
const MAX_SUMMARY_PROPERTIES: usize = 15;

/// Unique-value counts per property, a cheap proxy for variance.
fn property_variance(list: &ObjectList) -> BTreeMap<String, usize> {
    let mut values: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for grouping in list {
        for member in grouping.members() {
            for (name, value) in member.properties() {
                values
                    .entry(name.clone())
                    .or_default()
                    .insert(value.to_string());
            }
        }
    }
    values.into_iter().map(|(k, v)| (k, v.len())).collect()
}

fn render_schema(list: &ObjectList, variance: Option<&BTreeMap<String, usize>>) -> String {
    if list.is_empty() {
        return "Empty ObjectList".to_string();
    }

    let mut types: BTreeSet<String> = BTreeSet::new();
    let mut sources: BTreeSet<String> = BTreeSet::new();
    let mut type_properties: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut type_sources: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut type_counts: BTreeMap<String, usize> = BTreeMap::new();

    for grouping in list {
        for type_name in grouping.types() {
            *type_counts.entry(type_name.clone()).or_default() += 1;
        }
        for member in grouping.members() {
            sources.insert(member.source().to_string());
            for type_name in member.types() {
                types.insert(type_name.clone());
                type_sources
                    .entry(type_name.clone())
                    .or_default()
                    .insert(member.source().to_string());
                let properties = type_properties.entry(type_name.clone()).or_default();
                for name in member.properties().keys() {
                    properties.insert(name.clone());
                }
            }
        }
    }

    let mut parts = Vec::new();
    parts.push(format!("ObjectList with {} objects", list.len()));
    if !types.is_empty() {
        let names: Vec<&str> = types.iter().map(String::as_str).collect();
        parts.push(format!("Types: {}", names.join(", ")));
    }
    if !sources.is_empty() {
        let names: Vec<&str> = sources.iter().map(String::as_str).collect();
        parts.push(format!("Sources: {}", names.join(", ")));
    }

    for type_name in &types {
        let count = type_counts.get(type_name).copied().unwrap_or(0);
        let mut info = format!("\n  {type_name} ({count} objects)");
        if let Some(type_sources) = type_sources.get(type_name) {
            let names: Vec<&str> = type_sources.iter().map(String::as_str).collect();
            info.push_str(&format!(" from sources: {}", names.join(", ")));
        }

        let properties = type_properties.get(type_name);
        match properties {
            Some(properties) if !properties.is_empty() => {
                let shown: Vec<String> = match variance {
                    Some(variance) if properties.len() > MAX_SUMMARY_PROPERTIES => {
                        let mut ranked: Vec<(&String, usize)> = properties
                            .iter()
                            .map(|p| (p, variance.get(p).copied().unwrap_or(0)))
                            .collect();
                        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
                        let top: Vec<String> = ranked
                            .into_iter()
                            .take(MAX_SUMMARY_PROPERTIES)
                            .map(|(p, _)| p.clone())
                            .collect();
                        info.push_str(&format!(
                            "\n    Properties ({} total, showing {} most variable): {}",
                            properties.len(),
                            MAX_SUMMARY_PROPERTIES,
                            top.join(", ")
                        ));
                        Vec::new()
                    }
                    _ => properties.iter().cloned().collect(),
                };
                if !shown.is_empty() {
                    info.push_str(&format!("\n    Properties: {}", shown.join(", ")));
                }
            }
            _ => info.push_str("\n    No properties"),
        }
        parts.push(info);
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn list() -> ObjectList {
        let objects = [
            json!({"__id__": "e1", "__types__": ["employee"], "__source__": "hr", "name": "A"}),
            json!({"__id__": "e2", "__types__": ["employee"], "__source__": "hr", "name": "B", "level": 2}),
            json!({"__id__": "c1", "__types__": ["customer"], "__source__": "crm"}),
        ];
        let raws = objects
            .iter()
            .map(|j| Arc::new(crate::entity::RawObject::from_json(j).expect("valid")))
            .collect();
        ObjectList::from_raw(raws).expect("valid list")
    }

    fn run(op: &Operator, context: Value) -> String {
        let mut state = QueryState::with_data(ObjectList::new(vec![]));
        match (op.runner)(&context, &[], &mut state).expect("runs") {
            Value::String(s) => s,
            other => panic!("expected a string, got {other:?}"),
        }
    }

    #[test]
    fn describe_reports_types_sources_and_properties() {
        let text = run(&DESCRIBE, Value::Objects(list()));
        assert!(text.starts_with("ObjectList with 3 objects"));
        assert!(text.contains("Types: customer, employee"));
        assert!(text.contains("Sources: crm, hr"));
        assert!(text.contains("employee (2 objects) from sources: hr"));
        assert!(text.contains("Properties: level, name"));
        assert!(text.contains("No properties"));
    }

    #[test]
    fn describe_of_empty_list() {
        let text = run(&DESCRIBE, Value::Objects(ObjectList::new(vec![])));
        assert_eq!(text, "Empty ObjectList");
    }

    #[test]
    fn describe_of_primitive_is_its_display() {
        assert_eq!(run(&DESCRIBE, Value::Int(5)), "5");
    }

    #[test]
    fn summary_trims_wide_property_sets() {
        let mut properties = serde_json::Map::new();
        properties.insert("__id__".into(), "o1".into());
        properties.insert("__types__".into(), json!(["wide"]));
        properties.insert("__source__".into(), "s".into());
        for i in 0..20 {
            properties.insert(format!("p{i:02}"), json!(i));
        }
        let raw = Arc::new(
            crate::entity::RawObject::from_json(&serde_json::Value::Object(properties))
                .expect("valid"),
        );
        let wide = ObjectList::from_raw(vec![raw]).expect("valid list");

        let text = run(&SUMMARY, Value::Objects(wide));
        assert!(text.contains("20 total, showing 15 most variable"));
    }
}
