//! Plain-text result rendering.
//!
//! Object lists render as group blocks: a `#id (types @sources)` header and
//! indented `field: value` lines. When sources disagree on a field, each
//! contribution renders on its own `field@source` line so the conflict is
//! visible instead of merged away. Coloring is a shell concern and happens
//! outside the engine.

use crate::entity::{Grouping, ObjectList};
use crate::value::Value;

/// Render any query result for display.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Objects(list) => render_object_list(list),
        Value::Grouping(grouping) => render_grouping(grouping),
        other => other.to_string(),
    }
}

/// Render every grouping in order.
pub fn render_object_list(list: &ObjectList) -> String {
    let mut out = String::new();
    for grouping in list {
        out.push_str(&render_grouping(grouping));
    }
    out
}

fn render_grouping(grouping: &Grouping) -> String {
    let mut out = format!("{}\n", grouping.name());

    for field in grouping.fields() {
        // Raw per-source values; display never applies the merge rule.
        let contributions: Vec<(&str, &Value)> = grouping
            .members()
            .iter()
            .filter_map(|member| member.properties().get(&field).map(|v| (member.source(), v)))
            .collect();
        let Some((_, first)) = contributions.first() else {
            continue;
        };

        if contributions.iter().all(|(_, v)| v == first) {
            out.push_str(&format!("    {field}: {first}\n"));
        } else {
            for (source, value) in contributions {
                out.push_str(&format!("    {field}@{source}: {value}\n"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn list(objects: &[serde_json::Value]) -> ObjectList {
        let raws = objects
            .iter()
            .map(|j| Arc::new(crate::entity::RawObject::from_json(j).expect("valid")))
            .collect();
        ObjectList::from_raw(raws).expect("valid list")
    }

    #[test]
    fn agreeing_fields_render_once() {
        let rendered = render_object_list(&list(&[
            json!({"__id__": "e1", "__types__": ["employee"], "__source__": "hr", "name": "Alice"}),
            json!({"__id__": "e1", "__types__": ["employee"], "__source__": "crm", "name": "Alice"}),
        ]));
        assert!(rendered.starts_with("#e1 (employee @crm@hr)\n"));
        assert!(rendered.contains("    name: Alice\n"));
        assert!(!rendered.contains("name@"));
    }

    #[test]
    fn disagreeing_fields_render_per_source() {
        let rendered = render_object_list(&list(&[
            json!({"__id__": "e1", "__types__": ["employee"], "__source__": "hr", "title": "Engineer"}),
            json!({"__id__": "e1", "__types__": ["employee"], "__source__": "crm", "title": "Developer"}),
        ]));
        assert!(rendered.contains("    title@hr: Engineer\n"));
        assert!(rendered.contains("    title@crm: Developer\n"));
    }

    #[test]
    fn absorbing_null_renders_as_absorbing_none() {
        assert_eq!(render_value(&Value::AbsorbingNull), "AbsorbingNone");
    }

    #[test]
    fn custom_values_render_their_text_form() {
        let rendered = render_object_list(&list(&[json!({
            "__id__": "e1",
            "__types__": ["employee"],
            "__source__": "hr",
            "mail": {"__sa_type__": "email", "email": "a@b.co"}
        })]));
        assert!(rendered.contains("    mail: a@b.co\n"));
    }
}
