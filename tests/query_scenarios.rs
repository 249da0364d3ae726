//! End-to-end query scenarios over in-memory providers.

use quarry::execution::{execute_fully, execute_once};
use quarry::provider::memory::MemoryProvider;
use quarry::provider::Providers;
use quarry::render::render_value;
use quarry::value::Value;
use serde_json::json;

fn bulk_providers(objects: Vec<serde_json::Value>) -> Providers {
    let provider = MemoryProvider::new("test").with_bulk(objects);
    Providers::connect(vec![Box::new(provider)]).expect("providers connect")
}

#[test]
fn filter_by_type_and_count() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "s", "name": "A"}),
        json!({"__id__": "e2", "__types__": ["employee"], "__source__": "s", "name": "B"}),
        json!({"__id__": "e3", "__types__": ["employee"], "__source__": "s", "name": "C"}),
        json!({"__id__": "c1", "__types__": ["customer"], "__source__": "s"}),
    ]);
    let result = execute_fully("employee.count()", &mut providers).expect("converges");
    assert_eq!(result, Value::Int(3));
}

#[test]
fn field_conflict_surfaces_a_merge_error() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "hr", "title": "Engineer"}),
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "crm", "title": "Developer"}),
    ]);
    let result = execute_fully("#e1.title", &mut providers).expect("converges");
    let Value::String(text) = result else {
        panic!("expected an error string, got {result:?}")
    };
    assert!(text.starts_with("Error: "));
    assert!(text.contains("multiple conflicting definitions"));
}

#[test]
fn absorbing_null_propagates_to_the_top() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "x", "__types__": ["thing"], "__source__": "s"}),
    ]);
    let result = execute_fully(".foo == \"bar\"", &mut providers).expect("converges");
    assert_eq!(result, Value::AbsorbingNull);
    assert_eq!(render_value(&result), "AbsorbingNone");
}

#[test]
fn slice_cuts_the_object_list() {
    let objects = (0..5)
        .map(|i| json!({"__id__": format!("o{i}"), "__types__": ["thing"], "__source__": "s"}))
        .collect();
    let mut providers = bulk_providers(objects);
    let result = execute_fully("*[1:3].count()", &mut providers).expect("converges");
    assert_eq!(result, Value::Int(2));
}

#[test]
fn regex_id_shorthand() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "emp_001", "__types__": ["employee"], "__source__": "s"}),
        json!({"__id__": "emp_002", "__types__": ["employee"], "__source__": "s"}),
        json!({"__id__": "cust_001", "__types__": ["customer"], "__source__": "s"}),
    ]);
    let result = execute_fully("#emp_*.count()", &mut providers).expect("converges");
    assert_eq!(result, Value::Int(2));
}

#[test]
fn source_shorthand_restricts_groupings() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "hr", "title": "Engineer"}),
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "crm", "title": "Developer"}),
    ]);
    let result = execute_fully("@hr.count()", &mut providers).expect("converges");
    assert_eq!(result, Value::Int(1));

    // Picking one source resolves the conflict the merged read reports.
    let title = execute_fully("@hr[0].title", &mut providers).expect("converges");
    assert_eq!(title, Value::String("Engineer".into()));
}

#[test]
fn filter_bracket_runs_per_object() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "s", "dept": "sales"}),
        json!({"__id__": "e2", "__types__": ["employee"], "__source__": "s", "dept": "eng"}),
        json!({"__id__": "e3", "__types__": ["employee"], "__source__": "s"}),
    ]);
    // The object without the field absorbs to null and drops out quietly.
    let result = execute_fully("employee[.dept == 'sales'].count()", &mut providers)
        .expect("converges");
    assert_eq!(result, Value::Int(1));
}

#[test]
fn map_collects_field_values() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "s", "name": "A"}),
        json!({"__id__": "e2", "__types__": ["employee"], "__source__": "s", "name": "B"}),
    ]);
    let result = execute_fully("employee.map(.name)", &mut providers).expect("converges");
    assert_eq!(
        result,
        Value::List(vec![Value::String("A".into()), Value::String("B".into())])
    );
}

#[test]
fn select_whitelists_fields() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "s", "name": "A", "level": 2}),
    ]);
    let result = execute_fully("employee[['name']]", &mut providers).expect("converges");
    let rendered = render_value(&result);
    assert!(rendered.contains("name: A"));
    assert!(!rendered.contains("level"));
}

#[test]
fn foreach_returns_a_plain_list() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "s", "name": "A"}),
    ]);
    let result = execute_fully("employee{.name}", &mut providers).expect("converges");
    assert_eq!(result, Value::List(vec![Value::String("A".into())]));
}

#[test]
fn all_values_suffix_skips_the_merge_rule() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "hr", "title": "Engineer"}),
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "crm", "title": "Developer"}),
    ]);
    let result = execute_fully("#e1.title[]", &mut providers).expect("converges");
    assert_eq!(
        result,
        Value::List(vec![
            Value::String("Engineer".into()),
            Value::String("Developer".into())
        ])
    );
}

#[test]
fn strict_suffix_demands_the_field() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "s"}),
    ]);
    let result = execute_fully("#e1.salary!", &mut providers).expect("converges");
    let Value::String(text) = result else {
        panic!("expected an error string, got {result:?}")
    };
    assert!(text.contains("not found"));
}

#[test]
fn ref_custom_values_resolve_against_loaded_data() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "emp_1", "__types__": ["employee"], "__source__": "s", "name": "Alice"}),
        json!({
            "__id__": "c1", "__types__": ["customer"], "__source__": "s",
            "manager": {"__sa_type__": "ref", "id": "emp_1", "type": "employee"}
        }),
    ]);
    let result = execute_fully("customer.manager.name", &mut providers).expect("converges");
    assert_eq!(result, Value::String("Alice".into()));
}

#[test]
fn link_custom_values_run_a_sub_query() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "s"}),
        json!({"__id__": "e2", "__types__": ["employee"], "__source__": "s"}),
        json!({
            "__id__": "d1", "__types__": ["dashboard"], "__source__": "s",
            "headcount": {"__sa_type__": "link", "query": "employee.count()", "show_text": "headcount"}
        }),
    ]);
    let result = execute_fully("dashboard.headcount", &mut providers).expect("converges");
    assert_eq!(result, Value::Int(2));
}

#[test]
fn describe_summarizes_the_space() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "hr", "name": "A"}),
        json!({"__id__": "c1", "__types__": ["customer"], "__source__": "crm"}),
    ]);
    let result = execute_fully("*.describe()", &mut providers).expect("converges");
    let Value::String(text) = result else {
        panic!("expected a string, got {result:?}")
    };
    assert!(text.contains("ObjectList with 2 objects"));
    assert!(text.contains("Types: customer, employee"));
}

#[test]
fn to_json_round_trips_the_wire_shape() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "s", "name": "A"}),
    ]);
    let result = execute_fully("employee.to_json()", &mut providers).expect("converges");
    let Value::List(objects) = result else {
        panic!("expected a list, got {result:?}")
    };
    let Value::Map(map) = &objects[0] else {
        panic!("expected a map")
    };
    assert_eq!(map.get("__id__"), Some(&Value::String("e1".into())));
    assert_eq!(map.get("__source__"), Some(&Value::String("s".into())));
}

#[test]
fn errors_carry_source_areas_through_execution() {
    let mut providers = bulk_providers(vec![
        json!({"__id__": "e1", "__types__": ["employee"], "__source__": "s"}),
    ]);
    let (_, state) = execute_once("employee.count()", &mut providers);
    // The narrowed state is returned even for successful runs.
    assert!(state.final_needed_scopes().is_empty());

    let (result, _) = execute_once("employee.nonsense()", &mut providers);
    let Value::String(text) = result else {
        panic!("expected an error string")
    };
    assert!(text.contains("Invalid operator: nonsense"));
}

#[test]
fn literal_queries_evaluate_to_themselves() {
    let mut providers = bulk_providers(vec![]);
    assert_eq!(execute_fully("5", &mut providers).expect("converges"), Value::Int(5));
    assert_eq!(
        execute_fully("'hello'", &mut providers).expect("converges"),
        Value::String("hello".into())
    );
    assert_eq!(
        execute_fully("true && false", &mut providers).expect("converges"),
        Value::Bool(false)
    );
    assert_eq!(
        execute_fully(".add(2, 3)", &mut providers).expect("converges"),
        Value::Int(5)
    );
}
