//! Field operators: `get_field`, `has_field`, `get_field_regex`, `select`.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use regex::Regex;

use crate::chain::Operator;
use crate::entity::ObjectList;
use crate::error::QueryError;
use crate::operators::args::{absorbs, ArgumentParser};
use crate::state::QueryState;
use crate::value::{
    is_absorbing_null, is_bool, is_field_context, is_object_grouping, is_selectable,
    is_single_object_list, is_string, Value,
};

pub static GET_FIELD: Operator = Operator {
    name: "get_field",
    runner: get_field,
};

fn get_field(
    context: &Value,
    arguments: &[Value],
    state: &mut QueryState,
) -> Result<Value, QueryError> {
    let (context, args) = ArgumentParser::new("get_field")
        .context(
            is_field_context,
            "You can only use the get_field operator on an individual object or dicts.",
        )
        .arg(is_string, "field_name", "The field to get must be a string.")
        .arg(
            is_bool,
            "return_none_if_missing",
            "Please specify whether to return None if the field is missing.",
        )
        .arg(
            is_bool,
            "return_all_values",
            "Please specify whether to return all values for the field from all sources.",
        )
        .parse(context, arguments, state)?;

    if absorbs(&context, &args) {
        return Ok(Value::AbsorbingNull);
    }

    let context = into_grouping(context);
    let Value::String(field_name) = &args[0] else {
        return Err(QueryError::type_error("get_field field_name must be a string"));
    };
    let return_none_if_missing = matches!(args[1], Value::Bool(true));
    let return_all_values = matches!(args[2], Value::Bool(true));

    state.needed_scopes = state
        .needed_scopes
        .filter_fields(std::slice::from_ref(field_name));

    match &context {
        Value::Map(map) => match map.get(field_name) {
            Some(value) => Ok(value.clone()),
            None if return_none_if_missing => Ok(Value::AbsorbingNull),
            None => Err(QueryError::field(format!(
                "Field '{field_name}' not found in dict"
            ))),
        },
        Value::Grouping(grouping) => {
            if return_all_values {
                return Ok(Value::List(
                    grouping.get_all_field_values(field_name, state)?,
                ));
            }
            if !grouping.has_field(field_name) {
                if return_none_if_missing {
                    return Ok(Value::AbsorbingNull);
                }
                return Err(QueryError::field(format!(
                    "Field \"{field_name}\" not found in object: {grouping}"
                )));
            }
            grouping.get_field(field_name, state)
        }
        other => Err(QueryError::type_error(format!(
            "get_field operator can't operate on {}",
            other.type_name()
        ))),
    }
}

pub static HAS_FIELD: Operator = Operator {
    name: "has_field",
    runner: has_field,
};

fn has_field(
    context: &Value,
    arguments: &[Value],
    state: &mut QueryState,
) -> Result<Value, QueryError> {
    let (context, args) = ArgumentParser::new("has_field")
        .context(
            is_field_context,
            "You can only use the has_field operator on an individual object or dicts.",
        )
        .arg(is_string, "field_name", "The field to check must be a string.")
        .parse(context, arguments, state)?;

    if absorbs(&context, &args) {
        return Ok(Value::AbsorbingNull);
    }

    let context = into_grouping(context);
    let Value::String(field_name) = &args[0] else {
        return Err(QueryError::type_error("has_field field_name must be a string"));
    };

    let present = match &context {
        Value::Map(map) => map.contains_key(field_name),
        Value::Grouping(grouping) => grouping.has_field(field_name),
        _ => false,
    };
    Ok(Value::Bool(present))
}

pub static GET_FIELD_REGEX: Operator = Operator {
    name: "get_field_regex",
    runner: get_field_regex,
};

/// Collect every property whose name matches the pattern into a map.
fn get_field_regex(
    context: &Value,
    arguments: &[Value],
    state: &mut QueryState,
) -> Result<Value, QueryError> {
    let (context, args) = ArgumentParser::new("get_field_regex")
        .context(
            grouping_or_single,
            "You can only use the get_field_regex operator on an individual object.",
        )
        .arg(is_string, "field_name", "The field pattern must be a string.")
        .parse(context, arguments, state)?;

    if absorbs(&context, &args) {
        return Ok(Value::AbsorbingNull);
    }

    let context = into_grouping(context);
    let Value::String(pattern) = &args[0] else {
        return Err(QueryError::type_error("get_field_regex pattern must be a string"));
    };
    let compiled = Regex::new(pattern)
        .map_err(|e| QueryError::regex(format!("Invalid regex pattern '{pattern}': {e}")))?;

    let Value::Grouping(grouping) = &context else {
        return Err(QueryError::type_error(format!(
            "get_field_regex operator can't operate on {}",
            context.type_name()
        )));
    };

    let mut matched = BTreeMap::new();
    for field in grouping.fields() {
        if compiled.is_match(&field) {
            let value = grouping.get_field(&field, state)?;
            matched.insert(field, value);
        }
    }
    if matched.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::Map(matched))
}

fn grouping_or_single(value: &Value) -> bool {
    is_object_grouping(value) || is_single_object_list(value)
}

/// A one-element object list reads as its grouping.
fn into_grouping(context: Value) -> Value {
    match context {
        Value::Objects(list) if list.len() == 1 => Value::Grouping(list.groupings()[0].clone()),
        other => other,
    }
}

pub static SELECT: Operator = Operator {
    name: "select",
    runner: select,
};

/// Narrow the visible fields of a grouping, every grouping in a list, or a
/// map. Arguments are field names; chain arguments are evaluated first and
/// must come out as strings.
fn select(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    if is_absorbing_null(context) {
        return Ok(Value::AbsorbingNull);
    }
    if !is_selectable(context) {
        return Err(QueryError::type_error(format!(
            "select operator can't operate on {}. Select must be called on an ObjectList, \
             ObjectGrouping, or dict.",
            context.type_name()
        )));
    }

    let mut names: BTreeSet<String> = BTreeSet::new();
    for argument in arguments {
        let value = match argument {
            Value::Chain(chain) => chain.run(context.clone(), state)?,
            other => other.clone(),
        };
        if is_absorbing_null(&value) {
            return Ok(Value::AbsorbingNull);
        }
        let Value::String(name) = value else {
            return Err(QueryError::type_error(format!(
                "Select arguments must be strings, got {}",
                value.type_name()
            )));
        };
        names.insert(name);
    }

    let name_list: Vec<String> = names.iter().cloned().collect();
    state.needed_scopes = state.needed_scopes.filter_fields(&name_list);

    match context {
        Value::Map(map) => Ok(Value::Map(
            map.iter()
                .filter(|(k, _)| names.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )),
        Value::Grouping(grouping) => Ok(Value::Grouping(grouping.select_fields(names))),
        Value::Objects(list) => Ok(Value::Objects(ObjectList::new(
            list.iter()
                .map(|g| g.select_fields(names.clone()))
                .collect(),
        ))),
        other => Err(QueryError::type_error(format!(
            "select operator can't operate on {}",
            other.type_name()
        ))),
    }
}
