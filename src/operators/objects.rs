//! Object-list operators: `get_by_id`, `filter_by_type`, `filter_by_source`,
//! `types`.

use std::collections::BTreeSet;

use crate::chain::Operator;
use crate::entity::ObjectList;
use crate::error::QueryError;
use crate::operators::args::{absorbs, ArgumentParser};
use crate::state::QueryState;
use crate::value::{is_object_list, is_objects_or_grouping, is_string, Value};

pub static GET_BY_ID: Operator = Operator {
    name: "get_by_id",
    runner: get_by_id,
};

fn get_by_id(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (context, args) = ArgumentParser::new("get_by_id")
        .context(is_object_list, "You can only use the get_by_id operator on an ObjectList.")
        .arg(is_string, "obj_id", "The ID to search for must be a string.")
        .parse(context, arguments, state)?;

    if absorbs(&context, &args) {
        return Ok(Value::AbsorbingNull);
    }
    let (Value::Objects(list), Value::String(id)) = (&context, &args[0]) else {
        return Err(QueryError::type_error("get_by_id needs an ObjectList and a string id"));
    };
    Ok(Value::Objects(list.get_by_id(id)))
}

pub static FILTER_BY_TYPE: Operator = Operator {
    name: "filter_by_type",
    runner: filter_by_type,
};

fn filter_by_type(
    context: &Value,
    arguments: &[Value],
    state: &mut QueryState,
) -> Result<Value, QueryError> {
    let (context, args) = ArgumentParser::new("filter_by_type")
        .context(
            is_object_list,
            "You can only use the filter_by_type operator on an ObjectList.",
        )
        .arg(is_string, "type_name", "The type to filter by must be a string.")
        .parse(context, arguments, state)?;

    if absorbs(&context, &args) {
        return Ok(Value::AbsorbingNull);
    }
    let (Value::Objects(list), Value::String(type_name)) = (&context, &args[0]) else {
        return Err(QueryError::type_error("filter_by_type needs an ObjectList and a string"));
    };

    state.needed_scopes = state.needed_scopes.filter_type(type_name);
    Ok(Value::Objects(list.filter_by_type(type_name)))
}

pub static FILTER_BY_SOURCE: Operator = Operator {
    name: "filter_by_source",
    runner: filter_by_source,
};

fn filter_by_source(
    context: &Value,
    arguments: &[Value],
    state: &mut QueryState,
) -> Result<Value, QueryError> {
    let (context, args) = ArgumentParser::new("filter_by_source")
        .context(
            is_objects_or_grouping,
            "You can use the filter_by_source operator on an ObjectList or a single object.",
        )
        .arg(is_string, "source_name", "The source to filter by must be a string.")
        .parse(context, arguments, state)?;

    if absorbs(&context, &args) {
        return Ok(Value::AbsorbingNull);
    }
    let Value::String(source) = &args[0] else {
        return Err(QueryError::type_error("filter_by_source source must be a string"));
    };

    match &context {
        Value::Objects(list) => Ok(Value::Objects(list.filter_by_source(source))),
        Value::Grouping(grouping) => {
            let wanted: BTreeSet<String> = [source.clone()].into();
            match grouping.select_sources(&wanted) {
                Some(narrowed) => Ok(Value::Grouping(narrowed)),
                None => Ok(Value::Objects(ObjectList::new(vec![]))),
            }
        }
        other => Err(QueryError::type_error(format!(
            "filter_by_source operator can't operate on {}",
            other.type_name()
        ))),
    }
}

pub static TYPES: Operator = Operator {
    name: "types",
    runner: types,
};

/// Distinct type names claimed across the list, sorted.
fn types(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (context, _) = ArgumentParser::new("types")
        .context(is_object_list, "You can only use the types operator on an ObjectList.")
        .parse(context, arguments, state)?;

    if absorbs(&context, &[]) {
        return Ok(Value::AbsorbingNull);
    }
    let Value::Objects(list) = &context else {
        return Err(QueryError::type_error("types context must be an ObjectList"));
    };
    Ok(Value::List(
        list.types().into_iter().map(Value::String).collect(),
    ))
}
