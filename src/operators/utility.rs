//! Utility operators: `add`, `to_json`, `show_plan`.

use crate::chain::Operator;
use crate::error::QueryError;
use crate::operators::args::{absorbs, ArgumentParser};
use crate::state::QueryState;
use crate::value::{anything, is_chain, is_json_convertible, is_valid_sa_type, Value};

pub static ADD: Operator = Operator {
    name: "add",
    runner: add,
};

/// Numeric addition (ints promote to floats when mixed) or string
/// concatenation; anything else is a type error.
fn add(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (_, args) = ArgumentParser::new("add")
        .context(anything, "")
        .arg(is_valid_sa_type, "left", "Left side of add must be a plain value")
        .arg(is_valid_sa_type, "right", "Right side of add must be a plain value")
        .parse(context, arguments, state)?;

    if absorbs(&Value::Null, &args) {
        return Ok(Value::AbsorbingNull);
    }

    match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
            Ok(Value::Float(*a as f64 + b))
        }
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (left, right) => Err(QueryError::type_error(format!(
            "add operator can't combine {} and {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

pub static TO_JSON: Operator = Operator {
    name: "to_json",
    runner: to_json,
};

/// Peel the object containers off a value: an object list becomes the list
/// of its members' raw maps, a grouping becomes its merged view, everything
/// else passes through.
fn to_json(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (context, _) = ArgumentParser::new("to_json")
        .context(is_json_convertible, "Requires an evaluated value")
        .parse(context, arguments, state)?;

    if absorbs(&context, &[]) {
        return Ok(Value::AbsorbingNull);
    }
    match &context {
        Value::Objects(list) => {
            let mut maps = Vec::new();
            for grouping in list {
                for member in grouping.members() {
                    maps.push(Value::Map(member.as_map()));
                }
            }
            Ok(Value::List(maps))
        }
        Value::Grouping(grouping) => Ok(Value::Map(grouping.merged_view(state)?)),
        other => Ok(other.clone()),
    }
}

pub static SHOW_PLAN: Operator = Operator {
    name: "show_plan",
    runner: show_plan,
};

/// Describe what running the chain would demand, without running it.
fn show_plan(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (_, args) = ArgumentParser::new("show_plan")
        .context(anything, "")
        .arg(is_chain, "chain", "The chain to show the plan for")
        .parse(context, arguments, state)?;

    let Value::Chain(chain) = &args[0] else {
        return Err(QueryError::type_error("show_plan argument must be a chain"));
    };
    Ok(Value::String(format!(
        "{chain}\n{}",
        state.needed_scopes
    )))
}
