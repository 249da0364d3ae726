//! Comparison operators: `equals`, `regex_equals`.

use regex::Regex;

use crate::chain::Operator;
use crate::error::QueryError;
use crate::operators::args::{absorbs, ArgumentParser};
use crate::state::QueryState;
use crate::value::{anything, is_string, is_valid_sa_type, Value};

pub static EQUALS: Operator = Operator {
    name: "equals",
    runner: equals,
};

fn equals(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (_, args) = ArgumentParser::new("equals")
        .context(anything, "")
        .arg(is_valid_sa_type, "left", "Left side of equals must be a plain value")
        .arg(is_valid_sa_type, "right", "Right side of equals must be a plain value")
        .parse(context, arguments, state)?;

    if absorbs(&Value::Null, &args) {
        return Ok(Value::AbsorbingNull);
    }

    Ok(Value::Bool(args[0] == args[1]))
}

pub static REGEX_EQUALS: Operator = Operator {
    name: "regex_equals",
    runner: regex_equals,
};

fn regex_equals(
    context: &Value,
    arguments: &[Value],
    state: &mut QueryState,
) -> Result<Value, QueryError> {
    let (_, args) = ArgumentParser::new("regex_equals")
        .context(anything, "")
        .arg(is_string, "left", "Left side of regex equals must be a string")
        .arg(is_string, "right", "Right side of regex equals must be a string")
        .parse(context, arguments, state)?;

    if absorbs(&Value::Null, &args) {
        return Ok(Value::AbsorbingNull);
    }

    let (Value::String(left), Value::String(pattern)) = (&args[0], &args[1]) else {
        return Err(QueryError::type_error("regex_equals arguments must be strings"));
    };
    let compiled = Regex::new(pattern)
        .map_err(|e| QueryError::regex(format!("Invalid regex pattern '{pattern}': {e}")))?;
    Ok(Value::Bool(compiled.is_match(left)))
}
