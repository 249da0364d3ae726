//! List operators: `includes`, `flatten`, `unique`, `count`, `any`.

use crate::chain::Operator;
use crate::error::QueryError;
use crate::operators::args::{absorbs, ArgumentParser};
use crate::state::QueryState;
use crate::value::{is_countable, is_list, is_list_or_string, is_string, is_valid_primitive, Value};

pub static INCLUDES: Operator = Operator {
    name: "includes",
    runner: includes,
};

fn includes(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (context, args) = ArgumentParser::new("includes")
        .context(is_list_or_string, "Includes must be called on a list or string.")
        .arg(is_string, "value", "The value to search for must be a string.")
        .parse(context, arguments, state)?;

    if absorbs(&context, &args) {
        return Ok(Value::AbsorbingNull);
    }

    match &context {
        Value::List(items) => {
            let mut flattened = Vec::new();
            flatten_fully(items, &mut flattened);
            Ok(Value::Bool(flattened.iter().any(|v| *v == &args[0])))
        }
        Value::String(_) => Ok(Value::Bool(context == args[0])),
        other => Err(QueryError::type_error(format!(
            "includes operator can't operate on {}",
            other.type_name()
        ))),
    }
}

fn flatten_fully<'a>(items: &'a [Value], into: &mut Vec<&'a Value>) {
    for item in items {
        match item {
            Value::List(nested) => flatten_fully(nested, into),
            other => into.push(other),
        }
    }
}

pub static FLATTEN: Operator = Operator {
    name: "flatten",
    runner: flatten,
};

/// One level of flattening, and only when every element is a list; a mixed
/// list passes through unchanged.
fn flatten(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (context, _) = ArgumentParser::new("flatten")
        .context(is_list, "Flatten must be called on a list.")
        .parse(context, arguments, state)?;

    if absorbs(&context, &[]) {
        return Ok(Value::AbsorbingNull);
    }
    let Value::List(items) = &context else {
        return Err(QueryError::type_error("flatten context must be a list"));
    };

    if items.is_empty() || !items.iter().all(|i| matches!(i, Value::List(_))) {
        return Ok(context.clone());
    }
    let mut flattened = Vec::new();
    for item in items {
        if let Value::List(nested) = item {
            flattened.extend(nested.iter().cloned());
        }
    }
    Ok(Value::List(flattened))
}

pub static UNIQUE: Operator = Operator {
    name: "unique",
    runner: unique,
};

/// Distinct elements in first-occurrence order.
fn unique(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (context, _) = ArgumentParser::new("unique")
        .context(is_list, "Requires list")
        .parse(context, arguments, state)?;

    if absorbs(&context, &[]) {
        return Ok(Value::AbsorbingNull);
    }
    let Value::List(items) = &context else {
        return Err(QueryError::type_error("unique context must be a list"));
    };

    let mut distinct: Vec<Value> = Vec::new();
    for item in items {
        if !distinct.contains(item) {
            distinct.push(item.clone());
        }
    }
    Ok(Value::List(distinct))
}

pub static COUNT: Operator = Operator {
    name: "count",
    runner: count,
};

fn count(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (context, _) = ArgumentParser::new("count")
        .context(is_countable, "Can only count ObjectList or list items")
        .parse(context, arguments, state)?;

    if absorbs(&context, &[]) {
        return Ok(Value::AbsorbingNull);
    }
    match &context {
        Value::Objects(list) => Ok(Value::Int(list.len() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        other => Err(QueryError::type_error(format!(
            "count operator can't operate on {}",
            other.type_name()
        ))),
    }
}

pub static ANY: Operator = Operator {
    name: "any",
    runner: any,
};

fn any(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (context, _) = ArgumentParser::new("any")
        .context(is_valid_primitive, "Requires an evaluated value")
        .parse(context, arguments, state)?;

    if absorbs(&context, &[]) {
        return Ok(Value::AbsorbingNull);
    }
    let result = match &context {
        Value::Objects(list) => !list.is_empty(),
        Value::List(items) => !items.is_empty(),
        other => other.truthy(),
    };
    Ok(Value::Bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ObjectList;

    fn run(op: &Operator, context: Value, args: Vec<Value>) -> Result<Value, QueryError> {
        let mut state = QueryState::with_data(ObjectList::new(vec![]));
        (op.runner)(&context, &args, &mut state)
    }

    fn strings(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Value::String((*s).to_string())).collect())
    }

    #[test]
    fn includes_searches_nested_lists() {
        let context = Value::List(vec![strings(&["a", "b"]), strings(&["c"])]);
        assert_eq!(
            run(&INCLUDES, context.clone(), vec![Value::String("c".into())]).expect("runs"),
            Value::Bool(true)
        );
        assert_eq!(
            run(&INCLUDES, context, vec![Value::String("z".into())]).expect("runs"),
            Value::Bool(false)
        );
    }

    #[test]
    fn includes_on_string_compares_directly() {
        assert_eq!(
            run(
                &INCLUDES,
                Value::String("abc".into()),
                vec![Value::String("abc".into())]
            )
            .expect("runs"),
            Value::Bool(true)
        );
    }

    #[test]
    fn flatten_only_when_all_lists() {
        let nested = Value::List(vec![strings(&["a"]), strings(&["b"])]);
        assert_eq!(run(&FLATTEN, nested, vec![]).expect("runs"), strings(&["a", "b"]));

        let mixed = Value::List(vec![strings(&["a"]), Value::Int(1)]);
        assert_eq!(run(&FLATTEN, mixed.clone(), vec![]).expect("runs"), mixed);

        assert_eq!(
            run(&FLATTEN, Value::List(vec![]), vec![]).expect("runs"),
            Value::List(vec![])
        );
    }

    #[test]
    fn unique_keeps_first_occurrence_order() {
        let context = strings(&["b", "a", "b", "c", "a"]);
        assert_eq!(run(&UNIQUE, context, vec![]).expect("runs"), strings(&["b", "a", "c"]));
    }

    #[test]
    fn count_works_for_lists() {
        assert_eq!(
            run(&COUNT, strings(&["a", "b"]), vec![]).expect("runs"),
            Value::Int(2)
        );
    }

    #[test]
    fn any_is_emptiness_or_truthiness() {
        assert_eq!(run(&ANY, strings(&[]), vec![]).expect("runs"), Value::Bool(false));
        assert_eq!(run(&ANY, strings(&["x"]), vec![]).expect("runs"), Value::Bool(true));
        assert_eq!(run(&ANY, Value::Int(0), vec![]).expect("runs"), Value::Bool(false));
        assert_eq!(
            run(&ANY, Value::AbsorbingNull, vec![]).expect("runs"),
            Value::AbsorbingNull
        );
    }
}
