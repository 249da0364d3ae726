//! Iterating operators: `filter`, `map`, `foreach`.
//!
//! Each iteration runs in a fresh child state: narrowings made while
//! evaluating one element never leak into the outer query. The only outer
//! effect is the provider-side condition `filter` registers when its chain
//! has the canonical `equals(get_field(f), literal)` shape.

use crate::chain::Operator;
use crate::entity::ObjectList;
use crate::error::QueryError;
use crate::operators::args::{absorbs, ArgumentParser};
use crate::scope::chain_to_condition;
use crate::state::QueryState;
use crate::value::{is_chain, is_iterable, Value};

pub static FILTER: Operator = Operator {
    name: "filter",
    runner: filter,
};

fn filter(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (context, args) = ArgumentParser::new("filter")
        .context(is_iterable, "You can use the filter operator on an ObjectList or list.")
        .arg(
            is_chain,
            "chain",
            "The filtering expression must be able to be evaluated on each element to a boolean.",
        )
        .parse(context, arguments, state)?;

    if absorbs(&context, &args) {
        return Ok(Value::AbsorbingNull);
    }
    let Value::Chain(chain) = &args[0] else {
        return Err(QueryError::type_error("filter argument must be a chain"));
    };

    if let Some(condition) = chain_to_condition(chain) {
        state.needed_scopes = state.needed_scopes.add_condition(&condition);
    }

    match &context {
        Value::Objects(list) => {
            let mut survivors = Vec::new();
            for grouping in list.iter() {
                let element = Value::Objects(ObjectList::new(vec![grouping.clone()]));
                if keeps(chain, element, state, &format!("{grouping}"))? {
                    survivors.push(grouping.clone());
                }
            }
            Ok(Value::Objects(ObjectList::new(survivors)))
        }
        Value::List(items) => {
            let mut survivors = Vec::new();
            for item in items {
                if keeps(chain, item.clone(), state, &item.to_string())? {
                    survivors.push(item.clone());
                }
            }
            Ok(Value::List(survivors))
        }
        other => Err(QueryError::type_error(format!(
            "filter operator can't operate on {}",
            other.type_name()
        ))),
    }
}

/// Evaluate the filter chain for one element in a fresh child state.
/// AbsorbingNull skips the element; anything other than a bool is an error.
fn keeps(
    chain: &crate::chain::Chain,
    element: Value,
    state: &QueryState,
    shown: &str,
) -> Result<bool, QueryError> {
    let mut child = state.fresh_child();
    match chain.run(element, &mut child)? {
        Value::Bool(keep) => Ok(keep),
        Value::AbsorbingNull => Ok(false),
        other => Err(QueryError::type_error(format!(
            "Filter expression for {shown} result must be a boolean, got {}: {other}",
            other.type_name()
        ))),
    }
}

pub static MAP: Operator = Operator {
    name: "map",
    runner: map,
};

fn map(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let results = run_per_element("map", context, arguments, state)?;
    match results {
        Value::List(items) => {
            if !items.is_empty() && items.iter().all(|v| matches!(v, Value::Grouping(_))) {
                let groupings = items
                    .into_iter()
                    .map(|v| match v {
                        Value::Grouping(g) => g,
                        _ => unreachable!("checked above"),
                    })
                    .collect();
                return Ok(Value::Objects(ObjectList::new(groupings)));
            }
            Ok(Value::List(items))
        }
        other => Ok(other),
    }
}

pub static FOREACH: Operator = Operator {
    name: "foreach",
    runner: foreach,
};

/// Like `map`, but the result is always a plain list.
fn foreach(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    run_per_element("foreach", context, arguments, state)
}

fn run_per_element(
    operator: &'static str,
    context: &Value,
    arguments: &[Value],
    state: &mut QueryState,
) -> Result<Value, QueryError> {
    let (context, args) = ArgumentParser::new(operator)
        .context(is_iterable, "You can use this operator on an ObjectList or list.")
        .arg(
            is_chain,
            "chain",
            "The mapping expression must be able to be evaluated on each element to a value.",
        )
        .parse(context, arguments, state)?;

    if absorbs(&context, &args) {
        return Ok(Value::AbsorbingNull);
    }
    let Value::Chain(chain) = &args[0] else {
        return Err(QueryError::type_error("mapping argument must be a chain"));
    };

    let elements: Vec<Value> = match &context {
        Value::Objects(list) => list.iter().cloned().map(Value::Grouping).collect(),
        Value::List(items) => items.clone(),
        other => {
            return Err(QueryError::type_error(format!(
                "{operator} operator can't operate on {}",
                other.type_name()
            )))
        }
    };

    let mut results = Vec::with_capacity(elements.len());
    for element in elements {
        let mut child = state.fresh_child();
        let result = chain.run(element, &mut child)?;
        if matches!(result, Value::AbsorbingNull) {
            continue;
        }
        results.push(result);
    }
    Ok(Value::List(results))
}
