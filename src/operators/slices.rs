//! The `slice` operator, with Python-style index and slice semantics.

use crate::chain::Operator;
use crate::entity::ObjectList;
use crate::error::QueryError;
use crate::state::QueryState;
use crate::value::{is_absorbing_null, Value};

pub static SLICE: Operator = Operator {
    name: "slice",
    runner: slice,
};

/// `slice(i)` indexes a single element; `slice(i, j)` and `slice(i, j, k)`
/// cut a sub-sequence. Negative and omitted bounds follow Python's rules.
/// Omitted bounds arrive as nulls (the bracket shorthand) or empty strings
/// (explicit calls).
fn slice(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let _ = state;
    if is_absorbing_null(context) || arguments.iter().any(is_absorbing_null) {
        return Ok(Value::AbsorbingNull);
    }

    if arguments.is_empty() {
        return Err(QueryError::type_error("Slice operator expects at least 1 argument."));
    }
    if arguments.len() > 3 {
        return Err(QueryError::type_error("Slice operator expects at most 3 arguments."));
    }

    let mut bounds: Vec<Option<i64>> = Vec::with_capacity(arguments.len());
    for argument in arguments {
        match argument {
            Value::Int(i) => bounds.push(Some(*i)),
            Value::Null => bounds.push(None),
            Value::String(s) if s.is_empty() => bounds.push(None),
            _ => {
                return Err(QueryError::type_error(
                    "Slice operator arguments must be integers or empty strings.",
                ))
            }
        }
    }
    if bounds.len() == 1 && bounds[0].is_none() {
        return Err(QueryError::type_error("Invalid slice syntax: []."));
    }

    enum Items<'a> {
        Groupings(&'a ObjectList),
        Values(&'a [Value]),
    }
    let items = match context {
        Value::Objects(list) => Items::Groupings(list),
        Value::List(values) => Items::Values(values),
        _ => {
            return Err(QueryError::type_error(
                "You can only use the slice operator on an ObjectList or list (e.g. list[2]).",
            ))
        }
    };
    let len = match &items {
        Items::Groupings(list) => list.len(),
        Items::Values(values) => values.len(),
    } as i64;

    // Single index: one element, not a one-element sequence.
    if bounds.len() == 1 {
        let index = bounds[0].unwrap_or(0);
        let resolved = if index < 0 { len + index } else { index };
        if resolved < 0 || resolved >= len {
            return Err(QueryError::type_error(format!(
                "Error while evaluating \"[{index}]\": index out of range"
            )));
        }
        let at = resolved as usize;
        return Ok(match items {
            Items::Groupings(list) => Value::Grouping(list.groupings()[at].clone()),
            Items::Values(values) => values[at].clone(),
        });
    }

    let step = bounds.get(2).copied().flatten().unwrap_or(1);
    if step == 0 {
        return Err(QueryError::type_error(
            "Error while evaluating slice: step cannot be zero",
        ));
    }
    let indices = slice_indices(len, bounds[0], bounds.get(1).copied().flatten(), step);

    Ok(match items {
        Items::Groupings(list) => Value::Objects(ObjectList::new(
            indices
                .iter()
                .map(|&i| list.groupings()[i].clone())
                .collect(),
        )),
        Items::Values(values) => {
            Value::List(indices.iter().map(|&i| values[i].clone()).collect())
        }
    })
}

/// Element indices selected by a Python slice over a sequence of `len`.
fn slice_indices(len: i64, start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<usize> {
    let clamp = |value: i64, low: i64, high: i64| value.max(low).min(high);
    let normalize = |bound: i64| if bound < 0 { len + bound } else { bound };

    let mut indices = Vec::new();
    if step > 0 {
        let start = clamp(start.map_or(0, normalize), 0, len);
        let stop = clamp(stop.map_or(len, normalize), 0, len);
        let mut i = start;
        while i < stop {
            indices.push(i as usize);
            i += step;
        }
    } else {
        let start = clamp(start.map_or(len - 1, normalize), -1, len - 1);
        let stop = clamp(stop.map_or(-1, normalize), -1, len - 1);
        let mut i = start;
        while i > stop {
            if i >= 0 {
                indices.push(i as usize);
            }
            i += step;
        }
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(n: i64) -> Value {
        Value::List((0..n).map(Value::Int).collect())
    }

    fn run(context: Value, args: Vec<Value>) -> Result<Value, QueryError> {
        let mut state = QueryState::with_data(ObjectList::new(vec![]));
        (SLICE.runner)(&context, &args, &mut state)
    }

    #[test]
    fn range_slice() {
        let result = run(numbers(5), vec![Value::Int(1), Value::Int(3)]).expect("runs");
        assert_eq!(result, Value::List(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn open_ended_and_negative_bounds() {
        let result = run(numbers(5), vec![Value::Null, Value::Int(-2)]).expect("runs");
        assert_eq!(result, Value::List(vec![Value::Int(0), Value::Int(1), Value::Int(2)]));

        let tail = run(numbers(5), vec![Value::Int(-2), Value::Null]).expect("runs");
        assert_eq!(tail, Value::List(vec![Value::Int(3), Value::Int(4)]));
    }

    #[test]
    fn stepped_and_reversed() {
        let evens = run(numbers(6), vec![Value::Null, Value::Null, Value::Int(2)]).expect("runs");
        assert_eq!(
            evens,
            Value::List(vec![Value::Int(0), Value::Int(2), Value::Int(4)])
        );

        let reversed = run(numbers(3), vec![Value::Null, Value::Null, Value::Int(-1)]).expect("runs");
        assert_eq!(
            reversed,
            Value::List(vec![Value::Int(2), Value::Int(1), Value::Int(0)])
        );
    }

    #[test]
    fn single_index_returns_the_element() {
        assert_eq!(run(numbers(5), vec![Value::Int(2)]).expect("runs"), Value::Int(2));
        assert_eq!(run(numbers(5), vec![Value::Int(-1)]).expect("runs"), Value::Int(4));
        assert!(run(numbers(5), vec![Value::Int(9)]).is_err());
    }

    #[test]
    fn degenerate_forms_error() {
        assert!(run(numbers(3), vec![]).is_err());
        assert!(run(numbers(3), vec![Value::String(String::new())]).is_err());
        assert!(run(
            numbers(3),
            vec![Value::Null, Value::Null, Value::Int(0)]
        )
        .is_err());
    }

    #[test]
    fn clamping_never_panics() {
        let result = run(numbers(3), vec![Value::Int(-10), Value::Int(10)]).expect("runs");
        assert_eq!(result, numbers(3));
    }
}
