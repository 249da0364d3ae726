//! Boolean operators: `and`, `or`. Null (either kind) coerces to false.

use crate::chain::Operator;
use crate::error::QueryError;
use crate::operators::args::ArgumentParser;
use crate::state::QueryState;
use crate::value::{anything, is_valid_sa_type, Value};

pub static AND: Operator = Operator {
    name: "and",
    runner: and,
};

fn and(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (_, args) = ArgumentParser::new("and")
        .context(anything, "")
        .arg(is_valid_sa_type, "left", "Left side of and must be a plain value")
        .arg(is_valid_sa_type, "right", "Right side of and must be a plain value")
        .parse(context, arguments, state)?;
    Ok(Value::Bool(args[0].truthy() && args[1].truthy()))
}

pub static OR: Operator = Operator {
    name: "or",
    runner: or,
};

fn or(context: &Value, arguments: &[Value], state: &mut QueryState) -> Result<Value, QueryError> {
    let (_, args) = ArgumentParser::new("or")
        .context(anything, "")
        .arg(is_valid_sa_type, "left", "Left side of or must be a plain value")
        .arg(is_valid_sa_type, "right", "Right side of or must be a plain value")
        .parse(context, arguments, state)?;
    Ok(Value::Bool(args[0].truthy() || args[1].truthy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ObjectList;

    fn run(op: &Operator, args: Vec<Value>) -> Value {
        let mut state = QueryState::with_data(ObjectList::new(vec![]));
        (op.runner)(&Value::Null, &args, &mut state).expect("runs")
    }

    #[test]
    fn nulls_are_false() {
        assert_eq!(run(&AND, vec![Value::Null, Value::Bool(true)]), Value::Bool(false));
        assert_eq!(
            run(&OR, vec![Value::AbsorbingNull, Value::Bool(true)]),
            Value::Bool(true)
        );
        assert_eq!(
            run(&AND, vec![Value::AbsorbingNull, Value::Bool(true)]),
            Value::Bool(false)
        );
    }

    #[test]
    fn values_boolean_coerce() {
        assert_eq!(run(&AND, vec![Value::Int(1), Value::String("x".into())]), Value::Bool(true));
        assert_eq!(run(&OR, vec![Value::Int(0), Value::String(String::new())]), Value::Bool(false));
    }
}
