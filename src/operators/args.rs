//! Declarative operator argument schema.
//!
//! Every operator declares a context validator (with a human-readable
//! reason) and a fixed list of positional argument specs. Parsing enforces
//! arity, evaluates chain arguments that the validator rejects in their
//! unevaluated form, unwraps one-element object lists where the bare
//! grouping would pass, and lets `AbsorbingNull` through everywhere so the
//! runners can short-circuit on it.

use crate::chain::Chain;
use crate::error::QueryError;
use crate::state::QueryState;
use crate::value::{is_absorbing_null, is_single_object_list, Value};

/// A context or argument predicate.
pub type Validator = fn(&Value) -> bool;

struct ArgSpec {
    validator: Validator,
    name: &'static str,
    reason: &'static str,
}

/// Builder-style schema for one operator's context and arguments.
pub struct ArgumentParser {
    operator: &'static str,
    context: Option<(Validator, &'static str)>,
    specs: Vec<ArgSpec>,
}

impl ArgumentParser {
    pub fn new(operator: &'static str) -> ArgumentParser {
        ArgumentParser {
            operator,
            context: None,
            specs: Vec::new(),
        }
    }

    /// Declare what the context must look like.
    pub fn context(mut self, validator: Validator, reason: &'static str) -> ArgumentParser {
        self.context = Some((validator, reason));
        self
    }

    /// Declare the next positional argument.
    pub fn arg(
        mut self,
        validator: Validator,
        name: &'static str,
        reason: &'static str,
    ) -> ArgumentParser {
        self.specs.push(ArgSpec {
            validator,
            name,
            reason,
        });
        self
    }

    /// Validate context and arguments, returning the effective context and
    /// the evaluated argument values.
    pub fn parse(
        &self,
        context: &Value,
        arguments: &[Value],
        state: &mut QueryState,
    ) -> Result<(Value, Vec<Value>), QueryError> {
        let (context_validator, context_reason) = self.context.unwrap_or((crate::value::anything, ""));
        let accepts_context = |v: &Value| is_absorbing_null(v) || context_validator(v);

        let context = if accepts_context(context) {
            context.clone()
        } else if let Some(grouping) = unwrap_single(context, accepts_context) {
            grouping
        } else {
            return Err(QueryError::type_error(format!(
                "{} operator can't operate on {}. {}",
                self.operator,
                context.type_name(),
                context_reason
            )));
        };

        if self.specs.len() != arguments.len() {
            return Err(QueryError::type_error(format!(
                "{} operator expects {} arguments, got {}",
                self.operator,
                self.specs.len(),
                arguments.len()
            )));
        }

        let mut values = Vec::with_capacity(arguments.len());
        for (argument, spec) in arguments.iter().zip(&self.specs) {
            let accepts = |v: &Value| is_absorbing_null(v) || (spec.validator)(v);

            // A chain the validator rejects stands for its result: run it
            // against the current context and validate what comes out.
            let mut value = argument.clone();
            if !accepts(&value) {
                if let Value::Chain(chain) = argument {
                    value = run_argument_chain(chain, &context, state)?;
                }
            }
            if !accepts(&value) {
                match unwrap_single(&value, accepts) {
                    Some(grouping) => value = grouping,
                    None => {
                        return Err(QueryError::type_error(format!(
                            "{} operator, argument '{}' can't be {}. {}",
                            self.operator,
                            spec.name,
                            value.type_name(),
                            spec.reason
                        )))
                    }
                }
            }
            values.push(value);
        }

        Ok((context, values))
    }
}

/// Evaluate a chain argument against the current context.
fn run_argument_chain(
    chain: &Chain,
    context: &Value,
    state: &mut QueryState,
) -> Result<Value, QueryError> {
    chain.run(context.clone(), state)
}

/// A one-element object list where the bare grouping would pass counts as
/// that grouping.
fn unwrap_single(value: &Value, accepts: impl Fn(&Value) -> bool) -> Option<Value> {
    if !is_single_object_list(value) {
        return None;
    }
    let Value::Objects(list) = value else {
        return None;
    };
    let grouping = Value::Grouping(list.groupings()[0].clone());
    accepts(&grouping).then_some(grouping)
}

/// True when the context or any argument is the absorbing null; operators
/// with absorbing semantics return `AbsorbingNull` unchanged in that case.
pub fn absorbs(context: &Value, arguments: &[Value]) -> bool {
    is_absorbing_null(context) || arguments.iter().any(is_absorbing_null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ObjectList;
    use crate::value::{is_int, is_object_grouping, is_string};

    fn state() -> QueryState {
        QueryState::with_data(ObjectList::new(vec![]))
    }

    #[test]
    fn arity_is_enforced() {
        let parser = ArgumentParser::new("demo").context(crate::value::anything, "").arg(
            is_string,
            "name",
            "must be a string",
        );
        let err = parser
            .parse(&Value::Null, &[], &mut state())
            .expect_err("missing argument");
        assert!(err.message.contains("expects 1 arguments, got 0"));
    }

    #[test]
    fn wrong_argument_type_names_operator_and_argument() {
        let parser = ArgumentParser::new("demo").context(crate::value::anything, "").arg(
            is_string,
            "name",
            "must be a string",
        );
        let err = parser
            .parse(&Value::Null, &[Value::Int(3)], &mut state())
            .expect_err("bad argument");
        assert!(err.message.contains("demo operator, argument 'name'"));
        assert!(err.message.contains("Int"));
    }

    #[test]
    fn absorbing_null_passes_any_validator() {
        let parser = ArgumentParser::new("demo")
            .context(is_int, "needs an int")
            .arg(is_string, "name", "must be a string");
        let (context, args) = parser
            .parse(&Value::AbsorbingNull, &[Value::AbsorbingNull], &mut state())
            .expect("absorbing passes");
        assert_eq!(context, Value::AbsorbingNull);
        assert_eq!(args[0], Value::AbsorbingNull);
        assert!(absorbs(&context, &args));
    }

    #[test]
    fn single_object_list_unwraps_to_grouping() {
        let raw = std::sync::Arc::new(
            crate::entity::RawObject::from_json(&serde_json::json!({
                "__id__": "a", "__types__": ["t"], "__source__": "s"
            }))
            .expect("valid object"),
        );
        let list = ObjectList::from_raw(vec![raw]).expect("valid list");
        let parser = ArgumentParser::new("demo").context(is_object_grouping, "needs one object");
        let (context, _) = parser
            .parse(&Value::Objects(list), &[], &mut state())
            .expect("unwraps");
        assert!(is_object_grouping(&context));
    }
}
