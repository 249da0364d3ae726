//! Operator pipeline: the parsed form of a query.
//!
//! A [`Chain`] is an ordered sequence of [`OperatorNode`]s. Running a chain
//! threads the context value left to right through each node; each node runs
//! its operator, tags errors with its source area, and feeds any typed ids
//! the result carries back into the scope tracker.

use std::fmt;

use crate::error::{Area, QueryError};
use crate::state::QueryState;
use crate::value::Value;

/// Runner signature shared by every operator.
pub type Runner = fn(&Value, &[Value], &mut QueryState) -> Result<Value, QueryError>;

/// A named operator: the unit the parser resolves call sites against.
#[derive(Clone, Copy)]
pub struct Operator {
    pub name: &'static str,
    pub runner: Runner,
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator").field("name", &self.name).finish()
    }
}

impl PartialEq for Operator {
    fn eq(&self, other: &Operator) -> bool {
        self.name == other.name
    }
}

/// One call site in a chain: operator, arguments, and the source area the
/// call was parsed from.
#[derive(Debug, Clone)]
pub struct OperatorNode {
    pub operator: &'static Operator,
    pub arguments: Vec<Value>,
    pub area: Area,
}

impl OperatorNode {
    pub fn new(operator: &'static Operator, arguments: Vec<Value>, area: Area) -> OperatorNode {
        OperatorNode {
            operator,
            arguments,
            area,
        }
    }

    /// Run the operator against `context`.
    ///
    /// On failure the node's area is appended to the error's area stack. On
    /// success, a result that names typed ids (a grouping or object list)
    /// pins those ids onto every needed scope that asked for them.
    pub fn run(&self, context: Value, state: &mut QueryState) -> Result<Value, QueryError> {
        state.observer.start_part("RUN_OPERATOR", self.operator.name);
        let result = (self.operator.runner)(&context, &self.arguments, state)
            .map_err(|e| e.with_area(self.area.clone()));
        state.observer.end_part(self.operator.name);
        let result = result?;

        let id_types = match &result {
            Value::Grouping(grouping) => grouping.id_types().clone(),
            Value::Objects(list) => list.id_types(),
            _ => Default::default(),
        };
        if !id_types.is_empty() {
            state.needed_scopes = state.needed_scopes.set_id_types(&id_types);
        }
        Ok(result)
    }
}

// Equality is structural over operator and arguments; areas are diagnostic
// and two differently-written spellings of the same chain must compare equal.
impl PartialEq for OperatorNode {
    fn eq(&self, other: &OperatorNode) -> bool {
        self.operator == other.operator && self.arguments == other.arguments
    }
}

impl fmt::Display for OperatorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.operator.name)?;
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", argument.to_query_literal())?;
        }
        write!(f, ")")
    }
}

/// An ordered operator pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub nodes: Vec<OperatorNode>,
}

impl Chain {
    pub fn new(nodes: Vec<OperatorNode>) -> Chain {
        Chain { nodes }
    }

    /// Evaluate left to right, threading the context through every node.
    pub fn run(&self, mut context: Value, state: &mut QueryState) -> Result<Value, QueryError> {
        for node in &self.nodes {
            context = node.run(context, state)?;
        }
        Ok(context)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, ".{node}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TokenStream;
    use std::sync::Arc;

    fn area() -> Area {
        let tokens: TokenStream = Arc::new(vec!["x".to_string()]);
        Area::whole(tokens)
    }

    fn ok_runner(_: &Value, _: &[Value], _: &mut QueryState) -> Result<Value, QueryError> {
        Ok(Value::Int(1))
    }

    fn err_runner(_: &Value, _: &[Value], _: &mut QueryState) -> Result<Value, QueryError> {
        Err(QueryError::type_error("nope"))
    }

    static OK: Operator = Operator {
        name: "ok",
        runner: ok_runner,
    };
    static FAIL: Operator = Operator {
        name: "fail",
        runner: err_runner,
    };

    #[test]
    fn chain_threads_context_and_tags_errors() {
        let mut state = QueryState::with_data(crate::entity::ObjectList::new(vec![]));
        let good = Chain::new(vec![OperatorNode::new(&OK, vec![], area())]);
        assert_eq!(good.run(Value::Null, &mut state).expect("runs"), Value::Int(1));

        let bad = Chain::new(vec![
            OperatorNode::new(&OK, vec![], area()),
            OperatorNode::new(&FAIL, vec![], area()),
        ]);
        let err = bad.run(Value::Null, &mut state).expect_err("fails");
        assert_eq!(err.area_stack.len(), 1);
    }

    #[test]
    fn node_equality_ignores_areas() {
        let tokens_a: TokenStream = Arc::new(vec!["a".to_string(), "b".to_string()]);
        let tokens_b: TokenStream = Arc::new(vec!["zzzz".to_string()]);
        let left = OperatorNode::new(&OK, vec![Value::Int(1)], Area::whole(tokens_a));
        let right = OperatorNode::new(&OK, vec![Value::Int(1)], Area::whole(tokens_b));
        assert_eq!(left, right);
        assert_ne!(left, OperatorNode::new(&OK, vec![Value::Int(2)], area()));
    }

    #[test]
    fn canonical_printing() {
        let chain = Chain::new(vec![OperatorNode::new(
            &OK,
            vec![Value::String("a".into()), Value::Bool(true)],
            area(),
        )]);
        assert_eq!(chain.to_string(), ".ok(\"a\", true)");
    }
}
