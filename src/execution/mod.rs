//! # Executor and Lazy-Fetch Driver
//!
//! [`execute_once`] runs one query against whatever data is currently
//! loaded. [`execute_fully`] wraps it in the fixed-point loop: run, diff the
//! scopes the query still needs against the scopes already downloaded, ask
//! each missing scope's provider for its slice, merge, and run again - until
//! nothing is missing or no download makes progress.
//!
//! Query errors never escape an execution: they are stringified into an
//! `Error: ...` result, because a failing pass may still have produced the
//! scope demands the driver needs to make the next pass succeed.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::{EngineError, QueryError};
use crate::parser::parse_query;
use crate::provider::Providers;
use crate::state::QueryState;
use crate::value::Value;

/// Parse and evaluate one query against the given state.
pub(crate) fn run_subquery(query: &str, state: &mut QueryState) -> Result<Value, QueryError> {
    match parse_query(query)? {
        Value::Chain(chain) => chain.run(Value::Objects(state.all_data.clone()), state),
        literal => Ok(literal),
    }
}

/// Run one query against the current data, catching query errors into an
/// `Error: ...` string result. The state comes back regardless so the driver
/// can inspect the scopes the attempt would have needed.
pub fn execute_once(query: &str, providers: &mut Providers) -> (Value, QueryState) {
    providers.reset_overlays();
    let mut state = QueryState::setup(providers);
    state.observer.start_part("EXECUTE", query);
    let result = match run_subquery(query, &mut state) {
        Ok(value) => value,
        Err(error) => Value::String(format!("Error: {error}")),
    };
    state.observer.end_part(query);
    (result, state)
}

/// Run a query to its lazy-fetch fixed point.
///
/// Each iteration executes the query, then downloads every scope the query
/// needs that has not been downloaded yet. Per-scope provider failures are
/// warnings; only a full iteration without progress aborts.
pub fn execute_fully(query: &str, providers: &mut Providers) -> Result<Value, EngineError> {
    loop {
        let (result, state) = execute_once(query, providers);

        let needed = state.final_needed_scopes();
        let missing = needed.missing_from(providers.downloaded_scopes());
        if missing.is_empty() {
            return Ok(result);
        }
        debug!(missing = missing.len(), "scopes still needed");

        let fallback_id_types = state.known_id_types();
        for scope in &missing {
            match providers.download_scope(scope, &fallback_id_types) {
                Ok(count) => {
                    info!(scope = %scope, objects = count, "downloaded scope");
                }
                Err(error) => {
                    warn!(scope = %scope, %error, "scope download failed");
                }
            }
        }

        let still_missing: HashSet<_> = needed.missing_from(providers.downloaded_scopes());
        if still_missing == missing {
            let mut names: Vec<String> = still_missing.iter().map(ToString::to_string).collect();
            names.sort_unstable();
            return Err(EngineError::ScopesUnavailable {
                scopes: names.join(", "),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::MemoryProvider;
    use serde_json::json;

    fn providers() -> Providers {
        let provider = MemoryProvider::new("people")
            .with_bulk(vec![
                json!({"__id__": "e1", "__types__": ["employee"], "__source__": "hr", "name": "Alice"}),
                json!({"__id__": "e2", "__types__": ["employee"], "__source__": "hr", "name": "Bo"}),
            ]);
        Providers::connect(vec![Box::new(provider)]).expect("connects")
    }

    #[test]
    fn execute_once_runs_chains_and_returns_literals() {
        let mut providers = providers();
        let (result, _) = execute_once("employee.count()", &mut providers);
        assert_eq!(result, Value::Int(2));

        let (literal, _) = execute_once("42", &mut providers);
        assert_eq!(literal, Value::Int(42));
    }

    #[test]
    fn execute_once_catches_query_errors() {
        let mut providers = providers();
        let (result, _) = execute_once(".does_not_parse(", &mut providers);
        let Value::String(text) = result else {
            panic!("expected an error string")
        };
        assert!(text.starts_with("Error: "));
    }

    #[test]
    fn execute_fully_is_execute_once_when_nothing_is_lazy() {
        let mut providers = providers();
        let result = execute_fully("employee.count()", &mut providers).expect("converges");
        assert_eq!(result, Value::Int(2));
    }
}
