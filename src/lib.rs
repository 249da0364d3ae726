//! # Quarry Federated Query Engine
//!
//! Quarry federates heterogeneous JSON object feeds from independent data
//! providers and exposes a concise, chainable query language for exploring,
//! filtering, projecting and joining that data. An object is an id plus one
//! or more types; the same logical id may be contributed by several
//! providers, and the engine merges those contributions on read, reporting
//! conflicts instead of silently picking a winner.
//!
//! ## Pipeline
//!
//! ```text
//! Query text
//!     |
//! [Tokenizer]          -> tokens (join(tokens) == input)
//!     |
//! [Parser]             -> Chain of operator nodes (+ source areas)
//!     |
//! [Executor]           -> result value, narrowing needed scopes as it runs
//!     |
//! [Lazy-fetch driver]  -> diff needed vs downloaded scopes, fetch, re-run
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use quarry::execution::execute_fully;
//! use quarry::provider::memory::MemoryProvider;
//! use quarry::provider::Providers;
//! use quarry::value::Value;
//!
//! let provider = MemoryProvider::new("hr").with_bulk(vec![
//!     serde_json::json!({
//!         "__id__": "e1", "__types__": ["employee"], "__source__": "hr",
//!         "name": "Alice"
//!     }),
//! ]);
//! let mut providers = Providers::connect(vec![Box::new(provider)])?;
//!
//! let count = execute_fully("employee.count()", &mut providers)?;
//! assert_eq!(count, Value::Int(1));
//! # Ok::<(), quarry::error::EngineError>(())
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `parser` | query text -> tokens -> chain |
//! | `chain` | operator nodes and chain evaluation |
//! | `operators` | the operator library + argument schemas |
//! | `value` | the value domain (primitives, customs, absorbing null) |
//! | `entity` | raw objects, groupings, object lists |
//! | `scope` | typed data demands and their narrowing ops |
//! | `state` | per-query runtime state |
//! | `execution` | execute-once + the lazy-fetch fixed point |
//! | `provider` | provider contract, registry, in-memory impl |
//! | `render` | plain-text result rendering |
//! | `config` | figment config + providers file |
//! | `observer` | structured query events |

pub mod chain;
pub mod config;
pub mod entity;
pub mod error;
pub mod execution;
pub mod observer;
pub mod operators;
pub mod parser;
pub mod provider;
pub mod render;
pub mod scope;
pub mod state;
pub mod value;

// Re-export the surface most embedders touch.
pub use chain::{Chain, Operator, OperatorNode};
pub use config::Config;
pub use entity::{Grouping, ObjectList, RawObject};
pub use error::{Area, EngineError, QueryError, QueryErrorKind};
pub use execution::{execute_fully, execute_once};
pub use parser::{parse_query, tokenize};
pub use provider::{Provider, Providers};
pub use render::render_value;
pub use scope::{Condition, FieldSet, Scope, Scopes};
pub use state::QueryState;
pub use value::{CustomValue, Value};
