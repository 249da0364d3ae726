//! # Operator Library
//!
//! Every operator the query language exposes, grouped by family, plus the
//! registry the parser resolves call sites against. An operator is a name
//! and a runner over `(context, arguments, state)`; argument validation is
//! declarative through [`args::ArgumentParser`].

pub mod args;

pub mod analysis;
pub mod comparison;
pub mod fields;
pub mod iterate;
pub mod lists;
pub mod logical;
pub mod objects;
pub mod slices;
pub mod utility;

use crate::chain::Operator;

pub use analysis::{DESCRIBE, SUMMARY};
pub use comparison::{EQUALS, REGEX_EQUALS};
pub use fields::{GET_FIELD, GET_FIELD_REGEX, HAS_FIELD, SELECT};
pub use iterate::{FILTER, FOREACH, MAP};
pub use lists::{ANY, COUNT, FLATTEN, INCLUDES, UNIQUE};
pub use logical::{AND, OR};
pub use objects::{FILTER_BY_SOURCE, FILTER_BY_TYPE, GET_BY_ID, TYPES};
pub use slices::SLICE;
pub use utility::{ADD, SHOW_PLAN, TO_JSON};

/// Every registered operator, in the order they are documented.
pub static ALL_OPERATORS: &[&Operator] = &[
    &EQUALS,
    &REGEX_EQUALS,
    &AND,
    &OR,
    &ADD,
    &GET_FIELD,
    &GET_FIELD_REGEX,
    &HAS_FIELD,
    &FILTER,
    &MAP,
    &FOREACH,
    &SELECT,
    &INCLUDES,
    &FLATTEN,
    &UNIQUE,
    &COUNT,
    &ANY,
    &TYPES,
    &SLICE,
    &GET_BY_ID,
    &FILTER_BY_TYPE,
    &FILTER_BY_SOURCE,
    &TO_JSON,
    &SHOW_PLAN,
    &DESCRIBE,
    &SUMMARY,
];

/// Resolve an operator by the name used in query text.
pub fn lookup(name: &str) -> Option<&'static Operator> {
    ALL_OPERATORS.iter().copied().find(|op| op.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_registered_operators() {
        assert!(lookup("get_field").is_some());
        assert!(lookup("filter_by_type").is_some());
        assert!(lookup("no_such_operator").is_none());
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = ALL_OPERATORS.iter().map(|op| op.name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(names.len(), before);
    }
}
