//! # Query Parser
//!
//! Turns query text into a typed operator pipeline in two steps:
//!
//! 1. [`tokenize`] splits the text into tokens. Alphanumeric/underscore runs
//!    are one token, a `-` in number position starts a signed literal, and
//!    every other character (whitespace included) is its own token. Joining
//!    the tokens reproduces the input exactly, which is what lets every
//!    parse error point back at real source positions.
//! 2. [`parse_query`] walks the tokens with a small state machine and
//!    produces either a [`Chain`] of operator nodes or a single literal.
//!
//! The surface syntax is dot-chained calls plus shorthands that expand to
//! canonical operators:
//!
//! ```text
//! .field            get_field("field", true, false)   (! and [] tweak flags)
//! employee          filter_by_type("employee")         (position 0 only)
//! #id  /  #pre_*    get_by_id("id")  /  anchored regex filter on __id__
//! @source           filter_by_source("source")         (position 0 only)
//! [expr]            filter(expr)     [1:3]  slice      [[a, b]]  select
//! { a, b }          foreach(a, b)
//! lhs == rhs        equals(lhs, rhs)      lhs =~ rhs   regex_equals
//! a && b  /  a || b and(a, b)  /  or(a, b)
//! ```

use std::sync::Arc;

use crate::chain::{Chain, OperatorNode};
use crate::error::{Area, QueryError, TokenStream};
use crate::operators::{
    lookup, AND, EQUALS, FILTER, FILTER_BY_SOURCE, FILTER_BY_TYPE, FOREACH, GET_BY_ID, GET_FIELD,
    OR, REGEX_EQUALS, SELECT, SLICE,
};
use crate::value::Value;

/// Split a query string into tokens.
///
/// Invariant: `tokenize(s).concat() == s`, checked by assertion.
pub fn tokenize(query: &str) -> Vec<String> {
    let chars: Vec<char> = query.chars().collect();
    let mut tokens: Vec<String> = Vec::new();
    let mut run = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() || c == '_' {
            run.push(c);
            continue;
        }
        if !run.is_empty() {
            tokens.push(std::mem::take(&mut run));
        }
        // A minus in number position starts a signed literal; after an
        // operand it is its own token.
        let starts_number = c == '-'
            && (i == 0 || {
                let prev = chars[i - 1];
                !prev.is_alphanumeric() && prev != '_' && prev != ']' && prev != ')'
            });
        if starts_number {
            run.push('-');
        } else {
            tokens.push(c.to_string());
        }
    }
    if !run.is_empty() {
        tokens.push(run);
    }

    let rejoined: String = tokens.concat();
    assert_eq!(rejoined, query, "tokenizer round-trip invariant broken");
    tokens
}

/// Parse a query into a chain or a single literal value.
pub fn parse_query(query: &str) -> Result<Value, QueryError> {
    let tokens: TokenStream = Arc::new(tokenize(query));
    let area = Area::whole(tokens);
    parse_area(&area)
}

/// Intermediate parse result: operator nodes chain up, lone literals stand
/// alone, and any other mix is a parse error.
enum ParseItem {
    Literal(Value),
    Node(OperatorNode),
}

fn is_whitespace_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(char::is_whitespace)
}

fn is_identifier_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// `"123"` or `"-123"`.
fn parse_int_token(token: &str) -> Option<Result<i64, QueryError>> {
    let digits = token.strip_prefix('-').unwrap_or(token);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(
        token
            .parse::<i64>()
            .map_err(|_| QueryError::parse(format!("Integer literal out of range: {token}"))),
    )
}

/// Drop leading and trailing whitespace tokens.
fn trim_whitespace(area: &Area) -> Area {
    let mut lo = 0;
    let mut hi = area.len();
    while lo < hi && area.token(lo).is_some_and(is_whitespace_token) {
        lo += 1;
    }
    while hi > lo && area.token(hi - 1).is_some_and(is_whitespace_token) {
        hi -= 1;
    }
    area.sub(lo, hi)
}

/// Collect the argument windows of a bracketed form.
///
/// Returns the relative `(start, end)` token span of each argument and the
/// relative index of the matching closer. Only the given bracket pair
/// contributes to nesting depth; the separator splits at depth one.
fn bracket_arguments(
    area: &Area,
    open_index: usize,
    open: &str,
    close: &str,
    separator: Option<&str>,
) -> Result<(Vec<(usize, usize)>, usize), QueryError> {
    debug_assert_eq!(area.token(open_index), Some(open));
    let mut depth = 1usize;
    let mut windows = Vec::new();
    let mut argument_start = open_index + 1;

    let mut j = open_index + 1;
    while j < area.len() {
        let token = area.token(j).unwrap_or_default();
        if depth == 1 && Some(token) == separator {
            windows.push((argument_start, j));
            argument_start = j + 1;
        } else if token == open {
            depth += 1;
        } else if token == close {
            depth -= 1;
            if depth == 0 {
                windows.push((argument_start, j));
                return Ok((windows, j));
            }
        }
        j += 1;
    }
    Err(QueryError::parse(format!("Couldn't find a matching '{close}'"))
        .with_area(area.sub(open_index, area.len())))
}

/// Fold accumulated items into the parse result.
fn fold_results(results: Vec<ParseItem>, area: &Area) -> Result<Value, QueryError> {
    if results.is_empty() {
        return Err(QueryError::parse("Empty query").with_area(area.sub(0, area.len())));
    }
    if results.iter().all(|r| matches!(r, ParseItem::Node(_))) {
        let nodes = results
            .into_iter()
            .filter_map(|r| match r {
                ParseItem::Node(node) => Some(node),
                ParseItem::Literal(_) => None,
            })
            .collect();
        return Ok(Value::Chain(Chain::new(nodes)));
    }
    if results.len() == 1 {
        if let Some(ParseItem::Literal(value)) = results.into_iter().next() {
            return Ok(value);
        }
    }
    Err(
        QueryError::parse("Expected a single literal or a chain of operators")
            .with_area(area.sub(0, area.len())),
    )
}

/// Fold everything parsed so far into the left operand of a binary operator
/// and parse the remainder as the right operand.
fn fold_binary(
    operator: &'static crate::chain::Operator,
    results: Vec<ParseItem>,
    area: &Area,
    rhs_start: usize,
) -> Result<Value, QueryError> {
    let left = fold_results(results, area)?;
    let right = parse_area(&area.sub(rhs_start, area.len()))?;
    let node = OperatorNode::new(operator, vec![left, right], area.sub(0, area.len()));
    Ok(Value::Chain(Chain::new(vec![node])))
}

fn parse_area(area: &Area) -> Result<Value, QueryError> {
    let area = trim_whitespace(area);
    let mut results: Vec<ParseItem> = Vec::new();
    let mut i = 0usize;

    while i < area.len() {
        let token = area.token(i).unwrap_or_default();

        if is_whitespace_token(token) {
            i += 1;
            continue;
        }

        match token {
            "*" => {
                if i != 0 {
                    return Err(QueryError::parse(
                        "'*' is only allowed at the start of a query",
                    )
                    .with_area(area.sub(i, i + 1)));
                }
                i += 1;
            }
            "." => {
                i = parse_dot(&area, i, &mut results)?;
            }
            "'" | "\"" => {
                let quote = token;
                let mut text = String::new();
                let mut j = i + 1;
                loop {
                    match area.token(j) {
                        None => {
                            return Err(QueryError::parse("Unterminated string literal")
                                .with_area(area.sub(i, area.len())))
                        }
                        Some(t) if t == quote => break,
                        Some(t) => {
                            text.push_str(t);
                            j += 1;
                        }
                    }
                }
                results.push(ParseItem::Literal(Value::String(text)));
                i = j + 1;
            }
            "true" | "false" => {
                results.push(ParseItem::Literal(Value::Bool(token == "true")));
                i += 1;
            }
            "null" => {
                results.push(ParseItem::Literal(Value::Null));
                i += 1;
            }
            "=" => {
                return match area.token(i + 1) {
                    Some("=") => fold_binary(&EQUALS, results, &area, i + 2),
                    Some("~") => fold_binary(&REGEX_EQUALS, results, &area, i + 2),
                    _ => Err(QueryError::parse("Expected == or =~, got a lone =")
                        .with_area(area.sub(i, i + 1))),
                };
            }
            "&" => {
                if area.token(i + 1) != Some("&") {
                    return Err(QueryError::parse("Expected &&, got a lone &")
                        .with_area(area.sub(i, i + 1)));
                }
                return fold_binary(&AND, results, &area, i + 2);
            }
            "|" => {
                if area.token(i + 1) != Some("|") {
                    return Err(QueryError::parse("Expected ||, got a lone |")
                        .with_area(area.sub(i, i + 1)));
                }
                return fold_binary(&OR, results, &area, i + 2);
            }
            "[" => {
                i = parse_bracket(&area, i, &mut results)?;
            }
            "{" => {
                let (windows, close) = bracket_arguments(&area, i, "{", "}", Some(","))?;
                let mut arguments = Vec::with_capacity(windows.len());
                for (start, end) in &windows {
                    arguments.push(parse_area(&area.sub(*start, *end))?);
                }
                results.push(ParseItem::Node(OperatorNode::new(
                    &FOREACH,
                    arguments,
                    area.sub(i, close + 1),
                )));
                i = close + 1;
            }
            "#" => {
                i = parse_id_shorthand(&area, i, &mut results)?;
            }
            "@" => {
                if i != 0 {
                    return Err(QueryError::parse(
                        "The @source shorthand is only allowed at the start of a query",
                    )
                    .with_area(area.sub(i, i + 1)));
                }
                let source = area.token(i + 1).filter(|t| is_identifier_token(t)).ok_or_else(
                    || {
                        QueryError::parse("Expected a source name after @")
                            .with_area(area.sub(i, (i + 2).min(area.len())))
                    },
                )?;
                results.push(ParseItem::Node(OperatorNode::new(
                    &FILTER_BY_SOURCE,
                    vec![Value::String(source.to_string())],
                    area.sub(i, i + 2),
                )));
                i += 2;
            }
            other => {
                if let Some(int) = parse_int_token(other) {
                    results.push(ParseItem::Literal(Value::Int(int?)));
                    i += 1;
                    continue;
                }
                if i != 0 {
                    return Err(QueryError::parse(format!(
                        "A bare type filter is only allowed at the beginning, got '{other}'"
                    ))
                    .with_area(area.sub(i, i + 1)));
                }
                results.push(ParseItem::Node(OperatorNode::new(
                    &FILTER_BY_TYPE,
                    vec![Value::String(other.to_string())],
                    area.sub(i, i + 1),
                )));
                i += 1;
            }
        }
    }

    fold_results(results, &area)
}

/// Everything after a `.`: an explicit `name(args)` call, or a field-read
/// shorthand with optional `!` and `[]` suffixes.
fn parse_dot(area: &Area, dot: usize, results: &mut Vec<ParseItem>) -> Result<usize, QueryError> {
    let mut j = dot + 1;
    while j < area.len() && area.token(j).is_some_and(is_whitespace_token) {
        j += 1;
    }
    let Some(name) = area.token(j) else {
        return Err(QueryError::parse("Expected an operator or field name after '.'")
            .with_area(area.sub(dot, area.len())));
    };

    let mut paren = j + 1;
    while paren < area.len() && area.token(paren).is_some_and(is_whitespace_token) {
        paren += 1;
    }
    if area.token(paren) == Some("(") {
        let operator = lookup(name).ok_or_else(|| {
            QueryError::parse(format!("Invalid operator: {name}")).with_area(area.sub(j, j + 1))
        })?;
        let (windows, close) = bracket_arguments(area, paren, "(", ")", Some(","))?;
        let no_arguments = windows.len() == 1
            && (windows[0].0..windows[0].1)
                .all(|k| area.token(k).is_some_and(is_whitespace_token));
        let arguments = if no_arguments {
            Vec::new()
        } else {
            let mut arguments = Vec::with_capacity(windows.len());
            for (start, end) in &windows {
                arguments.push(parse_area(&area.sub(*start, *end))?);
            }
            arguments
        };
        results.push(ParseItem::Node(OperatorNode::new(
            operator,
            arguments,
            area.sub(dot, close + 1),
        )));
        return Ok(close + 1);
    }

    // Field-read shorthand. `!` demands the field, `[]` asks for every
    // source's value instead of the merged one.
    let mut end = j + 1;
    let mut return_none_if_missing = true;
    let mut return_all_values = false;
    if area.token(end) == Some("!") {
        return_none_if_missing = false;
        end += 1;
    }
    if area.token(end) == Some("[") && area.token(end + 1) == Some("]") {
        return_all_values = true;
        end += 2;
    }
    results.push(ParseItem::Node(OperatorNode::new(
        &GET_FIELD,
        vec![
            Value::String(name.to_string()),
            Value::Bool(return_none_if_missing),
            Value::Bool(return_all_values),
        ],
        area.sub(dot, end),
    )));
    Ok(end)
}

/// A `[...]` form: slice, select (`[[ ... ]]`) or filter.
fn parse_bracket(
    area: &Area,
    open: usize,
    results: &mut Vec<ParseItem>,
) -> Result<usize, QueryError> {
    let (windows, close) = bracket_arguments(area, open, "[", "]", None)?;
    let (content_start, content_end) = windows[0];
    let bracket_area = area.sub(open, close + 1);

    let content: Vec<&str> = (content_start..content_end)
        .filter_map(|k| area.token(k))
        .collect();
    if content.iter().all(|t| is_whitespace_token(t)) {
        return Err(QueryError::parse("Empty brackets").with_area(bracket_area));
    }

    // Single index: [2] cuts one element, [-1] the tail.
    if content.len() == 1 {
        if let Some(int) = parse_int_token(content[0]) {
            let index = int?;
            let arguments = if index >= 0 {
                vec![Value::Int(index), Value::Int(index + 1)]
            } else {
                vec![Value::Int(index), Value::Null]
            };
            results.push(ParseItem::Node(OperatorNode::new(
                &SLICE,
                arguments,
                bracket_area,
            )));
            return Ok(close + 1);
        }
    }

    // Slice grammar: up to three colon-separated parts, each empty or a
    // plain integer.
    if content.iter().any(|t| *t == ":") {
        let mut parts: Vec<Vec<&str>> = vec![Vec::new()];
        for t in &content {
            if *t == ":" {
                parts.push(Vec::new());
            } else if let Some(last) = parts.last_mut() {
                last.push(t);
            }
        }
        if parts.len() <= 3 {
            let mut arguments = Vec::with_capacity(parts.len());
            let mut is_slice = true;
            for part in &parts {
                match part.as_slice() {
                    [] => arguments.push(Value::Null),
                    [single] => match parse_int_token(single) {
                        Some(int) => arguments.push(Value::Int(int?)),
                        None => {
                            is_slice = false;
                            break;
                        }
                    },
                    _ => {
                        is_slice = false;
                        break;
                    }
                }
            }
            if is_slice {
                results.push(ParseItem::Node(OperatorNode::new(
                    &SLICE,
                    arguments,
                    bracket_area,
                )));
                return Ok(close + 1);
            }
        }
    }

    // Select: [[ chain, chain, ... ]].
    let first_significant = (content_start..content_end)
        .find(|k| area.token(*k).is_some_and(|t| !is_whitespace_token(t)));
    let last_significant = (content_start..content_end)
        .rev()
        .find(|k| area.token(*k).is_some_and(|t| !is_whitespace_token(t)));
    if let (Some(first), Some(last)) = (first_significant, last_significant) {
        if first < last && area.token(first) == Some("[") && area.token(last) == Some("]") {
            let (select_windows, _) = bracket_arguments(area, first, "[", "]", Some(","))?;
            let mut arguments = Vec::with_capacity(select_windows.len());
            for (start, end) in &select_windows {
                arguments.push(parse_area(&area.sub(*start, *end))?);
            }
            results.push(ParseItem::Node(OperatorNode::new(
                &SELECT,
                arguments,
                bracket_area,
            )));
            return Ok(close + 1);
        }
    }

    // Filter: the bracket's content is one chain evaluated per element.
    let argument = parse_area(&area.sub(content_start, content_end))?;
    results.push(ParseItem::Node(OperatorNode::new(
        &FILTER,
        vec![argument],
        bracket_area,
    )));
    Ok(close + 1)
}

/// `#id` looks one object up by id; a `*` in the id turns the whole
/// shorthand into an anchored-regex filter on `__id__`.
fn parse_id_shorthand(
    area: &Area,
    hash: usize,
    results: &mut Vec<ParseItem>,
) -> Result<usize, QueryError> {
    if hash != 0 {
        return Err(
            QueryError::parse("The #id shorthand is only allowed at the start of a query")
                .with_area(area.sub(hash, hash + 1)),
        );
    }

    let mut j = hash + 1;
    let mut id = String::new();
    while let Some(token) = area.token(j) {
        let id_part = is_identifier_token(token)
            || token == "*"
            || token == "-"
            || parse_int_token(token).is_some();
        if !id_part {
            break;
        }
        id.push_str(token);
        j += 1;
    }
    if id.is_empty() {
        return Err(QueryError::parse("Expected an id after #")
            .with_area(area.sub(hash, (hash + 2).min(area.len()))));
    }
    let id_area = area.sub(hash, j);

    if id.contains('*') {
        let mut pattern = String::from("^");
        for (k, part) in id.split('*').enumerate() {
            if k > 0 {
                pattern.push_str(".*");
            }
            pattern.push_str(&regex::escape(part));
        }
        pattern.push('$');

        let read_id = Chain::new(vec![OperatorNode::new(
            &GET_FIELD,
            vec![
                Value::String(crate::entity::ID_KEY.to_string()),
                Value::Bool(true),
                Value::Bool(false),
            ],
            id_area.clone(),
        )]);
        let matches = Chain::new(vec![OperatorNode::new(
            &REGEX_EQUALS,
            vec![Value::Chain(read_id), Value::String(pattern)],
            id_area.clone(),
        )]);
        results.push(ParseItem::Node(OperatorNode::new(
            &FILTER,
            vec![Value::Chain(matches)],
            id_area,
        )));
    } else {
        results.push(ParseItem::Node(OperatorNode::new(
            &GET_BY_ID,
            vec![Value::String(id)],
            id_area,
        )));
    }
    Ok(j)
}
