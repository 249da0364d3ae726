//! Query Error and Source-Area Model
//!
//! Every failure raised while parsing or running a query is a [`QueryError`]
//! carrying a stack of [`Area`]s: spans over the token stream of the original
//! query text. Each enclosing operator node appends its own area as the error
//! unwinds, so the outermost caller can point at the exact sub-expression
//! that failed and at every call site around it.
//!
//! Areas are measured in *tokens* and converted to character offsets only
//! when rendered, which keeps slicing cheap during recursive parsing.

use std::sync::Arc;
use thiserror::Error;

/// Token stream shared by every area cut from one query string.
///
/// Joining the tokens reproduces the original query exactly (the tokenizer
/// guarantees this), so character offsets can always be recovered.
pub type TokenStream = Arc<Vec<String>>;

/// A half-open `[start, end)` range over the token stream of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Area {
    start: usize,
    end: usize,
    tokens: TokenStream,
}

impl Area {
    pub fn new(tokens: TokenStream, start: usize, end: usize) -> Self {
        debug_assert!(start <= end && end <= tokens.len());
        Area { start, end, tokens }
    }

    /// Area spanning the whole token stream.
    pub fn whole(tokens: TokenStream) -> Self {
        let end = tokens.len();
        Area::new(tokens, 0, end)
    }

    /// Sub-area at `[rel_start, rel_end)` relative to this area's start.
    pub fn sub(&self, rel_start: usize, rel_end: usize) -> Area {
        Area::new(
            Arc::clone(&self.tokens),
            self.start + rel_start,
            self.start + rel_end,
        )
    }

    /// Number of tokens in the area.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Token at index `i` relative to the area start, if in range.
    pub fn token(&self, i: usize) -> Option<&str> {
        if i < self.len() {
            Some(self.tokens[self.start + i].as_str())
        } else {
            None
        }
    }

    /// The text this area covers.
    pub fn text(&self) -> String {
        self.tokens[self.start..self.end].concat()
    }

    /// The full query text the area was cut from.
    pub fn query(&self) -> String {
        self.tokens.concat()
    }

    /// Character offsets `(start, end)` of this area within the query text.
    pub fn char_span(&self) -> (usize, usize) {
        let start: usize = self.tokens[..self.start].iter().map(String::len).sum();
        let width: usize = self.tokens[self.start..self.end].iter().map(String::len).sum();
        (start, start + width)
    }

    /// Render the query with a caret line underlining this area.
    ///
    /// ```text
    /// employee.cuont()
    ///          ^^^^^
    /// ```
    pub fn underline(&self) -> String {
        let query = self.query();
        let (start, end) = self.char_span();
        let carets: String = query
            .chars()
            .enumerate()
            .map(|(i, c)| {
                if i >= start && i < end {
                    '^'
                } else if c == '\t' {
                    '\t'
                } else {
                    ' '
                }
            })
            .collect();
        format!("{query}\n{}", carets.trim_end())
    }
}

/// Failure category of a [`QueryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Malformed query text: unknown tokens, mismatched brackets, bad arity.
    Parse,
    /// A context or argument failed its operator's validator.
    Type,
    /// A field was missing where the operator demanded its presence.
    Field,
    /// Conflicting definitions across sources that cannot be reconciled.
    Merge,
    /// An invalid regular expression pattern.
    Regex,
}

/// Error raised while parsing or evaluating a query.
///
/// `could_succeed_with_more_data` marks failures that the lazy-fetch driver
/// may resolve by downloading further scopes (a missing field can appear once
/// the provider supplies the slice that carries it).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub message: String,
    pub area_stack: Vec<Area>,
    pub could_succeed_with_more_data: bool,
}

impl QueryError {
    fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        QueryError {
            kind,
            message: message.into(),
            area_stack: Vec::new(),
            could_succeed_with_more_data: false,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        QueryError::new(QueryErrorKind::Parse, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        QueryError::new(QueryErrorKind::Type, message)
    }

    /// A missing-field error; more data could make it succeed.
    pub fn field(message: impl Into<String>) -> Self {
        let mut err = QueryError::new(QueryErrorKind::Field, message);
        err.could_succeed_with_more_data = true;
        err
    }

    pub fn merge(message: impl Into<String>) -> Self {
        QueryError::new(QueryErrorKind::Merge, message)
    }

    pub fn regex(message: impl Into<String>) -> Self {
        QueryError::new(QueryErrorKind::Regex, message)
    }

    /// Append an enclosing area as the error propagates outward.
    pub fn with_area(mut self, area: Area) -> Self {
        self.area_stack.push(area);
        self
    }

    /// Render the innermost offending area with carets, if any was recorded.
    pub fn render_area(&self) -> Option<String> {
        self.area_stack.first().map(Area::underline)
    }
}

/// Convenience assertion that raises a [`QueryError`] instead of panicking.
pub fn ensure(condition: bool, err: impl FnOnce() -> QueryError) -> Result<(), QueryError> {
    if condition {
        Ok(())
    } else {
        Err(err())
    }
}

/// Top-level engine failures surfaced by the lazy-fetch driver.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The driver made no progress against the remaining needed scopes.
    #[error("Failed to download all scopes: {scopes}")]
    ScopesUnavailable { scopes: String },

    /// A provider failed outside the per-scope retry path (connect, bulk fetch).
    #[error(transparent)]
    Provider(#[from] crate::provider::ProviderError),

    /// A query error escaped the per-query catch (parser internal misuse).
    #[error(transparent)]
    Query(#[from] QueryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(parts: &[&str]) -> TokenStream {
        Arc::new(parts.iter().map(|s| (*s).to_string()).collect())
    }

    #[test]
    fn char_span_accounts_for_token_widths() {
        let tokens = stream(&["employee", ".", "count", "(", ")"]);
        let area = Area::new(tokens, 2, 3);
        assert_eq!(area.char_span(), (9, 14));
        assert_eq!(area.text(), "count");
    }

    #[test]
    fn underline_points_at_area() {
        let tokens = stream(&["employee", ".", "count", "(", ")"]);
        let area = Area::new(tokens, 2, 5);
        let rendered = area.underline();
        assert_eq!(rendered, "employee.count()\n         ^^^^^^^");
    }

    #[test]
    fn area_stack_grows_outward() {
        let tokens = stream(&["a", ".", "b"]);
        let inner = Area::new(Arc::clone(&tokens), 2, 3);
        let outer = Area::whole(tokens);
        let err = QueryError::type_error("boom")
            .with_area(inner.clone())
            .with_area(outer);
        assert_eq!(err.area_stack.len(), 2);
        assert_eq!(err.area_stack[0], inner);
        assert!(!err.could_succeed_with_more_data);
    }

    #[test]
    fn field_errors_may_succeed_with_more_data() {
        assert!(QueryError::field("no such field").could_succeed_with_more_data);
        assert!(!QueryError::merge("conflict").could_succeed_with_more_data);
    }
}
