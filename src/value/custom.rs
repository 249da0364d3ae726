//! Custom Semantic Values
//!
//! Properties on the wire may carry a `__sa_type__` tag that promotes a JSON
//! map to one of the closed variants below. Each variant validates its
//! payload at ingestion, resolves to a plain value on field access (possibly
//! consulting the query state, e.g. `link` runs a sub-query), and renders a
//! short text form for display.
//!
//! The tag table in [`CustomValue::from_json_map`] is the single registry;
//! adding a variant means adding an arm there plus the three behaviors.

use std::collections::BTreeMap;

use chrono::DateTime;

use crate::entity::EntityError;
use crate::error::QueryError;
use crate::execution::run_subquery;
use crate::state::QueryState;
use crate::value::Value;

/// Key marking a JSON map as a custom value.
pub const TAG_KEY: &str = "__sa_type__";

/// A typed value beyond the JSON primitives.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomValue {
    /// Nanoseconds since the Unix epoch.
    Timestamp { timestamp: i64 },
    /// A stored query rendered as a clickable link.
    Link { query: String, show_text: String },
    /// A reference to another object by id, optionally pinned to a type
    /// and source.
    Ref {
        id: String,
        target_type: Option<String>,
        source: Option<String>,
        show_text: Option<String>,
    },
    /// A stored query.
    Query { query: String },
    Email { email: String },
    Url { url: String },
    Phone { phone: String },
    /// Nanosecond epoch range.
    DateRange { start: i64, end: i64 },
    Money { amount: f64, currency: String },
    Image { url: String, alt: Option<String> },
    TagList { tags: Vec<String> },
    /// `{placeholder}` template over a map of values.
    Template {
        template: String,
        values: BTreeMap<String, Value>,
    },
    /// Items stringified and joined with a separator.
    Join { items: Vec<Value>, sep: String },
    /// First item that resolves to something non-null and non-empty.
    FirstNonNull { items: Vec<Value> },
}

fn invalid(tag: &'static str, reason: impl Into<String>) -> EntityError {
    EntityError::InvalidCustomValue {
        tag,
        reason: reason.into(),
    }
}

fn require_str(
    map: &serde_json::Map<String, serde_json::Value>,
    tag: &'static str,
    key: &str,
) -> Result<String, EntityError> {
    map.get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| invalid(tag, format!("missing or non-string key '{key}'")))
}

fn optional_str(
    map: &serde_json::Map<String, serde_json::Value>,
    tag: &'static str,
    key: &str,
) -> Result<Option<String>, EntityError> {
    match map.get(key) {
        None => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid(tag, format!("key '{key}' must be a string"))),
    }
}

fn require_int(
    map: &serde_json::Map<String, serde_json::Value>,
    tag: &'static str,
    key: &str,
) -> Result<i64, EntityError> {
    map.get(key)
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| invalid(tag, format!("missing or non-integer key '{key}'")))
}

fn require_values(
    map: &serde_json::Map<String, serde_json::Value>,
    tag: &'static str,
    key: &str,
) -> Result<Vec<Value>, EntityError> {
    map.get(key)
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| invalid(tag, format!("missing or non-list key '{key}'")))?
        .iter()
        .map(Value::from_json)
        .collect()
}

impl CustomValue {
    /// The variant's wire tag.
    pub fn tag(&self) -> &'static str {
        match self {
            CustomValue::Timestamp { .. } => "timestamp",
            CustomValue::Link { .. } => "link",
            CustomValue::Ref { .. } => "ref",
            CustomValue::Query { .. } => "query",
            CustomValue::Email { .. } => "email",
            CustomValue::Url { .. } => "url",
            CustomValue::Phone { .. } => "phone",
            CustomValue::DateRange { .. } => "date_range",
            CustomValue::Money { .. } => "money",
            CustomValue::Image { .. } => "image",
            CustomValue::TagList { .. } => "tag_list",
            CustomValue::Template { .. } => "template",
            CustomValue::Join { .. } => "join",
            CustomValue::FirstNonNull { .. } => "first_non_null",
        }
    }

    /// Build and validate a custom value from a tagged JSON map.
    pub fn from_json_map(
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<CustomValue, EntityError> {
        let tag = map
            .get(TAG_KEY)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| EntityError::InvalidValue(format!("non-string {TAG_KEY} tag")))?;

        match tag {
            "timestamp" => Ok(CustomValue::Timestamp {
                timestamp: require_int(map, "timestamp", "timestamp")?,
            }),
            "link" => Ok(CustomValue::Link {
                query: require_str(map, "link", "query")?,
                show_text: require_str(map, "link", "show_text")?,
            }),
            "ref" => Ok(CustomValue::Ref {
                id: require_str(map, "ref", "id")?,
                target_type: optional_str(map, "ref", "type")?,
                source: optional_str(map, "ref", "source")?,
                show_text: optional_str(map, "ref", "show_text")?,
            }),
            "query" => Ok(CustomValue::Query {
                query: require_str(map, "query", "query")?,
            }),
            "email" => Ok(CustomValue::Email {
                email: require_str(map, "email", "email")?,
            }),
            "url" => Ok(CustomValue::Url {
                url: require_str(map, "url", "url")?,
            }),
            "phone" => Ok(CustomValue::Phone {
                phone: require_str(map, "phone", "phone")?,
            }),
            "date_range" => Ok(CustomValue::DateRange {
                start: require_int(map, "date_range", "start")?,
                end: require_int(map, "date_range", "end")?,
            }),
            "money" => Ok(CustomValue::Money {
                amount: map
                    .get("amount")
                    .and_then(serde_json::Value::as_f64)
                    .ok_or_else(|| invalid("money", "missing or non-numeric key 'amount'"))?,
                currency: require_str(map, "money", "currency")?,
            }),
            "image" => Ok(CustomValue::Image {
                url: require_str(map, "image", "url")?,
                alt: optional_str(map, "image", "alt")?,
            }),
            "tag_list" => {
                let tags = map
                    .get("tags")
                    .and_then(serde_json::Value::as_array)
                    .ok_or_else(|| invalid("tag_list", "missing or non-list key 'tags'"))?;
                let tags = tags
                    .iter()
                    .map(|t| {
                        t.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| invalid("tag_list", "tags must be strings"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CustomValue::TagList { tags })
            }
            "template" => {
                let raw_values = map
                    .get("values")
                    .and_then(serde_json::Value::as_object)
                    .ok_or_else(|| invalid("template", "missing or non-map key 'values'"))?;
                let mut values = BTreeMap::new();
                for (key, value) in raw_values {
                    values.insert(key.clone(), Value::from_json(value)?);
                }
                Ok(CustomValue::Template {
                    template: require_str(map, "template", "template")?,
                    values,
                })
            }
            "join" => Ok(CustomValue::Join {
                items: require_values(map, "join", "items")?,
                sep: require_str(map, "join", "sep")?,
            }),
            "first_non_null" => Ok(CustomValue::FirstNonNull {
                items: require_values(map, "first_non_null", "items")?,
            }),
            unknown => Err(EntityError::UnknownCustomTag(unknown.to_string())),
        }
    }

    /// Re-emit the tagged JSON map form.
    pub fn to_json_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(TAG_KEY.to_string(), self.tag().into());
        match self {
            CustomValue::Timestamp { timestamp } => {
                map.insert("timestamp".into(), (*timestamp).into());
            }
            CustomValue::Link { query, show_text } => {
                map.insert("query".into(), query.clone().into());
                map.insert("show_text".into(), show_text.clone().into());
            }
            CustomValue::Ref {
                id,
                target_type,
                source,
                show_text,
            } => {
                map.insert("id".into(), id.clone().into());
                if let Some(t) = target_type {
                    map.insert("type".into(), t.clone().into());
                }
                if let Some(s) = source {
                    map.insert("source".into(), s.clone().into());
                }
                if let Some(s) = show_text {
                    map.insert("show_text".into(), s.clone().into());
                }
            }
            CustomValue::Query { query } => {
                map.insert("query".into(), query.clone().into());
            }
            CustomValue::Email { email } => {
                map.insert("email".into(), email.clone().into());
            }
            CustomValue::Url { url } => {
                map.insert("url".into(), url.clone().into());
            }
            CustomValue::Phone { phone } => {
                map.insert("phone".into(), phone.clone().into());
            }
            CustomValue::DateRange { start, end } => {
                map.insert("start".into(), (*start).into());
                map.insert("end".into(), (*end).into());
            }
            CustomValue::Money { amount, currency } => {
                map.insert("amount".into(), (*amount).into());
                map.insert("currency".into(), currency.clone().into());
            }
            CustomValue::Image { url, alt } => {
                map.insert("url".into(), url.clone().into());
                if let Some(alt) = alt {
                    map.insert("alt".into(), alt.clone().into());
                }
            }
            CustomValue::TagList { tags } => {
                map.insert("tags".into(), tags.clone().into());
            }
            CustomValue::Template { template, values } => {
                map.insert("template".into(), template.clone().into());
                map.insert(
                    "values".into(),
                    serde_json::Value::Object(
                        values
                            .iter()
                            .map(|(k, v)| (k.clone(), v.to_json_value()))
                            .collect(),
                    ),
                );
            }
            CustomValue::Join { items, sep } => {
                map.insert(
                    "items".into(),
                    serde_json::Value::Array(items.iter().map(Value::to_json_value).collect()),
                );
                map.insert("sep".into(), sep.clone().into());
            }
            CustomValue::FirstNonNull { items } => {
                map.insert(
                    "items".into(),
                    serde_json::Value::Array(items.iter().map(Value::to_json_value).collect()),
                );
            }
        }
        serde_json::Value::Object(map)
    }

    /// Resolve to a plain value, consulting the query state where the variant
    /// demands it.
    ///
    /// `link`, `query` and `ref` re-enter the engine on the *outer* state:
    /// they stage the scopes narrowed so far and let the sub-resolution
    /// narrow a fresh set, so the lazy-fetch driver learns what the
    /// resolution would have needed even when it comes up empty this pass.
    pub fn resolve(&self, state: &mut QueryState) -> Result<Value, QueryError> {
        match self {
            CustomValue::Timestamp { timestamp } => Ok(Value::Int(*timestamp)),
            CustomValue::Link { query, .. } | CustomValue::Query { query } => {
                state.stage_scopes();
                run_subquery(query, state)
            }
            CustomValue::Ref {
                id,
                target_type,
                source,
                ..
            } => {
                state.stage_scopes();
                if let Some(target) = target_type {
                    state.needed_scopes = state.needed_scopes.filter_type(target);
                    let mut id_types = std::collections::BTreeSet::new();
                    id_types.insert((id.clone(), target.clone()));
                    state.needed_scopes = state.needed_scopes.set_id_types(&id_types);
                }
                let mut matched = Vec::new();
                for grouping in state.all_data.iter() {
                    if grouping.id() != id {
                        continue;
                    }
                    if let Some(target) = target_type {
                        if !grouping.types().contains(target) {
                            continue;
                        }
                    }
                    match source {
                        Some(source) => {
                            let mut wanted = std::collections::BTreeSet::new();
                            wanted.insert(source.clone());
                            if let Some(narrowed) = grouping.select_sources(&wanted) {
                                matched.push(narrowed);
                            }
                        }
                        None => matched.push(grouping.clone()),
                    }
                }
                Ok(Value::Objects(crate::entity::ObjectList::new(matched)))
            }
            CustomValue::Email { email } => Ok(Value::String(email.clone())),
            CustomValue::Url { url } => Ok(Value::String(url.clone())),
            CustomValue::Phone { phone } => Ok(Value::String(phone.clone())),
            CustomValue::DateRange { start, end } => {
                let mut map = BTreeMap::new();
                map.insert("start".to_string(), Value::Int(*start));
                map.insert("end".to_string(), Value::Int(*end));
                Ok(Value::Map(map))
            }
            CustomValue::Money { amount, .. } => Ok(Value::Float(*amount)),
            CustomValue::Image { url, .. } => Ok(Value::String(url.clone())),
            CustomValue::TagList { tags } => Ok(Value::List(
                tags.iter().cloned().map(Value::String).collect(),
            )),
            CustomValue::Template { template, values } => {
                let mut rendered = template.clone();
                for (key, value) in values {
                    let resolved = match value {
                        Value::Custom(inner) => inner.resolve(state)?,
                        other => other.clone(),
                    };
                    let placeholder = format!("{{{key}}}");
                    rendered = rendered.replace(&placeholder, &resolved.to_string());
                }
                // Placeholders without a matching value stay as written.
                Ok(Value::String(rendered))
            }
            CustomValue::Join { items, sep } => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    let resolved = match item {
                        Value::Custom(inner) => inner.resolve(state)?,
                        other => other.clone(),
                    };
                    parts.push(resolved.to_string());
                }
                Ok(Value::String(parts.join(sep)))
            }
            CustomValue::FirstNonNull { items } => {
                for item in items {
                    let resolved = match item {
                        Value::Custom(inner) => inner.resolve(state)?,
                        other => other.clone(),
                    };
                    match &resolved {
                        Value::Null | Value::AbsorbingNull => {}
                        Value::String(s) if s.is_empty() => {}
                        _ => return Ok(resolved),
                    }
                }
                Ok(Value::Null)
            }
        }
    }

    /// Short text rendering used by displays; never consults query state.
    pub fn to_text(&self) -> String {
        match self {
            CustomValue::Timestamp { timestamp } => format_nanos(*timestamp),
            CustomValue::Link { show_text, .. } => format!("<{show_text}>"),
            CustomValue::Ref {
                id,
                target_type,
                show_text,
                ..
            } => {
                if let Some(text) = show_text {
                    text.clone()
                } else if let Some(target) = target_type {
                    format!("{target}#{id}")
                } else {
                    id.clone()
                }
            }
            CustomValue::Query { query } => format!("? {query}"),
            CustomValue::Email { email } => email.clone(),
            CustomValue::Url { url } => url.clone(),
            CustomValue::Phone { phone } => phone.clone(),
            CustomValue::DateRange { start, end } => {
                format!("{} - {}", format_nanos(*start), format_nanos(*end))
            }
            CustomValue::Money { amount, currency } => {
                if amount.fract() == 0.0 {
                    format!("{} {}", currency.to_uppercase(), *amount as i64)
                } else {
                    format!("{} {amount:.2}", currency.to_uppercase())
                }
            }
            CustomValue::Image { url, alt } => match alt {
                Some(alt) if !alt.is_empty() => alt.clone(),
                _ => url.clone(),
            },
            CustomValue::TagList { tags } => tags.join(", "),
            CustomValue::Template { template, .. } => template.clone(),
            CustomValue::Join { items, sep } => items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(sep),
            CustomValue::FirstNonNull { .. } => "first_non_null(...)".to_string(),
        }
    }
}

/// Nanosecond epoch rendered as ISO-8601 (UTC, second precision).
fn format_nanos(nanos: i64) -> String {
    DateTime::from_timestamp_nanos(nanos)
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}
