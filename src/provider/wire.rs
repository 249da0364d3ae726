//! Wire payloads of the provider contract.
//!
//! Only the payload shapes are normative; the transport (HTTP or otherwise)
//! lives outside the engine. Field names match the wire exactly
//! (`lazy_loading_scopes`, `sa_objects`, `__sa_type__`, ...).

use serde::{Deserialize, Serialize};

use crate::scope::FieldSet;

/// Capability advertisement returned by a provider's `hello` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    pub name: String,
    #[serde(default)]
    pub lazy_loading_scopes: Vec<ScopeSpec>,
}

/// One advertised lazy-loading scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    pub fields: FieldSet,
    #[serde(default)]
    pub filtering_fields: Vec<String>,
    #[serde(default)]
    pub needs_id_types: bool,
}

/// The slice a lazy request asks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeSelector {
    #[serde(rename = "type")]
    pub type_name: String,
    pub fields: FieldSet,
}

/// Request body of a provider's `lazy_load` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LazyLoadRequest {
    pub scope: ScopeSelector,
    /// `[field, op, value]` triples the provider may pre-filter on.
    pub conditions: Vec<(String, String, serde_json::Value)>,
    /// Ask for the provider's plan without materializing data.
    pub plan_only: bool,
    /// `(id, type)` pairs the query already holds.
    pub id_types: Vec<(String, String)>,
}

/// Response body of a provider's `lazy_load` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LazyLoadResponse {
    #[serde(default)]
    pub sa_objects: Vec<serde_json::Value>,
    #[serde(default)]
    pub plan: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}
