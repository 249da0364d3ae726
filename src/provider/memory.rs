//! In-memory provider over JSON fixtures.
//!
//! Used by the test suite and by embedders that want to join static data
//! into the federated space without standing up a transport. The default
//! lazy behavior filters the lazy pool by scope type, conditions, and
//! requested id_types; tests that need provider-side smarts (joins against
//! the requester's ids, refusals) install a hook instead.

use crate::provider::{
    Hello, LazyLoadRequest, LazyLoadResponse, Provider, ProviderError, ScopeSpec,
};

type LazyHook =
    Box<dyn Fn(&LazyLoadRequest) -> Result<LazyLoadResponse, ProviderError> + Send + Sync>;

pub struct MemoryProvider {
    name: String,
    scopes: Vec<ScopeSpec>,
    bulk: Vec<serde_json::Value>,
    lazy_pool: Vec<serde_json::Value>,
    lazy_hook: Option<LazyHook>,
}

impl MemoryProvider {
    pub fn new(name: impl Into<String>) -> MemoryProvider {
        MemoryProvider {
            name: name.into(),
            scopes: Vec::new(),
            bulk: Vec::new(),
            lazy_pool: Vec::new(),
            lazy_hook: None,
        }
    }

    /// Advertise a lazy-loading scope.
    pub fn with_scope(mut self, scope: ScopeSpec) -> MemoryProvider {
        self.scopes.push(scope);
        self
    }

    /// Objects handed out by the initial bulk fetch.
    pub fn with_bulk(mut self, objects: Vec<serde_json::Value>) -> MemoryProvider {
        self.bulk = objects;
        self
    }

    /// Objects served by the default lazy behavior.
    pub fn with_lazy(mut self, objects: Vec<serde_json::Value>) -> MemoryProvider {
        self.lazy_pool = objects;
        self
    }

    /// Replace the default lazy behavior entirely.
    pub fn with_lazy_hook(
        mut self,
        hook: impl Fn(&LazyLoadRequest) -> Result<LazyLoadResponse, ProviderError>
            + Send
            + Sync
            + 'static,
    ) -> MemoryProvider {
        self.lazy_hook = Some(Box::new(hook));
        self
    }

    fn matches(&self, object: &serde_json::Value, request: &LazyLoadRequest) -> bool {
        let types = object
            .get("__types__")
            .and_then(serde_json::Value::as_array);
        let claims_type = types.is_some_and(|types| {
            types
                .iter()
                .any(|t| t.as_str() == Some(request.scope.type_name.as_str()))
        });
        if !claims_type {
            return false;
        }

        for (field, op, value) in &request.conditions {
            if op == "==" && object.get(field) != Some(value) {
                return false;
            }
        }

        if !request.id_types.is_empty() {
            let id = object.get("__id__").and_then(serde_json::Value::as_str);
            let wanted = request.id_types.iter().any(|(want_id, want_type)| {
                id == Some(want_id.as_str()) && *want_type == request.scope.type_name
            });
            if !wanted {
                return false;
            }
        }
        true
    }
}

impl Provider for MemoryProvider {
    fn hello(&self) -> Result<Hello, ProviderError> {
        Ok(Hello {
            name: self.name.clone(),
            lazy_loading_scopes: self.scopes.clone(),
        })
    }

    fn all_data(&self) -> Result<Vec<serde_json::Value>, ProviderError> {
        Ok(self.bulk.clone())
    }

    fn lazy_load(&self, request: &LazyLoadRequest) -> Result<LazyLoadResponse, ProviderError> {
        if let Some(hook) = &self.lazy_hook {
            return hook(request);
        }
        let sa_objects = self
            .lazy_pool
            .iter()
            .filter(|o| self.matches(o, request))
            .cloned()
            .collect();
        Ok(LazyLoadResponse {
            sa_objects,
            plan: None,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScopeSelector;
    use crate::scope::FieldSet;
    use serde_json::json;

    fn request(id_types: Vec<(String, String)>) -> LazyLoadRequest {
        LazyLoadRequest {
            scope: ScopeSelector {
                type_name: "employee".into(),
                fields: FieldSet::All,
            },
            conditions: vec![],
            plan_only: false,
            id_types,
        }
    }

    fn provider() -> MemoryProvider {
        MemoryProvider::new("hr").with_lazy(vec![
            json!({"__id__": "e1", "__types__": ["employee"], "__source__": "hr", "dept": "sales"}),
            json!({"__id__": "e2", "__types__": ["employee"], "__source__": "hr", "dept": "eng"}),
            json!({"__id__": "c1", "__types__": ["customer"], "__source__": "hr"}),
        ])
    }

    #[test]
    fn default_lazy_filters_by_type() {
        let response = provider().lazy_load(&request(vec![])).expect("answers");
        assert_eq!(response.sa_objects.len(), 2);
    }

    #[test]
    fn default_lazy_honors_id_types() {
        let response = provider()
            .lazy_load(&request(vec![("e2".into(), "employee".into())]))
            .expect("answers");
        assert_eq!(response.sa_objects.len(), 1);
        assert_eq!(response.sa_objects[0]["__id__"], "e2");
    }

    #[test]
    fn default_lazy_applies_equality_conditions() {
        let mut req = request(vec![]);
        req.conditions = vec![("dept".into(), "==".into(), json!("sales"))];
        let response = provider().lazy_load(&req).expect("answers");
        assert_eq!(response.sa_objects.len(), 1);
        assert_eq!(response.sa_objects[0]["__id__"], "e1");
    }
}
