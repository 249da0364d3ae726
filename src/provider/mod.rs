//! # Provider Interface
//!
//! A provider is anything that can say hello (advertising its lazy-loading
//! scopes), dump its bulk data, and answer scoped lazy requests. The engine
//! only sees the [`Provider`] trait; transports live with the embedder.
//!
//! [`Providers`] is the registry the driver works against: it connects every
//! provider, performs the initial bulk fetch into one aggregate
//! [`ObjectList`], and tracks which scopes have been downloaded so the
//! fixed-point loop can diff demand against supply.

pub mod memory;
pub mod wire;

pub use wire::{Hello, LazyLoadRequest, LazyLoadResponse, ScopeSelector, ScopeSpec};

use std::collections::{BTreeSet, HashSet};

use thiserror::Error;
use tracing::{debug, info};

use crate::entity::{parse_objects, ObjectList};
use crate::error::EngineError;
use crate::scope::Scope;

/// Errors a provider (or the registry around it) can raise.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider could not be reached or answered garbage.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The provider answered, but the payload violates the contract.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The provider explicitly refused a lazy request.
    #[error("provider refused scope: {0}")]
    Refused(String),

    /// A scope names a provider this registry does not hold.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// The three logical endpoints every provider exposes.
pub trait Provider: Send {
    /// Capability advertisement: name plus lazy-loading scopes.
    fn hello(&self) -> Result<Hello, ProviderError>;

    /// Initial bulk fetch: every object the provider hands out eagerly.
    fn all_data(&self) -> Result<Vec<serde_json::Value>, ProviderError>;

    /// Scoped lazy fetch.
    fn lazy_load(&self, request: &LazyLoadRequest) -> Result<LazyLoadResponse, ProviderError>;
}

struct ProviderEntry {
    name: String,
    provider: Box<dyn Provider>,
    scopes: Vec<Scope>,
}

/// The connected provider population plus the aggregate data space.
pub struct Providers {
    entries: Vec<ProviderEntry>,
    all_data: ObjectList,
    downloaded_scopes: HashSet<Scope>,
    attempted_scopes: HashSet<Scope>,
}

impl Providers {
    /// Connect every provider: say hello, record the advertised scopes, and
    /// merge each provider's bulk data into the aggregate list.
    pub fn connect(providers: Vec<Box<dyn Provider>>) -> Result<Providers, EngineError> {
        let mut entries = Vec::with_capacity(providers.len());
        let mut all_data = ObjectList::new(vec![]);

        for provider in providers {
            let hello = provider.hello()?;
            let scopes = hello
                .lazy_loading_scopes
                .iter()
                .map(|spec| Scope {
                    provider: hello.name.clone(),
                    type_name: spec.type_name.clone(),
                    fields: spec.fields.clone(),
                    filtering_fields: spec.filtering_fields.clone(),
                    needs_id_types: spec.needs_id_types,
                    conditions: Vec::new(),
                    id_types: BTreeSet::new(),
                })
                .collect::<Vec<_>>();

            let bulk = provider.all_data()?;
            let objects = parse_objects(&bulk, &hello.name);
            info!(
                provider = %hello.name,
                objects = objects.len(),
                lazy_scopes = scopes.len(),
                "connected provider"
            );
            if !objects.is_empty() {
                let batch = ObjectList::from_raw(objects)
                    .map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;
                all_data = ObjectList::combine(&all_data, &batch)
                    .map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;
            }

            entries.push(ProviderEntry {
                name: hello.name,
                provider,
                scopes,
            });
        }

        Ok(Providers {
            entries,
            all_data,
            downloaded_scopes: HashSet::new(),
            attempted_scopes: HashSet::new(),
        })
    }

    /// Every scope advertised across the population.
    pub fn all_scopes(&self) -> Vec<Scope> {
        self.entries
            .iter()
            .flat_map(|e| e.scopes.iter().cloned())
            .collect()
    }

    pub fn all_data(&self) -> &ObjectList {
        &self.all_data
    }

    /// Clear query-local overlays before a fresh execution.
    pub fn reset_overlays(&mut self) {
        self.all_data.reset_overlays();
    }

    pub fn downloaded_scopes(&self) -> &HashSet<Scope> {
        &self.downloaded_scopes
    }

    /// Scopes that were requested at least once, downloaded or not.
    pub fn attempted_scopes(&self) -> &HashSet<Scope> {
        &self.attempted_scopes
    }

    /// Fetch one scope's slice and merge it into the aggregate data.
    ///
    /// The request carries the scope's own id_types; a `needs_id_types`
    /// scope that has none yet falls back to the id_types of everything
    /// currently known, so the provider can still relate its answer to the
    /// query's data. Objects already known are dropped before the merge.
    ///
    /// On failure the scope counts as attempted but not downloaded, which
    /// leaves it eligible for a retry under different id_types next
    /// iteration.
    pub fn download_scope(
        &mut self,
        scope: &Scope,
        fallback_id_types: &BTreeSet<(String, String)>,
    ) -> Result<usize, ProviderError> {
        self.attempted_scopes.insert(scope.clone());

        let entry = self
            .entries
            .iter()
            .find(|e| e.name == scope.provider)
            .ok_or_else(|| ProviderError::UnknownProvider(scope.provider.clone()))?;

        let id_types = if scope.id_types.is_empty() && scope.needs_id_types {
            fallback_id_types
        } else {
            &scope.id_types
        };
        let request = LazyLoadRequest {
            scope: ScopeSelector {
                type_name: scope.type_name.clone(),
                fields: scope.fields.clone(),
            },
            conditions: scope
                .conditions
                .iter()
                .map(|c| (c.field.clone(), c.op.clone(), c.value.to_json_value()))
                .collect(),
            plan_only: false,
            id_types: id_types.iter().cloned().collect(),
        };

        let response = entry.provider.lazy_load(&request)?;
        if let Some(error) = response.error {
            return Err(ProviderError::Refused(error));
        }

        let objects = parse_objects(&response.sa_objects, &entry.name);
        let known = self.all_data.unique_ids();
        let fresh: Vec<_> = objects
            .into_iter()
            .filter(|o| o.unique_ids().is_disjoint(&known))
            .collect();
        let count = fresh.len();
        if !fresh.is_empty() {
            let batch = ObjectList::from_raw(fresh)
                .map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;
            self.all_data = ObjectList::combine(&self.all_data, &batch)
                .map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;
        }

        self.downloaded_scopes.insert(scope.clone());
        debug!(scope = %scope, merged = count, "scope downloaded");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::MemoryProvider;
    use crate::scope::FieldSet;
    use serde_json::json;

    fn employee_scope_spec() -> ScopeSpec {
        ScopeSpec {
            type_name: "employee".into(),
            fields: FieldSet::Named(vec!["id".into(), "name".into()]),
            filtering_fields: vec![],
            needs_id_types: false,
        }
    }

    #[test]
    fn connect_merges_bulk_data_across_providers() {
        let a = MemoryProvider::new("a").with_bulk(vec![
            json!({"__id__": "x", "__types__": ["t"], "__source__": "a"}),
        ]);
        let b = MemoryProvider::new("b").with_bulk(vec![
            json!({"__id__": "x", "__types__": ["t"], "__source__": "b"}),
        ]);
        let providers = Providers::connect(vec![Box::new(a), Box::new(b)]).expect("connects");
        assert_eq!(providers.all_data().len(), 1);
        assert_eq!(providers.all_data().groupings()[0].sources().len(), 2);
    }

    #[test]
    fn download_scope_dedupes_and_marks_downloaded() {
        let provider = MemoryProvider::new("hr")
            .with_scope(employee_scope_spec())
            .with_bulk(vec![
                json!({"__id__": "e1", "__types__": ["employee"], "__source__": "hr"}),
            ])
            .with_lazy(vec![
                json!({"__id__": "e1", "__types__": ["employee"], "__source__": "hr"}),
                json!({"__id__": "e2", "__types__": ["employee"], "__source__": "hr"}),
            ]);
        let mut providers = Providers::connect(vec![Box::new(provider)]).expect("connects");

        let scope = providers.all_scopes().remove(0);
        let merged = providers
            .download_scope(&scope, &BTreeSet::new())
            .expect("downloads");
        assert_eq!(merged, 1);
        assert_eq!(providers.all_data().len(), 2);
        assert!(providers.downloaded_scopes().contains(&scope));
    }

    #[test]
    fn refused_scopes_stay_undownloaded_but_attempted() {
        let provider = MemoryProvider::new("hr")
            .with_scope(employee_scope_spec())
            .with_lazy_hook(|_| {
                Ok(LazyLoadResponse {
                    error: Some("no such slice".into()),
                    ..Default::default()
                })
            });
        let mut providers = Providers::connect(vec![Box::new(provider)]).expect("connects");

        let scope = providers.all_scopes().remove(0);
        let err = providers
            .download_scope(&scope, &BTreeSet::new())
            .expect_err("refused");
        assert!(matches!(err, ProviderError::Refused(_)));
        assert!(!providers.downloaded_scopes().contains(&scope));
        assert!(providers.attempted_scopes().contains(&scope));
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let mut providers = Providers::connect(vec![]).expect("connects");
        let scope = Scope {
            provider: "ghost".into(),
            type_name: "t".into(),
            fields: FieldSet::All,
            filtering_fields: vec![],
            needs_id_types: false,
            conditions: vec![],
            id_types: BTreeSet::new(),
        };
        assert!(matches!(
            providers.download_scope(&scope, &BTreeSet::new()),
            Err(ProviderError::UnknownProvider(_))
        ));
    }
}
