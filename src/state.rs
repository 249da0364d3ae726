//! Per-query runtime state.
//!
//! A [`QueryState`] is the confined universe of one `execute_once` call: a
//! snapshot of the aggregate data, the provider scope templates, and the
//! needed/staged scope sets the operators narrow as the chain runs.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::entity::ObjectList;
use crate::observer::{default_observer, QueryObserver};
use crate::provider::Providers;
use crate::scope::{Scope, Scopes};

/// Runtime state threaded through one query evaluation.
pub struct QueryState {
    /// Everything currently known, across all providers.
    pub all_data: ObjectList,
    /// Scope templates advertised by the connected providers.
    provider_scopes: Vec<Scope>,
    /// Scopes the still-running query would need; operators narrow this.
    pub needed_scopes: Scopes,
    /// Scopes parked by nested contexts; part of the final answer.
    pub staged_scopes: Scopes,
    /// Structured event sink.
    pub observer: Arc<dyn QueryObserver>,
}

impl QueryState {
    /// Set up state for a query over the given providers: needed starts as
    /// the full fresh scope set, staged starts empty.
    pub fn setup(providers: &Providers) -> QueryState {
        let provider_scopes = providers.all_scopes();
        let needed_scopes = Scopes::fresh(&provider_scopes);
        QueryState {
            all_data: providers.all_data().clone(),
            provider_scopes,
            needed_scopes,
            staged_scopes: Scopes::empty(),
            observer: default_observer(),
        }
    }

    /// State over plain data with no providers (embedding, tests).
    pub fn with_data(all_data: ObjectList) -> QueryState {
        QueryState {
            all_data,
            provider_scopes: Vec::new(),
            needed_scopes: Scopes::empty(),
            staged_scopes: Scopes::empty(),
            observer: default_observer(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn QueryObserver>) -> QueryState {
        self.observer = observer;
        self
    }

    /// The scopes the driver must compare against downloads: everything
    /// staged by nested contexts plus whatever the main chain still needs.
    pub fn final_needed_scopes(&self) -> Scopes {
        self.staged_scopes.union(&self.needed_scopes)
    }

    /// Park the current needed set and restart from a fresh full set.
    ///
    /// Nested contexts (custom-value resolution re-entering the engine) call
    /// this so their own narrowing starts from scratch without losing what
    /// the outer chain already established.
    pub fn stage_scopes(&mut self) {
        self.staged_scopes = self.staged_scopes.union(&self.needed_scopes);
        self.needed_scopes = Scopes::fresh(&self.provider_scopes);
    }

    /// An independent state for one filter/map iteration: same data, fresh
    /// scope sets. Narrowings made inside are discarded with it.
    pub fn fresh_child(&self) -> QueryState {
        QueryState {
            all_data: self.all_data.clone(),
            provider_scopes: self.provider_scopes.clone(),
            needed_scopes: Scopes::fresh(&self.provider_scopes),
            staged_scopes: Scopes::empty(),
            observer: Arc::clone(&self.observer),
        }
    }

    /// The (id, type) pairs of everything currently known.
    pub fn known_id_types(&self) -> BTreeSet<(String, String)> {
        self.all_data.id_types()
    }
}

impl fmt::Debug for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryState")
            .field("all_data", &self.all_data)
            .field("needed_scopes", &self.needed_scopes)
            .field("staged_scopes", &self.staged_scopes)
            .finish_non_exhaustive()
    }
}
