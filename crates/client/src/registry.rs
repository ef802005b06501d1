//! Endpoint registry
//!
//! Normalizes heterogeneous declarations — single endpoints and nested
//! groups — into one flat mapping from canonical key to its contract. The
//! registry is built once at client construction and read-only afterward,
//! so concurrent calls share it without synchronization.

use crate::endpoint::Endpoint;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Either one endpoint or a nested collection of declarations; groups
/// flatten recursively at registration time.
#[derive(Debug, Clone)]
pub enum Declaration {
    Endpoint(Endpoint),
    Group(Vec<Declaration>),
}

impl From<Endpoint> for Declaration {
    fn from(endpoint: Endpoint) -> Self {
        Declaration::Endpoint(endpoint)
    }
}

/// Groups declarations so related endpoints can be declared together.
pub fn group(declarations: impl IntoIterator<Item = Declaration>) -> Declaration {
    Declaration::Group(declarations.into_iter().collect())
}

/// Flat mapping from canonical key to endpoint contract.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<String, Arc<Endpoint>>,
}

impl Registry {
    /// Builds the registry from a declaration set. A duplicate canonical
    /// key is last-write-wins; the shadowed registration is logged because
    /// it is almost always a declaration mistake.
    pub fn build(declarations: impl IntoIterator<Item = Declaration>) -> Self {
        let mut registry = Registry::default();
        for declaration in declarations {
            registry.insert(declaration);
        }
        registry
    }

    fn insert(&mut self, declaration: Declaration) {
        match declaration {
            Declaration::Endpoint(endpoint) => {
                let key = endpoint.key();
                if self.entries.insert(key.clone(), Arc::new(endpoint)).is_some() {
                    warn!(key = %key, "duplicate endpoint registration, earlier contract shadowed");
                }
            }
            Declaration::Group(members) => {
                for member in members {
                    self.insert(member);
                }
            }
        }
    }

    /// The only read operation the pipeline needs.
    pub fn lookup(&self, key: &str) -> Option<&Arc<Endpoint>> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
