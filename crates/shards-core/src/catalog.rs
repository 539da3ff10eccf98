//! Statement catalog - what an executor knows how to run

use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::executor::Executor;

/// Capability handle bound to an established executor
pub type CapabilityHandle = Arc<dyn Any + Send + Sync>;

type CapabilityConstructor = Arc<dyn Fn(Arc<dyn Executor>) -> CapabilityHandle + Send + Sync>;

/// Statement catalog of one executor factory
pub trait StatementCatalog: Send + Sync {
    /// Every statement name the executor can run
    fn statement_names(&self) -> Vec<String>;

    fn has_statement(&self, name: &str) -> bool {
        self.statement_names().iter().any(|s| s == name)
    }

    /// Whether a typed capability (e.g. a mapper interface) is registered
    fn has_capability(&self, capability: TypeId) -> bool;

    /// Bind a registered capability to an executor
    fn obtain_capability(
        &self,
        capability: TypeId,
        executor: Arc<dyn Executor>,
    ) -> Option<CapabilityHandle>;
}

/// In-process catalog built up front
#[derive(Clone, Default)]
pub struct Catalog {
    statements: BTreeSet<String>,
    capabilities: HashMap<TypeId, CapabilityConstructor>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statement(mut self, name: impl Into<String>) -> Self {
        self.statements.insert(name.into());
        self
    }

    pub fn with_statements<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statements.extend(names.into_iter().map(Into::into));
        self
    }

    /// Register a capability of type `M`, built from the shard's executor on demand
    pub fn with_capability<M, F>(mut self, constructor: F) -> Self
    where
        M: Any + Send + Sync,
        F: Fn(Arc<dyn Executor>) -> M + Send + Sync + 'static,
    {
        let constructor: CapabilityConstructor =
            Arc::new(move |executor| Arc::new(constructor(executor)) as CapabilityHandle);
        self.capabilities.insert(TypeId::of::<M>(), constructor);
        self
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("statements", &self.statements)
            .field("capabilities", &self.capabilities.len())
            .finish()
    }
}

impl StatementCatalog for Catalog {
    fn statement_names(&self) -> Vec<String> {
        self.statements.iter().cloned().collect()
    }

    fn has_statement(&self, name: &str) -> bool {
        self.statements.contains(name)
    }

    fn has_capability(&self, capability: TypeId) -> bool {
        self.capabilities.contains_key(&capability)
    }

    fn obtain_capability(
        &self,
        capability: TypeId,
        executor: Arc<dyn Executor>,
    ) -> Option<CapabilityHandle> {
        self.capabilities
            .get(&capability)
            .map(|constructor| constructor(executor))
    }
}
