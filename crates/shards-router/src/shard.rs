//! Shards and the shard id index
//!
//! A `Shard` is one physical partition: an executor factory plus the logical
//! shard ids it serves. With virtual sharding several ids share one shard.
//! The `ShardIndex` is built once from the topology and is read-only after.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use shards_core::{Executor, ExecutorFactory, ShardId, StatementCatalog};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{Result, ShardsError};

/// One physical shard
pub struct Shard {
    /// Logical ids served by this shard (never empty)
    shard_ids: BTreeSet<ShardId>,

    /// Statement names known to this shard's catalog, fixed at construction
    statement_names: HashSet<String>,

    factory: Arc<dyn ExecutorFactory>,

    /// Established on first use, at most once
    executor: OnceCell<Arc<dyn Executor>>,
}

impl Shard {
    fn new(factory: Arc<dyn ExecutorFactory>, shard_ids: BTreeSet<ShardId>) -> Self {
        let statement_names = factory.catalog().statement_names().into_iter().collect();
        Self {
            shard_ids,
            statement_names,
            factory,
            executor: OnceCell::new(),
        }
    }

    pub fn shard_ids(&self) -> &BTreeSet<ShardId> {
        &self.shard_ids
    }

    /// Smallest shard id served by this shard
    pub fn primary_shard_id(&self) -> ShardId {
        // Topology validation rejects empty id sets
        *self.shard_ids.iter().next().unwrap_or(&ShardId::new(0))
    }

    pub fn is_virtual(&self) -> bool {
        self.shard_ids.len() > 1
    }

    pub fn has_statement(&self, statement: &str) -> bool {
        self.statement_names.contains(statement)
    }

    pub fn catalog(&self) -> &dyn StatementCatalog {
        self.factory.catalog()
    }

    /// Whether the executor has been established yet
    pub fn is_established(&self) -> bool {
        self.executor.initialized()
    }

    /// The executor, if it has already been established
    pub fn established(&self) -> Option<Arc<dyn Executor>> {
        self.executor.get().cloned()
    }

    /// Get the shard's executor, opening it on first use
    ///
    /// Concurrent callers wait for the single in-flight open.
    pub async fn establish(&self) -> Result<Arc<dyn Executor>> {
        let executor = self
            .executor
            .get_or_try_init(|| async {
                debug!(
                    shard = %self.primary_shard_id(),
                    factory = self.factory.name(),
                    "Establishing executor"
                );
                self.factory.open().await
            })
            .await?;
        Ok(executor.clone())
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("shard_ids", &self.shard_ids)
            .field("factory", &self.factory.name())
            .field("statements", &self.statement_names.len())
            .field("established", &self.is_established())
            .finish()
    }
}

/// One topology entry: an executor factory and the shard ids it serves
#[derive(Clone)]
pub struct ShardBinding {
    pub factory: Arc<dyn ExecutorFactory>,
    pub shard_ids: BTreeSet<ShardId>,
}

/// Executor factory → shard ids mapping supplied at session construction
#[derive(Clone, Default)]
pub struct Topology {
    bindings: Vec<ShardBinding>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a physical shard serving `shard_ids`
    pub fn with_shard<I>(mut self, factory: Arc<dyn ExecutorFactory>, shard_ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ShardId>,
    {
        self.bindings.push(ShardBinding {
            factory,
            shard_ids: shard_ids.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn bindings(&self) -> &[ShardBinding] {
        &self.bindings
    }

    /// Validate and build the shard list and its index
    pub fn build(&self) -> Result<(Vec<Arc<Shard>>, ShardIndex)> {
        if self.bindings.is_empty() {
            return Err(ShardsError::Configuration("topology has no shards".to_string()));
        }

        let mut seen: HashMap<ShardId, usize> = HashMap::new();
        for (position, binding) in self.bindings.iter().enumerate() {
            if binding.shard_ids.is_empty() {
                return Err(ShardsError::Configuration(format!(
                    "executor factory '{}' serves no shard ids",
                    binding.factory.name()
                )));
            }
            for shard_id in &binding.shard_ids {
                if let Some(previous) = seen.insert(*shard_id, position) {
                    return Err(ShardsError::Configuration(format!(
                        "{} is assigned to both '{}' and '{}'",
                        shard_id,
                        self.bindings[previous].factory.name(),
                        binding.factory.name()
                    )));
                }
            }
        }

        let shards: Vec<Arc<Shard>> = self
            .bindings
            .iter()
            .map(|b| Arc::new(Shard::new(b.factory.clone(), b.shard_ids.clone())))
            .collect();
        let index = ShardIndex::build(&shards);

        info!(
            shards = shards.len(),
            shard_ids = index.len(),
            "Built shard topology"
        );
        Ok((shards, index))
    }
}

/// Shard id → shard index
///
/// A total inverse of every shard's id set.
#[derive(Debug, Clone)]
pub struct ShardIndex {
    by_id: HashMap<ShardId, Arc<Shard>>,
}

impl ShardIndex {
    pub fn build(shards: &[Arc<Shard>]) -> Self {
        let mut by_id = HashMap::new();
        for shard in shards {
            for shard_id in shard.shard_ids() {
                by_id.insert(*shard_id, shard.clone());
            }
        }
        Self { by_id }
    }

    pub fn resolve(&self, shard_id: ShardId) -> Option<&Arc<Shard>> {
        self.by_id.get(&shard_id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// All shard ids, sorted
    pub fn shard_ids(&self) -> Vec<ShardId> {
        let mut ids: Vec<ShardId> = self.by_id.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Map shard ids to distinct shards, keeping first-seen order
    ///
    /// Ids co-located on one shard yield that shard once. An id missing from
    /// the index means a strategy produced an id outside the topology.
    pub fn shards_for_ids(&self, shard_ids: &[ShardId]) -> Result<Vec<Arc<Shard>>> {
        let mut shards: Vec<Arc<Shard>> = Vec::with_capacity(shard_ids.len());
        for shard_id in shard_ids {
            let shard = self.resolve(*shard_id).ok_or_else(|| {
                ShardsError::Configuration(format!("{} is not part of the topology", shard_id))
            })?;
            if !shards.iter().any(|s| Arc::ptr_eq(s, shard)) {
                shards.push(shard.clone());
            }
        }
        Ok(shards)
    }

    /// Candidate list for the statement-catalog fallback
    ///
    /// Shards owning ids in `primary_order` come first, in that order. The
    /// rest keep their original order.
    pub fn fallback_candidates(&self, shards: &[Arc<Shard>], primary_order: &[ShardId]) -> Vec<Arc<Shard>> {
        let mut ordered: Vec<Arc<Shard>> = Vec::with_capacity(shards.len());
        for shard_id in primary_order {
            if let Some(shard) = self.resolve(*shard_id) {
                if !ordered.iter().any(|s| Arc::ptr_eq(s, shard)) {
                    ordered.push(shard.clone());
                }
            }
        }
        for shard in shards {
            if !ordered.iter().any(|s| Arc::ptr_eq(s, shard)) {
                ordered.push(shard.clone());
            }
        }
        ordered
    }
}

/// First candidate whose catalog contains `statement`
///
/// Linear scan, first match wins. Callers wanting a home shard preferred
/// must put it first.
pub fn find_shard_for_statement<'a>(
    statement: &str,
    candidates: &'a [Arc<Shard>],
) -> Option<&'a Arc<Shard>> {
    candidates.iter().find(|shard| shard.has_statement(statement))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFactory;

    fn two_shard_topology() -> Topology {
        Topology::new()
            .with_shard(MockFactory::arc("a", &["User.getById"]), [1u16, 3])
            .with_shard(MockFactory::arc("b", &["User.getById", "User.findAll"]), [2u16])
    }

    #[test]
    fn test_resolve_virtual_shard_returns_same_instance() {
        let (shards, index) = two_shard_topology().build().unwrap();
        assert_eq!(shards.len(), 2);
        assert_eq!(index.len(), 3);

        let s1 = index.resolve(ShardId::new(1)).unwrap();
        let s3 = index.resolve(ShardId::new(3)).unwrap();
        let s2 = index.resolve(ShardId::new(2)).unwrap();

        assert!(Arc::ptr_eq(s1, s3));
        assert!(!Arc::ptr_eq(s1, s2));
        assert!(s1.is_virtual());
        assert_eq!(s1.primary_shard_id(), ShardId::new(1));
        assert!(index.resolve(ShardId::new(9)).is_none());
    }

    #[test]
    fn test_index_is_inverse_of_shard_ids() {
        let (shards, index) = two_shard_topology().build().unwrap();
        for shard in &shards {
            for id in shard.shard_ids() {
                assert!(Arc::ptr_eq(index.resolve(*id).unwrap(), shard));
            }
        }
        assert_eq!(
            index.shard_ids(),
            vec![ShardId::new(1), ShardId::new(2), ShardId::new(3)]
        );
    }

    #[test]
    fn test_building_twice_gives_identical_index() {
        let topology = two_shard_topology();
        let (_, first) = topology.build().unwrap();
        let (_, second) = topology.build().unwrap();

        assert_eq!(first.shard_ids(), second.shard_ids());
        for id in first.shard_ids() {
            assert_eq!(
                first.resolve(id).unwrap().shard_ids(),
                second.resolve(id).unwrap().shard_ids()
            );
        }
    }

    #[test]
    fn test_empty_topology_rejected() {
        let result = Topology::new().build();
        assert!(matches!(result, Err(ShardsError::Configuration(_))));
    }

    #[test]
    fn test_duplicate_shard_id_rejected() {
        let result = Topology::new()
            .with_shard(MockFactory::arc("a", &[]), [1u16, 2])
            .with_shard(MockFactory::arc("b", &[]), [2u16])
            .build();
        assert!(matches!(result, Err(ShardsError::Configuration(_))));
    }

    #[test]
    fn test_binding_without_ids_rejected() {
        let result = Topology::new()
            .with_shard(MockFactory::arc("a", &[]), Vec::<u16>::new())
            .build();
        assert!(matches!(result, Err(ShardsError::Configuration(_))));
    }

    #[test]
    fn test_shards_for_ids_deduplicates() {
        let (_, index) = two_shard_topology().build().unwrap();
        let shards = index
            .shards_for_ids(&[ShardId::new(3), ShardId::new(2), ShardId::new(1)])
            .unwrap();
        assert_eq!(shards.len(), 2);
        assert_eq!(shards[0].primary_shard_id(), ShardId::new(1));
        assert_eq!(shards[1].primary_shard_id(), ShardId::new(2));

        assert!(index.shards_for_ids(&[ShardId::new(7)]).is_err());
        assert!(index.shards_for_ids(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_find_shard_for_statement_first_match() {
        let (shards, index) = two_shard_topology().build().unwrap();

        let found = find_shard_for_statement("User.getById", &shards).unwrap();
        assert_eq!(found.primary_shard_id(), ShardId::new(1));

        let found = find_shard_for_statement("User.findAll", &shards).unwrap();
        assert_eq!(found.primary_shard_id(), ShardId::new(2));

        assert!(find_shard_for_statement("Order.insert", &shards).is_none());

        // Primary-first ordering changes which shard wins
        let ordered = index.fallback_candidates(&shards, &[ShardId::new(2)]);
        let found = find_shard_for_statement("User.getById", &ordered).unwrap();
        assert_eq!(found.primary_shard_id(), ShardId::new(2));
    }

    #[tokio::test]
    async fn test_executor_established_once() {
        let factory = MockFactory::new("a", &["User.getById"]);
        let opens = factory.opens.clone();
        let (shards, _) = Topology::new()
            .with_shard(Arc::new(factory), [1u16])
            .build()
            .unwrap();

        let shard = &shards[0];
        assert!(!shard.is_established());

        let (a, b) = tokio::join!(shard.establish(), shard.establish());
        let a = a.unwrap();
        let b = b.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        shard.establish().await.unwrap();

        assert!(shard.is_established());
        assert_eq!(opens.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
