//! Sharded Session
//!
//! The caller-facing façade. Every operation decides which shards must run
//! it, dispatches, and merges the per-shard results into one logical result.
//!
//! # Routing Decision Tree
//!
//! ```text
//!                   Operation arrives
//!                          │
//!        ┌─────────────────┼───────────────────┐
//!        ▼                 ▼                   ▼
//!     insert        update / delete /    select_list / select_map /
//!        │          id-keyed select_one  ad-hoc select_one
//!        ▼                 │                   │
//!  pinned subgraph?        ▼                   ▼
//!   │Yes      │No    identifier encodes    every shard whose
//!   │         ▼      a shard? ──Yes──┐     catalog has the statement
//!   │     Selection        │No       │         │
//!   │         │            ▼         │         │
//!   │         │       Resolution     │         │
//!   │         │            │         │         │
//!   │         ▼            ▼         ▼         ▼
//!   │   statement-catalog fallback   ShardId(s) → Shard(s)
//!   │         │                            │
//!   ▼         ▼                            ▼
//!   single shard, pin            access strategy, exit, collector
//! ```
//!
//! Writes run one executor call per target shard id and sum the affected
//! rows. No cross-shard transaction is provided.

use std::any::{type_name, Any, TypeId};
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shards_core::config::DEFAULT_LOOKUP_SUFFIX;
use shards_core::{Executor, HasIdentifier, Identifier, RouterConfig, RowBounds, ShardId};
use tracing::{debug, info, trace};

use crate::error::{Result, ShardsError};
use crate::id::{self, IdentifierGenerator};
use crate::operation::{ReadKind, ReadOperation};
use crate::parameter::{ParameterResolver, PassThroughResolver, ShardIdAnnotator};
use crate::shard::{find_shard_for_statement, Shard, ShardIndex, Topology};
use crate::strategy::{
    ExhaustiveExit, ExitStrategy, FirstNonNullExit, ListCollector, MapCollector,
    SelectOneCollector, ShardStrategy,
};
use crate::types::{ShardResolutionData, ShardResult};
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Clone, Copy)]
enum WriteKind {
    Update,
    Delete,
}

impl WriteKind {
    fn name(self) -> &'static str {
        match self {
            WriteKind::Update => "update",
            WriteKind::Delete => "delete",
        }
    }
}

/// Session over a fixed set of shards
pub struct ShardedSession {
    /// Physical shards in topology order
    shards: Vec<Arc<Shard>>,

    index: ShardIndex,

    /// Primary-first candidates for the statement-catalog fallback
    fallback_candidates: Vec<Arc<Shard>>,

    strategy: ShardStrategy,
    id_generator: Option<Arc<dyn IdentifierGenerator>>,
    resolver: Arc<dyn ParameterResolver>,

    /// Statement suffixes treated as identifier-keyed single-row lookups
    lookup_suffixes: Vec<String>,
}

impl ShardedSession {
    /// Build a session over `topology`
    ///
    /// A topology with virtual shards needs a shard-encoding generator,
    /// otherwise the owning shard id of a row could never be recovered.
    pub fn new(
        topology: &Topology,
        strategy: ShardStrategy,
        id_generator: Option<Arc<dyn IdentifierGenerator>>,
    ) -> Result<Self> {
        let (shards, index) = topology.build()?;

        let encodes_shard = id_generator.as_ref().map_or(false, |g| g.encodes_shard());
        if let Some(shard) = shards.iter().find(|s| s.is_virtual()) {
            if !encodes_shard {
                return Err(ShardsError::Configuration(format!(
                    "{} is virtually sharded but the id generator does not encode shard ids",
                    shard.primary_shard_id()
                )));
            }
        }

        info!(
            shards = shards.len(),
            shard_ids = index.len(),
            selection = strategy.selection.name(),
            resolution = strategy.resolution.name(),
            access = strategy.access.name(),
            id_generator = id_generator.as_ref().map_or("none", |g| g.name()),
            "Sharded session ready"
        );

        Ok(Self {
            fallback_candidates: shards.clone(),
            shards,
            index,
            strategy,
            id_generator,
            resolver: Arc::new(PassThroughResolver),
            lookup_suffixes: vec![DEFAULT_LOOKUP_SUFFIX.to_string()],
        })
    }

    /// Build a session with strategies, generator and options from `config`
    pub fn from_config(topology: &Topology, config: &RouterConfig) -> Result<Self> {
        let mut shard_ids: Vec<ShardId> = topology
            .bindings()
            .iter()
            .flat_map(|binding| binding.shard_ids.iter().copied())
            .collect();
        shard_ids.sort();

        let strategy = ShardStrategy::from_config(config, &shard_ids)?;
        let mut session = Self::new(topology, strategy, id::from_kind(config.id_generator))?
            .with_lookup_suffixes(config.lookup_suffixes.clone())
            .with_primary_shard_order(&config.primary_shard_order)?;

        if let Some(key) = &config.shard_parameter_key {
            session = session.with_parameter_resolver(Arc::new(ShardIdAnnotator::new(key.clone())));
        }
        Ok(session)
    }

    pub fn with_parameter_resolver(mut self, resolver: Arc<dyn ParameterResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_lookup_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.lookup_suffixes = suffixes;
        self
    }

    /// Put the shards owning `order` first in the fallback candidate list
    pub fn with_primary_shard_order(mut self, order: &[ShardId]) -> Result<Self> {
        if let Some(unknown) = order.iter().find(|id| self.index.resolve(**id).is_none()) {
            return Err(ShardsError::Configuration(format!(
                "primary shard order names {}, which is not part of the topology",
                unknown
            )));
        }
        self.fallback_candidates = self.index.fallback_candidates(&self.shards, order);
        Ok(self)
    }

    pub fn shards(&self) -> &[Arc<Shard>] {
        &self.shards
    }

    pub fn shard_index(&self) -> &ShardIndex {
        &self.index
    }

    pub fn strategy(&self) -> &ShardStrategy {
        &self.strategy
    }

    // ============================================
    // Reads
    // ============================================

    /// Read at most one row
    ///
    /// Lookup statements are routed by identifier; anything else runs on
    /// every shard that knows the statement. Two shards returning distinct
    /// rows fail the call with `AmbiguousResult`.
    pub async fn select_one<T, P>(&self, statement: &str, parameter: &P) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        P: Serialize + HasIdentifier,
    {
        let value = serde_json::to_value(parameter)?;

        let (shards, mut exit): (Vec<Arc<Shard>>, Box<dyn ExitStrategy>) =
            if self.is_lookup_statement(statement) {
                let identifier = parameter.identifier();
                let (shard_ids, decoded) = self.target_shard_ids(statement, &value, identifier.as_ref())?;
                if shard_ids.is_empty() {
                    return Err(ShardsError::unresolved("select_one", statement));
                }
                // Only a decoded identifier guarantees a single owner
                let exit: Box<dyn ExitStrategy> = if decoded {
                    Box::new(FirstNonNullExit)
                } else {
                    Box::new(ExhaustiveExit)
                };
                (self.index.shards_for_ids(&shard_ids)?, exit)
            } else {
                (self.shards_with_statement("select_one", statement)?, Box::new(ExhaustiveExit))
            };

        let operation = ReadOperation::new(ReadKind::One, statement, value, self.resolver.clone());
        let mut collector = SelectOneCollector::new(statement);
        let merged = self
            .strategy
            .access
            .apply(&shards, &operation, exit.as_mut(), &mut collector)
            .await?;

        match merged {
            ShardResult::One(row) => Ok(row.map(serde_json::from_value).transpose()?),
            other => Err(ShardsError::unexpected("select_one", "one", &other)),
        }
    }

    pub async fn select_list<T, P>(&self, statement: &str, parameter: &P) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        self.select_list_bounded(statement, parameter, RowBounds::DEFAULT).await
    }

    /// Full fan-out list read, concatenated in shard order
    ///
    /// `bounds` apply to each shard separately.
    pub async fn select_list_bounded<T, P>(
        &self,
        statement: &str,
        parameter: &P,
        bounds: RowBounds,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let value = serde_json::to_value(parameter)?;
        let shards = self.shards_with_statement("select_list", statement)?;

        let operation = ReadOperation::new(ReadKind::List(bounds), statement, value, self.resolver.clone());
        let mut collector = ListCollector::new(statement);
        let merged = self
            .strategy
            .access
            .apply(&shards, &operation, &mut ExhaustiveExit, &mut collector)
            .await?;

        match merged {
            ShardResult::List(rows) => rows
                .into_iter()
                .map(|row| serde_json::from_value(row).map_err(ShardsError::from))
                .collect(),
            other => Err(ShardsError::unexpected("select_list", "list", &other)),
        }
    }

    pub async fn select_map<V, P>(
        &self,
        statement: &str,
        parameter: &P,
        map_key: &str,
    ) -> Result<BTreeMap<String, V>>
    where
        V: DeserializeOwned,
        P: Serialize,
    {
        self.select_map_bounded(statement, parameter, map_key, RowBounds::DEFAULT)
            .await
    }

    /// Full fan-out map read; a key found on two shards is `DuplicateKey`
    pub async fn select_map_bounded<V, P>(
        &self,
        statement: &str,
        parameter: &P,
        map_key: &str,
        bounds: RowBounds,
    ) -> Result<BTreeMap<String, V>>
    where
        V: DeserializeOwned,
        P: Serialize,
    {
        let value = serde_json::to_value(parameter)?;
        let shards = self.shards_with_statement("select_map", statement)?;

        let kind = ReadKind::Map {
            map_key: map_key.to_string(),
            bounds,
        };
        let operation = ReadOperation::new(kind, statement, value, self.resolver.clone());
        let mut collector = MapCollector::new(statement);
        let merged = self
            .strategy
            .access
            .apply(&shards, &operation, &mut ExhaustiveExit, &mut collector)
            .await?;

        match merged {
            ShardResult::Map(rows) => rows
                .into_iter()
                .map(|(key, row)| {
                    serde_json::from_value(row)
                        .map(|value| (key, value))
                        .map_err(ShardsError::from)
                })
                .collect(),
            other => Err(ShardsError::unexpected("select_map", "map", &other)),
        }
    }

    // ============================================
    // Writes
    // ============================================

    /// Insert a new object on a single shard
    ///
    /// The first insert of a unit of work chooses the shard and pins it;
    /// later inserts in the same unit of work reuse the pin. With a
    /// generator configured, a fresh identifier is assigned to `parameter`
    /// before dispatch.
    pub async fn insert<P>(&self, uow: &mut UnitOfWork, statement: &str, parameter: &mut P) -> Result<u64>
    where
        P: Serialize + HasIdentifier,
    {
        let value = serde_json::to_value(&*parameter)?;

        let shard_id = match uow.current_subgraph_shard_id() {
            Some(pinned) => {
                trace!(statement = %statement, shard = %pinned, "Reusing subgraph shard");
                pinned
            }
            None => self.placement_shard_id(statement, &value, parameter.identifier().as_ref())?,
        };
        let shard = self.index.resolve(shard_id).cloned().ok_or_else(|| {
            ShardsError::Configuration(format!("{} is not part of the topology", shard_id))
        })?;
        uow.pin_subgraph_shard_id(shard_id);

        let value = match &self.id_generator {
            Some(generator) => {
                let id = generator.generate(uow, &value)?;
                debug!(
                    statement = %statement,
                    shard = %shard_id,
                    id = %id,
                    generator = generator.name(),
                    "Assigning generated identifier"
                );
                parameter.assign_identifier(id)?;
                serde_json::to_value(&*parameter)?
            }
            None => value,
        };

        let executor = shard.establish().await?;
        let rows = executor
            .insert(statement, &self.resolver.resolve(&value, shard_id))
            .await?;

        debug!(statement = %statement, shard = %shard_id, rows = rows, "Inserted");
        Ok(rows)
    }

    /// Update on every target shard id; returns the summed row count
    pub async fn update<P>(&self, uow: &UnitOfWork, statement: &str, parameter: &P) -> Result<u64>
    where
        P: Serialize + HasIdentifier,
    {
        self.write(WriteKind::Update, uow, statement, parameter).await
    }

    /// Delete on every target shard id; returns the summed row count
    pub async fn delete<P>(&self, uow: &UnitOfWork, statement: &str, parameter: &P) -> Result<u64>
    where
        P: Serialize + HasIdentifier,
    {
        self.write(WriteKind::Delete, uow, statement, parameter).await
    }

    async fn write<P>(&self, kind: WriteKind, uow: &UnitOfWork, statement: &str, parameter: &P) -> Result<u64>
    where
        P: Serialize + HasIdentifier,
    {
        let value = serde_json::to_value(parameter)?;
        let identifier = parameter.identifier();
        let shard_ids = self.write_targets(kind, uow, statement, &value, identifier.as_ref())?;
        let shards = self.index.shards_for_ids(&shard_ids)?;

        let mut total = 0u64;
        for shard in &shards {
            let executor = shard.establish().await?;
            let mut dispatched: Vec<Value> = Vec::with_capacity(shard.shard_ids().len());

            for shard_id in shard.shard_ids() {
                let resolved = self.resolver.resolve(&value, *shard_id);
                if dispatched.contains(&resolved) {
                    continue;
                }

                let rows = match kind {
                    WriteKind::Update => executor.update(statement, &resolved).await?,
                    WriteKind::Delete => executor.delete(statement, &resolved).await?,
                };
                debug!(
                    operation = kind.name(),
                    statement = %statement,
                    shard = %shard_id,
                    rows = rows,
                    "Dispatched write"
                );
                total += rows;
                dispatched.push(resolved);
            }
        }
        Ok(total)
    }

    /// Selection strategy first, then the statement catalog
    fn placement_shard_id(
        &self,
        statement: &str,
        value: &Value,
        identifier: Option<&Identifier>,
    ) -> Result<ShardId> {
        if let Some(shard_id) = self.strategy.selection.select_shard_id_for_new_object(statement, value) {
            trace!(
                statement = %statement,
                strategy = self.strategy.selection.name(),
                shard = %shard_id,
                "Placement selected"
            );
            return Ok(shard_id);
        }

        match self.shard_id_for_statement_in(statement, identifier, &self.fallback_candidates)? {
            Some(shard_id) => {
                debug!(statement = %statement, shard = %shard_id, "Selection empty, using statement catalog");
                Ok(shard_id)
            }
            None => Err(ShardsError::unresolved("insert", statement)),
        }
    }

    /// Resolution first, then the unit of work's pin, then the catalog fallback
    fn write_targets(
        &self,
        kind: WriteKind,
        uow: &UnitOfWork,
        statement: &str,
        value: &Value,
        identifier: Option<&Identifier>,
    ) -> Result<Vec<ShardId>> {
        let (shard_ids, _) = self.target_shard_ids(statement, value, identifier)?;
        if !shard_ids.is_empty() {
            return Ok(shard_ids);
        }

        if let Some(pinned) = uow.current_subgraph_shard_id() {
            debug!(operation = kind.name(), statement = %statement, shard = %pinned, "Resolution empty, using subgraph shard");
            return Ok(vec![pinned]);
        }

        match self.shard_id_for_statement_in(statement, identifier, &self.fallback_candidates)? {
            Some(shard_id) => {
                debug!(operation = kind.name(), statement = %statement, shard = %shard_id, "Resolution empty, using statement catalog");
                Ok(vec![shard_id])
            }
            None => Err(ShardsError::unresolved(kind.name(), statement)),
        }
    }

    // ============================================
    // Shard targeting
    // ============================================

    /// Shard id of the first fallback candidate that declares `statement`
    ///
    /// A virtual shard answers with the shard id embedded in the parameter's
    /// identifier. `None` when no candidate knows the statement or the
    /// identifier cannot be decoded.
    pub fn shard_id_for_statement_or_parameter<P>(&self, statement: &str, parameter: &P) -> Result<Option<ShardId>>
    where
        P: HasIdentifier,
    {
        let identifier = parameter.identifier();
        self.shard_id_for_statement_in(statement, identifier.as_ref(), &self.fallback_candidates)
    }

    fn shard_id_for_statement_in(
        &self,
        statement: &str,
        identifier: Option<&Identifier>,
        candidates: &[Arc<Shard>],
    ) -> Result<Option<ShardId>> {
        let Some(shard) = find_shard_for_statement(statement, candidates) else {
            return Ok(None);
        };
        if !shard.is_virtual() {
            return Ok(Some(shard.primary_shard_id()));
        }

        match &self.id_generator {
            Some(generator) if generator.encodes_shard() => match identifier {
                Some(id) => self.decode_identifier(id),
                None => Ok(None),
            },
            _ => Err(ShardsError::Configuration(
                "virtual sharding requires a shard-encoding id generator".to_string(),
            )),
        }
    }

    /// Candidate shard ids and whether they were decoded from the identifier
    fn target_shard_ids(
        &self,
        statement: &str,
        value: &Value,
        identifier: Option<&Identifier>,
    ) -> Result<(Vec<ShardId>, bool)> {
        if let Some(id) = identifier {
            if let Some(shard_id) = self.decode_identifier(id)? {
                trace!(statement = %statement, id = %id, shard = %shard_id, "Shard decoded from identifier");
                return Ok((vec![shard_id], true));
            }
        }

        let data = ShardResolutionData::new(statement, value, identifier);
        let shard_ids = self.strategy.resolution.select_shard_ids(&data);
        trace!(
            statement = %statement,
            strategy = self.strategy.resolution.name(),
            shard_ids = ?shard_ids,
            "Resolved candidate shards"
        );
        Ok((shard_ids, false))
    }

    /// Shard id embedded in `id`, if the generator can decode it
    ///
    /// Identifiers of the wrong shape, or naming a shard id outside the
    /// topology, are left to the resolution strategy.
    fn decode_identifier(&self, id: &Identifier) -> Result<Option<ShardId>> {
        let Some(generator) = self.id_generator.as_ref().filter(|g| g.encodes_shard()) else {
            return Ok(None);
        };

        match generator.extract_shard_id(id) {
            Ok(shard_id) if self.index.resolve(shard_id).is_some() => Ok(Some(shard_id)),
            Ok(shard_id) => {
                debug!(id = %id, shard = %shard_id, "Decoded shard id is not in the topology");
                Ok(None)
            }
            Err(ShardsError::Identifier(e)) => {
                trace!(id = %id, error = %e, "Identifier carries no shard id");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn shards_with_statement(&self, operation: &'static str, statement: &str) -> Result<Vec<Arc<Shard>>> {
        let shards: Vec<Arc<Shard>> = self
            .shards
            .iter()
            .filter(|shard| shard.has_statement(statement))
            .cloned()
            .collect();
        if shards.is_empty() {
            return Err(ShardsError::unresolved(operation, statement));
        }
        Ok(shards)
    }

    fn is_lookup_statement(&self, statement: &str) -> bool {
        self.lookup_suffixes
            .iter()
            .any(|suffix| !suffix.is_empty() && statement.ends_with(suffix.as_str()))
    }

    // ============================================
    // Capabilities and administration
    // ============================================

    /// Typed capability from the first shard whose catalog registers `M`
    pub async fn capability<M>(&self) -> Result<Arc<M>>
    where
        M: Any + Send + Sync,
    {
        let capability = TypeId::of::<M>();
        let not_bound = || ShardsError::CapabilityNotBound(type_name::<M>());

        let shard = self
            .shards
            .iter()
            .find(|shard| shard.catalog().has_capability(capability))
            .ok_or_else(not_bound)?;
        let executor = shard.establish().await?;

        shard
            .catalog()
            .obtain_capability(capability, executor)
            .ok_or_else(not_bound)?
            .downcast::<M>()
            .map_err(|_| not_bound())
    }

    /// Clear the local cache of every established executor
    pub fn clear_cache(&self) {
        let mut cleared = 0usize;
        for executor in self.shards.iter().filter_map(|shard| shard.established()) {
            executor.clear_cache();
            cleared += 1;
        }
        debug!(cleared = cleared, "Cleared executor caches");
    }

    pub fn commit(&self) -> Result<()> {
        Err(ShardsError::unsupported("commit across shards"))
    }

    pub fn rollback(&self) -> Result<()> {
        Err(ShardsError::unsupported("rollback across shards"))
    }

    /// There is no single connection behind a sharded session
    pub fn connection(&self) -> Result<Arc<dyn Executor>> {
        Err(ShardsError::unsupported("connection access across shards"))
    }

    /// Streaming reads through a row handler are not merged across shards
    pub fn select_with_handler<P, F>(&self, statement: &str, _parameter: &P, _handler: F) -> Result<()>
    where
        P: Serialize,
        F: FnMut(Value),
    {
        Err(ShardsError::unsupported(format!(
            "result handler read of '{}' across shards",
            statement
        )))
    }

    /// Batched statements belong to the unit-of-work manager
    pub fn flush_statements(&self) -> Result<()> {
        debug!("flush_statements delegated to the unit-of-work manager");
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        debug!("close delegated to the unit-of-work manager");
        Ok(())
    }
}

impl std::fmt::Debug for ShardedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedSession")
            .field("shards", &self.shards)
            .field("strategy", &self.strategy)
            .field("id_generator", &self.id_generator.as_ref().map(|g| g.name()))
            .field("resolver", &self.resolver.name())
            .field("lookup_suffixes", &self.lookup_suffixes)
            .finish()
    }
}
