//! Sharding Strategies
//!
//! Four independent concerns, each behind its own small trait:
//!
//! - `ShardSelectionStrategy`: which shard id receives a new object
//! - `ShardResolutionStrategy`: which shard ids may hold the rows a read/write targets
//! - `ShardAccessStrategy`: how a per-shard operation runs over the candidate shards
//! - `ExitStrategy` + `ResultsCollector`: when scatter-gather stops, how partials merge
//!
//! # Strategy Hierarchy
//!
//! ```text
//! Operation (statement, parameter)
//!     │
//!     ▼
//! ┌─────────────────────────┐
//! │ Selection / Resolution  │  (RoundRobin / ConsistentHash / AllShards)
//! │   (Which shard ids?)    │
//! └───────────┬─────────────┘
//!             │
//!             ▼
//! ┌─────────────────────────┐
//! │        Access           │  (Sequential / Parallel)
//! │ (Run, exit, collect)    │
//! └─────────────────────────┘
//! ```

mod all_shards;
mod collector;
mod consistent_hash;
mod exit;
mod parallel;
mod round_robin;
mod sequential;

pub use all_shards::AllShardsResolution;
pub use collector::{ListCollector, MapCollector, SelectOneCollector};
pub use consistent_hash::ConsistentHashStrategy;
pub use exit::{ExhaustiveExit, FirstNonNullExit};
pub use parallel::ParallelAccessStrategy;
pub use round_robin::RoundRobinSelection;
pub use sequential::SequentialAccessStrategy;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use shards_core::{AccessMode, ResolutionPolicy, RouterConfig, SelectionPolicy, ShardId};

use crate::error::{Result, ShardsError};
use crate::operation::ShardOperation;
use crate::shard::Shard;
use crate::types::{ShardResolutionData, ShardResult};

/// Trait for insert placement strategies
pub trait ShardSelectionStrategy: Send + Sync {
    /// Pick the shard id for a new object
    ///
    /// `None` sends the session to its statement-catalog fallback.
    fn select_shard_id_for_new_object(&self, statement: &str, parameter: &Value) -> Option<ShardId>;

    /// Strategy name for logging
    fn name(&self) -> &'static str;
}

/// Trait for read/write targeting strategies
///
/// A strategy that cannot narrow the candidates must return every shard id.
/// An empty result means "no eligible shard" and fails the operation.
pub trait ShardResolutionStrategy: Send + Sync {
    fn select_shard_ids(&self, data: &ShardResolutionData<'_>) -> Vec<ShardId>;

    /// Strategy name for logging
    fn name(&self) -> &'static str;
}

/// Trait for scatter-gather execution policies
///
/// Runs `operation` on each shard, feeds every partial to the collector and
/// asks the exit strategy whether to stop. Any shard failure aborts the call.
#[async_trait]
pub trait ShardAccessStrategy: Send + Sync {
    async fn apply(
        &self,
        shards: &[Arc<Shard>],
        operation: &dyn ShardOperation,
        exit: &mut dyn ExitStrategy,
        collector: &mut dyn ResultsCollector,
    ) -> Result<ShardResult>;

    /// Strategy name for logging
    fn name(&self) -> &'static str;
}

/// Early termination policy
pub trait ExitStrategy: Send {
    fn might_exit(&mut self, partial: &ShardResult) -> bool;
}

/// Merges partial results into the logical result
pub trait ResultsCollector: Send {
    /// `position` is the shard's index in the candidate list
    fn accumulate(&mut self, position: usize, shard: &Shard, partial: ShardResult) -> Result<()>;

    /// Merged result of everything accumulated so far
    fn collect(&mut self) -> Result<ShardResult>;
}

/// The configured strategy bundle
#[derive(Clone)]
pub struct ShardStrategy {
    pub selection: Arc<dyn ShardSelectionStrategy>,
    pub resolution: Arc<dyn ShardResolutionStrategy>,
    pub access: Arc<dyn ShardAccessStrategy>,
}

impl ShardStrategy {
    pub fn new(
        selection: Arc<dyn ShardSelectionStrategy>,
        resolution: Arc<dyn ShardResolutionStrategy>,
        access: Arc<dyn ShardAccessStrategy>,
    ) -> Self {
        Self {
            selection,
            resolution,
            access,
        }
    }

    /// Round-robin placement, full fan-out resolution, sequential access
    pub fn default_for(shard_ids: &[ShardId]) -> Self {
        Self::new(
            Arc::new(RoundRobinSelection::new(shard_ids.to_vec())),
            Arc::new(AllShardsResolution::new(shard_ids.to_vec())),
            Arc::new(SequentialAccessStrategy),
        )
    }

    /// Build the bundle described by `config` over `shard_ids`
    pub fn from_config(config: &RouterConfig, shard_ids: &[ShardId]) -> Result<Self> {
        let access: Arc<dyn ShardAccessStrategy> = match config.access {
            AccessMode::Sequential => Arc::new(SequentialAccessStrategy),
            AccessMode::Parallel => Arc::new(ParallelAccessStrategy),
        };

        let hashing = match &config.selection {
            SelectionPolicy::ConsistentHash {
                key_field,
                virtual_nodes,
            } => Some(Arc::new(ConsistentHashStrategy::with_virtual_nodes(
                key_field.clone(),
                shard_ids,
                *virtual_nodes,
            ))),
            SelectionPolicy::RoundRobin => None,
        };

        let selection: Arc<dyn ShardSelectionStrategy> = match &hashing {
            Some(ring) => ring.clone(),
            None => Arc::new(RoundRobinSelection::new(shard_ids.to_vec())),
        };

        let resolution: Arc<dyn ShardResolutionStrategy> = match (config.resolution, &hashing) {
            (ResolutionPolicy::AllShards, _) => Arc::new(AllShardsResolution::new(shard_ids.to_vec())),
            (ResolutionPolicy::ConsistentHash, Some(ring)) => ring.clone(),
            (ResolutionPolicy::ConsistentHash, None) => {
                return Err(ShardsError::Configuration(
                    "consistent hash resolution requires consistent hash selection".to_string(),
                ))
            }
        };

        Ok(Self::new(selection, resolution, access))
    }
}

impl std::fmt::Debug for ShardStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardStrategy")
            .field("selection", &self.selection.name())
            .field("resolution", &self.resolution.name())
            .field("access", &self.access.name())
            .finish()
    }
}
