//! Shards Router - Sharded Session Layer
//!
//! Routes statement-oriented reads and writes across horizontal shards and
//! merges the per-shard results into one logical result.
//!
//! # Architecture
//!
//! ```text
//! (statement, parameter)
//!     │
//!     ▼
//! ┌─────────────────────────┐
//! │     ShardedSession      │  Decides: identifier, selection or resolution
//! │   (Which shard ids?)    │
//! └───────────┬─────────────┘
//!             │
//!             ▼
//! ┌─────────────────────────┐
//! │       ShardIndex        │  ShardId → physical Shard
//! └───────────┬─────────────┘
//!             │
//!             ▼
//! ┌─────────────────────────┐
//! │  ShardAccessStrategy    │  Scatter-gather with exit + collector
//! │   (Run and merge)       │
//! └─────────────────────────┘
//! ```
//!
//! # Strategies
//!
//! ## Placement and targeting (strategy module)
//! - **RoundRobinSelection**: Spreads new objects evenly over shard ids
//! - **ConsistentHashStrategy**: Same partition key → same shard id
//! - **AllShardsResolution**: Full fan-out when nothing narrows the targets
//!
//! ## Access
//! - **SequentialAccessStrategy**: One shard at a time, list order
//! - **ParallelAccessStrategy**: All shards in flight, completion order
//!
//! # Example
//!
//! ```rust,ignore
//! use shards_router::{ShardedSession, Topology, UnitOfWork};
//!
//! let topology = Topology::new()
//!     .with_shard(factory_a, [0u16])
//!     .with_shard(factory_b, [1u16]);
//! let session = ShardedSession::from_config(&topology, &RouterConfig::from_env())?;
//!
//! let mut uow = UnitOfWork::new();
//! let mut user = json!({"name": "alice"});
//! session.insert(&mut uow, "User.insert", &mut user).await?;
//!
//! // Routed straight to the shard embedded in the generated id
//! let found: Option<Value> = session.select_one("User.getById", &user["id"]).await?;
//! ```

// Core modules
mod error;
mod types;
mod shard;
mod unit_of_work;
mod parameter;

// Identifier generators
mod id;

// Strategy module (contains all sharding strategies)
mod strategy;

// Execution
mod operation;
mod session;

#[cfg(test)]
mod testing;


// Re-exports: Error types
pub use error::{Result, ShardsError};

// Re-exports: Core types
pub use types::{ShardResolutionData, ShardResult};

// Re-exports: Shard management
pub use shard::{find_shard_for_statement, Shard, ShardBinding, ShardIndex, Topology};

// Re-exports: Unit of work and parameter resolution
pub use parameter::{ParameterResolver, PassThroughResolver, ShardIdAnnotator};
pub use unit_of_work::UnitOfWork;

// Re-exports: Identifier generators
pub use id::{
    from_kind as generator_from_kind, IdentifierGenerator, PlainUuidGenerator,
    ShardedSequenceGenerator, ShardedUuidGenerator,
};

// Re-exports: Strategy traits and implementations
pub use strategy::{
    // Traits
    ExitStrategy, ResultsCollector, ShardAccessStrategy, ShardResolutionStrategy,
    ShardSelectionStrategy, ShardStrategy,
    // Selection and resolution
    AllShardsResolution, ConsistentHashStrategy, RoundRobinSelection,
    // Access
    ParallelAccessStrategy, SequentialAccessStrategy,
    // Exit and collection
    ExhaustiveExit, FirstNonNullExit, ListCollector, MapCollector, SelectOneCollector,
};

// Re-exports: Operations and the session
pub use operation::{ReadKind, ReadOperation, ShardOperation};
pub use session::ShardedSession;
