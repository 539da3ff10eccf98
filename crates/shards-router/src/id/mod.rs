//! Identifier generation
//!
//! - `ShardedUuidGenerator`: v4 UUIDs carrying the owning shard id
//! - `ShardedSequenceGenerator`: positive `i64`s carrying the owning shard id
//! - `PlainUuidGenerator`: v4 UUIDs with no shard information
//!
//! Shard-encoding generators let an identifier-keyed read go straight to the
//! owning shard without asking a resolution strategy. The price is that an
//! object cannot move to another shard without a new identifier.

mod sequence;
mod uuid_generator;

pub use self::sequence::ShardedSequenceGenerator;
pub use self::uuid_generator::{PlainUuidGenerator, ShardedUuidGenerator};

use std::sync::Arc;

use serde_json::Value;
use shards_core::{IdGeneratorKind, Identifier, ShardId};

use crate::error::{Result, ShardsError};
use crate::unit_of_work::UnitOfWork;

/// Trait for identifier generators
pub trait IdentifierGenerator: Send + Sync {
    /// Produce a new identifier for `parameter`
    ///
    /// Shard-encoding generators embed the unit of work's subgraph shard.
    fn generate(&self, uow: &UnitOfWork, parameter: &Value) -> Result<Identifier>;

    /// Decode the owning shard id. Pure, no lookup.
    fn extract_shard_id(&self, id: &Identifier) -> Result<ShardId>;

    /// Whether `extract_shard_id` is supported
    fn encodes_shard(&self) -> bool;

    /// Generator name for logging
    fn name(&self) -> &'static str;
}

/// Build the generator selected by configuration
pub fn from_kind(kind: IdGeneratorKind) -> Option<Arc<dyn IdentifierGenerator>> {
    match kind {
        IdGeneratorKind::None => None,
        IdGeneratorKind::ShardedUuid => Some(Arc::new(ShardedUuidGenerator::new())),
        IdGeneratorKind::PlainUuid => Some(Arc::new(PlainUuidGenerator::new())),
        IdGeneratorKind::ShardedSequence => Some(Arc::new(ShardedSequenceGenerator::new())),
    }
}

/// Shard id pinned on the unit of work, required by shard-encoding generators
fn pinned_shard(uow: &UnitOfWork, generator: &'static str) -> Result<ShardId> {
    uow.current_subgraph_shard_id().ok_or_else(|| {
        ShardsError::Configuration(format!(
            "{} needs a subgraph shard pinned on the unit of work",
            generator
        ))
    })
}
