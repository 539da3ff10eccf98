//! Numeric shard-encoding identifiers
//!
//! ```text
//!  63   62            47 46                        0
//! ┌───┬────────────────┬───────────────────────────┐
//! │ 0 │    shard id    │         sequence          │
//! └───┴────────────────┴───────────────────────────┘
//! ```
//!
//! The sequence is per process. Deployments running several writers must
//! give each one a disjoint starting point via `with_start`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use shards_core::{Identifier, IdentifierError, ShardId};
use tracing::trace;

use super::{pinned_shard, IdentifierGenerator};
use crate::error::Result;
use crate::unit_of_work::UnitOfWork;

const SEQUENCE_BITS: u32 = 47;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Positive `i64` identifiers with the shard id in bits 47..63
#[derive(Debug)]
pub struct ShardedSequenceGenerator {
    next: AtomicU64,
}

impl ShardedSequenceGenerator {
    pub fn new() -> Self {
        Self::with_start(1)
    }

    pub fn with_start(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start & SEQUENCE_MASK),
        }
    }

    pub fn encode(shard_id: ShardId, sequence: u64) -> i64 {
        let raw = (u64::from(shard_id.get()) << SEQUENCE_BITS) | (sequence & SEQUENCE_MASK);
        // The top bit is never set: 16 + 47 bits
        raw as i64
    }

    pub fn decode(id: i64) -> Option<ShardId> {
        if id < 0 {
            return None;
        }
        Some(ShardId::new(((id as u64) >> SEQUENCE_BITS) as u16))
    }
}

impl Default for ShardedSequenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentifierGenerator for ShardedSequenceGenerator {
    fn generate(&self, uow: &UnitOfWork, _parameter: &Value) -> Result<Identifier> {
        let shard_id = pinned_shard(uow, self.name())?;
        let sequence = self.next.fetch_add(1, Ordering::Relaxed);
        let id = Self::encode(shard_id, sequence);
        trace!(shard = %shard_id, id, "Generated sharded sequence id");
        Ok(Identifier::Number(id))
    }

    fn extract_shard_id(&self, id: &Identifier) -> Result<ShardId> {
        let decoded = match id {
            Identifier::Number(n) => Self::decode(*n),
            Identifier::Text(s) => s.parse::<i64>().ok().and_then(Self::decode),
            Identifier::Uuid(_) => None,
        };
        decoded.ok_or_else(|| IdentifierError::NoEmbeddedShard(id.clone()).into())
    }

    fn encodes_shard(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "ShardedSequence"
    }
}
