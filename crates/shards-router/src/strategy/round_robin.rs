//! Round-robin placement of new objects

use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;
use shards_core::ShardId;
use tracing::trace;

use super::ShardSelectionStrategy;

/// Rotates new objects over the shard ids in order
#[derive(Debug)]
pub struct RoundRobinSelection {
    shard_ids: Vec<ShardId>,
    next: AtomicUsize,
}

impl RoundRobinSelection {
    pub fn new(shard_ids: Vec<ShardId>) -> Self {
        Self {
            shard_ids,
            next: AtomicUsize::new(0),
        }
    }
}

impl ShardSelectionStrategy for RoundRobinSelection {
    fn select_shard_id_for_new_object(&self, statement: &str, _parameter: &Value) -> Option<ShardId> {
        if self.shard_ids.is_empty() {
            return None;
        }
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.shard_ids.len();
        let shard_id = self.shard_ids[slot];
        trace!(statement, shard = %shard_id, "Round-robin placement");
        Some(shard_id)
    }

    fn name(&self) -> &'static str {
        "RoundRobin"
    }
}
