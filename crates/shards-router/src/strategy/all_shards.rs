//! Full fan-out resolution

use shards_core::ShardId;

use super::ShardResolutionStrategy;
use crate::types::ShardResolutionData;

/// Resolution that never narrows: every shard id is a candidate
#[derive(Debug, Clone)]
pub struct AllShardsResolution {
    shard_ids: Vec<ShardId>,
}

impl AllShardsResolution {
    pub fn new(shard_ids: Vec<ShardId>) -> Self {
        Self { shard_ids }
    }
}

impl ShardResolutionStrategy for AllShardsResolution {
    fn select_shard_ids(&self, _data: &ShardResolutionData<'_>) -> Vec<ShardId> {
        self.shard_ids.clone()
    }

    fn name(&self) -> &'static str {
        "AllShards"
    }
}
