//! Consistent Hash Strategy for Shard Placement
//!
//! Hashes a partition key taken from the parameter onto a ring of shard ids,
//! so the same key always lands on the same shard. The same ring answers
//! resolution: a parameter carrying the key narrows to one shard id, anything
//! else fans out to all of them.

use std::collections::BTreeMap;

use blake3::Hasher;
use serde_json::Value;
use shards_core::ShardId;
use tracing::trace;

use super::{ShardResolutionStrategy, ShardSelectionStrategy};
use crate::types::ShardResolutionData;

/// Consistent hash placement/resolution over a fixed set of shard ids
#[derive(Debug)]
pub struct ConsistentHashStrategy {
    /// Parameter field holding the partition key
    key_field: String,
    /// Ring of hash → shard id, built once since the topology is immutable
    ring: BTreeMap<u64, ShardId>,
    shard_ids: Vec<ShardId>,
}

impl ConsistentHashStrategy {
    /// Create with default 150 virtual nodes
    pub fn new(key_field: impl Into<String>, shard_ids: &[ShardId]) -> Self {
        Self::with_virtual_nodes(key_field, shard_ids, 150)
    }

    /// Create with custom virtual node count
    pub fn with_virtual_nodes(key_field: impl Into<String>, shard_ids: &[ShardId], virtual_nodes: u32) -> Self {
        let virtual_nodes = virtual_nodes.max(1);
        let mut ring = BTreeMap::new();
        for shard_id in shard_ids {
            for vn in 0..virtual_nodes {
                let key = format!("{}:{}", shard_id, vn);
                ring.insert(Self::hash_key(&key), *shard_id);
            }
        }

        Self {
            key_field: key_field.into(),
            ring,
            shard_ids: shard_ids.to_vec(),
        }
    }

    /// Hash a string key using blake3
    fn hash_key(key: &str) -> u64 {
        let mut hasher = Hasher::new();
        hasher.update(key.as_bytes());
        let hash = hasher.finalize();
        let bytes = hash.as_bytes();
        u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
            bytes[4], bytes[5], bytes[6], bytes[7],
        ])
    }

    /// Partition key of an object parameter, rendered as a string
    fn partition_key(&self, parameter: &Value) -> Option<String> {
        match parameter.get(&self.key_field)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Shard id owning `key`
    pub fn route_key(&self, key: &str) -> Option<ShardId> {
        if self.ring.is_empty() {
            return None;
        }

        let hash = Self::hash_key(key);
        trace!(key = %key, hash = %hash, "Consistent hash lookup");

        // Find the first node >= hash, or wrap around to first
        self.ring
            .range(hash..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, shard_id)| *shard_id)
    }
}

impl ShardSelectionStrategy for ConsistentHashStrategy {
    fn select_shard_id_for_new_object(&self, _statement: &str, parameter: &Value) -> Option<ShardId> {
        let key = self.partition_key(parameter)?;
        self.route_key(&key)
    }

    fn name(&self) -> &'static str {
        "ConsistentHash"
    }
}

impl ShardResolutionStrategy for ConsistentHashStrategy {
    fn select_shard_ids(&self, data: &ShardResolutionData<'_>) -> Vec<ShardId> {
        match self.partition_key(data.parameter).and_then(|key| self.route_key(&key)) {
            Some(shard_id) => vec![shard_id],
            None => self.shard_ids.clone(),
        }
    }

    fn name(&self) -> &'static str {
        "ConsistentHash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sha2::{Digest, Sha256};

    fn shard_ids(count: u16) -> Vec<ShardId> {
        (1..=count).map(ShardId::new).collect()
    }

    fn make_tenant_key(name: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"TENANT:");
        hasher.update(name.as_bytes());
        let result = hasher.finalize();
        result.iter().map(|b| format!("{:02x}", b)).collect()
    }

    #[test]
    fn test_consistent_hash_deterministic() {
        let strategy = ConsistentHashStrategy::new("tenant", &shard_ids(6));
        let param = json!({"tenant": "alice"});

        let first = strategy.select_shard_id_for_new_object("User.insert", &param);
        let second = strategy.select_shard_id_for_new_object("User.insert", &param);

        assert!(first.is_some());
        assert_eq!(first, second, "Same key should route to same shard");
    }

    #[test]
    fn test_consistent_hash_distribution() {
        let strategy = ConsistentHashStrategy::new("tenant", &shard_ids(6));

        let mut distribution = std::collections::HashMap::new();

        for i in 0..1000 {
            let param = json!({"tenant": make_tenant_key(&format!("tenant-{}", i))});
            let shard = strategy.select_shard_id_for_new_object("T.insert", &param).unwrap();
            *distribution.entry(shard).or_insert(0) += 1;
        }

        // All 6 shards should receive traffic
        assert_eq!(distribution.len(), 6);

        // Check reasonable distribution (each shard gets roughly 10-30%)
        for count in distribution.values() {
            assert!(*count > 50 && *count < 300, "count={} is outside expected range", count);
        }
    }

    #[test]
    fn test_missing_key_selects_nothing() {
        let strategy = ConsistentHashStrategy::new("tenant", &shard_ids(3));
        assert_eq!(strategy.select_shard_id_for_new_object("T.insert", &json!({"name": "x"})), None);
        assert_eq!(strategy.select_shard_id_for_new_object("T.insert", &json!({"tenant": null})), None);
        assert_eq!(strategy.select_shard_id_for_new_object("T.insert", &json!(5)), None);
    }

    #[test]
    fn test_resolution_narrows_or_fans_out() {
        let ids = shard_ids(4);
        let strategy = ConsistentHashStrategy::new("tenant", &ids);

        let keyed = json!({"tenant": 77});
        let narrowed = strategy.select_shard_ids(&ShardResolutionData::new("T.update", &keyed, None));
        assert_eq!(narrowed.len(), 1);
        assert_eq!(Some(narrowed[0]), strategy.route_key("77"));

        let unkeyed = json!({"name": "x"});
        let all = strategy.select_shard_ids(&ShardResolutionData::new("T.update", &unkeyed, None));
        assert_eq!(all, ids);
    }

    #[test]
    fn test_empty_ring() {
        let strategy = ConsistentHashStrategy::new("tenant", &[]);
        assert_eq!(strategy.route_key("anything"), None);
    }
}
