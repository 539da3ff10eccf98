//! Per-shard parameter resolution
//!
//! Before a statement is dispatched the parameter is rewritten for the shard
//! id it runs against, e.g. so a mapped statement can pick a per-shard table.

use serde_json::Value;
use shards_core::ShardId;

/// Rewrites a parameter for one target shard id
pub trait ParameterResolver: Send + Sync {
    fn resolve(&self, parameter: &Value, shard_id: ShardId) -> Value;

    /// Resolver name for logging
    fn name(&self) -> &'static str;
}

/// Dispatches the parameter unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughResolver;

impl ParameterResolver for PassThroughResolver {
    fn resolve(&self, parameter: &Value, _shard_id: ShardId) -> Value {
        parameter.clone()
    }

    fn name(&self) -> &'static str {
        "PassThrough"
    }
}

/// Adds the target shard id under `key`
///
/// Object parameters get the key added. Any other parameter is wrapped as
/// `{"value": <parameter>, <key>: <shard id>}`.
#[derive(Debug, Clone)]
pub struct ShardIdAnnotator {
    key: String,
}

impl ShardIdAnnotator {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl ParameterResolver for ShardIdAnnotator {
    fn resolve(&self, parameter: &Value, shard_id: ShardId) -> Value {
        let mut map = match parameter {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };
        map.insert(self.key.clone(), Value::from(shard_id.get()));
        Value::Object(map)
    }

    fn name(&self) -> &'static str {
        "ShardIdAnnotator"
    }
}
