//! Configuration module for the sharded session

use serde::{Deserialize, Serialize};

use crate::types::ShardId;

/// Router configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// How candidate shards are visited during scatter-gather
    pub access: AccessMode,

    /// Placement of new objects
    pub selection: SelectionPolicy,

    /// Targeting of reads, updates and deletes
    pub resolution: ResolutionPolicy,

    /// Identifier generator used on insert
    pub id_generator: IdGeneratorKind,

    /// Statement name suffixes treated as identifier-keyed single-row lookups
    pub lookup_suffixes: Vec<String>,

    /// Primary-first shard order for the "first shard declaring the statement" fallback.
    /// Shards not listed keep topology order after the listed ones.
    pub primary_shard_order: Vec<ShardId>,

    /// When set, every dispatched parameter object gets the target shard id under this key
    pub shard_parameter_key: Option<String>,
}

/// Scatter-gather concurrency policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Visit shards one after another in list order
    #[default]
    Sequential,
    /// Dispatch to every shard at once; completion order decides early exit
    Parallel,
}

/// Insert placement policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Rotate over all shard ids
    RoundRobin,
    /// Hash the parameter's partition key onto a ring of shard ids
    ConsistentHash {
        key_field: String,
        virtual_nodes: u32,
    },
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::RoundRobin
    }
}

/// Read/update/delete targeting policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// Always fan out to every shard
    #[default]
    AllShards,
    /// Narrow by partition key when the parameter carries one.
    /// Requires `SelectionPolicy::ConsistentHash`.
    ConsistentHash,
}

/// Identifier generator kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdGeneratorKind {
    /// Identifiers are supplied by the caller or the database
    None,
    /// UUIDs with the shard id embedded
    #[default]
    ShardedUuid,
    /// UUIDs with no shard information
    PlainUuid,
    /// 63-bit numbers with the shard id in the high bits
    ShardedSequence,
}

impl std::str::FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            other => Err(format!("unknown access mode '{}'", other)),
        }
    }
}

impl std::str::FromStr for IdGeneratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "none" => Ok(Self::None),
            "sharded-uuid" => Ok(Self::ShardedUuid),
            "plain-uuid" | "uuid" => Ok(Self::PlainUuid),
            "sharded-sequence" => Ok(Self::ShardedSequence),
            other => Err(format!("unknown id generator '{}'", other)),
        }
    }
}

pub const DEFAULT_LOOKUP_SUFFIX: &str = "getById";
pub const DEFAULT_VIRTUAL_NODES: u32 = 150;

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            access: AccessMode::default(),
            selection: SelectionPolicy::default(),
            resolution: ResolutionPolicy::default(),
            id_generator: IdGeneratorKind::default(),
            lookup_suffixes: vec![DEFAULT_LOOKUP_SUFFIX.to_string()],
            primary_shard_order: vec![],
            shard_parameter_key: None,
        }
    }
}

impl RouterConfig {
    /// Load configuration from environment variables
    ///
    /// Unparsable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = RouterConfig::default();

        if let Ok(access) = std::env::var("SHARDS_ACCESS") {
            if let Ok(access) = access.parse() {
                config.access = access;
            }
        }

        // Selection: "round-robin" or "consistent-hash"; the latter reads its key field
        if let Ok(selection) = std::env::var("SHARDS_SELECTION") {
            match selection.trim().to_ascii_lowercase().as_str() {
                "round-robin" | "round_robin" => config.selection = SelectionPolicy::RoundRobin,
                "consistent-hash" | "consistent_hash" => {
                    let key_field = std::env::var("SHARDS_PARTITION_KEY")
                        .unwrap_or_else(|_| crate::identifier::PRIMARY_KEY_FIELD.to_string());
                    config.selection = SelectionPolicy::ConsistentHash {
                        key_field,
                        virtual_nodes: DEFAULT_VIRTUAL_NODES,
                    };
                    config.resolution = ResolutionPolicy::ConsistentHash;
                }
                _ => {}
            }
        }

        if let Ok(kind) = std::env::var("SHARDS_ID_GENERATOR") {
            if let Ok(kind) = kind.parse() {
                config.id_generator = kind;
            }
        }

        if let Ok(suffixes) = std::env::var("SHARDS_LOOKUP_SUFFIXES") {
            config.lookup_suffixes = split_list(&suffixes);
        }

        if let Ok(order) = std::env::var("SHARDS_PRIMARY_ORDER") {
            config.primary_shard_order = split_list(&order)
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();
        }

        if let Ok(key) = std::env::var("SHARDS_PARAMETER_KEY") {
            let key = key.trim();
            if !key.is_empty() {
                config.shard_parameter_key = Some(key.to_string());
            }
        }

        config
    }

    /// Parse configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
