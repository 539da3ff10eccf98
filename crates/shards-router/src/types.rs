//! Common types for the router
//!
//! Centralizes the values that flow between the session, the strategies and
//! the shard operations.

use std::collections::BTreeMap;

use serde_json::Value;
use shards_core::Identifier;

/// Partial result produced by one shard
///
/// Exit strategies inspect it, collectors merge it.
#[derive(Debug, Clone, PartialEq)]
pub enum ShardResult {
    One(Option<Value>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl ShardResult {
    /// Shape name for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            ShardResult::One(_) => "one",
            ShardResult::List(_) => "list",
            ShardResult::Map(_) => "map",
        }
    }

    /// Null or empty results count as "nothing found"
    pub fn is_empty(&self) -> bool {
        match self {
            ShardResult::One(row) => matches!(row, None | Some(Value::Null)),
            ShardResult::List(rows) => rows.is_empty(),
            ShardResult::Map(rows) => rows.is_empty(),
        }
    }
}

/// Inputs handed to a resolution strategy for one call
#[derive(Debug, Clone, Copy)]
pub struct ShardResolutionData<'a> {
    pub statement: &'a str,
    pub parameter: &'a Value,
    pub identifier: Option<&'a Identifier>,
}

impl<'a> ShardResolutionData<'a> {
    pub fn new(statement: &'a str, parameter: &'a Value, identifier: Option<&'a Identifier>) -> Self {
        Self {
            statement,
            parameter,
            identifier,
        }
    }
}
