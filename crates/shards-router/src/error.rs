//! Error types for the sharded session

use shards_core::{IdentifierError, ShardId};
use thiserror::Error;

use crate::types::ShardResult;

/// Sharded session error types
///
/// Every variant is fatal for the call that raised it. Nothing is retried.
#[derive(Debug, Error)]
pub enum ShardsError {
    /// Invalid topology or strategy setup
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Selection or resolution produced no shard id for an operation that needs one
    #[error("No shard resolved for {operation} of statement '{statement}'")]
    UnresolvedShard {
        operation: &'static str,
        statement: String,
    },

    /// More than one shard returned a row for a single-row read
    #[error("Statement '{statement}' returned distinct rows from {first} and {second}")]
    AmbiguousResult {
        statement: String,
        first: ShardId,
        second: ShardId,
    },

    /// A map read found the same key on two shards
    #[error("Statement '{statement}' returned key '{key}' from both {first} and {second}")]
    DuplicateKey {
        statement: String,
        key: String,
        first: ShardId,
        second: ShardId,
    },

    /// Operation is not available across shards
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// No shard's catalog registers the requested capability type
    #[error("Capability {0} is not bound on any shard")]
    CapabilityNotBound(&'static str),

    /// A shard operation produced a result its collector cannot merge
    #[error("Operation {operation} produced a {actual} result, expected {expected}")]
    UnexpectedResult {
        operation: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Parameter could not take a generated identifier
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    /// Parameter or row (de)serialization failed
    #[error("Mapping error: {0}")]
    Mapping(#[from] serde_json::Error),

    /// Failure raised by a shard's executor, passed through unchanged
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl ShardsError {
    pub(crate) fn unresolved(operation: &'static str, statement: &str) -> Self {
        ShardsError::UnresolvedShard {
            operation,
            statement: statement.to_string(),
        }
    }

    pub(crate) fn unexpected(operation: &str, expected: &'static str, actual: &ShardResult) -> Self {
        ShardsError::UnexpectedResult {
            operation: operation.to_string(),
            expected,
            actual: actual.kind(),
        }
    }

    pub(crate) fn unsupported(what: impl Into<String>) -> Self {
        ShardsError::UnsupportedOperation(what.into())
    }
}

pub type Result<T> = std::result::Result<T, ShardsError>;
