//! Per-shard statement executor capability
//!
//! The executor owns connection management, parameter binding and result
//! mapping for one physical shard. The router only ever calls it through
//! these traits and treats every failure as opaque.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::catalog::StatementCatalog;
use crate::types::RowBounds;

/// Statement executor bound to one physical shard
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a statement expected to yield at most one row
    async fn select_one(&self, statement: &str, parameter: &Value) -> anyhow::Result<Option<Value>>;

    /// Run a statement yielding a list of rows
    async fn select_list(
        &self,
        statement: &str,
        parameter: &Value,
        bounds: RowBounds,
    ) -> anyhow::Result<Vec<Value>>;

    /// Run a statement and key each row by its `map_key` property
    async fn select_map(
        &self,
        statement: &str,
        parameter: &Value,
        map_key: &str,
        bounds: RowBounds,
    ) -> anyhow::Result<BTreeMap<String, Value>>;

    /// Returns the number of affected rows
    async fn insert(&self, statement: &str, parameter: &Value) -> anyhow::Result<u64>;

    /// Returns the number of affected rows
    async fn update(&self, statement: &str, parameter: &Value) -> anyhow::Result<u64>;

    /// Returns the number of affected rows
    async fn delete(&self, statement: &str, parameter: &Value) -> anyhow::Result<u64>;

    /// Drop any locally cached results
    fn clear_cache(&self);
}

/// Opens executors for one physical shard
///
/// A topology maps each factory to the shard ids it serves.
#[async_trait]
pub trait ExecutorFactory: Send + Sync {
    /// Statements and capabilities known to executors from this factory
    fn catalog(&self) -> &dyn StatementCatalog;

    /// Establish an executor. Called at most once per shard.
    async fn open(&self) -> anyhow::Result<Arc<dyn Executor>>;

    /// Name for logging
    fn name(&self) -> &str {
        "executor-factory"
    }
}
