//! Per-shard operations run by the access strategies

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use shards_core::RowBounds;
use tracing::trace;

use crate::error::Result;
use crate::parameter::ParameterResolver;
use crate::shard::Shard;
use crate::types::ShardResult;

/// One unit of work executed against a single shard
#[async_trait]
pub trait ShardOperation: Send + Sync {
    async fn execute(&self, shard: &Shard) -> Result<ShardResult>;

    /// Operation name for logging
    fn operation_name(&self) -> &str;
}

/// Shape of a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadKind {
    One,
    List(RowBounds),
    Map { map_key: String, bounds: RowBounds },
}

/// A read statement dispatched to each candidate shard
///
/// The parameter is resolved for the shard's primary shard id.
pub struct ReadOperation {
    kind: ReadKind,
    statement: String,
    parameter: Value,
    resolver: Arc<dyn ParameterResolver>,
}

impl ReadOperation {
    pub fn new(
        kind: ReadKind,
        statement: impl Into<String>,
        parameter: Value,
        resolver: Arc<dyn ParameterResolver>,
    ) -> Self {
        Self {
            kind,
            statement: statement.into(),
            parameter,
            resolver,
        }
    }
}

#[async_trait]
impl ShardOperation for ReadOperation {
    async fn execute(&self, shard: &Shard) -> Result<ShardResult> {
        let executor = shard.establish().await?;
        let shard_id = shard.primary_shard_id();
        let parameter = self.resolver.resolve(&self.parameter, shard_id);

        trace!(
            statement = %self.statement,
            shard = %shard_id,
            operation = self.operation_name(),
            "Dispatching read"
        );

        let partial = match &self.kind {
            ReadKind::One => ShardResult::One(executor.select_one(&self.statement, &parameter).await?),
            ReadKind::List(bounds) => {
                ShardResult::List(executor.select_list(&self.statement, &parameter, *bounds).await?)
            }
            ReadKind::Map { map_key, bounds } => ShardResult::Map(
                executor
                    .select_map(&self.statement, &parameter, map_key, *bounds)
                    .await?,
            ),
        };
        Ok(partial)
    }

    fn operation_name(&self) -> &str {
        match self.kind {
            ReadKind::One => "select_one",
            ReadKind::List(_) => "select_list",
            ReadKind::Map { .. } => "select_map",
        }
    }
}
