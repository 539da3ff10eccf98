//! Sequential scatter-gather

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{ExitStrategy, ResultsCollector, ShardAccessStrategy};
use crate::error::Result;
use crate::operation::ShardOperation;
use crate::shard::Shard;
use crate::types::ShardResult;

/// Visits shards one at a time in list order
///
/// The early-exit winner is always the first qualifying shard in the list.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialAccessStrategy;

#[async_trait]
impl ShardAccessStrategy for SequentialAccessStrategy {
    async fn apply(
        &self,
        shards: &[Arc<Shard>],
        operation: &dyn ShardOperation,
        exit: &mut dyn ExitStrategy,
        collector: &mut dyn ResultsCollector,
    ) -> Result<ShardResult> {
        for (position, shard) in shards.iter().enumerate() {
            let partial = operation.execute(shard).await?;
            let stop = exit.might_exit(&partial);
            collector.accumulate(position, shard, partial)?;
            if stop {
                debug!(
                    operation = operation.operation_name(),
                    shard = %shard.primary_shard_id(),
                    skipped = shards.len() - position - 1,
                    "Early exit"
                );
                break;
            }
        }
        collector.collect()
    }

    fn name(&self) -> &'static str {
        "Sequential"
    }
}
