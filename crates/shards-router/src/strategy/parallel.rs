//! Concurrent scatter-gather
//!
//! All shard operations are in flight at once on the caller's task; nothing
//! is spawned. Partials are handled one at a time in completion order, so
//! the collector and exit check never run concurrently. Under a content
//! based exit the winner is whichever qualifying shard finishes first.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::debug;

use super::{ExitStrategy, ResultsCollector, ShardAccessStrategy};
use crate::error::Result;
use crate::operation::ShardOperation;
use crate::shard::Shard;
use crate::types::ShardResult;

/// Dispatches to every candidate shard at once
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelAccessStrategy;

#[async_trait]
impl ShardAccessStrategy for ParallelAccessStrategy {
    async fn apply(
        &self,
        shards: &[Arc<Shard>],
        operation: &dyn ShardOperation,
        exit: &mut dyn ExitStrategy,
        collector: &mut dyn ResultsCollector,
    ) -> Result<ShardResult> {
        let mut pending: FuturesUnordered<_> = shards
            .iter()
            .enumerate()
            .map(|(position, shard)| async move { (position, shard, operation.execute(shard).await) })
            .collect();

        let mut completed = 0usize;
        while let Some((position, shard, partial)) = pending.next().await {
            // Dropping `pending` on error or exit cancels the shards still running
            let partial = partial?;
            completed += 1;
            let stop = exit.might_exit(&partial);
            collector.accumulate(position, shard, partial)?;
            if stop {
                debug!(
                    operation = operation.operation_name(),
                    shard = %shard.primary_shard_id(),
                    cancelled = shards.len() - completed,
                    "Early exit"
                );
                break;
            }
        }
        collector.collect()
    }

    fn name(&self) -> &'static str {
        "Parallel"
    }
}
