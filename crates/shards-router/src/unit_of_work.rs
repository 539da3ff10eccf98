//! Unit of work context
//!
//! Carries the subgraph shard pin explicitly instead of keeping it in
//! ambient per-thread state. The caller owns the value, so two concurrent
//! units of work can never observe each other's pin.

use shards_core::ShardId;
use tracing::trace;

/// One logical unit of work spanning several session calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitOfWork {
    subgraph_shard_id: Option<ShardId>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a unit of work already pinned to `shard_id`
    pub fn pinned_to(shard_id: ShardId) -> Self {
        Self {
            subgraph_shard_id: Some(shard_id),
        }
    }

    /// Shard chosen by the first insert of this unit of work, if any
    pub fn current_subgraph_shard_id(&self) -> Option<ShardId> {
        self.subgraph_shard_id
    }

    pub fn pin_subgraph_shard_id(&mut self, shard_id: ShardId) {
        trace!(shard = %shard_id, "Pinning subgraph shard");
        self.subgraph_shard_id = Some(shard_id);
    }

    /// End of the unit of work; the session never clears the pin itself
    pub fn clear(&mut self) {
        self.subgraph_shard_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_and_clear() {
        let mut uow = UnitOfWork::new();
        assert_eq!(uow.current_subgraph_shard_id(), None);

        uow.pin_subgraph_shard_id(ShardId::new(4));
        assert_eq!(uow.current_subgraph_shard_id(), Some(ShardId::new(4)));

        uow.clear();
        assert_eq!(uow.current_subgraph_shard_id(), None);
    }

    #[test]
    fn test_units_are_independent() {
        let a = UnitOfWork::pinned_to(ShardId::new(1));
        let b = UnitOfWork::new();
        assert_ne!(a.current_subgraph_shard_id(), b.current_subgraph_shard_id());
    }
}
