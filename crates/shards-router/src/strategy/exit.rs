//! Exit strategies

use super::ExitStrategy;
use crate::types::ShardResult;

/// Stop as soon as any shard yields a non-null, non-empty result
///
/// For identifier-targeted lookups where one shard at most holds the row.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstNonNullExit;

impl ExitStrategy for FirstNonNullExit {
    fn might_exit(&mut self, partial: &ShardResult) -> bool {
        !partial.is_empty()
    }
}

/// Never stop early; every candidate shard is visited
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustiveExit;

impl ExitStrategy for ExhaustiveExit {
    fn might_exit(&mut self, _partial: &ShardResult) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_non_null() {
        let mut exit = FirstNonNullExit;
        assert!(!exit.might_exit(&ShardResult::One(None)));
        assert!(!exit.might_exit(&ShardResult::List(vec![])));
        assert!(exit.might_exit(&ShardResult::One(Some(json!({"id": 1})))));
        assert!(exit.might_exit(&ShardResult::List(vec![json!(1)])));
    }

    #[test]
    fn test_exhaustive() {
        let mut exit = ExhaustiveExit;
        assert!(!exit.might_exit(&ShardResult::One(Some(json!(1)))));
    }
}
