//! Common types shared by the router and executor implementations

use serde::{Deserialize, Serialize};

/// Logical partition identifier (numeric for efficient routing)
///
/// Several shard ids may be served by one physical shard (virtual sharding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(u16);

impl ShardId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

impl From<u16> for ShardId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ShardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shard-{}", self.0)
    }
}

impl std::str::FromStr for ShardId {
    type Err = std::num::ParseIntError;

    /// Accepts both `3` and `shard-3`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_prefix("shard-").unwrap_or(s);
        digits.parse().map(Self)
    }
}

/// Offset/limit window passed through to every shard's executor
///
/// Bounds apply per shard, not to the merged result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowBounds {
    pub offset: usize,
    pub limit: usize,
}

impl RowBounds {
    pub const NO_ROW_OFFSET: usize = 0;
    pub const NO_ROW_LIMIT: usize = usize::MAX;

    pub const DEFAULT: RowBounds = RowBounds {
        offset: Self::NO_ROW_OFFSET,
        limit: Self::NO_ROW_LIMIT,
    };

    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }
}

impl Default for RowBounds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_id_parse() {
        assert_eq!("3".parse::<ShardId>().unwrap(), ShardId::new(3));
        assert_eq!("shard-7".parse::<ShardId>().unwrap(), ShardId::new(7));
        assert_eq!(" 12 ".parse::<ShardId>().unwrap(), ShardId::new(12));
        assert!("shard-x".parse::<ShardId>().is_err());
    }

    #[test]
    fn test_shard_id_display_round_trips() {
        let id = ShardId::new(42);
        assert_eq!(id.to_string(), "shard-42");
        assert_eq!(id.to_string().parse::<ShardId>().unwrap(), id);
    }

    #[test]
    fn test_default_row_bounds() {
        assert!(RowBounds::default().is_default());
        assert!(!RowBounds::new(10, 5).is_default());
    }
}
