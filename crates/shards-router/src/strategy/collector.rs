//! Results collectors
//!
//! Collectors see partials in completion order, which under parallel access
//! is not list order. Each one produces the same merge either way.

use std::collections::BTreeMap;

use serde_json::Value;
use shards_core::ShardId;

use super::ResultsCollector;
use crate::error::{Result, ShardsError};
use crate::shard::Shard;
use crate::types::ShardResult;

/// Keeps the single non-null row; a second distinct row is an error
#[derive(Debug)]
pub struct SelectOneCollector {
    statement: String,
    found: Option<(ShardId, Value)>,
}

impl SelectOneCollector {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            found: None,
        }
    }
}

impl ResultsCollector for SelectOneCollector {
    fn accumulate(&mut self, _position: usize, shard: &Shard, partial: ShardResult) -> Result<()> {
        let row = match partial {
            ShardResult::One(Some(Value::Null)) | ShardResult::One(None) => return Ok(()),
            ShardResult::One(Some(row)) => row,
            other => return Err(ShardsError::unexpected(&self.statement, "one", &other)),
        };

        if let Some((first, existing)) = &self.found {
            if *existing == row {
                return Ok(());
            }
            return Err(ShardsError::AmbiguousResult {
                statement: self.statement.clone(),
                first: *first,
                second: shard.primary_shard_id(),
            });
        }

        self.found = Some((shard.primary_shard_id(), row));
        Ok(())
    }

    fn collect(&mut self) -> Result<ShardResult> {
        Ok(ShardResult::One(self.found.as_ref().map(|(_, row)| row.clone())))
    }
}

/// Concatenates per-shard lists in candidate order
#[derive(Debug)]
pub struct ListCollector {
    statement: String,
    slices: Vec<(usize, Vec<Value>)>,
}

impl ListCollector {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            slices: Vec::new(),
        }
    }
}

impl ResultsCollector for ListCollector {
    fn accumulate(&mut self, position: usize, _shard: &Shard, partial: ShardResult) -> Result<()> {
        match partial {
            ShardResult::List(rows) => {
                self.slices.push((position, rows));
                Ok(())
            }
            other => Err(ShardsError::unexpected(&self.statement, "list", &other)),
        }
    }

    fn collect(&mut self) -> Result<ShardResult> {
        self.slices.sort_by_key(|(position, _)| *position);
        let rows = self
            .slices
            .iter()
            .flat_map(|(_, rows)| rows.iter().cloned())
            .collect();
        Ok(ShardResult::List(rows))
    }
}

/// Merges per-shard maps; a key seen on two shards is an error
#[derive(Debug)]
pub struct MapCollector {
    statement: String,
    entries: BTreeMap<String, (ShardId, Value)>,
}

impl MapCollector {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            entries: BTreeMap::new(),
        }
    }
}

impl ResultsCollector for MapCollector {
    fn accumulate(&mut self, _position: usize, shard: &Shard, partial: ShardResult) -> Result<()> {
        let rows = match partial {
            ShardResult::Map(rows) => rows,
            other => return Err(ShardsError::unexpected(&self.statement, "map", &other)),
        };

        let shard_id = shard.primary_shard_id();
        for (key, row) in rows {
            if let Some((first, _)) = self.entries.get(&key) {
                return Err(ShardsError::DuplicateKey {
                    statement: self.statement.clone(),
                    key,
                    first: *first,
                    second: shard_id,
                });
            }
            self.entries.insert(key, (shard_id, row));
        }
        Ok(())
    }

    fn collect(&mut self) -> Result<ShardResult> {
        let merged = self
            .entries
            .iter()
            .map(|(key, (_, row))| (key.clone(), row.clone()))
            .collect();
        Ok(ShardResult::Map(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::Topology;
    use crate::testing::MockFactory;
    use serde_json::json;
    use std::sync::Arc;

    fn shards() -> Vec<Arc<Shard>> {
        let (shards, _) = Topology::new()
            .with_shard(MockFactory::arc("a", &[]), [1u16])
            .with_shard(MockFactory::arc("b", &[]), [2u16])
            .build()
            .unwrap();
        shards
    }

    #[test]
    fn test_select_one_keeps_single_row() {
        let shards = shards();
        let mut collector = SelectOneCollector::new("User.getById");
        collector.accumulate(0, &shards[0], ShardResult::One(None)).unwrap();
        collector
            .accumulate(1, &shards[1], ShardResult::One(Some(json!({"id": 1}))))
            .unwrap();
        assert_eq!(
            collector.collect().unwrap(),
            ShardResult::One(Some(json!({"id": 1})))
        );
    }

    #[test]
    fn test_select_one_rejects_second_distinct_row() {
        let shards = shards();
        let mut collector = SelectOneCollector::new("User.getById");
        collector
            .accumulate(0, &shards[0], ShardResult::One(Some(json!({"id": 1, "v": "a"}))))
            .unwrap();
        let err = collector
            .accumulate(1, &shards[1], ShardResult::One(Some(json!({"id": 1, "v": "b"}))))
            .unwrap_err();
        match err {
            ShardsError::AmbiguousResult { first, second, .. } => {
                assert_eq!(first, ShardId::new(1));
                assert_eq!(second, ShardId::new(2));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_select_one_empty() {
        let mut collector = SelectOneCollector::new("User.getById");
        assert_eq!(collector.collect().unwrap(), ShardResult::One(None));
    }

    #[test]
    fn test_list_concatenates_in_candidate_order() {
        let shards = shards();
        let mut collector = ListCollector::new("User.findAll");
        // Completion order reversed
        collector
            .accumulate(1, &shards[1], ShardResult::List(vec![json!("b1"), json!("b2")]))
            .unwrap();
        collector
            .accumulate(0, &shards[0], ShardResult::List(vec![json!("a1")]))
            .unwrap();
        assert_eq!(
            collector.collect().unwrap(),
            ShardResult::List(vec![json!("a1"), json!("b1"), json!("b2")])
        );
    }

    #[test]
    fn test_map_merges_and_rejects_collisions() {
        let shards = shards();
        let mut collector = MapCollector::new("User.byName");
        collector
            .accumulate(0, &shards[0], ShardResult::Map(BTreeMap::from([("alice".to_string(), json!(1))])))
            .unwrap();
        collector
            .accumulate(1, &shards[1], ShardResult::Map(BTreeMap::from([("bob".to_string(), json!(2))])))
            .unwrap();
        assert_eq!(
            collector.collect().unwrap(),
            ShardResult::Map(BTreeMap::from([
                ("alice".to_string(), json!(1)),
                ("bob".to_string(), json!(2)),
            ]))
        );

        let err = collector
            .accumulate(1, &shards[1], ShardResult::Map(BTreeMap::from([("alice".to_string(), json!(3))])))
            .unwrap_err();
        assert!(matches!(err, ShardsError::DuplicateKey { ref key, .. } if key == "alice"));
    }

    #[test]
    fn test_wrong_shape_is_reported() {
        let shards = shards();
        let mut collector = ListCollector::new("User.findAll");
        let err = collector.accumulate(0, &shards[0], ShardResult::One(None)).unwrap_err();
        assert!(matches!(err, ShardsError::UnexpectedResult { expected: "list", actual: "one", .. }));
    }
}
