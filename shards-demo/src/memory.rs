//! In-memory statement executor
//!
//! Statements are named `<Table>.<verb>`. Supported verbs:
//!
//! | verb         | call         | effect                                  |
//! |--------------|--------------|-----------------------------------------|
//! | `insert`     | insert       | store the object under its `id`         |
//! | `getById`    | select_one   | row by primary key                      |
//! | `count`      | select_one   | `{"count": n}`                          |
//! | `findAll`    | select_list  | every row, in key order                 |
//! | `findAll`    | select_map   | every row keyed by `map_key`            |
//! | `update`     | update       | merge fields into the row with `id`     |
//! | `updateAll`  | update       | merge fields into every row             |
//! | `deleteById` | delete       | remove the row with `id`                |
//! | `deleteAll`  | delete       | clear the table                         |

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use shards_core::{
    Catalog, Executor, ExecutorFactory, Identifier, RowBounds, StatementCatalog, PRIMARY_KEY_FIELD,
};
use thiserror::Error;
use tracing::{debug, trace};

/// Verbs registered for every table
pub const VERBS: &[&str] = &[
    "insert",
    "getById",
    "count",
    "findAll",
    "update",
    "updateAll",
    "deleteById",
    "deleteAll",
];

/// In-memory executor errors
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Unknown statement: {0}")]
    UnknownStatement(String),

    #[error("Statement '{statement}' needs an object parameter")]
    NotAnObject { statement: String },

    #[error("Statement '{statement}' needs a primary key")]
    MissingKey { statement: String },

    #[error("Row '{key}' already exists in table {table}")]
    DuplicateRow { table: String, key: String },

    #[error("Row in table {table} has no '{field}' to key a map by")]
    MissingMapKey { table: String, field: String },
}

type Table = BTreeMap<String, Value>;

/// One shard's worth of tables
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    name: String,
    tables: RwLock<HashMap<String, Table>>,
    cache_clears: AtomicUsize,
}

impl MemoryExecutor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows currently held in `table`
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, BTreeMap::len)
    }

    pub fn cache_clears(&self) -> usize {
        self.cache_clears.load(Ordering::SeqCst)
    }

    fn split(statement: &str) -> Result<(&str, &str), MemoryError> {
        statement
            .rsplit_once('.')
            .ok_or_else(|| MemoryError::UnknownStatement(statement.to_string()))
    }

    fn unknown(statement: &str) -> anyhow::Error {
        MemoryError::UnknownStatement(statement.to_string()).into()
    }

    /// Primary key of a parameter: its `id`, an annotated `value`, or the scalar itself
    fn row_key(parameter: &Value) -> Option<String> {
        let raw = match parameter {
            Value::Object(map) => map.get(PRIMARY_KEY_FIELD).or_else(|| map.get("value"))?,
            other => other,
        };
        Identifier::from_value(raw).map(|id| id.to_string())
    }

    fn require_key(statement: &str, parameter: &Value) -> Result<String, MemoryError> {
        Self::row_key(parameter).ok_or_else(|| MemoryError::MissingKey {
            statement: statement.to_string(),
        })
    }

    fn require_object<'a>(statement: &str, parameter: &'a Value) -> Result<&'a Map<String, Value>, MemoryError> {
        parameter.as_object().ok_or_else(|| MemoryError::NotAnObject {
            statement: statement.to_string(),
        })
    }

    fn merge(row: &mut Value, changes: &Map<String, Value>) {
        if let Value::Object(fields) = row {
            for (field, value) in changes {
                if field != PRIMARY_KEY_FIELD {
                    fields.insert(field.clone(), value.clone());
                }
            }
        }
    }

    fn bounded(rows: impl Iterator<Item = Value>, bounds: RowBounds) -> Vec<Value> {
        rows.skip(bounds.offset).take(bounds.limit).collect()
    }
}

#[async_trait]
impl Executor for MemoryExecutor {
    async fn select_one(&self, statement: &str, parameter: &Value) -> anyhow::Result<Option<Value>> {
        let (table, verb) = Self::split(statement)?;
        let tables = self.tables.read();
        match verb {
            "getById" => {
                let key = Self::require_key(statement, parameter)?;
                Ok(tables.get(table).and_then(|rows| rows.get(&key)).cloned())
            }
            "count" => {
                let count = tables.get(table).map_or(0, BTreeMap::len);
                Ok(Some(serde_json::json!({ "count": count })))
            }
            _ => Err(Self::unknown(statement)),
        }
    }

    async fn select_list(&self, statement: &str, _parameter: &Value, bounds: RowBounds) -> anyhow::Result<Vec<Value>> {
        let (table, verb) = Self::split(statement)?;
        if verb != "findAll" {
            return Err(Self::unknown(statement));
        }
        let tables = self.tables.read();
        let rows = tables
            .get(table)
            .map(|rows| Self::bounded(rows.values().cloned(), bounds))
            .unwrap_or_default();
        trace!(shard = %self.name, table, rows = rows.len(), "findAll");
        Ok(rows)
    }

    async fn select_map(
        &self,
        statement: &str,
        parameter: &Value,
        map_key: &str,
        bounds: RowBounds,
    ) -> anyhow::Result<BTreeMap<String, Value>> {
        let (table, _) = Self::split(statement)?;
        let mut keyed = BTreeMap::new();
        for row in self.select_list(statement, parameter, bounds).await? {
            let key = match row.get(map_key) {
                Some(Value::String(s)) => s.clone(),
                Some(other) if !other.is_null() => other.to_string(),
                _ => {
                    return Err(MemoryError::MissingMapKey {
                        table: table.to_string(),
                        field: map_key.to_string(),
                    }
                    .into())
                }
            };
            keyed.insert(key, row);
        }
        Ok(keyed)
    }

    async fn insert(&self, statement: &str, parameter: &Value) -> anyhow::Result<u64> {
        let (table, verb) = Self::split(statement)?;
        if verb != "insert" {
            return Err(Self::unknown(statement));
        }
        Self::require_object(statement, parameter)?;
        let key = Self::require_key(statement, parameter)?;

        let mut tables = self.tables.write();
        let rows = tables.entry(table.to_string()).or_default();
        if rows.contains_key(&key) {
            return Err(MemoryError::DuplicateRow {
                table: table.to_string(),
                key,
            }
            .into());
        }
        debug!(shard = %self.name, table, key = %key, "Row inserted");
        rows.insert(key, parameter.clone());
        Ok(1)
    }

    async fn update(&self, statement: &str, parameter: &Value) -> anyhow::Result<u64> {
        let (table, verb) = Self::split(statement)?;
        let changes = Self::require_object(statement, parameter)?;

        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let updated = match verb {
            "update" => {
                let key = Self::require_key(statement, parameter)?;
                match rows.get_mut(&key) {
                    Some(row) => {
                        Self::merge(row, changes);
                        1
                    }
                    None => 0,
                }
            }
            "updateAll" => {
                for row in rows.values_mut() {
                    Self::merge(row, changes);
                }
                rows.len() as u64
            }
            _ => return Err(Self::unknown(statement)),
        };
        debug!(shard = %self.name, table, updated, "Rows updated");
        Ok(updated)
    }

    async fn delete(&self, statement: &str, parameter: &Value) -> anyhow::Result<u64> {
        let (table, verb) = Self::split(statement)?;

        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let deleted = match verb {
            "deleteById" => {
                let key = Self::require_key(statement, parameter)?;
                u64::from(rows.remove(&key).is_some())
            }
            "deleteAll" => {
                let count = rows.len() as u64;
                rows.clear();
                count
            }
            _ => return Err(Self::unknown(statement)),
        };
        debug!(shard = %self.name, table, deleted, "Rows deleted");
        Ok(deleted)
    }

    fn clear_cache(&self) {
        self.cache_clears.fetch_add(1, Ordering::SeqCst);
        trace!(shard = %self.name, "Cache cleared");
    }
}

/// Row counts read through a shard's executor
///
/// Registered as a catalog capability.
pub struct TableStats {
    executor: Arc<dyn Executor>,
}

impl TableStats {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    pub async fn count(&self, table: &str) -> anyhow::Result<u64> {
        let statement = format!("{}.count", table);
        let row = self.executor.select_one(&statement, &Value::Null).await?;
        Ok(row
            .and_then(|row| row.get("count").and_then(Value::as_u64))
            .unwrap_or(0))
    }
}

/// Factory for one in-memory shard
///
/// Every open hands out the same executor, so the data outlives sessions.
pub struct MemoryFactory {
    catalog: Catalog,
    executor: Arc<MemoryExecutor>,
}

impl MemoryFactory {
    /// Shard holding `tables`, each with the full verb set
    pub fn new(name: &str, tables: &[&str]) -> Self {
        let statements = tables
            .iter()
            .flat_map(|table| VERBS.iter().map(move |verb| format!("{}.{}", table, verb)));
        Self {
            catalog: Catalog::new().with_statements(statements),
            executor: Arc::new(MemoryExecutor::new(name)),
        }
    }

    /// Also register the `TableStats` capability
    pub fn with_table_stats(mut self) -> Self {
        self.catalog = self.catalog.with_capability(TableStats::new);
        self
    }

    pub fn executor(&self) -> Arc<MemoryExecutor> {
        self.executor.clone()
    }
}

#[async_trait]
impl ExecutorFactory for MemoryFactory {
    fn catalog(&self) -> &dyn StatementCatalog {
        &self.catalog
    }

    async fn open(&self) -> anyhow::Result<Arc<dyn Executor>> {
        debug!(shard = %self.executor.name(), "Opening in-memory executor");
        let executor: Arc<dyn Executor> = self.executor.clone();
        Ok(executor)
    }

    fn name(&self) -> &str {
        self.executor.name()
    }
}
