//! Scripted executors and factories for router tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use shards_core::{Catalog, Executor, ExecutorFactory, RowBounds, StatementCatalog};

/// One recorded executor call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: &'static str,
    pub statement: String,
    pub parameter: Value,
}

/// Executor returning canned results and recording every call
#[derive(Debug, Default)]
pub struct MockExecutor {
    one: Option<Value>,
    list: Vec<Value>,
    map: BTreeMap<String, Value>,
    rows: u64,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
    pub cache_clears: AtomicUsize,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning_one(mut self, row: Value) -> Self {
        self.one = Some(row);
        self
    }

    pub fn returning_list(mut self, rows: Vec<Value>) -> Self {
        self.list = rows;
        self
    }

    pub fn returning_map(mut self, rows: BTreeMap<String, Value>) -> Self {
        self.map = rows;
        self
    }

    pub fn affecting(mut self, rows: u64) -> Self {
        self.rows = rows;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn with_delay(mut self, millis: u64) -> Self {
        self.delay = Some(Duration::from_millis(millis));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    async fn respond(&self, method: &'static str, statement: &str, parameter: &Value) -> anyhow::Result<()> {
        self.calls.lock().push(Call {
            method,
            statement: statement.to_string(),
            parameter: parameter.clone(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(message) => Err(anyhow::anyhow!("{}", message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn select_one(&self, statement: &str, parameter: &Value) -> anyhow::Result<Option<Value>> {
        self.respond("select_one", statement, parameter).await?;
        Ok(self.one.clone())
    }

    async fn select_list(&self, statement: &str, parameter: &Value, _bounds: RowBounds) -> anyhow::Result<Vec<Value>> {
        self.respond("select_list", statement, parameter).await?;
        Ok(self.list.clone())
    }

    async fn select_map(
        &self,
        statement: &str,
        parameter: &Value,
        _map_key: &str,
        _bounds: RowBounds,
    ) -> anyhow::Result<BTreeMap<String, Value>> {
        self.respond("select_map", statement, parameter).await?;
        Ok(self.map.clone())
    }

    async fn insert(&self, statement: &str, parameter: &Value) -> anyhow::Result<u64> {
        self.respond("insert", statement, parameter).await?;
        Ok(self.rows)
    }

    async fn update(&self, statement: &str, parameter: &Value) -> anyhow::Result<u64> {
        self.respond("update", statement, parameter).await?;
        Ok(self.rows)
    }

    async fn delete(&self, statement: &str, parameter: &Value) -> anyhow::Result<u64> {
        self.respond("delete", statement, parameter).await?;
        Ok(self.rows)
    }

    fn clear_cache(&self) {
        self.cache_clears.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory handing out one shared `MockExecutor`
pub struct MockFactory {
    name: String,
    catalog: Catalog,
    executor: Arc<MockExecutor>,
    pub opens: Arc<AtomicUsize>,
}

impl MockFactory {
    pub fn new(name: &str, statements: &[&str]) -> Self {
        Self::with_executor(name, statements, MockExecutor::new())
    }

    pub fn with_executor(name: &str, statements: &[&str], executor: MockExecutor) -> Self {
        Self {
            name: name.to_string(),
            catalog: Catalog::new().with_statements(statements.iter().copied()),
            executor: Arc::new(executor),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn arc(name: &str, statements: &[&str]) -> Arc<dyn ExecutorFactory> {
        Arc::new(Self::new(name, statements))
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn executor(&self) -> Arc<MockExecutor> {
        self.executor.clone()
    }
}

#[async_trait]
impl ExecutorFactory for MockFactory {
    fn catalog(&self) -> &dyn StatementCatalog {
        &self.catalog
    }

    async fn open(&self) -> anyhow::Result<Arc<dyn Executor>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let executor: Arc<dyn Executor> = self.executor.clone();
        Ok(executor)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
