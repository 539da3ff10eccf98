//! Scripted walk through the sharded session
//!
//! Each user is written together with one order in a single unit of work,
//! so both land on the same shard. The rest of the script reads, updates
//! and deletes through the session and reports what it observed.

use serde::{Deserialize, Serialize};
use shards_core::{
    HasIdentifier, IdGeneratorKind, Identifier, IdentifierError, RouterConfig, RowBounds, ShardId,
};
use shards_router::{ShardedSession, ShardsError, Topology, UnitOfWork};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::memory::{MemoryExecutor, MemoryFactory, TableStats};

/// Demo failures
#[derive(Debug, Error)]
pub enum DemoError {
    #[error(transparent)]
    Session(#[from] ShardsError),

    #[error("User {0} was inserted but cannot be read back")]
    Missing(String),

    #[error("Table statistics failed: {0}")]
    Stats(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Identifier>,
    pub name: String,
    #[serde(default)]
    pub active: bool,
}

impl User {
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            active: false,
        }
    }
}

impl HasIdentifier for User {
    fn identifier(&self) -> Option<Identifier> {
        self.id.clone()
    }

    fn assign_identifier(&mut self, id: Identifier) -> Result<(), IdentifierError> {
        self.id = Some(id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Identifier>,
    pub user_id: Option<Identifier>,
    pub total: u64,
}

impl HasIdentifier for Order {
    fn identifier(&self) -> Option<Identifier> {
        self.id.clone()
    }

    fn assign_identifier(&mut self, id: Identifier) -> Result<(), IdentifierError> {
        self.id = Some(id);
        Ok(())
    }
}

/// Two physical shards, `east` and `west`
///
/// With `virtual_west` the west shard serves shard ids 1 and 2.
pub struct DemoCluster {
    pub topology: Topology,
    pub east: Arc<MemoryExecutor>,
    pub west: Arc<MemoryExecutor>,
}

impl DemoCluster {
    pub fn new(virtual_west: bool) -> Self {
        let east = MemoryFactory::new("east", &["User", "Order"]).with_table_stats();
        let west = MemoryFactory::new("west", &["User", "Order"]);
        let (east_exec, west_exec) = (east.executor(), west.executor());

        let west_ids: Vec<u16> = if virtual_west { vec![1, 2] } else { vec![1] };
        let topology = Topology::new()
            .with_shard(Arc::new(east), [0u16])
            .with_shard(Arc::new(west), west_ids);

        Self {
            topology,
            east: east_exec,
            west: west_exec,
        }
    }
}

/// What the scenario observed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemoReport {
    /// Shard each user's unit of work was pinned to
    pub placements: BTreeMap<String, ShardId>,
    pub users_listed: usize,
    pub first_page: usize,
    pub users_by_name: usize,
    pub activated: u64,
    pub orders_deleted: u64,
    /// Users counted on the first shard exposing `TableStats`
    pub users_on_stats_shard: u64,
}

/// Run the scripted unit-of-work sequence against `session`
pub async fn run(session: &ShardedSession, config: &RouterConfig, names: &[&str]) -> Result<DemoReport, DemoError> {
    let mut report = DemoReport::default();
    let mut first_order: Option<Order> = None;

    for name in names {
        let mut uow = UnitOfWork::new();
        let mut user = User::new(name);
        if config.id_generator == IdGeneratorKind::None {
            user.id = Some(Identifier::Text(format!("user-{}", name)));
        }
        session.insert(&mut uow, "User.insert", &mut user).await?;

        let mut order = Order {
            id: None,
            user_id: user.id.clone(),
            total: 10 * name.len() as u64,
        };
        if config.id_generator == IdGeneratorKind::None {
            order.id = Some(Identifier::Text(format!("order-{}", name)));
        }
        session.insert(&mut uow, "Order.insert", &mut order).await?;

        if let Some(shard_id) = uow.current_subgraph_shard_id() {
            info!(user = %name, shard = %shard_id, "Unit of work placed");
            report.placements.insert(name.to_string(), shard_id);
        }
        uow.clear();

        let found: Option<User> = session.select_one("User.getById", &user).await?;
        if found.is_none() {
            return Err(DemoError::Missing(name.to_string()));
        }
        first_order.get_or_insert(order);
    }

    let users: Vec<User> = session.select_list("User.findAll", &()).await?;
    report.users_listed = users.len();

    let page: Vec<User> = session
        .select_list_bounded("User.findAll", &(), RowBounds::new(0, 1))
        .await?;
    report.first_page = page.len();

    let by_name: BTreeMap<String, User> = session.select_map("User.findAll", &(), "name").await?;
    report.users_by_name = by_name.len();

    let uow = UnitOfWork::new();
    report.activated = session
        .update(&uow, "User.updateAll", &serde_json::json!({"active": true}))
        .await?;

    if let Some(order) = &first_order {
        report.orders_deleted = session.delete(&uow, "Order.deleteById", order).await?;
    }

    let stats = session.capability::<TableStats>().await?;
    report.users_on_stats_shard = stats.count("User").await?;

    session.clear_cache();
    info!(
        users = report.users_listed,
        activated = report.activated,
        orders_deleted = report.orders_deleted,
        "Scenario complete"
    );
    Ok(report)
}
