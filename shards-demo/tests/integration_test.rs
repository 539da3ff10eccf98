//! Integration tests for routing over in-memory shards

use std::sync::Arc;

use serde_json::{json, Value};
use shards_core::{
    AccessMode, HasIdentifier, IdGeneratorKind, ResolutionPolicy, RouterConfig, SelectionPolicy,
    ShardId,
};
use shards_demo::{DemoCluster, User};
use shards_router::{
    ConsistentHashStrategy, IdentifierGenerator, RoundRobinSelection, SequentialAccessStrategy,
    ShardResolutionData, ShardResolutionStrategy, ShardStrategy, ShardedSession,
    ShardedUuidGenerator, ShardsError, UnitOfWork,
};

/// Resolution that never narrows to anything
struct Nowhere;

impl ShardResolutionStrategy for Nowhere {
    fn select_shard_ids(&self, _data: &ShardResolutionData<'_>) -> Vec<ShardId> {
        Vec::new()
    }

    fn name(&self) -> &'static str {
        "Nowhere"
    }
}

#[tokio::test]
async fn test_sharded_uuid_lookup_routes_to_origin_only() {
    let cluster = DemoCluster::new(false);
    let config = RouterConfig::default();
    let session = ShardedSession::from_config(&cluster.topology, &config).unwrap();

    let mut uow = UnitOfWork::new();
    let mut user = User::new("alice");
    session.insert(&mut uow, "User.insert", &mut user).await.unwrap();

    let id = user.identifier().unwrap();
    let origin = ShardedUuidGenerator::new().extract_shard_id(&id).unwrap();
    assert_eq!(uow.current_subgraph_shard_id(), Some(origin));

    let (owner, other) = if origin == ShardId::new(0) {
        (&cluster.east, &cluster.west)
    } else {
        (&cluster.west, &cluster.east)
    };
    assert_eq!(owner.row_count("User"), 1);
    assert_eq!(other.row_count("User"), 0);

    // A fresh session has established nothing yet
    let reader = ShardedSession::from_config(&cluster.topology, &config).unwrap();
    let found: Option<User> = reader.select_one("User.getById", &id).await.unwrap();
    assert_eq!(found, Some(user));

    let established: Vec<ShardId> = reader
        .shards()
        .iter()
        .filter(|shard| shard.is_established())
        .map(|shard| shard.primary_shard_id())
        .collect();
    assert_eq!(established, vec![origin]);
}

#[tokio::test]
async fn test_update_sums_counts_across_shards() {
    use shards_core::Executor;

    let cluster = DemoCluster::new(false);
    for n in 0..3 {
        cluster.east.insert("User.insert", &json!({"id": format!("e{}", n), "name": "east"})).await.unwrap();
    }
    for n in 0..5 {
        cluster.west.insert("User.insert", &json!({"id": format!("w{}", n), "name": "west"})).await.unwrap();
    }

    let session = ShardedSession::from_config(&cluster.topology, &RouterConfig::default()).unwrap();
    let rows = session
        .update(&UnitOfWork::new(), "User.updateAll", &json!({"active": true}))
        .await
        .unwrap();
    assert_eq!(rows, 8);

    let active: Vec<User> = session.select_list("User.findAll", &()).await.unwrap();
    assert_eq!(active.len(), 8);
    assert!(active.iter().all(|user| user.active));
}

#[tokio::test]
async fn test_delete_with_no_target_fails_before_dispatch() {
    let cluster = DemoCluster::new(false);
    let ids = vec![ShardId::new(0), ShardId::new(1)];
    let strategy = ShardStrategy::new(
        Arc::new(RoundRobinSelection::new(ids)),
        Arc::new(Nowhere),
        Arc::new(SequentialAccessStrategy),
    );
    let generator: Arc<dyn IdentifierGenerator> = Arc::new(ShardedUuidGenerator::new());
    let session = ShardedSession::new(&cluster.topology, strategy, Some(generator)).unwrap();

    let result = session
        .delete(&UnitOfWork::new(), "Invoice.deleteById", &json!({"id": "inv-1"}))
        .await;
    assert!(matches!(result, Err(ShardsError::UnresolvedShard { .. })));
    assert!(session.shards().iter().all(|shard| !shard.is_established()));
}

#[test]
fn test_virtual_sharding_rejects_plain_ids() {
    let cluster = DemoCluster::new(true);
    let config = RouterConfig {
        id_generator: IdGeneratorKind::PlainUuid,
        ..RouterConfig::default()
    };
    let result = ShardedSession::from_config(&cluster.topology, &config);
    assert!(matches!(result, Err(ShardsError::Configuration(_))));

    let config = RouterConfig {
        id_generator: IdGeneratorKind::ShardedSequence,
        ..RouterConfig::default()
    };
    assert!(ShardedSession::from_config(&cluster.topology, &config).is_ok());
}

#[tokio::test]
async fn test_consistent_hash_places_by_partition_key() {
    let cluster = DemoCluster::new(false);
    let config = RouterConfig {
        selection: SelectionPolicy::ConsistentHash {
            key_field: "name".to_string(),
            virtual_nodes: 64,
        },
        resolution: ResolutionPolicy::ConsistentHash,
        ..RouterConfig::default()
    };
    let session = ShardedSession::from_config(&cluster.topology, &config).unwrap();
    let ring = ConsistentHashStrategy::with_virtual_nodes(
        "name",
        &[ShardId::new(0), ShardId::new(1)],
        64,
    );

    for name in ["alice", "bob", "carol", "dave", "erin"] {
        let mut uow = UnitOfWork::new();
        session.insert(&mut uow, "User.insert", &mut User::new(name)).await.unwrap();
        assert_eq!(uow.current_subgraph_shard_id(), ring.route_key(name));
    }

    let total = cluster.east.row_count("User") + cluster.west.row_count("User");
    assert_eq!(total, 5);

    // A parameter carrying the key narrows the write to its owning shard
    let alice_shard = ring.route_key("alice");
    let mut uow = UnitOfWork::new();
    let mut twin = User::new("alice");
    session.insert(&mut uow, "User.insert", &mut twin).await.unwrap();
    assert_eq!(uow.current_subgraph_shard_id(), alice_shard);

    let deleted = session
        .delete(&UnitOfWork::new(), "User.deleteAll", &json!({"name": "alice"}))
        .await
        .unwrap();
    let owner = if alice_shard == Some(ShardId::new(0)) { &cluster.east } else { &cluster.west };
    assert_eq!(owner.row_count("User"), 0);
    assert_eq!(deleted as usize + cluster.east.row_count("User") + cluster.west.row_count("User"), 6);

    let rows: Vec<Value> = session.select_list("User.findAll", &()).await.unwrap();
    assert_eq!(rows.len(), 6 - deleted as usize);
}

#[tokio::test]
async fn test_parallel_access_matches_sequential() {
    let mut reports = Vec::new();
    for access in [AccessMode::Sequential, AccessMode::Parallel] {
        let cluster = DemoCluster::new(false);
        let config = RouterConfig {
            access,
            ..RouterConfig::default()
        };
        let session = ShardedSession::from_config(&cluster.topology, &config).unwrap();
        reports.push(shards_demo::run(&session, &config, &["alice", "bob", "carol"]).await.unwrap());
    }
    assert_eq!(reports[0], reports[1]);
}
