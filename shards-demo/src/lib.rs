//! Shards Demo - In-memory shards behind a sharded session
//!
//! Wires two in-memory executors into a topology and drives a scripted
//! unit-of-work sequence through `ShardedSession`.

pub mod memory;
pub mod scenario;

pub use memory::{MemoryError, MemoryExecutor, MemoryFactory, TableStats};
pub use scenario::{run, DemoCluster, DemoError, DemoReport, Order, User};

/// Users written by the binary
pub const DEMO_USERS: &[&str] = &["alice", "bob", "carol", "dave"];
