//! Shards Core - Shared library for the sharded session layer
//!
//! This crate provides the value types and collaborator interfaces used
//! by the router and by anything that plugs a statement executor into it.

pub mod catalog;
pub mod config;
pub mod executor;
pub mod identifier;
pub mod types;

pub use catalog::{Catalog, StatementCatalog};
pub use config::{AccessMode, IdGeneratorKind, ResolutionPolicy, RouterConfig, SelectionPolicy};
pub use executor::{Executor, ExecutorFactory};
pub use identifier::{HasIdentifier, Identifier, IdentifierError, PRIMARY_KEY_FIELD};
pub use types::{RowBounds, ShardId};
