//! UUID identifier generators

use serde_json::Value;
use shards_core::{Identifier, IdentifierError, ShardId};
use tracing::trace;
use uuid::Uuid;

use super::{pinned_shard, IdentifierGenerator};
use crate::error::{Result, ShardsError};
use crate::unit_of_work::UnitOfWork;

/// v4 UUIDs whose first two bytes hold the shard id (big endian)
///
/// The version and variant bits live in bytes 6 and 8 and are untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShardedUuidGenerator;

impl ShardedUuidGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(shard_id: ShardId) -> Uuid {
        let mut bytes = *Uuid::new_v4().as_bytes();
        bytes[..2].copy_from_slice(&shard_id.get().to_be_bytes());
        Uuid::from_bytes(bytes)
    }

    pub fn decode(uuid: &Uuid) -> ShardId {
        let bytes = uuid.as_bytes();
        ShardId::new(u16::from_be_bytes([bytes[0], bytes[1]]))
    }
}

impl IdentifierGenerator for ShardedUuidGenerator {
    fn generate(&self, uow: &UnitOfWork, _parameter: &Value) -> Result<Identifier> {
        let shard_id = pinned_shard(uow, self.name())?;
        let uuid = Self::encode(shard_id);
        trace!(shard = %shard_id, id = %uuid, "Generated sharded uuid");
        Ok(Identifier::Uuid(uuid))
    }

    fn extract_shard_id(&self, id: &Identifier) -> Result<ShardId> {
        match id {
            Identifier::Uuid(uuid) => Ok(Self::decode(uuid)),
            other => Err(IdentifierError::NoEmbeddedShard(other.clone()).into()),
        }
    }

    fn encodes_shard(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "ShardedUuid"
    }
}

/// Plain v4 UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainUuidGenerator;

impl PlainUuidGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl IdentifierGenerator for PlainUuidGenerator {
    fn generate(&self, _uow: &UnitOfWork, _parameter: &Value) -> Result<Identifier> {
        Ok(Identifier::Uuid(Uuid::new_v4()))
    }

    fn extract_shard_id(&self, _id: &Identifier) -> Result<ShardId> {
        Err(ShardsError::unsupported(
            "plain uuid identifiers do not encode a shard id",
        ))
    }

    fn encodes_shard(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "PlainUuid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_returns_generating_shard() {
        let generator = ShardedUuidGenerator::new();
        for raw in [0u16, 1, 2, 255, 4096, u16::MAX] {
            let uow = UnitOfWork::pinned_to(ShardId::new(raw));
            let id = generator.generate(&uow, &json!({})).unwrap();
            assert_eq!(generator.extract_shard_id(&id).unwrap(), ShardId::new(raw));
        }
    }

    #[test]
    fn test_sharded_uuid_keeps_version() {
        let uuid = ShardedUuidGenerator::encode(ShardId::new(0xABCD));
        assert_eq!(uuid.get_version_num(), 4);
        assert_eq!(&uuid.as_bytes()[..2], &[0xAB, 0xCD]);
    }

    #[test]
    fn test_sharded_uuid_is_unique() {
        let a = ShardedUuidGenerator::encode(ShardId::new(1));
        let b = ShardedUuidGenerator::encode(ShardId::new(1));
        assert_ne!(a, b);
    }

    #[test]
    fn test_generate_without_pin_fails() {
        let generator = ShardedUuidGenerator::new();
        let result = generator.generate(&UnitOfWork::new(), &json!({}));
        assert!(matches!(result, Err(ShardsError::Configuration(_))));
    }

    #[test]
    fn test_non_uuid_identifier_has_no_shard() {
        let generator = ShardedUuidGenerator::new();
        let result = generator.extract_shard_id(&Identifier::Number(12));
        assert!(matches!(
            result,
            Err(ShardsError::Identifier(IdentifierError::NoEmbeddedShard(_)))
        ));
    }

    #[test]
    fn test_plain_uuid_extraction_unsupported() {
        let generator = PlainUuidGenerator::new();
        let id = generator.generate(&UnitOfWork::new(), &json!({})).unwrap();
        assert!(matches!(id, Identifier::Uuid(_)));
        assert!(matches!(
            generator.extract_shard_id(&id),
            Err(ShardsError::UnsupportedOperation(_))
        ));
    }
}
