//! Object identifiers and the capability to read/write them on parameters
//!
//! A parameter handed to the session may carry a primary key. The router
//! reads it to target the owning shard, and writes a freshly generated one
//! before an insert is dispatched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Field holding the primary key on object-shaped parameters
pub const PRIMARY_KEY_FIELD: &str = "id";

/// Identifier errors
#[derive(Debug, Error)]
pub enum IdentifierError {
    #[error("Parameter of type {0} cannot receive a generated identifier")]
    NotAssignable(&'static str),

    #[error("Identifier {0} does not carry a shard id")]
    NoEmbeddedShard(Identifier),
}

/// Caller-visible primary key value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Number(i64),
    Uuid(Uuid),
    Text(String),
}

impl Identifier {
    /// Interpret a scalar JSON value as an identifier
    ///
    /// Strings that parse as a UUID become `Identifier::Uuid`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Identifier::Number),
            Value::String(s) => Some(Self::from(s.as_str())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Identifier::Number(n) => Value::from(*n),
            Identifier::Uuid(u) => Value::String(u.to_string()),
            Identifier::Text(s) => Value::String(s.clone()),
        }
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identifier::Number(n) => write!(f, "{}", n),
            Identifier::Uuid(u) => write!(f, "{}", u),
            Identifier::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Identifier {
    fn from(n: i64) -> Self {
        Identifier::Number(n)
    }
}

impl From<Uuid> for Identifier {
    fn from(u: Uuid) -> Self {
        Identifier::Uuid(u)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        match Uuid::parse_str(s) {
            Ok(u) => Identifier::Uuid(u),
            Err(_) => Identifier::Text(s.to_string()),
        }
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Identifier::from(s.as_str())
    }
}

/// Primary key access on a parameter object
///
/// Domain objects implement this instead of relying on field discovery, so a
/// parameter that cannot hold a key fails loudly on insert.
pub trait HasIdentifier {
    /// The primary key, when the parameter carries one
    fn identifier(&self) -> Option<Identifier>;

    /// Store a generated primary key on the parameter
    fn assign_identifier(&mut self, id: Identifier) -> Result<(), IdentifierError>;
}

impl HasIdentifier for Value {
    fn identifier(&self) -> Option<Identifier> {
        match self {
            Value::Object(map) => map.get(PRIMARY_KEY_FIELD).and_then(Identifier::from_value),
            other => Identifier::from_value(other),
        }
    }

    fn assign_identifier(&mut self, id: Identifier) -> Result<(), IdentifierError> {
        match self {
            Value::Object(map) => {
                map.insert(PRIMARY_KEY_FIELD.to_string(), id.to_value());
                Ok(())
            }
            _ => Err(IdentifierError::NotAssignable("non-object JSON value")),
        }
    }
}

impl HasIdentifier for () {
    fn identifier(&self) -> Option<Identifier> {
        None
    }

    fn assign_identifier(&mut self, _id: Identifier) -> Result<(), IdentifierError> {
        Err(IdentifierError::NotAssignable("()"))
    }
}

impl<T: HasIdentifier> HasIdentifier for Option<T> {
    fn identifier(&self) -> Option<Identifier> {
        self.as_ref().and_then(HasIdentifier::identifier)
    }

    fn assign_identifier(&mut self, id: Identifier) -> Result<(), IdentifierError> {
        match self {
            Some(inner) => inner.assign_identifier(id),
            None => Err(IdentifierError::NotAssignable("None")),
        }
    }
}

// Scalars are the identifier themselves and cannot take a new one.
macro_rules! scalar_identifier {
    ($($ty:ty => |$v:ident| $conv:expr),* $(,)?) => {
        $(
            impl HasIdentifier for $ty {
                fn identifier(&self) -> Option<Identifier> {
                    let $v = self;
                    $conv
                }

                fn assign_identifier(&mut self, _id: Identifier) -> Result<(), IdentifierError> {
                    Err(IdentifierError::NotAssignable(stringify!($ty)))
                }
            }
        )*
    };
}

scalar_identifier! {
    i64 => |v| Some(Identifier::Number(*v)),
    i32 => |v| Some(Identifier::Number(i64::from(*v))),
    u64 => |v| i64::try_from(*v).ok().map(Identifier::Number),
    String => |v| Some(Identifier::from(v.as_str())),
    &str => |v| Some(Identifier::from(*v)),
    Uuid => |v| Some(Identifier::Uuid(*v)),
    Identifier => |v| Some(v.clone()),
}
