use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an order, booking, or ledger entry.
///
/// Wraps a UUID to provide type safety and prevent mixing up
/// entity IDs with other UUID-based identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new random entity ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entity ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Derives a stable ID from a name.
    ///
    /// The same name always yields the same ID, so two writers inserting a
    /// record keyed by that name collide on the store's primary key.
    pub fn derived(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses an entity ID from its hyphenated string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<EntityId> for Uuid {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Maximum accepted length of a correlation reference.
pub const MAX_CORRELATION_REF_LEN: usize = 100;

/// Caller-generated payment correlation reference.
///
/// Generated before the payment gateway is contacted so the payment session
/// can be persisted and indexed first. The same value is handed to the gateway
/// as its transaction reference and is the key for every later lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationRef(String);

impl CorrelationRef {
    /// Generates a fresh reference of the form `{prefix}-{32 hex chars}`.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", Uuid::new_v4().simple()))
    }

    /// Validates and wraps an externally supplied reference.
    ///
    /// Accepts ASCII alphanumerics, `-` and `_`, up to
    /// [`MAX_CORRELATION_REF_LEN`] characters.
    pub fn parse(s: &str) -> Result<Self, InvalidCorrelationRef> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(InvalidCorrelationRef {
                message: "reference is empty".to_string(),
            });
        }
        if trimmed.len() > MAX_CORRELATION_REF_LEN {
            return Err(InvalidCorrelationRef {
                message: format!(
                    "reference is {} characters, max {MAX_CORRELATION_REF_LEN}",
                    trimmed.len()
                ),
            });
        }
        if let Some(c) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(InvalidCorrelationRef {
                message: format!("reference contains invalid character {c:?}"),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for CorrelationRef {
    type Err = InvalidCorrelationRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Error returned when a correlation reference fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCorrelationRef {
    pub message: String,
}

impl std::fmt::Display for InvalidCorrelationRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid correlation reference: {}", self.message)
    }
}

impl std::error::Error for InvalidCorrelationRef {}
