use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Version number of a document, used for optimistic concurrency control.
///
/// A document that has never been written is at version 0. The first write
/// stores version 1 and each later write increments it by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of a document that does not exist yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version stored by the first write.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A JSON document stored in a named collection.
///
/// `version`, `created_at` and `updated_at` are owned by the store: values
/// supplied by a writer are replaced when the write is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Collection the document belongs to (e.g., "orders").
    pub collection: String,

    /// Identifier, unique within the collection.
    pub id: String,

    /// Version after the last applied write.
    pub version: Version,

    /// When the document was first inserted.
    pub created_at: DateTime<Utc>,

    /// When the document was last written.
    pub updated_at: DateTime<Utc>,

    /// The document body.
    pub body: serde_json::Value,
}

impl Document {
    /// Creates an unsaved document from a raw JSON body.
    pub fn new(
        collection: impl Into<String>,
        id: impl Into<String>,
        body: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            collection: collection.into(),
            id: id.into(),
            version: Version::initial(),
            created_at: now,
            updated_at: now,
            body,
        }
    }

    /// Creates an unsaved document by serializing a value.
    pub fn from_value<T: Serialize>(
        collection: impl Into<String>,
        id: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(collection, id, serde_json::to_value(value)?))
    }

    /// Deserializes the body into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }

    /// Returns the `(collection, id)` pair identifying this document.
    pub fn key(&self) -> (&str, &str) {
        (&self.collection, &self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering() {
        let v1 = Version::new(1);
        let v2 = Version::new(2);
        assert!(v1 < v2);
        assert_eq!(v1.next(), v2);
    }

    #[test]
    fn version_initial_and_first() {
        assert_eq!(Version::initial().as_i64(), 0);
        assert_eq!(Version::first().as_i64(), 1);
        assert_eq!(Version::initial().next(), Version::first());
    }

    #[test]
    fn new_document_is_unsaved() {
        let doc = Document::new("orders", "o-1", serde_json::json!({"status": "pending"}));
        assert_eq!(doc.version, Version::initial());
        assert_eq!(doc.key(), ("orders", "o-1"));
    }

    #[test]
    fn from_value_and_decode() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Sample {
            name: String,
            qty: u32,
        }

        let sample = Sample {
            name: "Widget".to_string(),
            qty: 3,
        };
        let doc = Document::from_value("products", "SKU-1", &sample).unwrap();
        assert_eq!(doc.body["qty"], 3);
        let decoded: Sample = doc.decode().unwrap();
        assert_eq!(decoded, sample);
    }
}
