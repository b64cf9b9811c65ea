//! The stored document shape.
//!
//! A [`Record`] is what a collection keeps for every document: an identifier assigned
//! at creation, creation and last-modified timestamps in epoch milliseconds, and the
//! caller-defined payload as a BSON document. The three engine-owned values are also
//! visible as virtual fields ([`ID_FIELD`], [`CREATED_AT_FIELD`], [`UPDATED_AT_FIELD`])
//! so they can be filtered, sorted and indexed like any payload field.

use std::borrow::Cow;

use bson::{Bson, Document as BsonDocument};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Virtual field holding the document identifier.
pub const ID_FIELD: &str = "id";
/// Virtual field holding the creation timestamp.
pub const CREATED_AT_FIELD: &str = "created_at";
/// Virtual field holding the last-modified timestamp.
pub const UPDATED_AT_FIELD: &str = "updated_at";
/// Fields owned by the engine. Payloads and patches may not set them.
pub const RESERVED_FIELDS: [&str; 3] = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

/// A document as stored in a collection.
///
/// Callers always receive clones; the collection never hands out its live instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: String,
    created_at: i64,
    updated_at: i64,
    fields: BsonDocument,
}

impl Record {
    /// Creates a record from its parts.
    pub fn new(id: impl Into<String>, created_at: i64, updated_at: i64, fields: BsonDocument) -> Self {
        Self {
            id: id.into(),
            created_at,
            updated_at,
            fields,
        }
    }

    /// Builds a record from a bulk-loaded document that carries its own identifier.
    ///
    /// The document must have a non-empty string `id`. Timestamps are taken from the
    /// document when present as integers or BSON datetimes, otherwise `now` is used.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the identifier is missing or
    /// a timestamp has an unusable type.
    pub fn from_document(mut document: BsonDocument, now: i64) -> DocumentStoreResult<Self> {
        let id = match document.remove(ID_FIELD) {
            Some(Bson::String(id)) if !id.is_empty() => id,
            Some(other) => {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "document identifier must be a non-empty string, got {other}"
                )));
            }
            None => {
                return Err(DocumentStoreError::InvalidDocument(
                    "document is missing its identifier".to_string(),
                ));
            }
        };

        let created_at = take_timestamp(&mut document, CREATED_AT_FIELD, &id)?.unwrap_or(now);
        let updated_at = take_timestamp(&mut document, UPDATED_AT_FIELD, &id)?.unwrap_or(created_at);

        Ok(Self::new(id, created_at, updated_at, document))
    }

    /// Returns the document identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the creation timestamp in epoch milliseconds.
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Returns the last-modified timestamp in epoch milliseconds.
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    /// Returns the caller-defined payload.
    pub fn fields(&self) -> &BsonDocument {
        &self.fields
    }

    /// Looks up a field by name, including the virtual engine-owned fields.
    pub fn get(&self, field: &str) -> Option<Cow<'_, Bson>> {
        match field {
            ID_FIELD => Some(Cow::Owned(Bson::String(self.id.clone()))),
            CREATED_AT_FIELD => Some(Cow::Owned(Bson::Int64(self.created_at))),
            UPDATED_AT_FIELD => Some(Cow::Owned(Bson::Int64(self.updated_at))),
            _ => self.fields.get(field).map(Cow::Borrowed),
        }
    }

    /// Returns a copy with `patch` merged over the payload and a new modification time.
    ///
    /// The merge is shallow: each top-level key in the patch replaces the stored value.
    pub fn patched(&self, patch: &BsonDocument, updated_at: i64) -> Self {
        let mut fields = self.fields.clone();
        for (key, value) in patch.iter() {
            fields.insert(key.clone(), value.clone());
        }

        Self {
            id: self.id.clone(),
            created_at: self.created_at,
            updated_at: updated_at.max(self.updated_at),
            fields,
        }
    }

    /// Returns a copy whose payload is exactly `fields`, keeping identity and creation
    /// time.
    pub fn replaced(&self, fields: BsonDocument, updated_at: i64) -> Self {
        Self {
            id: self.id.clone(),
            created_at: self.created_at,
            updated_at: updated_at.max(self.updated_at),
            fields,
        }
    }

    /// Renders the full record, engine-owned fields included.
    pub fn to_document(&self) -> BsonDocument {
        let mut document = BsonDocument::new();
        document.insert(ID_FIELD, self.id.clone());
        document.insert(CREATED_AT_FIELD, self.created_at);
        document.insert(UPDATED_AT_FIELD, self.updated_at);
        for (key, value) in self.fields.iter() {
            document.insert(key.clone(), value.clone());
        }
        document
    }
}

/// Rejects payloads and patches that try to set engine-owned fields.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] naming the first reserved field found.
pub fn check_reserved(fields: &BsonDocument) -> DocumentStoreResult<()> {
    match RESERVED_FIELDS.iter().find(|field| fields.contains_key(**field)) {
        Some(field) => Err(DocumentStoreError::InvalidDocument(format!(
            "field {field} is managed by the collection and cannot be written"
        ))),
        None => Ok(()),
    }
}

/// Removes engine-owned fields from a serialized document.
pub fn strip_reserved(fields: &mut BsonDocument) {
    for field in RESERVED_FIELDS {
        fields.remove(field);
    }
}

fn take_timestamp(document: &mut BsonDocument, field: &str, id: &str) -> DocumentStoreResult<Option<i64>> {
    match document.remove(field) {
        None => Ok(None),
        Some(Bson::Int64(value)) => Ok(Some(value)),
        Some(Bson::Int32(value)) => Ok(Some(i64::from(value))),
        Some(Bson::DateTime(value)) => Ok(Some(value.timestamp_millis())),
        Some(other) => Err(DocumentStoreError::InvalidDocument(format!(
            "field {field} of document {id} must be an integer timestamp, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_virtual_fields() {
        let record = Record::new("a", 10, 20, doc! { "name": "Alice" });

        assert_eq!(record.get(ID_FIELD).as_deref(), Some(&Bson::String("a".to_string())));
        assert_eq!(record.get(CREATED_AT_FIELD).as_deref(), Some(&Bson::Int64(10)));
        assert_eq!(record.get(UPDATED_AT_FIELD).as_deref(), Some(&Bson::Int64(20)));
        assert_eq!(record.get("name").as_deref(), Some(&Bson::String("Alice".to_string())));
        assert!(record.get("missing").is_none());
    }

    #[test]
    fn test_patched_keeps_identity_and_unpatched_fields() {
        let record = Record::new("a", 10, 10, doc! { "name": "Alice", "age": 30 });
        let patched = record.patched(&doc! { "age": 31, "city": "Oslo" }, 15);

        assert_eq!(patched.id(), "a");
        assert_eq!(patched.created_at(), 10);
        assert_eq!(patched.updated_at(), 15);
        assert_eq!(patched.fields(), &doc! { "name": "Alice", "age": 31, "city": "Oslo" });
    }

    #[test]
    fn test_patched_never_moves_updated_at_backwards() {
        let record = Record::new("a", 10, 50, doc! {});
        assert_eq!(record.patched(&doc! {}, 20).updated_at(), 50);
    }

    #[test]
    fn test_replaced_drops_omitted_fields() {
        let record = Record::new("a", 10, 40, doc! { "name": "Alice", "city": "Oslo" });
        let replaced = record.replaced(doc! { "name": "Alicia" }, 20);

        assert_eq!(replaced.id(), "a");
        assert_eq!(replaced.created_at(), 10);
        assert_eq!(replaced.updated_at(), 40);
        assert_eq!(replaced.fields(), &doc! { "name": "Alicia" });
    }

    #[test]
    fn test_from_document() {
        let record = Record::from_document(doc! { "id": "x", "created_at": 5_i64, "n": 1 }, 99).unwrap();
        assert_eq!(record.id(), "x");
        assert_eq!(record.created_at(), 5);
        assert_eq!(record.updated_at(), 5);
        assert_eq!(record.fields(), &doc! { "n": 1 });

        let stamped = Record::from_document(doc! { "id": "y" }, 99).unwrap();
        assert_eq!(stamped.created_at(), 99);
        assert_eq!(stamped.updated_at(), 99);
    }

    #[test]
    fn test_from_document_requires_id() {
        assert!(matches!(
            Record::from_document(doc! { "n": 1 }, 0),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
        assert!(matches!(
            Record::from_document(doc! { "id": "" }, 0),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
        assert!(matches!(
            Record::from_document(doc! { "id": 7 }, 0),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_check_reserved() {
        assert!(check_reserved(&doc! { "name": "Alice" }).is_ok());
        assert!(check_reserved(&doc! { "id": "forged" }).is_err());
        assert!(check_reserved(&doc! { "updated_at": 1 }).is_err());
    }

    #[test]
    fn test_to_document_round_trip() {
        let record = Record::new("a", 1, 2, doc! { "name": "Alice" });
        let rebuilt = Record::from_document(record.to_document(), 0).unwrap();
        assert_eq!(rebuilt, record);
    }
}
