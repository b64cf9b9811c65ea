//! Core traits for typed documents and their conversions.
//!
//! Collections store untyped [`Record`]s. Types implementing [`Document`] can be
//! written to and read from a collection through the BSON conversions provided by
//! [`DocumentExt`].

use bson::{Bson, Document as BsonDocument, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    record::{Record, strip_reserved},
};

/// Core trait for types stored in a collection.
///
/// The identifier and timestamps belong to the collection. A document type may declare
/// `id`, `created_at` and `updated_at` fields to receive them when read back; they are
/// ignored when the document is written.
///
/// # Example
///
/// ```ignore
/// use docsync::document::Document;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     #[serde(default)]
///     pub id: String,
///     pub name: String,
///     pub age: i32,
/// }
///
/// impl Document for User {
///     fn collection_name() -> &'static str {
///         "users"
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;
}

/// Conversion helpers between typed documents and collection payloads.
///
/// This trait is automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document {
    /// Serializes this document into a payload, dropping engine-owned fields.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the type does not serialize to a map.
    fn to_payload(&self) -> DocumentStoreResult<BsonDocument>;

    /// Deserializes a document from a stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not match the shape of `Self`.
    fn from_record(record: &Record) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_payload(&self) -> DocumentStoreResult<BsonDocument> {
        into_payload(serialize_to_bson(self)?)
    }

    fn from_record(record: &Record) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(record.to_document()))?)
    }
}

/// Serializes any value into a patch or payload, dropping engine-owned fields.
///
/// # Errors
///
/// Returns an error if serialization fails or the value does not serialize to a map.
pub fn to_patch<P: Serialize>(value: &P) -> DocumentStoreResult<BsonDocument> {
    into_payload(serialize_to_bson(value)?)
}

fn into_payload(bson: Bson) -> DocumentStoreResult<BsonDocument> {
    match bson {
        Bson::Document(mut fields) => {
            strip_reserved(&mut fields);
            Ok(fields)
        }
        other => Err(DocumentStoreError::Serialization(format!(
            "expected a document, got {other}"
        ))),
    }
}
