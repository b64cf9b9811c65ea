//! An embeddable, in-memory document collection engine.
//!
//! docsync keeps keyed collections of documents in process memory and offers indexed
//! queries, sorted and paginated retrieval, change notification, and optimistic
//! synchronization with an external system of record. It is meant as a fast,
//! queryable local cache that stays eventually consistent with a backend.
//!
//! # Features
//!
//! - **Indexed queries** - Equality indexes narrow where-clauses before full evaluation
//! - **Ordering and pagination** - Stable multi-key sorts with locale-aware string collation
//! - **Change listeners** - Collection-level and per-document event subscriptions
//! - **Optimistic writes** - Writes apply locally, then commit or revert on the synchronizer's verdict
//! - **Typed documents** - Serde types viewed through [`TypedCollection`]
//!
//! # Quick Start
//!
//! ```ignore
//! use docsync::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     #[serde(default)]
//!     pub id: String,
//!     pub name: String,
//!     pub age: i32,
//! }
//!
//! impl Document for User {
//!     fn collection_name() -> &'static str { "users" }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let registry = Registry::new();
//!     registry
//!         .create_collection(
//!             Collection::builder("users")
//!                 .index("name")
//!                 .synchronizer(WriteOp::Create, |target: SyncTarget| async move {
//!                     // send `target` to the backend
//!                     Ok::<_, BoxError>(true)
//!                 }),
//!         )
//!         .await?;
//!
//!     let users = registry.typed_collection::<User>().await?;
//!     let id = users
//!         .create(&User { id: String::new(), name: "Alice".into(), age: 30 })
//!         .await?;
//!
//!     let adults = users.query(
//!         &Filter::gte("age", 18),
//!         &QueryOptions::builder().sort("name", SortDirection::Asc).build(),
//!     )?;
//!     assert_eq!(adults[0].id, id);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Synchronization failures
//!
//! When a synchronizer rejects a write, the write is reverted, `syncError` listeners
//! are notified, and the caller receives [`DocumentStoreError::Sync`](error::DocumentStoreError::Sync)
//! carrying the operation kind and the original cause.

pub mod prelude;
pub mod registry;
pub mod typed;

pub use docsync_core::{document, error, event, page, query, record, sync, write};

pub use registry::Registry;
pub use typed::TypedCollection;

// Re-export BSON types for convenience
pub use bson;

/// The in-memory collection engine.
pub mod memory {
    pub use docsync_memory::{Clock, Collection, CollectionBuilder, Handler, IdGenerator, Subscription};
}
