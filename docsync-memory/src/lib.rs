//! In-memory collection engine for docsync.
//!
//! This crate implements the [`Collection`]: a keyed, insertion-ordered store of
//! records with equality indexes, a query planner, multi-key sorting, change listeners
//! and the optimistic write protocol that confirms each write with an external
//! [`Synchronizer`](docsync_core::sync::Synchronizer).
//!
//! # Quick Start
//!
//! ```ignore
//! use docsync_core::{error::BoxError, query::Filter, sync::{SyncTarget, WriteOp}};
//! use docsync_memory::Collection;
//! use bson::doc;
//!
//! let users = Collection::builder("users")
//!     .index("city")
//!     .synchronizer(WriteOp::Create, |target: SyncTarget| async move {
//!         // push the new document to the backend
//!         Ok::<_, BoxError>(true)
//!     })
//!     .build()?;
//!
//! let id = users.create(doc! { "name": "Alice", "city": "Oslo" }).await?;
//! assert!(users.find_one(&Filter::eq("city", "Oslo")).is_some());
//! ```

pub mod collection;
pub mod listeners;

mod evaluator;
mod index;
mod planner;
mod sort;
mod store;
mod sync;

pub use collection::{Clock, Collection, CollectionBuilder, IdGenerator};
pub use listeners::{Handler, Subscription};

#[cfg(test)]
#[ctor::ctor]
fn init() {
    colog::init();
}
