//! Data model and contracts for the docsync collection engine.
//!
//! This crate is the core of the docsync project and provides:
//!
//! - **Records** ([`record`]) - The stored document shape: identifier, timestamps and payload
//! - **Document traits** ([`document`]) - Serde-typed documents and their BSON conversions
//! - **Where-clauses** ([`query`]) - Per-field conditions, operators and query options
//! - **Events** ([`event`]) - Change notifications emitted by a collection
//! - **Synchronization contract** ([`sync`]) - The async confirm/reject hook for writes
//! - **Write results** ([`write`]) - Outcomes of removals and bulk writes
//! - **Pagination** ([`page`]) - Page-numbered views over query results
//! - **Error handling** ([`error`]) - Validation and synchronization error types
//!
//! # Example
//!
//! ```ignore
//! use docsync_core::query::{Filter, QueryOptions, SortDirection};
//!
//! let adults = Filter::gte("age", 18).and(Filter::eq("active", true));
//! let options = QueryOptions::builder()
//!     .sort("age", SortDirection::Asc)
//!     .limit(10)
//!     .build();
//! ```

pub mod document;
pub mod error;
pub mod event;
pub mod page;
pub mod query;
pub mod record;
pub mod sync;
pub mod write;
