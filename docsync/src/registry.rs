//! The name to collection table.
//!
//! A [`Registry`] is the application-wide entry point: collections are created through
//! it, looked up by name, and dropped. Typed views are resolved from a document type's
//! collection name.
//!
//! # Example
//!
//! ```ignore
//! use docsync::{Registry, memory::Collection};
//!
//! let registry = Registry::new();
//! registry
//!     .create_collection(Collection::builder("users").index("email"))
//!     .await?;
//!
//! let users = registry.typed_collection::<User>().await?;
//! ```

use std::{collections::HashMap, sync::Arc};

use log::info;
use mea::rwlock::RwLock;

use docsync_core::{
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
};
use docsync_memory::{Collection, CollectionBuilder};

use crate::typed::TypedCollection;

type CollectionMap = HashMap<String, Collection>;

/// Registry of named collections.
///
/// Clones share the same table.
#[derive(Default, Clone, Debug)]
pub struct Registry {
    collections: Arc<RwLock<CollectionMap>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(CollectionMap::new())),
        }
    }

    /// Builds a collection and registers it under the builder's name.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::CollectionAlreadyExists`] if the name is taken, or
    /// the builder's own error if the configuration is invalid.
    pub async fn create_collection(&self, builder: CollectionBuilder) -> DocumentStoreResult<Collection> {
        let mut collections = self.collections.write().await;
        let name = builder.name().to_string();

        if collections.contains_key(&name) {
            return Err(DocumentStoreError::CollectionAlreadyExists(name));
        }

        let collection = builder.build()?;
        collections.insert(name.clone(), collection.clone());
        info!("created collection {name}");

        Ok(collection)
    }

    /// Returns the collection registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::CollectionNotFound`] if no such collection exists.
    pub async fn collection(&self, name: &str) -> DocumentStoreResult<Collection> {
        self.collections
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DocumentStoreError::CollectionNotFound(name.to_string()))
    }

    /// Returns a typed view of the collection named by `D::collection_name()`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::CollectionNotFound`] if no such collection exists.
    pub async fn typed_collection<D: Document>(&self) -> DocumentStoreResult<TypedCollection<D>> {
        Ok(TypedCollection::new(self.collection(D::collection_name()).await?))
    }

    /// Lists the registered collection names, sorted.
    pub async fn list_collections(&self) -> Vec<String> {
        let mut names = self
            .collections
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Unregisters a collection and clears it.
    ///
    /// Handles obtained earlier stay usable but see an empty collection with no
    /// listeners.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::CollectionNotFound`] if no such collection exists.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let collection = self
            .collections
            .write()
            .await
            .remove(name)
            .ok_or_else(|| DocumentStoreError::CollectionNotFound(name.to_string()))?;

        collection.clear();
        info!("dropped collection {name}");

        Ok(())
    }
}
