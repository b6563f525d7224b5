//! Collection index: entity-id lookup consumed by the open-by-id command.
//! How collections are discovered or persisted is the embedder's business,
//! hidden behind `CollectionSource`.

use netconsole_protocol::RequestDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionItem {
    pub id: String,
    pub name: String,
    pub request: RequestDescriptor,
}

struct IndexEntry {
    item: CollectionItem,
    collection: Collection,
}

/// Discovers the current set of collections. Called on refresh.
pub trait CollectionSource: Send + Sync {
    fn discover(&self) -> Vec<(Collection, Vec<CollectionItem>)>;
}

#[derive(Default)]
pub struct CollectionIndex {
    entries: Mutex<HashMap<String, IndexEntry>>,
}

impl CollectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, item: CollectionItem, collection: Collection) {
        let mut entries = self.entries.lock().expect("index lock poisoned");
        entries.insert(
            item.id.clone(),
            IndexEntry { item, collection },
        );
    }

    pub fn get_item(&self, id: &str) -> Option<CollectionItem> {
        let entries = self.entries.lock().expect("index lock poisoned");
        entries.get(id).map(|entry| entry.item.clone())
    }

    pub fn get_collection(&self, id: &str) -> Option<Collection> {
        let entries = self.entries.lock().expect("index lock poisoned");
        entries.get(id).map(|entry| entry.collection.clone())
    }

    pub fn clear(&self) {
        self.entries.lock().expect("index lock poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuilds the index from a fresh discovery pass.
    pub fn refresh(&self, source: &dyn CollectionSource) {
        let discovered = source.discover();
        let mut entries = self.entries.lock().expect("index lock poisoned");
        entries.clear();
        for (collection, items) in discovered {
            for item in items {
                entries.insert(
                    item.id.clone(),
                    IndexEntry {
                        item,
                        collection: collection.clone(),
                    },
                );
            }
        }
        info!(event = "collections_refreshed", entries = entries.len());
    }
}
