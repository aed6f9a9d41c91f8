//! Publish run identity and its reconciliation cache.
//!
//! A `PublishRun` is created for exactly one batch going to one shop. Remote
//! identifiers resolved during the run are cached on it and discarded with it,
//! so a later run always sees fresh provider state and two concurrent runs
//! never share a cache.

use std::collections::HashMap;

use tokio::sync::{Mutex, MutexGuard};

use storefront_core::{RunId, ShopId};

/// Kind of remote entity the cache holds identifiers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteKind {
    Collection,
    Category,
    Attribute,
}

impl RemoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteKind::Collection => "collection",
            RemoteKind::Category => "category",
            RemoteKind::Attribute => "attribute",
        }
    }
}

impl core::fmt::Display for RemoteKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local name → provider id, per remote kind.
#[derive(Debug, Default)]
pub struct RunCache {
    entries: HashMap<(RemoteKind, String), String>,
    location: Option<Option<String>>,
}

impl RunCache {
    pub fn get(&self, kind: RemoteKind, key: &str) -> Option<&str> {
        self.entries
            .get(&(kind, key.to_string()))
            .map(String::as_str)
    }

    pub fn insert(&mut self, kind: RemoteKind, key: impl Into<String>, remote_id: impl Into<String>) {
        self.entries.insert((kind, key.into()), remote_id.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inventory location resolved for this run. `Some(None)` means the shop
    /// has none.
    pub fn location(&self) -> Option<Option<&str>> {
        self.location.as_ref().map(|l| l.as_deref())
    }

    pub fn set_location(&mut self, location: Option<String>) {
        self.location = Some(location);
    }
}

/// One batch publish to one shop.
#[derive(Debug)]
pub struct PublishRun {
    shop_id: ShopId,
    run_id: RunId,
    cache: Mutex<RunCache>,
}

impl PublishRun {
    pub fn new(shop_id: ShopId) -> Self {
        Self {
            shop_id,
            run_id: RunId::new(),
            cache: Mutex::new(RunCache::default()),
        }
    }

    pub fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Lock the cache. Hold the guard across a lookup-or-create so two tasks of
    /// the same run cannot create the same remote entity.
    pub async fn cache(&self) -> MutexGuard<'_, RunCache> {
        self.cache.lock().await
    }
}
