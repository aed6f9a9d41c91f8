//! Get-or-create reconciliation of shared remote entities (collections,
//! categories, attribute definitions) by name.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::run::{PublishRun, RemoteKind};

/// How local names are compared with remote names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    CaseInsensitive,
}

impl MatchMode {
    /// Cache key for `name` under this mode.
    pub fn key(&self, name: &str) -> String {
        match self {
            MatchMode::Exact => name.to_string(),
            MatchMode::CaseInsensitive => name.to_lowercase(),
        }
    }

    pub fn matches(&self, local: &str, remote: &str) -> bool {
        match self {
            MatchMode::Exact => local == remote,
            MatchMode::CaseInsensitive => local.to_lowercase() == remote.to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
}

/// A local name to resolve, with the description used if it has to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalName {
    pub name: String,
    pub description: String,
}

impl LocalName {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DirectoryError(pub String);

/// One provider-side namespace of named entities.
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    fn kind(&self) -> RemoteKind;

    fn match_mode(&self) -> MatchMode;

    /// Existing entries whose name may match `name` (one bounded page).
    async fn search(&self, name: &str) -> Result<Vec<RemoteEntry>, DirectoryError>;

    /// Create an entry and return its remote id.
    async fn create(&self, name: &str, description: &str) -> Result<String, DirectoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("failed to look up {kind} `{name}`: {message}")]
    Lookup {
        kind: RemoteKind,
        name: String,
        message: String,
    },

    #[error("failed to create {kind} `{name}`: {message}")]
    Create {
        kind: RemoteKind,
        name: String,
        message: String,
    },
}

/// Resolve every distinct name to a remote id, reusing the run cache, then
/// existing remote entries, and creating what is missing.
///
/// Any failure aborts the whole resolution. Entries created before the
/// failure stay cached for the rest of the run.
pub async fn resolve<D>(
    directory: &D,
    run: &PublishRun,
    wanted: &[LocalName],
) -> Result<BTreeMap<String, String>, ReconcileError>
where
    D: RemoteDirectory + ?Sized,
{
    let kind = directory.kind();
    let mode = directory.match_mode();
    let mut resolved = BTreeMap::new();

    let mut cache = run.cache().await;
    for local in wanted {
        if resolved.contains_key(&local.name) {
            continue;
        }
        let key = mode.key(&local.name);

        if let Some(id) = cache.get(kind, &key) {
            resolved.insert(local.name.clone(), id.to_string());
            continue;
        }

        let candidates = directory
            .search(&local.name)
            .await
            .map_err(|e| ReconcileError::Lookup {
                kind,
                name: local.name.clone(),
                message: e.0,
            })?;

        let id = match candidates.iter().find(|c| mode.matches(&local.name, &c.name)) {
            Some(found) => {
                debug!(%kind, name = %local.name, remote_id = %found.id, "reusing remote entry");
                found.id.clone()
            }
            None => {
                let id = directory
                    .create(&local.name, &local.description)
                    .await
                    .map_err(|e| {
                        warn!(%kind, name = %local.name, error = %e, "remote create failed");
                        ReconcileError::Create {
                            kind,
                            name: local.name.clone(),
                            message: e.0,
                        }
                    })?;
                info!(%kind, name = %local.name, remote_id = %id, run_id = %run.run_id(), "created remote entry");
                id
            }
        };

        cache.insert(kind, key, id.clone());
        resolved.insert(local.name.clone(), id);
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use storefront_core::ShopId;

    struct FakeDirectory {
        mode: MatchMode,
        entries: Mutex<Vec<RemoteEntry>>,
        creates: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl FakeDirectory {
        fn new(mode: MatchMode) -> Self {
            Self {
                mode,
                entries: Mutex::new(Vec::new()),
                creates: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn creates(&self) -> Vec<String> {
            self.creates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteDirectory for FakeDirectory {
        fn kind(&self) -> RemoteKind {
            RemoteKind::Collection
        }

        fn match_mode(&self) -> MatchMode {
            self.mode
        }

        async fn search(&self, _name: &str) -> Result<Vec<RemoteEntry>, DirectoryError> {
            Ok(self.entries.lock().unwrap().clone())
        }

        async fn create(&self, name: &str, _description: &str) -> Result<String, DirectoryError> {
            if self.fail_on.as_deref() == Some(name) {
                return Err(DirectoryError("rate limited".to_string()));
            }
            let mut entries = self.entries.lock().unwrap();
            let id = format!("remote-{}", entries.len() + 1);
            entries.push(RemoteEntry {
                id: id.clone(),
                name: name.to_string(),
            });
            self.creates.lock().unwrap().push(name.to_string());
            Ok(id)
        }
    }

    fn names(list: &[&str]) -> Vec<LocalName> {
        list.iter().map(|n| LocalName::new(*n, "")).collect()
    }

    #[tokio::test]
    async fn repeated_names_in_one_run_create_once() {
        let dir = FakeDirectory::new(MatchMode::Exact);
        let run = PublishRun::new(ShopId::new());

        let first = resolve(&dir, &run, &names(&["Summer", "Summer"])).await.unwrap();
        let second = resolve(&dir, &run, &names(&["Summer"])).await.unwrap();

        assert_eq!(dir.creates(), vec!["Summer".to_string()]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn a_new_run_reuses_the_remote_entry() {
        let dir = FakeDirectory::new(MatchMode::Exact);
        let shop = ShopId::new();

        resolve(&dir, &PublishRun::new(shop), &names(&["Summer"])).await.unwrap();
        let again = resolve(&dir, &PublishRun::new(shop), &names(&["Summer"])).await.unwrap();

        assert_eq!(dir.creates().len(), 1);
        assert_eq!(again.get("Summer").map(String::as_str), Some("remote-1"));
    }

    #[tokio::test]
    async fn exact_mode_is_case_sensitive() {
        let dir = FakeDirectory::new(MatchMode::Exact);
        let run = PublishRun::new(ShopId::new());

        resolve(&dir, &run, &names(&["Summer", "summer"])).await.unwrap();
        assert_eq!(dir.creates().len(), 2);
    }

    #[tokio::test]
    async fn case_insensitive_mode_reuses_differently_cased_names() {
        let dir = FakeDirectory::new(MatchMode::CaseInsensitive);
        let shop = ShopId::new();

        resolve(&dir, &PublishRun::new(shop), &names(&["Summer"])).await.unwrap();
        let map = resolve(&dir, &PublishRun::new(shop), &names(&["SUMMER", "summer"]))
            .await
            .unwrap();

        assert_eq!(dir.creates().len(), 1);
        assert_eq!(map.len(), 2);
        assert!(map.values().all(|id| id == "remote-1"));
    }

    #[tokio::test]
    async fn create_failure_aborts_resolution() {
        let mut dir = FakeDirectory::new(MatchMode::Exact);
        dir.fail_on = Some("Linen".to_string());
        let run = PublishRun::new(ShopId::new());

        let err = resolve(&dir, &run, &names(&["Summer", "Linen", "Beach"]))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Create { ref name, .. } if name == "Linen"));
        assert_eq!(dir.creates(), vec!["Summer".to_string()]);
    }
}
