//! In-memory collaborators for tests and local wiring.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{
    CollaboratorError, ImageFetcher, ImageMetadataEditor, MediaStorage, MetadataHandle,
    StoredAsset, TextRewriter, UploadOptions,
};

/// Media storage keeping assets in a map keyed by public id.
#[derive(Debug)]
pub struct InMemoryMediaStorage {
    base_url: String,
    assets: RwLock<HashMap<String, StoredAsset>>,
    files: RwLock<HashMap<String, Vec<u8>>>,
    next_id: AtomicU64,
    uploads: AtomicU64,
}

impl InMemoryMediaStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            assets: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            uploads: AtomicU64::new(0),
        }
    }

    /// Number of upload calls, including overwrites.
    pub fn upload_count(&self) -> u64 {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn asset(&self, public_id: &str) -> Option<StoredAsset> {
        self.assets.read().unwrap().get(public_id).cloned()
    }

    pub fn file(&self, public_id: &str) -> Option<Vec<u8>> {
        self.files.read().unwrap().get(public_id).cloned()
    }

    fn store(&self, options: &UploadOptions) -> Result<StoredAsset, CollaboratorError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);

        let public_id = match &options.public_id {
            Some(id) => id.clone(),
            None => format!("asset-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
        };
        let public_id = match &options.folder {
            Some(folder) if !public_id.starts_with(&format!("{folder}/")) => {
                format!("{folder}/{public_id}")
            }
            _ => public_id,
        };

        let mut assets = self.assets.write().unwrap();
        if let Some(existing) = assets.get(&public_id) {
            if !options.overwrite {
                return Err(CollaboratorError::Rejected(format!(
                    "asset {public_id} already exists"
                )));
            }
            return Ok(existing.clone());
        }

        let asset = StoredAsset {
            secure_url: format!("{}/{public_id}", self.base_url.trim_end_matches('/')),
            public_id: public_id.clone(),
        };
        assets.insert(public_id, asset.clone());
        Ok(asset)
    }
}

impl Default for InMemoryMediaStorage {
    fn default() -> Self {
        Self::new("https://media.local")
    }
}

#[async_trait]
impl MediaStorage for InMemoryMediaStorage {
    async fn upload(&self, source: &str, options: &UploadOptions) -> Result<StoredAsset, CollaboratorError> {
        if source.trim().is_empty() {
            return Err(CollaboratorError::Rejected("empty image source".to_string()));
        }
        self.store(options)
    }

    async fn upload_file(&self, bytes: Vec<u8>, options: &UploadOptions) -> Result<StoredAsset, CollaboratorError> {
        let asset = self.store(options)?;
        self.files
            .write()
            .unwrap()
            .insert(asset.public_id.clone(), bytes);
        Ok(asset)
    }

    async fn remove(&self, public_id: &str) -> Result<(), CollaboratorError> {
        self.files.write().unwrap().remove(public_id);
        match self.assets.write().unwrap().remove(public_id) {
            Some(_) => Ok(()),
            None => Err(CollaboratorError::NotFound(public_id.to_string())),
        }
    }
}

/// Metadata editor that stores tags per handle and serializes them as
/// `tag=value` lines.
#[derive(Debug, Default)]
pub struct InMemoryMetadataEditor {
    next: AtomicU64,
    tags: RwLock<HashMap<u64, Vec<(String, String)>>>,
}

impl InMemoryMetadataEditor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageMetadataEditor for InMemoryMetadataEditor {
    async fn load(&self, bytes: &[u8]) -> Result<MetadataHandle, CollaboratorError> {
        if bytes.is_empty() {
            return Err(CollaboratorError::Rejected("empty image".to_string()));
        }
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        self.tags.write().unwrap().insert(id, Vec::new());
        Ok(MetadataHandle(id))
    }

    async fn set_tag(&self, handle: &MetadataHandle, tag: &str, value: &str) -> Result<(), CollaboratorError> {
        let mut tags = self.tags.write().unwrap();
        let entry = tags
            .get_mut(&handle.0)
            .ok_or_else(|| CollaboratorError::NotFound(format!("metadata handle {}", handle.0)))?;
        entry.retain(|(t, _)| t != tag);
        entry.push((tag.to_string(), value.to_string()));
        Ok(())
    }

    async fn dump(&self, handle: &MetadataHandle) -> Result<Vec<u8>, CollaboratorError> {
        let tags = self.tags.read().unwrap();
        let entry = tags
            .get(&handle.0)
            .ok_or_else(|| CollaboratorError::NotFound(format!("metadata handle {}", handle.0)))?;
        let mut out = String::new();
        for (tag, value) in entry {
            out.push_str(tag);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        Ok(out.into_bytes())
    }

    async fn insert(&self, metadata: &[u8], bytes: Vec<u8>) -> Result<Vec<u8>, CollaboratorError> {
        let mut out = Vec::with_capacity(metadata.len() + bytes.len());
        out.extend_from_slice(metadata);
        out.extend(bytes);
        Ok(out)
    }
}

/// Serves fixed bytes per URL, optionally with a fallback for any URL.
#[derive(Debug, Default)]
pub struct StaticImageFetcher {
    images: HashMap<String, Vec<u8>>,
    fallback: Option<Vec<u8>>,
}

impl StaticImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn any(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            images: HashMap::new(),
            fallback: Some(bytes.into()),
        }
    }

    pub fn with(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.images.insert(url.into(), bytes.into());
        self
    }
}

#[async_trait]
impl ImageFetcher for StaticImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CollaboratorError> {
        self.images
            .get(url)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(url.to_string()))
    }
}

/// Deterministic rewriter: collapses whitespace and truncates to `max_length`
/// characters. Stands in for the language model outside production.
#[derive(Debug, Default, Clone)]
pub struct TruncatingRewriter;

#[async_trait]
impl TextRewriter for TruncatingRewriter {
    async fn rewrite(&self, text: &str, _instructions: &str, max_length: usize) -> Result<String, CollaboratorError> {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        Ok(collapsed.chars().take(max_length).collect())
    }
}
