//! Narrow interfaces to services the publisher consumes but does not own:
//! media storage, image metadata editing, image download and text rewriting.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpImageFetcher;
pub use memory::{
    InMemoryMediaStorage, InMemoryMetadataEditor, StaticImageFetcher, TruncatingRewriter,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Options for a media upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOptions {
    /// Replace an existing asset stored under the same `public_id`.
    pub overwrite: bool,
    pub public_id: Option<String>,
    pub folder: Option<String>,
}

/// Result of a media upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAsset {
    pub secure_url: String,
    pub public_id: String,
}

/// Blob storage for product images.
///
/// Uploading twice under the same `public_id` with `overwrite` set must yield
/// the same asset.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Upload from a remote URL or a `data:` URI.
    async fn upload(&self, source: &str, options: &UploadOptions) -> Result<StoredAsset, CollaboratorError>;

    async fn upload_file(&self, bytes: Vec<u8>, options: &UploadOptions) -> Result<StoredAsset, CollaboratorError>;

    async fn remove(&self, public_id: &str) -> Result<(), CollaboratorError>;
}

/// Opaque handle to a loaded image's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataHandle(pub u64);

/// Image metadata (EXIF) editing.
#[async_trait]
pub trait ImageMetadataEditor: Send + Sync {
    async fn load(&self, bytes: &[u8]) -> Result<MetadataHandle, CollaboratorError>;

    async fn set_tag(&self, handle: &MetadataHandle, tag: &str, value: &str) -> Result<(), CollaboratorError>;

    /// Serialize the edited metadata block.
    async fn dump(&self, handle: &MetadataHandle) -> Result<Vec<u8>, CollaboratorError>;

    /// Write a dumped metadata block into `bytes`, returning the new image.
    async fn insert(&self, metadata: &[u8], bytes: Vec<u8>) -> Result<Vec<u8>, CollaboratorError>;
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CollaboratorError>;
}

/// Language-model text rewriting.
#[async_trait]
pub trait TextRewriter: Send + Sync {
    async fn rewrite(&self, text: &str, instructions: &str, max_length: usize) -> Result<String, CollaboratorError>;
}
