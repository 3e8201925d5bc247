//! Storage layer for the photo catalog
//!
//! Categories are directories under a storage root. A JSON index maps each
//! category name to its metadata and is the source of truth for which
//! categories exist. The index is read whole on every query and rewritten
//! whole on every mutation; nothing is locked and nothing is rolled back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

/// Extension given to every stored photo
pub const MEDIA_EXTENSION: &str = "jpg";

/// Errors that can occur during catalog operations
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Category is already present in the index
    #[error("category already exists: {0}")]
    AlreadyExists(String),
    /// Name cannot be used as a directory name
    #[error("invalid category name: {0:?}")]
    InvalidName(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata kept per category in the index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMeta {
    /// When the category was created
    pub created_at: DateTime<Utc>,
}

/// Catalog index in insertion order
pub type CatalogIndex = IndexMap<String, CategoryMeta>;

/// Interface for catalog storage providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Category names in index order
    async fn list_categories(&self) -> Result<Vec<String>, CatalogError>;
    /// Whether the index contains `name`
    async fn category_exists(&self, name: &str) -> Result<bool, CatalogError>;
    /// Create a category directory and its index entry
    async fn create_category(&self, name: &str) -> Result<(), CatalogError>;
    /// Number of entries in the category directory; 0 when it is missing
    async fn count_media(&self, name: &str) -> Result<usize, CatalogError>;
    /// Stored file identifiers; empty when the directory is missing
    async fn list_media(&self, name: &str) -> Result<Vec<String>, CatalogError>;
    /// Write a new photo and return its identifier
    async fn store_media(&self, name: &str, bytes: Vec<u8>) -> Result<String, CatalogError>;
    /// Uniformly chosen identifier, or `None` if the category holds nothing
    async fn pick_random(&self, name: &str) -> Result<Option<String>, CatalogError>;
    /// Location of a stored item on disk
    fn media_path(&self, name: &str, id: &str) -> PathBuf;
}

/// Longest category name in UTF-8 bytes; common filesystems cap a path
/// component at 255.
pub const MAX_NAME_BYTES: usize = 255;

/// Checks that `name` is usable as a single path component.
///
/// # Errors
///
/// Returns `CatalogError::InvalidName` for empty names, `.`/`..`, names
/// containing `/` or NUL, and names longer than [`MAX_NAME_BYTES`].
pub fn validate_category_name(name: &str) -> Result<(), CatalogError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.len() > MAX_NAME_BYTES
        || name.contains(['/', '\0']);
    if bad {
        return Err(CatalogError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Filesystem-backed catalog
pub struct FsMediaStore {
    root: PathBuf,
    index_path: PathBuf,
}

impl FsMediaStore {
    /// Open the catalog, creating the storage root and an empty index if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be created or the index cannot be written.
    pub async fn open(
        root: impl Into<PathBuf>,
        index_path: impl Into<PathBuf>,
    ) -> Result<Self, CatalogError> {
        let store = Self {
            root: root.into(),
            index_path: index_path.into(),
        };

        fs::create_dir_all(&store.root).await?;
        if !fs::try_exists(&store.index_path).await? {
            store.save_index(&CatalogIndex::new()).await?;
            info!("Created empty catalog index at {}", store.index_path.display());
        }

        Ok(store)
    }

    /// Storage root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a category, or `None` if the name would escape the root.
    fn category_dir(&self, name: &str) -> Option<PathBuf> {
        validate_category_name(name).ok()?;
        Some(self.root.join(name))
    }

    /// Load the whole index. A missing or blank file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub async fn load_index(&self) -> Result<CatalogIndex, CatalogError> {
        let raw = match fs::read(&self.index_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CatalogIndex::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(CatalogIndex::new());
        }
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn save_index(&self, index: &CatalogIndex) -> Result<(), CatalogError> {
        let body = serde_json::to_string_pretty(index)?;
        fs::write(&self.index_path, body).await?;
        Ok(())
    }

    /// Create a category stamped with `created_at`.
    ///
    /// The directory is ensured before the index is rewritten; a failure in
    /// between leaves an orphan directory.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the index has the name, `InvalidName` for unusable
    /// names, I/O or JSON errors otherwise.
    pub async fn create_category_at(
        &self,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), CatalogError> {
        validate_category_name(name)?;

        let mut index = self.load_index().await?;
        if index.contains_key(name) {
            return Err(CatalogError::AlreadyExists(name.to_string()));
        }

        fs::create_dir_all(self.root.join(name)).await?;
        index.insert(name.to_string(), CategoryMeta { created_at });
        self.save_index(&index).await?;

        info!("Created category '{name}'");
        Ok(())
    }

    /// Store `bytes` under a name derived from `at`.
    ///
    /// Two writes within the same millisecond target the same file; the later
    /// one wins.
    ///
    /// # Errors
    ///
    /// `InvalidName` for unusable names, I/O errors otherwise.
    pub async fn store_media_at(
        &self,
        name: &str,
        bytes: &[u8],
        at: DateTime<Utc>,
    ) -> Result<String, CatalogError> {
        let dir = self
            .category_dir(name)
            .ok_or_else(|| CatalogError::InvalidName(name.to_string()))?;
        fs::create_dir_all(&dir).await?;

        let id = format!("{}.{MEDIA_EXTENSION}", at.timestamp_millis());
        fs::write(dir.join(&id), bytes).await?;

        debug!(category = name, file = %id, size = bytes.len(), "Stored media");
        Ok(id)
    }
}

#[async_trait]
impl CatalogStore for FsMediaStore {
    async fn list_categories(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.load_index().await?.into_keys().collect())
    }

    async fn category_exists(&self, name: &str) -> Result<bool, CatalogError> {
        Ok(self.load_index().await?.contains_key(name))
    }

    async fn create_category(&self, name: &str) -> Result<(), CatalogError> {
        self.create_category_at(name, Utc::now()).await
    }

    async fn count_media(&self, name: &str) -> Result<usize, CatalogError> {
        Ok(self.list_media(name).await?.len())
    }

    async fn list_media(&self, name: &str) -> Result<Vec<String>, CatalogError> {
        let Some(dir) = self.category_dir(name) else {
            return Ok(Vec::new());
        };

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
        files.sort();
        Ok(files)
    }

    async fn store_media(&self, name: &str, bytes: Vec<u8>) -> Result<String, CatalogError> {
        self.store_media_at(name, &bytes, Utc::now()).await
    }

    async fn pick_random(&self, name: &str) -> Result<Option<String>, CatalogError> {
        let files = self.list_media(name).await?;
        Ok(files.choose(&mut rand::thread_rng()).cloned())
    }

    fn media_path(&self, name: &str, id: &str) -> PathBuf {
        self.root.join(name).join(id)
    }
}
