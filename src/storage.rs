//! File storage for uploaded attachments.
//!
//! [`FileStorage`] enforces the per-category type and size rules and picks
//! collision-free names; the bytes themselves go through an
//! [`ObjectStorage`] backend ([`LocalStorage`] in production).

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ErrorKind;

const MAX_NAME_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Document,
}

impl FileCategory {
    /// Allowed MIME types with their accepted extensions.
    fn allowed(&self) -> &'static [(&'static str, &'static [&'static str])] {
        match self {
            Self::Image => &[
                ("image/jpeg", &["jpg", "jpeg"]),
                ("image/jpg", &["jpg", "jpeg"]),
                ("image/png", &["png"]),
                ("image/gif", &["gif"]),
            ],
            Self::Document => &[("application/pdf", &["pdf"])],
        }
    }

    fn from_mime(mime: &str) -> Option<Self> {
        [Self::Image, Self::Document]
            .into_iter()
            .find(|c| c.allowed().iter().any(|(m, _)| *m == mime))
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Document => f.write_str("document"),
        }
    }
}

/// Reference to a persisted upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StoredFile {
    /// Stored file name, unique within the content root.
    pub file_id: String,
    pub path: String,
    pub original_filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub category: FileCategory,
    pub created_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn extension(&self) -> &str {
        Path::new(&self.file_id)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
    }
}

/// An incoming file before validation.
#[derive(Debug, Clone)]
pub struct Upload {
    pub data: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unsupported {category} type: {detail}")]
    UnsupportedFileType { category: FileCategory, detail: String },
    #[error("{category} is {size} bytes, the limit is {limit} bytes")]
    FileTooLarge {
        category: FileCategory,
        size: u64,
        limit: u64,
    },
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("file already exists: {0}")]
    AlreadyExists(String),
    #[error("no free file name after {0} attempts")]
    NameExhausted(usize),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFileType { .. } => ErrorKind::UnsupportedFileType,
            Self::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            Self::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::StorageFailed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FolderContent {
    pub name: String,
    pub is_file: bool,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
}

/// Byte-level storage keyed by `folder/name` paths.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write a new object; fails with `AlreadyExists` instead of overwriting.
    async fn create_new(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;
    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError>;
    async fn metadata(&self, key: &str) -> Result<FolderContent, StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
    async fn list_folder_contents(&self, folder: &str) -> Result<Vec<FolderContent>, StorageError>;
    fn location(&self, key: &str) -> String;
}

/// Local-disk backend rooted at the content root.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

fn not_found_or_io(key: &str, e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Io(e)
    }
}

fn to_folder_content(name: String, meta: &std::fs::Metadata) -> FolderContent {
    FolderContent {
        name,
        is_file: meta.is_file(),
        size: meta.is_file().then(|| meta.len()),
        modified: meta.modified().ok().map(DateTime::<Utc>::from),
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn create_new(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let written = async {
            file.write_all(data).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            log::error!("Failed writing {}, removing partial file: {}", path.display(), e);
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(self.path_for(key))
            .await
            .map_err(|e| not_found_or_io(key, e))
    }

    async fn metadata(&self, key: &str) -> Result<FolderContent, StorageError> {
        let meta = tokio::fs::metadata(self.path_for(key))
            .await
            .map_err(|e| not_found_or_io(key, e))?;
        let name = Path::new(key)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(key)
            .to_string();
        Ok(to_folder_content(name, &meta))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        tokio::fs::remove_file(self.path_for(key))
            .await
            .map_err(|e| not_found_or_io(key, e))
    }

    async fn list_folder_contents(&self, folder: &str) -> Result<Vec<FolderContent>, StorageError> {
        let mut entries = match tokio::fs::read_dir(self.path_for(folder)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut contents = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            contents.push(to_folder_content(
                entry.file_name().to_string_lossy().into_owned(),
                &meta,
            ));
        }
        Ok(contents)
    }

    fn location(&self, key: &str) -> String {
        self.path_for(key).display().to_string()
    }
}

/// Check leading magic bytes against the declared MIME type.
pub fn magic_matches(mime: &str, data: &[u8]) -> bool {
    match mime {
        "image/png" => data.starts_with(&[0x89, 0x50, 0x4E, 0x47]),
        "image/jpeg" | "image/jpg" => data.starts_with(&[0xFF, 0xD8, 0xFF]),
        "image/gif" => data.starts_with(b"GIF8"),
        "application/pdf" => data.starts_with(b"%PDF"),
        _ => false,
    }
}

/// Category-aware upload service.
#[derive(Clone)]
pub struct FileStorage {
    backend: Arc<dyn ObjectStorage>,
    folder: String,
    max_image_size: u64,
    max_file_size: u64,
}

impl FileStorage {
    pub fn new(backend: Arc<dyn ObjectStorage>, config: &AppConfig) -> Self {
        Self {
            backend,
            folder: config.images_subdir.clone(),
            max_image_size: config.max_image_size,
            max_file_size: config.max_file_size,
        }
    }

    pub fn local(config: &AppConfig) -> Self {
        Self::new(Arc::new(LocalStorage::new(&config.upload_dir)), config)
    }

    pub fn size_limit(&self, category: FileCategory) -> u64 {
        match category {
            FileCategory::Image => self.max_image_size,
            FileCategory::Document => self.max_file_size,
        }
    }

    /// Validate type and size; returns the extension to store under.
    pub fn check(&self, upload: &Upload, category: FileCategory) -> Result<String, StorageError> {
        let mime = upload.content_type.trim().to_ascii_lowercase();
        let unsupported = |detail: String| StorageError::UnsupportedFileType { category, detail };

        let (_, extensions) = category
            .allowed()
            .iter()
            .find(|(m, _)| *m == mime)
            .ok_or_else(|| unsupported(format!("content type '{}'", upload.content_type)))?;

        let extension = match Path::new(&upload.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
        {
            Some(ext) if extensions.contains(&ext.as_str()) => ext,
            Some(ext) => return Err(unsupported(format!("extension '.{}' for {}", ext, mime))),
            None => extensions[0].to_string(),
        };

        let size = upload.data.len() as u64;
        let limit = self.size_limit(category);
        if size > limit {
            return Err(StorageError::FileTooLarge { category, size, limit });
        }

        if !magic_matches(&mime, &upload.data) {
            return Err(unsupported(format!("content does not look like {}", mime)));
        }

        Ok(extension)
    }

    /// Validate and persist an upload under a fresh, unique name.
    pub async fn store(
        &self,
        upload: Upload,
        category: FileCategory,
        prefix: &str,
    ) -> Result<StoredFile, StorageError> {
        let extension = self.check(&upload, category)?;

        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let file_id = unique_filename(prefix, &extension);
            let key = self.key(&file_id);
            match self.backend.create_new(&key, &upload.data).await {
                Ok(()) => {
                    log::info!("Stored {} {} ({} bytes)", category, file_id, upload.data.len());
                    return Ok(StoredFile {
                        path: self.backend.location(&key),
                        file_id,
                        original_filename: sanitize_filename::sanitize(&upload.filename),
                        mime_type: upload.content_type.trim().to_ascii_lowercase(),
                        size_bytes: upload.data.len() as u64,
                        category,
                        created_at: Utc::now(),
                    });
                }
                Err(StorageError::AlreadyExists(_)) => {
                    log::warn!("Name collision on {} (attempt {})", file_id, attempt);
                }
                Err(e) => return Err(e),
            }
        }
        Err(StorageError::NameExhausted(MAX_NAME_ATTEMPTS))
    }

    pub async fn read(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        self.backend.read(&self.checked_key(file_id)?).await
    }

    /// Describe a stored file from its name and on-disk metadata.
    pub async fn info(&self, file_id: &str) -> Result<StoredFile, StorageError> {
        let key = self.checked_key(file_id)?;
        let meta = self.backend.metadata(&key).await?;
        Ok(self.describe(file_id, &key, &meta))
    }

    /// Stored files of one category, newest first.
    pub async fn list(&self, category: FileCategory) -> Result<Vec<StoredFile>, StorageError> {
        let mut files: Vec<StoredFile> = self
            .backend
            .list_folder_contents(&self.folder)
            .await?
            .into_iter()
            .filter(|c| c.is_file)
            .map(|c| self.describe(&c.name, &self.key(&c.name), &c))
            .filter(|f| f.category == category)
            .collect();
        files.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.file_id.cmp(&a.file_id))
        });
        Ok(files)
    }

    pub async fn delete(&self, file_id: &str) -> Result<(), StorageError> {
        self.backend.delete(&self.checked_key(file_id)?).await?;
        log::info!("Deleted stored file {}", file_id);
        Ok(())
    }

    fn key(&self, file_id: &str) -> String {
        format!("{}/{}", self.folder, file_id)
    }

    /// Reject ids that could escape the storage folder.
    fn checked_key(&self, file_id: &str) -> Result<String, StorageError> {
        if file_id.is_empty()
            || sanitize_filename::sanitize(file_id) != file_id
            || file_id.starts_with('.')
        {
            return Err(StorageError::NotFound(file_id.to_string()));
        }
        Ok(self.key(file_id))
    }

    fn describe(&self, file_id: &str, key: &str, meta: &FolderContent) -> StoredFile {
        let mime = mime_guess::from_path(file_id)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
        StoredFile {
            file_id: file_id.to_string(),
            path: self.backend.location(key),
            original_filename: file_id.to_string(),
            category: FileCategory::from_mime(&mime).unwrap_or(FileCategory::Document),
            mime_type: mime,
            size_bytes: meta.size.unwrap_or(0),
            created_at: meta.modified.unwrap_or_else(Utc::now),
        }
    }
}

/// `<prefix>_<YYYYmmdd_HHMMSS>_<uuid>.<ext>`
pub fn unique_filename(prefix: &str, extension: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let id = Uuid::new_v4().simple();
    let prefix = sanitize_filename::sanitize(prefix);
    if prefix.is_empty() {
        format!("{}_{}.{}", timestamp, id, extension)
    } else {
        format!("{}_{}_{}.{}", prefix, timestamp, id, extension)
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod storage_tests;
