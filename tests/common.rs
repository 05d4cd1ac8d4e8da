#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use request_payment_server::pdf::FontSet;
use request_payment_server::request_form::builder::PaymentRequestBuilder;
use request_payment_server::request_form::models::{
    ExpenseLineSubmission, PaymentRequest, RequestFormSubmission,
};
use request_payment_server::request_form::validation::validate_submission;
use request_payment_server::storage::{
    FileCategory, FolderContent, ObjectStorage, StorageError, StoredFile,
};
use request_payment_server::{AppConfig, AppState};

pub const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
pub const MB: usize = 1024 * 1024;

/// Mock implementation of ObjectStorage for testing
pub struct MockObjectStorage {
    // In-memory storage for testing
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    /// Number of upcoming `create_new` calls that report a name collision.
    collisions: AtomicUsize,
}

impl MockObjectStorage {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            collisions: AtomicUsize::new(0),
        }
    }

    pub fn with_collisions(count: usize) -> Self {
        let storage = Self::new();
        storage.collisions.store(count, Ordering::SeqCst);
        storage
    }

    pub async fn has_file(&self, key: &str) -> bool {
        let files = self.files.lock().await;
        files.contains_key(key)
    }

    pub async fn file_count(&self) -> usize {
        self.files.lock().await.len()
    }
}

#[async_trait::async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn create_new(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let pending = self.collisions.load(Ordering::SeqCst);
        if pending > 0 {
            self.collisions.store(pending - 1, Ordering::SeqCst);
            return Err(StorageError::AlreadyExists(key.to_string()));
        }

        let mut files = self.files.lock().await;
        if files.contains_key(key) {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        files.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let files = self.files.lock().await;
        files
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn metadata(&self, key: &str) -> Result<FolderContent, StorageError> {
        let files = self.files.lock().await;
        let data = files
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(FolderContent {
            name: key.rsplit('/').next().unwrap_or(key).to_string(),
            is_file: true,
            size: Some(data.len() as u64),
            modified: Some(Utc::now()),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut files = self.files.lock().await;
        files
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list_folder_contents(&self, folder: &str) -> Result<Vec<FolderContent>, StorageError> {
        let files = self.files.lock().await;
        let prefix = format!("{}/", folder);
        Ok(files
            .iter()
            .filter_map(|(key, data)| {
                key.strip_prefix(&prefix).map(|name| FolderContent {
                    name: name.to_string(),
                    is_file: true,
                    size: Some(data.len() as u64),
                    modified: Some(Utc::now()),
                })
            })
            .collect())
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{}", key)
    }
}

/// Config rooted in `dir` with a font path that does not exist.
pub fn test_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::with_upload_dir(dir);
    config.font_path = dir.join("fonts/missing.ttf");
    config.ensure_directories().unwrap();
    config
}

pub fn test_state(dir: &Path) -> AppState {
    AppState::new(test_config(dir))
}

/// A usable CJK font and its family for end-to-end rendering, if the
/// environment provides one.
pub fn available_font() -> Option<(std::path::PathBuf, String)> {
    let defaults = AppConfig::default();
    let path = std::env::var("TEST_FONT_PATH")
        .map(std::path::PathBuf::from)
        .unwrap_or(defaults.font_path);
    let family = std::env::var("TEST_FONT_FAMILY").unwrap_or(defaults.font_family);
    FontSet::resolve(&path, &family).ok()?;
    Some((path, family))
}

pub fn png_bytes(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len.max(PNG_MAGIC.len())];
    data[..PNG_MAGIC.len()].copy_from_slice(&PNG_MAGIC);
    data
}

/// A decodable 1x1 PNG, for renders that embed the image.
pub fn tiny_png() -> Vec<u8> {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    const PNG_1X1: &str = concat!(
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk",
        "YPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==",
    );
    STANDARD.decode(PNG_1X1).unwrap()
}

pub fn line(amount: i64) -> ExpenseLineSubmission {
    ExpenseLineSubmission {
        project_type: "A".to_string(),
        expense_type: "1.交通費".to_string(),
        execution_time: Some("3/15".to_string()),
        execution_content: "理監事會議交通".to_string(),
        amount: Decimal::from(amount),
        receipt_note: None,
    }
}

pub fn submission(method: &str, amounts: &[i64]) -> RequestFormSubmission {
    RequestFormSubmission {
        application_date: Some("114.3.15".to_string()),
        payee: "王小明".to_string(),
        payment_method: method.to_string(),
        payment_method_other: None,
        requesting_unit: "輔導活動執委會".to_string(),
        requesting_unit_other: None,
        payment_details: amounts.iter().map(|a| line(*a)).collect(),
        bank_book_image_id: None,
    }
}

pub fn bankbook_file() -> StoredFile {
    StoredFile {
        file_id: "bankbook_20250315_142501_0123456789abcdef.png".to_string(),
        path: "uploads/images/bankbook_20250315_142501_0123456789abcdef.png".to_string(),
        original_filename: "bankbook.png".to_string(),
        mime_type: "image/png".to_string(),
        size_bytes: 1024,
        category: FileCategory::Image,
        created_at: Utc::now(),
    }
}

/// A validated request; transfer and advance get a bankbook reference.
pub fn payment_request(method: &str, amounts: &[i64]) -> PaymentRequest {
    let input = submission(method, amounts);
    let fields = validate_submission(&input, true).unwrap();
    let bankbook = fields
        .payment_method
        .requires_bankbook()
        .then(bankbook_file);
    PaymentRequestBuilder::new(fields)
        .bankbook_image(bankbook)
        .build()
        .unwrap()
}

/// One part of a hand-built multipart/form-data body.
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: Vec<u8>,
}

pub const BOUNDARY: &str = "----request-payment-test-boundary";

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(filename) = part.filename {
            disposition.push_str(&format!("; filename=\"{}\"", filename));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn metadata_part(submission: &RequestFormSubmission) -> Part<'static> {
    Part {
        name: "metadata",
        filename: None,
        content_type: Some("application/json"),
        data: serde_json::to_vec(submission).unwrap(),
    }
}

pub fn image_part(
    data: Vec<u8>,
    filename: &'static str,
    content_type: &'static str,
) -> Part<'static> {
    Part {
        name: "bank_book_image",
        filename: Some(filename),
        content_type: Some(content_type),
        data,
    }
}
