use actix_multipart::{Field, Multipart};
use futures_util::StreamExt;
use sanitize_filename::sanitize;

use super::models::RequestFormSubmission;
use crate::error::ErrorKind;
use crate::storage::Upload;

/// Form part carrying the JSON-encoded submission.
pub const METADATA_FIELD: &str = "metadata";
/// Form parts accepted as the bankbook image.
pub const FILE_FIELDS: [&str; 2] = ["bank_book_image", "file"];

#[derive(Debug)]
pub struct ParsedSubmission {
    pub metadata: RequestFormSubmission,
    pub file: Option<Upload>,
}

#[derive(Debug, thiserror::Error)]
pub enum MultipartParseError {
    #[error("Multipart field error: {0}")]
    FieldError(String),
    #[error("Invalid metadata: {0}")]
    MetadataError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Invalid UTF-8 data: {0}")]
    Utf8Error(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Part '{field}' exceeds {limit} bytes")]
    TooLarge { field: String, limit: u64 },
}

impl MultipartParseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TooLarge { .. } => ErrorKind::FileTooLarge,
            Self::MetadataError(_) => ErrorKind::MissingField,
            _ => ErrorKind::BadRequest,
        }
    }
}

pub struct MultipartParser;

impl MultipartParser {
    /// Parse a submission made of a `metadata` JSON part and an optional
    /// bankbook image part. File parts are read up to `max_file_bytes`.
    pub async fn parse_submission_multipart(
        mut multipart: Multipart,
        max_file_bytes: u64,
    ) -> Result<ParsedSubmission, MultipartParseError> {
        let mut metadata: Option<RequestFormSubmission> = None;
        let mut file: Option<Upload> = None;

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| MultipartParseError::FieldError(e.to_string()))?;
            let name = field_name(&field)?;

            if name == METADATA_FIELD {
                let buffer = read_field(&mut field, &name, MAX_METADATA_BYTES).await?;
                let metadata_str = String::from_utf8(buffer)
                    .map_err(|e| MultipartParseError::Utf8Error(e.to_string()))?;

                let parsed: RequestFormSubmission = serde_json::from_str(&metadata_str)
                    .map_err(|e| MultipartParseError::SerializationError(e.to_string()))?;
                metadata = Some(parsed);
            } else if FILE_FIELDS.contains(&name.as_str()) {
                let upload = read_upload(&mut field, &name, max_file_bytes).await?;
                // An empty file input is the same as no file.
                if !upload.data.is_empty() {
                    file = Some(upload);
                }
            } else {
                log::debug!("Ignoring unexpected multipart field '{}'", name);
                drain(&mut field).await?;
            }
        }

        let metadata = metadata.ok_or_else(|| {
            MultipartParseError::MetadataError(format!("missing '{}' part", METADATA_FIELD))
        })?;

        Ok(ParsedSubmission { metadata, file })
    }

    /// Parse a single-file upload sent as the `file` part.
    pub async fn parse_file_multipart(
        mut multipart: Multipart,
        max_file_bytes: u64,
    ) -> Result<Upload, MultipartParseError> {
        let mut file: Option<Upload> = None;

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| MultipartParseError::FieldError(e.to_string()))?;
            let name = field_name(&field)?;

            if FILE_FIELDS.contains(&name.as_str()) && file.is_none() {
                file = Some(read_upload(&mut field, &name, max_file_bytes).await?);
            } else {
                drain(&mut field).await?;
            }
        }

        match file {
            Some(upload) if !upload.data.is_empty() => Ok(upload),
            _ => Err(MultipartParseError::FieldError("No file uploaded".to_string())),
        }
    }
}

const MAX_METADATA_BYTES: u64 = 256 * 1024;

fn field_name(field: &Field) -> Result<String, MultipartParseError> {
    let content_disposition = field.content_disposition().ok_or_else(|| {
        MultipartParseError::FieldError("Content disposition not found".to_string())
    })?;
    content_disposition
        .get_name()
        .map(str::to_string)
        .ok_or_else(|| MultipartParseError::FieldError("Field name not found".to_string()))
}

async fn read_upload(
    field: &mut Field,
    name: &str,
    max_bytes: u64,
) -> Result<Upload, MultipartParseError> {
    let filename = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .map(sanitize)
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| format!("{}.dat", name));
    let content_type = field
        .content_type()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let data = read_field(field, name, max_bytes).await?;

    Ok(Upload {
        data,
        filename,
        content_type,
    })
}

async fn read_field(
    field: &mut Field,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, MultipartParseError> {
    let mut buffer = Vec::new();
    while let Some(chunk) = field.next().await {
        let data_chunk = chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
        if (buffer.len() + data_chunk.len()) as u64 > max_bytes {
            return Err(MultipartParseError::TooLarge {
                field: name.to_string(),
                limit: max_bytes,
            });
        }
        buffer.extend_from_slice(&data_chunk);
    }
    Ok(buffer)
}

async fn drain(field: &mut Field) -> Result<(), MultipartParseError> {
    while let Some(chunk) = field.next().await {
        chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
    }
    Ok(())
}
