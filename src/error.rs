//! Error taxonomy shared by every layer of the request pipeline.
//!
//! Subsystems raise their own `thiserror` enums; they all fold into
//! [`RequestError`], which knows its [`ErrorKind`], its HTTP status and how to
//! render itself as an [`ErrorResponse`].

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::pdf::RenderError;
use crate::request_form::multipart_parser::MultipartParseError;
use crate::request_form::validation::ValidationErrors;
use crate::storage::StorageError;

/// Caller-visible classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ErrorKind {
    InvalidFormat,
    InvalidEnumValue,
    InvalidAmount,
    MissingField,
    MissingAttachment,
    UnsupportedFileType,
    FileTooLarge,
    FontUnavailable,
    InvalidRequestState,
    NotFound,
    BadRequest,
    StorageFailed,
    RenderFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "InvalidFormat",
            Self::InvalidEnumValue => "InvalidEnumValue",
            Self::InvalidAmount => "InvalidAmount",
            Self::MissingField => "MissingField",
            Self::MissingAttachment => "MissingAttachment",
            Self::UnsupportedFileType => "UnsupportedFileType",
            Self::FileTooLarge => "FileTooLarge",
            Self::FontUnavailable => "FontUnavailable",
            Self::InvalidRequestState => "InvalidRequestState",
            Self::NotFound => "NotFound",
            Self::BadRequest => "BadRequest",
            Self::StorageFailed => "StorageFailed",
            Self::RenderFailed => "RenderFailed",
        }
    }

    /// Kinds produced by checking submitted field values.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat
                | Self::InvalidEnumValue
                | Self::InvalidAmount
                | Self::MissingField
                | Self::MissingAttachment
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            kind if kind.is_validation() => StatusCode::BAD_REQUEST,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::UnsupportedFileType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field-level problem inside an [`ErrorResponse`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub field: String,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(kind: ErrorKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_string(),
            details: Vec::new(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_details(mut self, details: Vec<ErrorDetail>) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Multipart(#[from] MultipartParseError),
    #[error("invalid request state: {0}")]
    InvalidRequestState(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
}

impl From<ValidationErrors> for RequestError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl RequestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(errors) => errors.kind(),
            Self::Storage(e) => e.kind(),
            Self::Render(e) => e.kind(),
            Self::Multipart(e) => e.kind(),
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::InvalidRequestState(_) => ErrorKind::InvalidRequestState,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let response = ErrorResponse::new(self.kind(), &self.to_string());
        match self {
            Self::Validation(errors) => response.with_details(errors.details()),
            _ => response,
        }
    }
}

impl ResponseError for RequestError {
    fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    fn error_response(&self) -> HttpResponse {
        match self.kind() {
            ErrorKind::FontUnavailable => {
                log::error!("OPERATOR ALERT: PDF font unavailable, rendering is disabled: {}", self)
            }
            kind if kind.status_code().is_server_error() => {
                log::error!("Request failed ({}): {}", kind, self)
            }
            kind => log::warn!("Request rejected ({}): {}", kind, self),
        }
        HttpResponse::build(self.status_code()).json(self.to_response())
    }
}
