//! PDF rendering of payment requests.
//!
//! A [`PaymentRequest`](crate::request_form::models::PaymentRequest) is first
//! turned into a declarative [`layout::DocumentLayout`], the layout is written
//! out as Typst markup, and the markup is compiled by the `typst` CLI.

pub mod common;
pub mod engine;
pub mod fonts;
pub mod generator;
pub mod layout;
pub mod traits;
pub mod typst;

pub use engine::TypstRenderEngine;
pub use fonts::FontSet;
pub use generator::{PaymentRequestPdf, RenderInput};
pub use layout::DocumentLayout;
pub use traits::Generator;

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during document generation.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("font unavailable at {path}: {reason}")]
    FontUnavailable { path: PathBuf, reason: String },
    #[error("missing render asset: {0}")]
    MissingAsset(String),
    #[error("failed to create render workspace: {0}")]
    TempDir(#[source] std::io::Error),
    #[error("failed to write Typst source: {0}")]
    WriteTypst(#[source] std::io::Error),
    #[error("failed to write render asset: {0}")]
    WriteAsset(#[source] std::io::Error),
    #[error("Typst CLI execution failed: {0}")]
    TypstIo(#[source] std::io::Error),
    #[error("Typst CLI exited with status {code}: {stderr}")]
    TypstExit { code: i32, stderr: String },
    #[error("failed to read generated PDF: {0}")]
    ReadPdf(#[source] std::io::Error),
    #[error("Typst produced output without a PDF header")]
    InvalidOutput,
    #[error("render task failed: {0}")]
    Blocking(String),
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FontUnavailable { .. } => ErrorKind::FontUnavailable,
            Self::MissingAsset(_) => ErrorKind::InvalidRequestState,
            _ => ErrorKind::RenderFailed,
        }
    }
}

/// Result of a successful document generation.
#[derive(Debug)]
pub struct GeneratedDocument {
    pub filename: String,
    pub pdf: Vec<u8>,
    pub page_count: usize,
}
