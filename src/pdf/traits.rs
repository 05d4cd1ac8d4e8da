//! Traits for generator system standardization.

use super::{GeneratedDocument, RenderError};

/// Trait for document generators.
pub trait Generator<Req> {
    /// Generate a document from the request.
    fn generate(&self, request: Req) -> Result<GeneratedDocument, RenderError>;
}
