//! Generator for the payment request form (請款單).

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

use super::common::download_filename;
use super::engine::{RenderAsset, TypstRenderEngine};
use super::fonts::FontSet;
use super::layout::{self, DocumentLayout, LayoutOptions, BANKBOOK_ASSET, LOGO_ASSET};
use super::traits::Generator;
use super::typst::to_markup;
use super::{GeneratedDocument, RenderError};
use crate::config::AppConfig;
use crate::request_form::models::PaymentRequest;

/// A request to render plus the bytes of its bankbook image, read from
/// storage beforehand so rendering does no storage I/O.
#[derive(Debug, Clone)]
pub struct RenderInput {
    pub request: PaymentRequest,
    pub bankbook: Option<Vec<u8>>,
}

impl RenderInput {
    pub fn new(request: PaymentRequest) -> Self {
        Self {
            request,
            bankbook: None,
        }
    }

    pub fn with_bankbook(mut self, data: Vec<u8>) -> Self {
        self.bankbook = Some(data);
        self
    }
}

/// Renders payment requests to PDF. Holds no per-request state, so one
/// instance is shared by all workers.
#[derive(Debug, Clone)]
pub struct PaymentRequestPdf {
    engine: TypstRenderEngine,
    font_path: PathBuf,
    font_family: String,
    logo_path: Option<PathBuf>,
}

impl PaymentRequestPdf {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            engine: TypstRenderEngine::new(&config.typst_bin, config.temp_dir()),
            font_path: config.font_path.clone(),
            font_family: config.font_family.clone(),
            logo_path: config.logo_path.clone(),
        }
    }

    pub fn engine(&self) -> &TypstRenderEngine {
        &self.engine
    }

    /// Check the configured font without rendering anything.
    pub fn fonts(&self) -> Result<FontSet, RenderError> {
        FontSet::resolve(&self.font_path, &self.font_family)
    }

    fn layout_with_logo(
        &self,
        request: &PaymentRequest,
        logo: Option<&RenderAsset>,
    ) -> DocumentLayout {
        let options = LayoutOptions {
            font_family: self.font_family.clone(),
            logo_extension: logo.and_then(|asset| {
                Path::new(&asset.name)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(str::to_string)
            }),
        };
        layout::build(request, &options)
    }

    /// A missing or unreadable logo only drops the logo from the header.
    fn load_logo(&self) -> Option<RenderAsset> {
        let path = self.logo_path.as_ref()?;
        let extension = path.extension().and_then(|e| e.to_str())?;

        match fs::read(path) {
            Ok(data) => Some(RenderAsset {
                name: layout::asset_name(LOGO_ASSET, extension),
                data,
            }),
            Err(e) => {
                log::warn!("Logo {} not loaded: {}", path.display(), e);
                None
            }
        }
    }
}

impl Generator<RenderInput> for PaymentRequestPdf {
    fn generate(&self, input: RenderInput) -> Result<GeneratedDocument, RenderError> {
        let fonts = self.fonts()?;
        let request = &input.request;

        let logo = self.load_logo();
        let layout = self.layout_with_logo(request, logo.as_ref());
        let markup = to_markup(&layout);

        let mut assets: Vec<RenderAsset> = logo.into_iter().collect();
        if let Some(file) = request.bankbook_image() {
            let data = input
                .bankbook
                .ok_or_else(|| RenderError::MissingAsset(file.file_id.clone()))?;
            assets.push(RenderAsset {
                name: layout::asset_name(BANKBOOK_ASSET, file.extension()),
                data,
            });
        }

        let pdf = self.engine.render(&markup, &fonts, &assets)?;

        Ok(GeneratedDocument {
            filename: download_filename(Local::now()),
            pdf,
            page_count: layout.pages.len(),
        })
    }
}

// Inherent impl for ease of use
impl PaymentRequestPdf {
    pub fn generate(&self, input: RenderInput) -> Result<GeneratedDocument, RenderError> {
        Generator::generate(self, input)
    }
}
