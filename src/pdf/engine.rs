//! Typst rendering engine.
//!
//! Handles the low-level details of writing Typst source and image assets to
//! a private workspace, invoking the compiler, and collecting the output PDF.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use super::fonts::FontSet;
use super::RenderError;

const SOURCE_FILENAME: &str = "request.typ";
const OUTPUT_FILENAME: &str = "request.pdf";

/// A file placed next to the Typst source so the markup can reference it by name.
#[derive(Debug, Clone)]
pub struct RenderAsset {
    pub name: String,
    pub data: Vec<u8>,
}

/// Engine for compiling Typst markup to PDF with the `typst` CLI.
///
/// Every call gets its own temporary directory under `workspace_root`, so
/// concurrent renders never share intermediate files. The directory is
/// removed when the call returns, whether or not compilation succeeded.
#[derive(Debug, Clone)]
pub struct TypstRenderEngine {
    binary: PathBuf,
    workspace_root: PathBuf,
}

impl TypstRenderEngine {
    pub fn new(binary: impl Into<PathBuf>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            workspace_root: workspace_root.into(),
        }
    }

    /// Whether the configured `typst` binary can be executed.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    /// Render Typst source to PDF bytes.
    ///
    /// # Arguments
    /// * `typst_source` - The complete Typst source.
    /// * `fonts` - Font directory passed with `--font-path`.
    /// * `assets` - Images the source references by file name.
    pub fn render(
        &self,
        typst_source: &str,
        fonts: &FontSet,
        assets: &[RenderAsset],
    ) -> Result<Vec<u8>, RenderError> {
        fs::create_dir_all(&self.workspace_root).map_err(RenderError::TempDir)?;
        // typst runs inside the workspace, so every path handed to it is absolute.
        let root = fs::canonicalize(&self.workspace_root).map_err(RenderError::TempDir)?;
        let temp_dir = tempfile::Builder::new()
            .prefix("render-")
            .tempdir_in(&root)
            .map_err(RenderError::TempDir)?;

        fs::write(temp_dir.path().join(SOURCE_FILENAME), typst_source)
            .map_err(RenderError::WriteTypst)?;

        for asset in assets {
            let name = Path::new(&asset.name)
                .file_name()
                .ok_or_else(|| RenderError::MissingAsset(asset.name.clone()))?;
            fs::write(temp_dir.path().join(name), &asset.data).map_err(RenderError::WriteAsset)?;
        }

        let pdf = self.compile_typst_to_pdf(&temp_dir, fonts.dir())?;
        if !pdf.starts_with(b"%PDF") {
            return Err(RenderError::InvalidOutput);
        }

        log::debug!(
            "Rendered {} bytes of PDF in {}",
            pdf.len(),
            temp_dir.path().display()
        );
        Ok(pdf)
    }

    /// Compile the workspace source file to PDF.
    fn compile_typst_to_pdf(
        &self,
        temp_dir: &TempDir,
        font_dir: &Path,
    ) -> Result<Vec<u8>, RenderError> {
        let typ_path = temp_dir.path().join(SOURCE_FILENAME);
        let output_path = temp_dir.path().join(OUTPUT_FILENAME);

        let output = Command::new(&self.binary)
            .arg("compile")
            .arg("--font-path")
            .arg(font_dir)
            .arg("--ignore-system-fonts")
            .arg(&typ_path)
            .arg(&output_path)
            .current_dir(temp_dir.path())
            .output()
            .map_err(RenderError::TypstIo)?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log::error!("typst compile failed with status {}: {}", code, stderr);
            return Err(RenderError::TypstExit { code, stderr });
        }

        fs::read(&output_path).map_err(RenderError::ReadPdf)
    }
}
