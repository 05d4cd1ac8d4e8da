//! Application configuration.
//!
//! Values come from the environment (optionally seeded from `.env`), each with
//! a default, and the resulting [`AppConfig`] is passed explicitly to the
//! services that need it.

use anyhow::Context;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
pub const DEFAULT_MAX_IMAGE_SIZE: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Content root for every stored file.
    pub upload_dir: PathBuf,
    pub images_subdir: String,
    pub temp_subdir: String,
    pub max_file_size: u64,
    pub max_image_size: u64,
    pub font_path: PathBuf,
    pub font_family: String,
    pub logo_path: Option<PathBuf>,
    pub typst_bin: PathBuf,
    pub request_ttl_secs: u64,
    pub cors_origins: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7860,
            upload_dir: PathBuf::from("uploads"),
            images_subdir: "images".to_string(),
            temp_subdir: "temp".to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
            font_path: PathBuf::from("fonts/edukai-5.0.ttf"),
            font_family: "TW-Kai".to_string(),
            logo_path: None,
            typst_bin: PathBuf::from("typst"),
            request_ttl_secs: 3600,
            cors_origins: "*".to_string(),
        }
    }
}

impl AppConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            images_subdir: env::var("IMAGES_DIR").unwrap_or(defaults.images_subdir),
            temp_subdir: env::var("TEMP_DIR").unwrap_or(defaults.temp_subdir),
            max_file_size: parse_var("MAX_FILE_SIZE", defaults.max_file_size)?,
            max_image_size: parse_var("MAX_IMAGE_SIZE", defaults.max_image_size)?,
            font_path: env::var("FONT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.font_path),
            font_family: env::var("FONT_FAMILY").unwrap_or(defaults.font_family),
            logo_path: env::var("LOGO_PATH").ok().map(PathBuf::from),
            typst_bin: env::var("TYPST_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.typst_bin),
            request_ttl_secs: parse_var("REQUEST_TTL_SECS", defaults.request_ttl_secs)?,
            cors_origins: env::var("CORS_ORIGINS").unwrap_or(defaults.cors_origins),
        })
    }

    /// Config rooted at `dir`, used by tests to keep uploads in a temp directory.
    pub fn with_upload_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            upload_dir: dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.upload_dir.join(&self.images_subdir)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.upload_dir.join(&self.temp_subdir)
    }

    pub fn cors_origins_list(&self) -> Vec<String> {
        if self.cors_origins.trim() == "*" {
            return vec!["*".to_string()];
        }
        self.cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Create the content root and its fixed subdirectories.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [self.upload_dir.clone(), self.images_dir(), self.temp_dir()] {
            std::fs::create_dir_all(&dir)?;
            log::debug!("Ensured directory exists: {}", dir.display());
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}
