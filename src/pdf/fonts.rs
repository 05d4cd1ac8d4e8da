//! Lookup of the CJK font the form is typeset with.

use std::path::{Path, PathBuf};

use ttf_parser::{name_id, Face};

use super::layout::{
    BANKBOOK_TITLE, DETAILS_HEADING, FORM_TITLE, ITEM_COLUMNS, RECEIPT_TITLE, SERIAL_LABEL,
    SIGNATURE_ROLES,
};
use super::RenderError;

/// A font file that parses, carries the configured family and covers the
/// printed labels of the form.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSet {
    pub family: String,
    pub path: PathBuf,
}

impl FontSet {
    /// Load `path` and check it provides `family` with every glyph the fixed
    /// labels need.
    pub fn resolve(path: &Path, family: &str) -> Result<Self, RenderError> {
        let unavailable = |reason: String| RenderError::FontUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let data = std::fs::read(path).map_err(|e| unavailable(e.to_string()))?;
        let face_count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);

        let mut last_problem = "no font faces found".to_string();
        for index in 0..face_count {
            let face = match Face::parse(&data, index) {
                Ok(face) => face,
                Err(e) => {
                    last_problem = format!("not a TrueType or OpenType font: {}", e);
                    continue;
                }
            };

            let names = family_names(&face);
            if !names.iter().any(|name| name.eq_ignore_ascii_case(family)) {
                last_problem = format!(
                    "family '{}' not in font (found {})",
                    family,
                    if names.is_empty() {
                        "no family name".to_string()
                    } else {
                        names.join(", ")
                    }
                );
                continue;
            }

            if let Some(missing) = missing_glyphs(&face) {
                return Err(unavailable(format!(
                    "family '{}' lacks glyphs for: {}",
                    family, missing
                )));
            }

            let path = std::fs::canonicalize(path).map_err(|e| unavailable(e.to_string()))?;
            return Ok(Self {
                family: family.to_string(),
                path,
            });
        }

        Err(unavailable(last_problem))
    }

    /// Directory handed to `typst --font-path`.
    pub fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

/// Legacy and typographic family names, the ones typst matches on.
fn family_names(face: &Face<'_>) -> Vec<String> {
    let mut names: Vec<String> = face
        .names()
        .into_iter()
        .filter(|name| {
            name.name_id == name_id::FAMILY || name.name_id == name_id::TYPOGRAPHIC_FAMILY
        })
        .filter_map(|name| name.to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}

fn required_labels() -> impl Iterator<Item = &'static str> {
    [FORM_TITLE, DETAILS_HEADING, RECEIPT_TITLE, BANKBOOK_TITLE, SERIAL_LABEL]
        .into_iter()
        .chain(ITEM_COLUMNS)
        .chain(SIGNATURE_ROLES)
}

/// Label characters the face has no glyph for, or `None` when all are covered.
fn missing_glyphs(face: &Face<'_>) -> Option<String> {
    let mut missing: Vec<char> = required_labels()
        .flat_map(str::chars)
        .filter(|c| c.is_alphanumeric())
        .filter(|c| face.glyph_index(*c).is_none())
        .collect();
    missing.sort_unstable();
    missing.dedup();

    (!missing.is_empty()).then(|| missing.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    /// Latin-only fonts commonly present on Linux hosts.
    const LATIN_FONTS: [(&str, &str); 2] = [
        ("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf", "DejaVu Sans"),
        ("/usr/share/fonts/TTF/DejaVuSans.ttf", "DejaVu Sans"),
    ];

    fn latin_font() -> Option<(PathBuf, &'static str)> {
        LATIN_FONTS
            .iter()
            .map(|(path, family)| (PathBuf::from(path), *family))
            .find(|(path, _)| path.is_file())
    }

    #[test]
    fn test_missing_font_is_unavailable() {
        let err = FontSet::resolve(Path::new("/nonexistent/edukai.ttf"), "TW-Kai").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FontUnavailable);
    }

    #[test]
    fn test_non_font_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.ttf");
        std::fs::write(&path, b"<html>not a font</html>").unwrap();

        let err = FontSet::resolve(&path, "TW-Kai").unwrap_err();
        assert!(matches!(err, RenderError::FontUnavailable { .. }));
    }

    #[test]
    fn test_truncated_truetype_header_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kai.ttf");
        std::fs::write(&path, [0x00, 0x01, 0x00, 0x00, 0xde, 0xad]).unwrap();

        let err = FontSet::resolve(&path, "NoSuchFamily").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FontUnavailable);
    }

    #[test]
    fn test_latin_font_lacks_form_glyphs() {
        let Some((path, family)) = latin_font() else {
            eprintln!("skipping: no DejaVu Sans on this host");
            return;
        };

        let err = FontSet::resolve(&path, family).unwrap_err();
        match err {
            RenderError::FontUnavailable { reason, .. } => {
                assert!(reason.contains("lacks glyphs"), "{}", reason);
                assert!(reason.contains('請'), "{}", reason);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unknown_family_is_unavailable() {
        let Some((path, _)) = latin_font() else {
            eprintln!("skipping: no DejaVu Sans on this host");
            return;
        };

        let err = FontSet::resolve(&path, "TW-Kai").unwrap_err();
        match err {
            RenderError::FontUnavailable { reason, .. } => {
                assert!(reason.contains("family 'TW-Kai' not in font"), "{}", reason);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_configured_font_resolves() {
        let Ok(path) = std::env::var("TEST_FONT_PATH").map(PathBuf::from) else {
            eprintln!("skipping: TEST_FONT_PATH not set");
            return;
        };
        let family = std::env::var("TEST_FONT_FAMILY").unwrap_or_else(|_| "TW-Kai".to_string());

        let fonts = FontSet::resolve(&path, &family).unwrap();
        assert_eq!(fonts.family, family);
        assert_eq!(fonts.dir(), std::fs::canonicalize(path.parent().unwrap()).unwrap());

        let err = FontSet::resolve(&path, "NoSuchFamily").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FontUnavailable);
    }
}
