//! The loaded font set.
//!
//! Every face that finished downloading (or was found in a local font
//! directory) lives here. Its size is what the readiness detector watches,
//! and the renderer picks faces out of it by family and style.

use ab_glyph::FontArc;
use std::path::Path;
use std::sync::RwLock;

use crate::error::CardError;

/// Generic CSS families. They never name a loaded face, so they resolve to
/// the fallback face.
const GENERIC_FAMILIES: &[&str] = &[
    "sans-serif",
    "serif",
    "monospace",
    "cursive",
    "fantasy",
    "system-ui",
];

/// One loaded font file.
#[derive(Clone)]
pub struct FontFace {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
    pub font: FontArc,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("family", &self.family)
            .field("bold", &self.bold)
            .field("italic", &self.italic)
            .finish()
    }
}

/// Thread-safe set of loaded faces.
#[derive(Debug, Default)]
pub struct FontRegistry {
    faces: RwLock<Vec<FontFace>>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of loaded faces.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&self, face: FontFace) {
        let mut faces = self.faces.write().unwrap_or_else(|e| e.into_inner());
        faces.push(face);
    }

    /// Parse font file bytes and add the face.
    pub fn add_bytes(
        &self,
        family: &str,
        bold: bool,
        italic: bool,
        bytes: Vec<u8>,
    ) -> Result<(), CardError> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| CardError::Font(format!("{} is not a usable font: {}", family, e)))?;
        self.add(FontFace {
            family: family.to_string(),
            bold,
            italic,
            font,
        });
        Ok(())
    }

    /// Load every `.ttf`/`.otf` file in `dir`.
    ///
    /// Family and style come from the file name (`Roboto-BoldItalic.ttf`
    /// is family `Roboto`, bold, italic). Unparsable files are skipped.
    pub fn load_dir(&self, dir: &Path) -> Result<usize, CardError> {
        let mut loaded = 0;
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"))
            })
            .collect();
        paths.sort();

        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let (family, bold, italic) = style_from_file_stem(stem);
            let bytes = std::fs::read(&path)?;
            match self.add_bytes(&family, bold, italic, bytes) {
                Ok(()) => loaded += 1,
                Err(e) => eprintln!("[fonts] Skipping {}: {}", path.display(), e),
            }
        }
        Ok(loaded)
    }

    /// Loaded family names, deduplicated and sorted.
    pub fn families(&self) -> Vec<String> {
        let mut families: Vec<String> = self.read().iter().map(|f| f.family.clone()).collect();
        families.sort();
        families.dedup();
        families
    }

    /// Pick the face for a family and style.
    ///
    /// Within a family the face with the most matching style flags wins
    /// (italic counts more than bold). An unknown or generic family falls
    /// back to the first family in sorted order.
    pub fn select(&self, family: &str, bold: bool, italic: bool) -> Option<FontFace> {
        let faces = self.read();
        let wanted = family.trim().trim_matches(|c| c == '"' || c == '\'');

        let is_generic = GENERIC_FAMILIES.iter().any(|g| g.eq_ignore_ascii_case(wanted));
        let family = if !is_generic && faces.iter().any(|f| f.family.eq_ignore_ascii_case(wanted)) {
            wanted.to_string()
        } else {
            faces.iter().map(|f| f.family.clone()).min()?
        };

        faces
            .iter()
            .filter(|f| f.family.eq_ignore_ascii_case(&family))
            .max_by_key(|f| {
                let italic_match = (f.italic == italic) as u8;
                let bold_match = (f.bold == bold) as u8;
                italic_match * 2 + bold_match
            })
            .cloned()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<FontFace>> {
        self.faces.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Split a font file stem like `Open Sans-SemiBoldItalic` into family and style.
fn style_from_file_stem(stem: &str) -> (String, bool, bool) {
    let (family, style) = match stem.rsplit_once('-') {
        Some((family, style)) if !family.is_empty() => (family, style),
        _ => (stem, ""),
    };
    let style = style.to_ascii_lowercase();
    let bold = style.contains("bold") || style.contains("black") || style.contains("heavy");
    let italic = style.contains("italic") || style.contains("oblique");
    (family.to_string(), bold, italic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_from_file_stem() {
        assert_eq!(
            style_from_file_stem("Roboto-BoldItalic"),
            ("Roboto".to_string(), true, true)
        );
        assert_eq!(
            style_from_file_stem("Open Sans-Regular"),
            ("Open Sans".to_string(), false, false)
        );
        assert_eq!(
            style_from_file_stem("Lobster"),
            ("Lobster".to_string(), false, false)
        );
        assert_eq!(
            style_from_file_stem("Inter-SemiBold"),
            ("Inter".to_string(), true, false)
        );
    }

    #[test]
    fn test_empty_registry() {
        let registry = FontRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.families().is_empty());
        assert!(registry.select("sans-serif", false, false).is_none());
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let registry = FontRegistry::new();
        let err = registry.add_bytes("Broken", false, false, b"not a font".to_vec());
        assert!(matches!(err, Err(CardError::Font(_))));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_load_missing_dir_is_io_error() {
        let registry = FontRegistry::new();
        let err = registry.load_dir(Path::new("/definitely/not/here"));
        assert!(matches!(err, Err(CardError::Io(_))));
    }
}
