//! Script-aware font resolution and font loading.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use fontdue::{Font, FontSettings};
use tracing::debug;

use crate::tables::{
    font_file_for_lang, is_safe_for_broad_font, BROAD_GENERIC_FONT, GENERIC_FONTS, SCRIPT_RANGES,
};

pub const FONTS_DIR_REL: &str = "fonts";

/// Why a font was picked. Reported by the font audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSource {
    Language,
    Script(&'static str),
    Preferred,
    Generic,
}

impl FontSource {
    pub fn label(&self) -> String {
        match self {
            Self::Language => "language".to_owned(),
            Self::Script(script) => format!("script:{script}"),
            Self::Preferred => "preferred".to_owned(),
            Self::Generic => "generic".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFont {
    pub path: PathBuf,
    pub source: FontSource,
}

/// Maps a language hint and the text's codepoints to a font file under one
/// fonts directory.
#[derive(Debug, Clone)]
pub struct FontResolver {
    fonts_dir: PathBuf,
}

impl FontResolver {
    pub fn new(fonts_dir: impl Into<PathBuf>) -> Self {
        Self {
            fonts_dir: fonts_dir.into(),
        }
    }

    pub fn resolve(&self, lang: &str, text: &str, preferred: Option<&Path>) -> Option<PathBuf> {
        self.resolve_detailed(lang, text, preferred)
            .map(|resolved| resolved.path)
    }

    /// Resolution order: language table, script scan, preferred font,
    /// generic fallbacks. `None` means nothing on disk can render `text`.
    pub fn resolve_detailed(
        &self,
        lang: &str,
        text: &str,
        preferred: Option<&Path>,
    ) -> Option<ResolvedFont> {
        if let Some(file) = font_file_for_lang(lang) {
            let path = self.fonts_dir.join(file);
            if path.is_file() {
                return Some(ResolvedFont {
                    path,
                    source: FontSource::Language,
                });
            }
        }

        for range in SCRIPT_RANGES {
            if !text.chars().any(|ch| range.contains(ch)) {
                continue;
            }
            let path = self.fonts_dir.join(range.font_file);
            if path.is_file() {
                return Some(ResolvedFont {
                    path,
                    source: FontSource::Script(range.script),
                });
            }
        }

        if let Some(preferred) = preferred {
            if preferred.is_file() && !is_broad_generic(preferred) {
                return Some(ResolvedFont {
                    path: preferred.to_path_buf(),
                    source: FontSource::Preferred,
                });
            }
        }

        for file in GENERIC_FONTS {
            let path = self.fonts_dir.join(file);
            if !path.is_file() {
                continue;
            }
            if *file == BROAD_GENERIC_FONT && needs_special_font(text) {
                debug!(text, "skipping broad generic font for out-of-coverage text");
                continue;
            }
            return Some(ResolvedFont {
                path,
                source: FontSource::Generic,
            });
        }

        None
    }
}

fn is_broad_generic(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name == BROAD_GENERIC_FONT)
}

/// `true` when `text` has a codepoint the broad generic font would draw as
/// tofu.
pub fn needs_special_font(text: &str) -> bool {
    !text.chars().all(is_safe_for_broad_font)
}

/// A parsed font together with the file bytes the shaper reads its layout
/// tables from.
pub struct FontFace {
    font: Font,
    data: Vec<u8>,
}

impl FontFace {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let font = Font::from_bytes(data.as_slice(), FontSettings::default())
            .map_err(|error| anyhow!("{error}"))?;
        Ok(Self { font, data })
    }

    pub fn font(&self) -> &Font {
        &self.font
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Parsed fonts keyed by path, shared by every measurement and draw call of
/// a run.
#[derive(Default)]
pub struct FontCache {
    fonts: HashMap<PathBuf, FontFace>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: &Path) -> Result<&FontFace> {
        if !self.fonts.contains_key(path) {
            let face = load_font(path)?;
            self.fonts.insert(path.to_path_buf(), face);
        }
        self.fonts
            .get(path)
            .ok_or_else(|| anyhow!("font cache lost entry for {}", path.display()))
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

pub fn load_font(path: &Path) -> Result<FontFace> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read font file {}", path.display()))?;
    FontFace::from_bytes(bytes)
        .with_context(|| format!("failed to parse font {}", path.display()))
}

/// Codepoints of `text` the font has no glyph for, control characters
/// excluded.
pub fn missing_codepoints(font: &Font, text: &str) -> Vec<char> {
    let mut missing = text
        .chars()
        .filter(|ch| !ch.is_control() && !ch.is_whitespace())
        .filter(|&ch| font.lookup_glyph_index(ch) == 0)
        .collect::<Vec<_>>();
    missing.dedup();
    missing
}
