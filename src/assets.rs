//! Asset root layout and the flag-color catalog.
//!
//! ```text
//! <root>/fonts/             font files named by the font tables
//! <root>/images/<country>/  background photos, optionally under <root>/images/<word>/
//! <root>/flag_colors.json   { "United_States": ["#B22234", "#FFFFFF", "#3C3B6E"] }
//! <root>/translations.json  { "hello": { "en": "Hello", "es": "Hola" } }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde_json::json;
use tracing::{debug, warn};

use crate::color::Rgb;
use crate::error_codes::{CodedError, ErrorCode};
use crate::font_assets::FONTS_DIR_REL;
use crate::tables::country_for_lang;

pub const IMAGES_DIR_REL: &str = "images";
pub const FLAG_COLORS_FILE: &str = "flag_colors.json";
pub const TRANSLATIONS_FILE: &str = "translations.json";
pub const GLOBAL_COUNTRY: &str = "global";

#[derive(Debug, Clone)]
pub struct AssetRoot {
    root: PathBuf,
}

impl AssetRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn fonts_dir(&self) -> PathBuf {
        self.root.join(FONTS_DIR_REL)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR_REL)
    }

    pub fn flag_colors_path(&self) -> PathBuf {
        self.root.join(FLAG_COLORS_FILE)
    }

    pub fn translations_path(&self) -> PathBuf {
        self.root.join(TRANSLATIONS_FILE)
    }
}

/// Parses `#RRGGBB`, `RRGGBB`, or the three-digit shorthand.
pub fn hex_to_rgb(raw: &str) -> Result<Rgb> {
    let digits = raw.trim().trim_start_matches('#');
    let expanded = match digits.len() {
        3 => digits.chars().flat_map(|ch| [ch, ch]).collect::<String>(),
        6 => digits.to_owned(),
        _ => return Err(invalid_hex(raw)),
    };
    let channel = |offset: usize| {
        expanded
            .get(offset..offset + 2)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
            .ok_or_else(|| invalid_hex(raw))
    };
    Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
}

fn invalid_hex(raw: &str) -> anyhow::Error {
    anyhow!(
        CodedError::new(ErrorCode::InvalidHexColor, format!("invalid hex color '{raw}'"))
            .with_details(json!({ "provided": raw }))
    )
}

/// Country → flag stripe colors, keyed by title-cased folder name
/// (`united_states` → `United_States`).
#[derive(Debug, Clone, Default)]
pub struct FlagCatalog {
    flags: HashMap<String, Vec<Rgb>>,
}

impl FlagCatalog {
    /// A missing file yields an empty catalog; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            debug!(path = %path.display(), "no flag color catalog");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read flag colors {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("failed to parse flag colors {}", path.display()))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(contents)?;
        let mut flags = HashMap::with_capacity(raw.len());
        for (country, hexes) in raw {
            let colors = hexes
                .iter()
                .map(|hex| hex_to_rgb(hex))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("bad color for flag '{country}'"))?;
            flags.insert(country, colors);
        }
        Ok(Self { flags })
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Stripe colors for the country of `lang`; empty when unknown.
    pub fn colors_for_lang(&self, lang: &str) -> Vec<Rgb> {
        let country = country_for_lang(lang).unwrap_or(GLOBAL_COUNTRY);
        let key = flag_key(country);
        match self.flags.get(&key) {
            Some(colors) => colors.clone(),
            None => {
                warn!(lang, country = %key, "no flag colors, using white");
                Vec::new()
            }
        }
    }
}

/// `south_korea` → `South_Korea`.
pub fn flag_key(country: &str) -> String {
    country
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("_")
}
