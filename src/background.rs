//! Background selection: a country photo, a shared `global` photo, or a
//! random solid color, with a per-run set of identities already shown.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::imageops::{self, FilterType};
use image::{ImageReader, Rgb as Pixel, RgbImage};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::assets::GLOBAL_COUNTRY;
use crate::color::Rgb;
use crate::tables::country_for_lang;

/// Files at or below this size are treated as broken downloads.
pub const MIN_IMAGE_BYTES: u64 = 500;

/// A background bitmap and the identity recorded in the run's used set.
#[derive(Debug, Clone)]
pub struct BackgroundAsset {
    pub image: RgbImage,
    pub identity: String,
    pub kind: BackgroundKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundKind {
    Photo,
    Solid,
    /// The chosen photo could not be decoded; neutral gray stands in.
    Unreadable,
}

pub fn solid_identity(color: Rgb) -> String {
    format!("solid:{}", color.to_hex())
}

pub fn solid_background(width: u32, height: u32, color: Rgb) -> RgbImage {
    RgbImage::from_pixel(width, height, Pixel([color.r, color.g, color.b]))
}

pub struct BackgroundProvider {
    images_root: PathBuf,
    rng: StdRng,
}

impl BackgroundProvider {
    pub fn new(images_root: impl Into<PathBuf>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(images_root, rng)
    }

    pub fn with_rng(images_root: impl Into<PathBuf>, rng: StdRng) -> Self {
        Self {
            images_root: images_root.into(),
            rng,
        }
    }

    /// Image directory for a word: `<images>/<word>/` when it exists,
    /// otherwise the images root itself.
    pub fn theme_root(&self, word_context: Option<&str>) -> PathBuf {
        if let Some(word) = word_context.map(theme_key).filter(|key| !key.is_empty()) {
            let themed = self.images_root.join(&word);
            if themed.is_dir() {
                return themed;
            }
        }
        self.images_root.clone()
    }

    pub fn get(
        &mut self,
        lang: &str,
        size: (u32, u32),
        word_context: Option<&str>,
        used_images: &HashSet<String>,
    ) -> BackgroundAsset {
        let root = self.theme_root(word_context);
        let (width, height) = size;

        match self.pick_photo(&root, lang, used_images) {
            Some(path) => {
                let identity = path.display().to_string();
                match load_cover(&path, width, height) {
                    Ok(image) => {
                        debug!(lang, identity = %identity, "photo background");
                        BackgroundAsset {
                            image,
                            identity,
                            kind: BackgroundKind::Photo,
                        }
                    }
                    Err(error) => {
                        warn!(identity = %identity, "unreadable background image: {error:#}");
                        BackgroundAsset {
                            image: solid_background(width, height, Rgb::NEUTRAL_GRAY),
                            identity,
                            kind: BackgroundKind::Unreadable,
                        }
                    }
                }
            }
            None => {
                let color = Rgb::new(self.rng.random(), self.rng.random(), self.rng.random());
                let identity = solid_identity(color);
                debug!(lang, identity = %identity, "no photo available, solid background");
                BackgroundAsset {
                    image: solid_background(width, height, color),
                    identity,
                    kind: BackgroundKind::Solid,
                }
            }
        }
    }

    fn pick_photo(
        &mut self,
        root: &Path,
        lang: &str,
        used_images: &HashSet<String>,
    ) -> Option<PathBuf> {
        if let Some(country) = country_for_lang(lang) {
            let unused = candidate_images(&root.join(country))
                .into_iter()
                .filter(|path| !used_images.contains(&path.display().to_string()))
                .collect::<Vec<_>>();
            if let Some(path) = unused.choose(&mut self.rng) {
                return Some(path.clone());
            }
        }

        let global = candidate_images(&root.join(GLOBAL_COUNTRY));
        let unused = global
            .iter()
            .filter(|path| !used_images.contains(&path.display().to_string()))
            .cloned()
            .collect::<Vec<_>>();
        if let Some(path) = unused.choose(&mut self.rng) {
            return Some(path.clone());
        }
        if !global.is_empty() {
            debug!("global backgrounds exhausted, reusing");
        }
        global.choose(&mut self.rng).cloned()
    }
}

/// `"Hello!"` → `"hello"`.
pub fn theme_key(word: &str) -> String {
    word.trim()
        .to_lowercase()
        .trim_matches(|ch| ch == '!' || ch == '.')
        .to_owned()
}

/// Image files in `dir` larger than [`MIN_IMAGE_BYTES`], sorted by path so a
/// seeded choice is reproducible.
fn candidate_images(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut images = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some())
        .filter(|path| {
            fs::metadata(path)
                .map(|meta| meta.is_file() && meta.len() > MIN_IMAGE_BYTES)
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();
    images.sort();
    images
}

fn load_cover(path: &Path, width: u32, height: u32) -> Result<RgbImage> {
    let image = ImageReader::open(path)
        .with_context(|| format!("failed to open image {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("failed to sniff image {}", path.display()))?
        .decode()
        .with_context(|| format!("failed to decode image {}", path.display()))?
        .to_rgb8();
    cover_crop(&image, width, height)
}

/// Scales `source` to cover `width`×`height` and crops the centered overflow.
pub fn cover_crop(source: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    let (src_w, src_h) = source.dimensions();
    if src_w == 0 || src_h == 0 || width == 0 || height == 0 {
        bail!("cannot cover {width}x{height} with a {src_w}x{src_h} image");
    }

    let target_aspect = f64::from(width) / f64::from(height);
    let source_aspect = f64::from(src_w) / f64::from(src_h);
    let (scaled_w, scaled_h) = if source_aspect > target_aspect {
        (((source_aspect * f64::from(height)) as u32).max(width), height)
    } else {
        (width, ((f64::from(width) / source_aspect) as u32).max(height))
    };

    let scaled = imageops::resize(source, scaled_w, scaled_h, FilterType::Lanczos3);
    let left = (scaled_w - width) / 2;
    let top = (scaled_h - height) / 2;
    Ok(imageops::crop_imm(&scaled, left, top, width, height).to_image())
}
