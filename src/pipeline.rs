//! One generation run: units in, frames out to a sink.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::assets::{AssetRoot, FlagCatalog};
use crate::background::{solid_background, BackgroundProvider};
use crate::color::ColorModeKind;
use crate::compositor::{caption_text, Caption, Frame, FrameCompositor, FrameRequest};
use crate::encoding::FrameSink;
use crate::error_codes::{CodedError, ErrorCode};
use crate::font_assets::{missing_codepoints, FontCache, FontResolver};
use crate::schema::RenderSettings;
use crate::sequence::{arrange, FrameTiming};
use crate::text_measure::{fit_unit, RenderConfig};
use crate::translations::TranslationSource;
use crate::units::{dedup_units, parse_text_array, TextUnit};

const PROGRESS_EVERY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("need a word to translate or a text array")]
    NoInput,
    #[error("no text unit could be rendered; nothing was written")]
    EmptyResult,
}

impl GenerateError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoInput => ErrorCode::NoInput,
            Self::EmptyResult => ErrorCode::EmptyResult,
        }
    }
}

impl From<GenerateError> for CodedError {
    fn from(failure: GenerateError) -> Self {
        CodedError::new(failure.code(), failure.to_string())
    }
}

/// What the caller asked to render. A word goes through the translation
/// source; a text array is used literally.
#[derive(Debug, Clone, Default)]
pub struct RenderInput {
    pub text: Option<String>,
    pub text_array: Option<String>,
}

impl RenderInput {
    pub fn word_context(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.trim().is_empty())
    }
}

/// Ordered, de-duplicated units for `input`. A word takes precedence over a
/// text array when both are given.
pub fn collect_units(
    input: &RenderInput,
    source: &dyn TranslationSource,
    languages: &[String],
) -> Result<Vec<TextUnit>> {
    let units = match (input.word_context(), input.text_array.as_deref()) {
        (Some(word), _) => source.translate(word, languages)?,
        (None, Some(raw)) => parse_text_array(raw),
        (None, None) => Vec::new(),
    };
    let units = dedup_units(units);
    if units.is_empty() {
        return Err(anyhow!(GenerateError::NoInput));
    }
    Ok(units)
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedUnit {
    pub unit: TextUnit,
    pub font_size: u32,
    pub color_mode: ColorModeKind,
    pub background: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub rendered: Vec<RenderedUnit>,
    pub skipped: Vec<TextUnit>,
    pub output_frames: usize,
    pub timing: FrameTiming,
}

#[derive(Debug, Clone, Serialize)]
pub struct FontAuditEntry {
    pub text: String,
    pub lang: String,
    pub font: Option<String>,
    pub source: Option<String>,
    pub missing_codepoints: Vec<String>,
}

/// State scoped to one run: the fitted-size memo, the backgrounds already
/// shown, and the parsed fonts.
pub struct GenerationRun {
    settings: RenderSettings,
    resolver: FontResolver,
    fonts: FontCache,
    flags: FlagCatalog,
    backgrounds: BackgroundProvider,
    compositor: FrameCompositor,
    word_context: Option<String>,
    used_images: HashSet<String>,
    configs: HashMap<TextUnit, RenderConfig>,
}

impl GenerationRun {
    pub fn new(settings: RenderSettings, assets: &AssetRoot) -> Result<Self> {
        settings.validate()?;
        let flags = if settings.flag_colors {
            FlagCatalog::load(&assets.flag_colors_path())?
        } else {
            FlagCatalog::default()
        };
        let compositor = FrameCompositor::new(settings.size.width, settings.size.height);
        let backgrounds = BackgroundProvider::new(assets.images_dir(), settings.seed);
        Ok(Self {
            resolver: FontResolver::new(assets.fonts_dir()),
            fonts: FontCache::new(),
            flags,
            backgrounds,
            compositor,
            word_context: None,
            used_images: HashSet::new(),
            configs: HashMap::new(),
            settings,
        })
    }

    /// Word used to pick a themed background folder.
    pub fn with_word_context(mut self, word: Option<&str>) -> Self {
        self.word_context = word.map(str::to_owned);
        self
    }

    pub fn used_images(&self) -> &HashSet<String> {
        &self.used_images
    }

    pub fn config_for(&self, unit: &TextUnit) -> Option<&RenderConfig> {
        self.configs.get(unit)
    }

    /// Fits every unit not already in the memo.
    #[instrument(skip_all, fields(units = units.len()))]
    pub fn analyze(&mut self, units: &[TextUnit]) -> Result<()> {
        info!("analyzing {} units", units.len());
        let base_size = self.settings.base_font_size();
        let target_width = self.settings.size.width;
        let char_by_char = self.settings.char_by_char();
        for unit in units {
            if self.configs.contains_key(unit) {
                continue;
            }
            let config = fit_unit(
                &self.resolver,
                &mut self.fonts,
                unit,
                self.settings.font_path.as_deref(),
                base_size,
                target_width,
                char_by_char,
            )?;
            self.configs.insert(unit.clone(), config);
        }
        Ok(())
    }

    /// One frame per renderable unit, in unit order. Unrenderable units are
    /// reported in the second list.
    #[instrument(skip_all, fields(units = units.len()))]
    pub fn render(&mut self, units: &[TextUnit]) -> Result<(Vec<Frame>, Vec<RenderedUnit>, Vec<TextUnit>)> {
        self.analyze(units)?;
        let total = units.len();
        let (width, height) = (self.settings.size.width, self.settings.size.height);
        let high_contrast = self.settings.high_contrast();

        let mut frames = Vec::with_capacity(total);
        let mut rendered = Vec::with_capacity(total);
        let mut skipped = Vec::new();

        for (index, unit) in units.iter().enumerate() {
            let Some(config) = self.configs.get(unit).filter(|config| config.is_renderable()).cloned() else {
                warn!(text = %unit.text, lang = %unit.lang, "skipping unrenderable unit");
                skipped.push(unit.clone());
                continue;
            };

            let (background, identity) = if self.settings.background_images {
                let asset = self.backgrounds.get(
                    &unit.lang,
                    (width, height),
                    self.word_context.as_deref(),
                    &self.used_images,
                );
                self.used_images.insert(asset.identity.clone());
                (asset.image, Some(asset.identity))
            } else {
                (solid_background(width, height, self.settings.background_color), None)
            };

            let flags = &self.flags;
            let mode = self.settings.color_mode(|| flags.colors_for_lang(&unit.lang));
            let caption = if self.settings.show_labels {
                self.caption_for(unit)
            } else {
                None
            };

            let (frame, decision) = self.compositor.compose(
                &mut self.fonts,
                &FrameRequest {
                    unit,
                    config: &config,
                    background: &background,
                    mode: &mode,
                    frame_index: index,
                    total_frames: total,
                    high_contrast,
                    caption: caption.as_ref(),
                },
            )?;
            debug!(
                text = %unit.text,
                lang = %unit.lang,
                font_size = config.font_size,
                identity = identity.as_deref().unwrap_or("solid"),
                "rendered frame"
            );
            frames.push(frame);
            rendered.push(RenderedUnit {
                unit: unit.clone(),
                font_size: config.font_size,
                color_mode: decision.mode,
                background: identity,
            });

            if frames.len() % PROGRESS_EVERY == 0 || index + 1 == total {
                info!("rendered frame {}/{}", index + 1, total);
            }
        }

        Ok((frames, rendered, skipped))
    }

    /// Renders, expands, and hands the result to `sink`. The sink is not
    /// called when nothing rendered.
    pub fn generate(&mut self, units: &[TextUnit], sink: &mut dyn FrameSink) -> Result<GenerationReport> {
        let (frames, rendered, skipped) = self.render(units)?;
        if frames.is_empty() {
            return Err(anyhow!(GenerateError::EmptyResult));
        }

        let delay = self.settings.delay;
        let (frames, timing) = arrange(frames, delay.dwell_count(), self.settings.pacing, delay.base_ms);
        info!(
            sink = sink.label(),
            frames = frames.len(),
            dwell = delay.dwell_count(),
            "writing frames"
        );
        sink.write(&frames, &timing, true)?;

        Ok(GenerationReport {
            rendered,
            skipped,
            output_frames: frames.len(),
            timing,
        })
    }

    /// Resolved font and missing glyphs per unit, without rendering.
    pub fn audit(&mut self, units: &[TextUnit]) -> Vec<FontAuditEntry> {
        let preferred = self.settings.font_path.clone();
        units
            .iter()
            .map(|unit| {
                let resolved = self
                    .resolver
                    .resolve_detailed(&unit.lang, &unit.text, preferred.as_deref());
                let missing = match &resolved {
                    Some(resolved) => match self.fonts.load(&resolved.path) {
                        Ok(face) => missing_codepoints(face.font(), &unit.text)
                            .into_iter()
                            .map(|ch| format!("U+{:04X}", ch as u32))
                            .collect(),
                        Err(error) => {
                            warn!(font = %resolved.path.display(), "font failed to load: {error:#}");
                            vec![format!("unloadable: {error}")]
                        }
                    },
                    None => Vec::new(),
                };
                FontAuditEntry {
                    text: unit.text.clone(),
                    lang: unit.lang.clone(),
                    font: resolved.as_ref().map(|r| r.path.display().to_string()),
                    source: resolved.as_ref().map(|r| r.source.label()),
                    missing_codepoints: missing,
                }
            })
            .collect()
    }

    fn caption_for(&self, unit: &TextUnit) -> Option<Caption> {
        let text = caption_text(&unit.lang);
        match self.resolver.resolve("en", &text, None) {
            Some(font) => Some(Caption { text, font }),
            None => {
                debug!(lang = %unit.lang, "no font for caption");
                None
            }
        }
    }
}
