use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::Result;
use fontdue::layout::GlyphRasterConfig;
use fontdue::Font;
use rustybuzz::{Direction, Face as ShapingFace, UnicodeBuffer};
use serde::Serialize;
use tracing::{debug, warn};
use unicode_bidi::BidiInfo;

use crate::font_assets::{FontCache, FontFace, FontResolver};
use crate::units::TextUnit;

pub const MIN_FONT_SIZE: u32 = 8;
pub const FIT_STEP: u32 = 2;
/// Share of the target width the ink box may occupy.
pub const FIT_RATIO: f32 = 0.9;

/// Ink bounding box of a laid-out string, relative to the layout origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Measurement {
    pub width: f32,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

/// One positioned glyph, relative to the layout origin.
#[derive(Debug, Clone, Copy)]
pub struct PlacedGlyph {
    pub key: GlyphRasterConfig,
    pub ch: char,
    pub x: f32,
    pub y: f32,
    pub width: usize,
    pub height: usize,
}

impl PlacedGlyph {
    pub fn has_ink(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Glyphs shaped from one source character (or one ligature/cluster), in
/// visual order. Decorative color modes color whole clusters.
#[derive(Debug, Clone)]
pub struct GlyphCluster {
    pub ch: char,
    pub cursor: f32,
    pub advance: f32,
    pub glyphs: Vec<PlacedGlyph>,
}

/// Runs of `text` in left-to-right display order, each flagged when it
/// reads right to left.
pub fn visual_runs(text: &str) -> Vec<(Range<usize>, bool)> {
    let info = BidiInfo::new(text, None);
    let mut runs = Vec::new();
    for paragraph in &info.paragraphs {
        let (levels, line_runs) = info.visual_runs(paragraph, paragraph.range.clone());
        for run in line_runs {
            let rtl = levels[run.start].is_rtl();
            runs.push((run, rtl));
        }
    }
    runs
}

/// Shaped single line, top at `y`, pen starting at `x`. Bidi runs are
/// placed in display order and each run is shaped in its own direction, so
/// Arabic joins and Hebrew reads right to left.
pub fn layout_clusters(face: &FontFace, text: &str, size: f32, x: f32, y: f32) -> Vec<GlyphCluster> {
    if text.is_empty() {
        return Vec::new();
    }
    let font = face.font();
    let ascent = font
        .horizontal_line_metrics(size)
        .map(|metrics| metrics.ascent)
        .unwrap_or(size);
    let baseline = y + ascent;
    let shaper = ShapingFace::from_slice(face.data(), 0);

    let mut pen = x;
    let mut clusters: Vec<GlyphCluster> = Vec::new();
    for (run, rtl) in visual_runs(text) {
        let run_text = &text[run.clone()];
        let shaped = match &shaper {
            Some(shaper) => shape_run(shaper, run_text, rtl, size),
            None => unshaped_run(font, run_text, rtl, size),
        };
        let mut current: Option<usize> = None;
        for glyph in shaped {
            if current != Some(glyph.cluster) {
                current = Some(glyph.cluster);
                let ch = run_text
                    .get(glyph.cluster..)
                    .and_then(|rest| rest.chars().next())
                    .unwrap_or(' ');
                clusters.push(GlyphCluster {
                    ch,
                    cursor: pen,
                    advance: 0.0,
                    glyphs: Vec::new(),
                });
            }
            let Some(cluster) = clusters.last_mut() else {
                continue;
            };
            let metrics = font.metrics_indexed(glyph.glyph_index, size);
            cluster.glyphs.push(PlacedGlyph {
                key: GlyphRasterConfig {
                    glyph_index: glyph.glyph_index,
                    px: size,
                    font_hash: font.file_hash(),
                },
                ch: cluster.ch,
                x: pen + glyph.x_offset + metrics.xmin as f32,
                y: baseline - glyph.y_offset - (metrics.height as f32 + metrics.ymin as f32),
                width: metrics.width,
                height: metrics.height,
            });
            cluster.advance += glyph.x_advance;
            pen += glyph.x_advance;
        }
    }
    clusters
}

/// [`layout_clusters`] flattened into one glyph run.
pub fn layout_line(face: &FontFace, text: &str, size: f32, x: f32, y: f32) -> Vec<PlacedGlyph> {
    layout_clusters(face, text, size, x, y)
        .into_iter()
        .flat_map(|cluster| cluster.glyphs)
        .collect()
}

struct ShapedGlyph {
    glyph_index: u16,
    /// Byte offset of the source character within the run.
    cluster: usize,
    x_advance: f32,
    x_offset: f32,
    y_offset: f32,
}

fn shape_run(shaper: &ShapingFace<'_>, text: &str, rtl: bool, size: f32) -> Vec<ShapedGlyph> {
    let scale = size / shaper.units_per_em().max(1) as f32;
    let mut buffer = UnicodeBuffer::new();
    buffer.push_str(text);
    buffer.set_direction(if rtl {
        Direction::RightToLeft
    } else {
        Direction::LeftToRight
    });
    buffer.guess_segment_properties();
    let output = rustybuzz::shape(shaper, &[], buffer);
    output
        .glyph_infos()
        .iter()
        .zip(output.glyph_positions())
        .map(|(info, position)| ShapedGlyph {
            glyph_index: info.glyph_id as u16,
            cluster: info.cluster as usize,
            x_advance: position.x_advance as f32 * scale,
            x_offset: position.x_offset as f32 * scale,
            y_offset: position.y_offset as f32 * scale,
        })
        .collect()
}

/// Character-to-glyph mapping without layout tables, still in display order.
fn unshaped_run(font: &Font, text: &str, rtl: bool, size: f32) -> Vec<ShapedGlyph> {
    let mut glyphs = text
        .char_indices()
        .map(|(offset, ch)| ShapedGlyph {
            glyph_index: font.lookup_glyph_index(ch),
            cluster: offset,
            x_advance: font.metrics(ch, size).advance_width,
            x_offset: 0.0,
            y_offset: 0.0,
        })
        .collect::<Vec<_>>();
    if rtl {
        glyphs.reverse();
    }
    glyphs
}

/// Ink extent of `text` at `size`. With `char_by_char` the extent runs from
/// the first cluster's left edge to the last cluster's right edge, the way
/// decorative modes draw; a cluster with no ink spans its advance.
pub fn measure(face: &FontFace, text: &str, size: f32, char_by_char: bool) -> Measurement {
    let clusters = layout_clusters(face, text, size, 0.0, 0.0);
    let vertical = ink_box(clusters.iter().flat_map(|cluster| cluster.glyphs.iter()));
    if !char_by_char {
        return vertical;
    }

    let span = |cluster: &GlyphCluster| {
        if cluster.glyphs.iter().any(PlacedGlyph::has_ink) {
            let ink = ink_box(cluster.glyphs.iter());
            (ink.left, ink.right)
        } else {
            (cluster.cursor, cluster.cursor + cluster.advance)
        }
    };
    let (Some(first), Some(last)) = (clusters.first(), clusters.last()) else {
        return Measurement::default();
    };
    let (left, _) = span(first);
    let (_, right) = span(last);
    Measurement {
        width: right - left,
        left,
        right,
        top: vertical.top,
        bottom: vertical.bottom,
    }
}

fn ink_box<'a>(glyphs: impl Iterator<Item = &'a PlacedGlyph>) -> Measurement {
    let mut left = f32::MAX;
    let mut right = f32::MIN;
    let mut top = f32::MAX;
    let mut bottom = f32::MIN;
    let mut any = false;
    for glyph in glyphs.filter(|glyph| glyph.has_ink()) {
        any = true;
        left = left.min(glyph.x);
        right = right.max(glyph.x + glyph.width as f32);
        top = top.min(glyph.y);
        bottom = bottom.max(glyph.y + glyph.height as f32);
    }
    if !any {
        return Measurement::default();
    }
    Measurement {
        width: right - left,
        left,
        right,
        top,
        bottom,
    }
}

/// Fitted size and ink box for one unit, computed once per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderConfig {
    pub font_size: u32,
    pub ink_width: f32,
    pub ink_left: f32,
    pub ink_right: f32,
    pub ink_top: f32,
    pub ink_bottom: f32,
    /// `None` marks the unit unrenderable.
    pub font: Option<PathBuf>,
}

impl RenderConfig {
    pub fn unrenderable(font_size: u32) -> Self {
        Self {
            font_size,
            ink_width: 0.0,
            ink_left: 0.0,
            ink_right: 0.0,
            ink_top: 0.0,
            ink_bottom: 0.0,
            font: None,
        }
    }

    fn from_measurement(font_size: u32, measurement: Measurement, font: PathBuf) -> Self {
        Self {
            font_size,
            ink_width: measurement.width,
            ink_left: measurement.left,
            ink_right: measurement.right,
            ink_top: measurement.top,
            ink_bottom: measurement.bottom,
            font: Some(font),
        }
    }

    pub fn is_renderable(&self) -> bool {
        self.font.is_some()
    }
}

/// Shrinks `base_size` in steps of [`FIT_STEP`] until the ink width fits
/// within [`FIT_RATIO`] of `target_width` or the size reaches
/// [`MIN_FONT_SIZE`]. Best effort: an oversized result at the floor is kept.
pub fn fit_to_width(
    face: &FontFace,
    text: &str,
    base_size: u32,
    target_width: u32,
    char_by_char: bool,
) -> (u32, Measurement) {
    let limit = target_width as f32 * FIT_RATIO;
    let mut size = base_size;
    let mut measurement = measure(face, text, size as f32, char_by_char);
    if measurement.width <= 0.0 {
        return (size, measurement);
    }
    while measurement.width > limit && size > MIN_FONT_SIZE {
        size = size.saturating_sub(FIT_STEP).max(MIN_FONT_SIZE);
        measurement = measure(face, text, size as f32, char_by_char);
    }
    (size, measurement)
}

/// Resolves a font for `unit` and fits it to `target_width`.
pub fn fit_unit(
    resolver: &FontResolver,
    fonts: &mut FontCache,
    unit: &TextUnit,
    preferred: Option<&Path>,
    base_size: u32,
    target_width: u32,
    char_by_char: bool,
) -> Result<RenderConfig> {
    let Some(font_path) = resolver.resolve(&unit.lang, &unit.text, preferred) else {
        warn!(text = %unit.text, lang = %unit.lang, "no font can render text");
        return Ok(RenderConfig::unrenderable(base_size));
    };
    let face = fonts.load(&font_path)?;

    let (size, measurement) = fit_to_width(face, &unit.text, base_size, target_width, char_by_char);
    if measurement.width <= 0.0 && !unit.text.trim().is_empty() {
        warn!(
            text = %unit.text,
            lang = %unit.lang,
            font = %font_path.display(),
            "font produced no ink for text"
        );
        return Ok(RenderConfig::unrenderable(base_size));
    }

    debug!(
        text = %unit.text,
        lang = %unit.lang,
        font_size = size,
        ink_width = measurement.width,
        "fitted unit"
    );
    Ok(RenderConfig::from_measurement(size, measurement, font_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(x: f32, y: f32, width: usize, height: usize) -> PlacedGlyph {
        PlacedGlyph {
            key: GlyphRasterConfig {
                glyph_index: 1,
                px: 12.0,
                font_hash: 0,
            },
            ch: 'a',
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn ink_box_ignores_empty_glyphs() {
        let glyphs = [glyph(2.0, 4.0, 5, 8), glyph(9.0, 0.0, 0, 0), glyph(12.0, 3.0, 4, 6)];
        let measurement = ink_box(glyphs.iter());
        assert_eq!(measurement.left, 2.0);
        assert_eq!(measurement.right, 16.0);
        assert_eq!(measurement.width, 14.0);
        assert_eq!(measurement.top, 3.0);
        assert_eq!(measurement.bottom, 12.0);
    }

    #[test]
    fn ink_box_of_nothing_is_zero() {
        let glyphs: [PlacedGlyph; 0] = [];
        assert_eq!(ink_box(glyphs.iter()), Measurement::default());
    }

    #[test]
    fn hebrew_line_is_a_single_right_to_left_run() {
        assert_eq!(visual_runs("שלום"), vec![(0..8, true)]);
    }

    #[test]
    fn mixed_line_orders_runs_for_display() {
        assert_eq!(visual_runs("hi שלום"), vec![(0..3, false), (3..11, true)]);
        assert_eq!(visual_runs("Hello"), vec![(0..5, false)]);
        assert!(visual_runs("").is_empty());
    }

    #[test]
    fn unrenderable_config_has_zero_ink() {
        let config = RenderConfig::unrenderable(32);
        assert!(!config.is_renderable());
        assert_eq!(config.ink_width, 0.0);
        assert_eq!(config.font_size, 32);
    }
}
