//! Frame compositing: background, centered glyph run with optional stroke,
//! and the optional caption label.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use fontdue::layout::GlyphRasterConfig;
use image::{imageops, RgbImage, RgbaImage};
use tiny_skia::{Color, IntSize, Pixmap, PixmapPaint, Transform};

use crate::color::{select_colors, ColorDecision, ColorMode, ColorRequest, Rgb};
use crate::font_assets::{FontCache, FontFace};
use crate::tables::{country_for_lang, display_country};
use crate::text_measure::{layout_clusters, layout_line, measure, PlacedGlyph, RenderConfig};
use crate::units::TextUnit;

pub const LABEL_MIN_SIZE: u32 = 10;
pub const LABEL_MARGIN: u32 = 10;
pub const LABEL_FILL: Rgb = Rgb::new(200, 200, 200);

/// A rendered RGBA frame. Clones share pixel storage.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<RgbaImage>,
}

impl Frame {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// `true` when both frames share the same pixel buffer.
    pub fn shares_pixels(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

#[derive(Debug, Clone)]
pub struct GlyphBitmap {
    pub width: usize,
    pub height: usize,
    pub bitmap: Vec<u8>,
}

/// Stroke width for a fitted font size.
pub fn stroke_width(font_size: u32) -> u32 {
    (font_size / 15).max(2)
}

/// `"Japan (ja)"`; languages without a country read `"Unknown (xx)"`.
pub fn caption_text(lang: &str) -> String {
    let country = country_for_lang(lang)
        .map(display_country)
        .unwrap_or_else(|| "Unknown".to_owned());
    format!("{country} ({lang})")
}

pub struct Caption {
    pub text: String,
    pub font: PathBuf,
}

pub struct FrameRequest<'a> {
    pub unit: &'a TextUnit,
    pub config: &'a RenderConfig,
    pub background: &'a RgbImage,
    pub mode: &'a ColorMode,
    pub frame_index: usize,
    pub total_frames: usize,
    pub high_contrast: bool,
    pub caption: Option<&'a Caption>,
}

/// Draws frames of one fixed size. Rasterized glyphs and their stroke masks
/// are cached across frames.
pub struct FrameCompositor {
    width: u32,
    height: u32,
    glyphs: HashMap<GlyphRasterConfig, GlyphBitmap>,
    strokes: HashMap<(GlyphRasterConfig, u32), GlyphBitmap>,
}

impl FrameCompositor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            glyphs: HashMap::new(),
            strokes: HashMap::new(),
        }
    }

    pub fn compose(
        &mut self,
        fonts: &mut FontCache,
        request: &FrameRequest<'_>,
    ) -> Result<(Frame, ColorDecision)> {
        let font_path = request
            .config
            .font
            .as_deref()
            .ok_or_else(|| anyhow!("unit '{}' has no font to draw with", request.unit.text))?;
        let mut canvas = self.canvas(request.background)?;

        let config = request.config;
        let x = (self.width as f32 - (config.ink_left + config.ink_right)) / 2.0;
        let y = (self.height as f32 - (config.ink_top + config.ink_bottom)) / 2.0;

        let face = fonts.load(font_path)?;
        let size = config.font_size as f32;
        let clusters = layout_clusters(face, &request.unit.text, size, 0.0, 0.0);

        let region = sample_region(
            request.background,
            x + config.ink_left,
            y + config.ink_top,
            x + config.ink_right,
            y + config.ink_bottom,
        );
        let decision = select_colors(
            request.mode,
            &ColorRequest {
                char_count: clusters.len(),
                region: &region,
                frame_index: request.frame_index,
                total_frames: request.total_frames,
                high_contrast: request.high_contrast,
            },
        );
        let stroke = decision
            .outline
            .map(|outline| (outline, stroke_width(config.font_size)));

        if request.mode.is_per_char() {
            for (index, cluster) in clusters.iter().enumerate() {
                self.draw_run(
                    &mut canvas,
                    face,
                    &cluster.glyphs,
                    (x, y),
                    decision.char_color(index),
                    stroke,
                );
            }
        } else {
            let glyphs = clusters
                .into_iter()
                .flat_map(|cluster| cluster.glyphs)
                .collect::<Vec<_>>();
            self.draw_run(&mut canvas, face, &glyphs, (x, y), decision.primary, stroke);
        }

        if let Some(caption) = request.caption {
            let face = fonts
                .load(&caption.font)
                .with_context(|| format!("failed to load caption font for '{}'", caption.text))?;
            self.draw_caption(&mut canvas, face, &caption.text);
        }

        let image = RgbaImage::from_raw(self.width, self.height, canvas.take())
            .ok_or_else(|| anyhow!("canvas buffer does not match {}x{}", self.width, self.height))?;
        Ok((Frame::new(image), decision))
    }

    fn canvas(&self, background: &RgbImage) -> Result<Pixmap> {
        let mut canvas = Pixmap::new(self.width, self.height).context("failed to create pixmap")?;
        canvas.fill(Color::from_rgba8(0, 0, 0, 255));

        let (bg_w, bg_h) = background.dimensions();
        let size = IntSize::from_wh(bg_w, bg_h)
            .ok_or_else(|| anyhow!("background has zero size {bg_w}x{bg_h}"))?;
        let rgba = background
            .pixels()
            .flat_map(|pixel| [pixel[0], pixel[1], pixel[2], 255])
            .collect::<Vec<_>>();
        let photo = Pixmap::from_vec(rgba, size).context("failed to wrap background pixels")?;
        canvas.draw_pixmap(
            0,
            0,
            photo.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        Ok(canvas)
    }

    /// Stroke under fill for one run of glyphs placed at `origin`.
    fn draw_run(
        &mut self,
        canvas: &mut Pixmap,
        face: &FontFace,
        glyphs: &[PlacedGlyph],
        origin: (f32, f32),
        fill: Rgb,
        stroke: Option<(Rgb, u32)>,
    ) {
        let at = |glyph: &PlacedGlyph, pad: u32| {
            (
                (origin.0 + glyph.x).round() as i32 - pad as i32,
                (origin.1 + glyph.y).round() as i32 - pad as i32,
            )
        };
        if let Some((outline, radius)) = stroke {
            for glyph in glyphs.iter().filter(|glyph| glyph.has_ink()) {
                stamp(canvas, self.stroke_mask(face, glyph, radius), at(glyph, radius), outline);
            }
        }
        for glyph in glyphs.iter().filter(|glyph| glyph.has_ink()) {
            stamp(canvas, self.glyph(face, glyph), at(glyph, 0), fill);
        }
    }

    fn draw_caption(&mut self, canvas: &mut Pixmap, face: &FontFace, text: &str) {
        let size = (self.height / 20).max(LABEL_MIN_SIZE);
        let measurement = measure(face, text, size as f32, false);
        let x = (self.width as f32 - measurement.width) / 2.0 - measurement.left;
        let y = self.height as f32 - size as f32 - LABEL_MARGIN as f32;
        let glyphs = layout_line(face, text, size as f32, 0.0, 0.0);
        self.draw_run(canvas, face, &glyphs, (x, y), LABEL_FILL, Some((Rgb::BLACK, 1)));
    }

    fn glyph(&mut self, face: &FontFace, glyph: &PlacedGlyph) -> &GlyphBitmap {
        self.glyphs.entry(glyph.key).or_insert_with(|| {
            let (metrics, bitmap) = face.font().rasterize_config(glyph.key);
            GlyphBitmap {
                width: metrics.width,
                height: metrics.height,
                bitmap,
            }
        })
    }

    fn stroke_mask(&mut self, face: &FontFace, glyph: &PlacedGlyph, radius: u32) -> &GlyphBitmap {
        let key = (glyph.key, radius);
        if !self.strokes.contains_key(&key) {
            let dilated = dilate(self.glyph(face, glyph), radius);
            self.strokes.insert(key, dilated);
        }
        &self.strokes[&key]
    }
}

/// Grows coverage by `radius` pixels: each output pixel takes the maximum
/// coverage within a disc around it. The result is `2 × radius` larger on
/// each axis.
pub fn dilate(glyph: &GlyphBitmap, radius: u32) -> GlyphBitmap {
    let r = radius as i64;
    let width = glyph.width + 2 * radius as usize;
    let height = glyph.height + 2 * radius as usize;
    let mut bitmap = vec![0_u8; width * height];
    let offsets = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
        .filter(|(dx, dy)| dx * dx + dy * dy <= r * r)
        .collect::<Vec<_>>();

    for row in 0..glyph.height {
        for col in 0..glyph.width {
            let coverage = glyph.bitmap[row * glyph.width + col];
            if coverage == 0 {
                continue;
            }
            for (dx, dy) in &offsets {
                let out_x = (col as i64 + r + dx) as usize;
                let out_y = (row as i64 + r + dy) as usize;
                let slot = &mut bitmap[out_y * width + out_x];
                *slot = (*slot).max(coverage);
            }
        }
    }

    GlyphBitmap {
        width,
        height,
        bitmap,
    }
}

/// Background pixels under the ink box, clamped to the frame. Empty when
/// the box is degenerate or fully outside.
pub fn sample_region(background: &RgbImage, left: f32, top: f32, right: f32, bottom: f32) -> RgbImage {
    let (width, height) = background.dimensions();
    let clamp = |value: f32, max: u32| value.round().clamp(0.0, max as f32) as u32;
    let (x0, x1) = (clamp(left, width), clamp(right, width));
    let (y0, y1) = (clamp(top, height), clamp(bottom, height));
    if x1 <= x0 || y1 <= y0 {
        return RgbImage::new(0, 0);
    }
    imageops::crop_imm(background, x0, y0, x1 - x0, y1 - y0).to_image()
}

/// Paints `color` through `mask` with its top-left corner at `at`, clipped to
/// the canvas. The canvas is opaque, so only color channels mix.
pub fn stamp(canvas: &mut Pixmap, mask: &GlyphBitmap, at: (i32, i32), color: Rgb) {
    let (canvas_w, canvas_h) = (canvas.width() as i32, canvas.height() as i32);
    let cols = at.0.max(0)..(at.0 + mask.width as i32).min(canvas_w);
    let rows = at.1.max(0)..(at.1 + mask.height as i32).min(canvas_h);
    if cols.is_empty() || rows.is_empty() {
        return;
    }

    let stride = canvas_w as usize * 4;
    let data = canvas.data_mut();
    for y in rows {
        let mask_row = (y - at.1) as usize * mask.width;
        let coverage = &mask.bitmap[mask_row + (cols.start - at.0) as usize..][..cols.len()];
        let line = &mut data[y as usize * stride..][cols.start as usize * 4..cols.end as usize * 4];
        for (pixel, &alpha) in line.chunks_exact_mut(4).zip(coverage) {
            if alpha > 0 {
                mix(pixel, color, alpha);
            }
        }
    }
}

fn mix(pixel: &mut [u8], color: Rgb, alpha: u8) {
    let alpha = u16::from(alpha);
    let keep = 255 - alpha;
    for (channel, paint) in pixel.iter_mut().zip([color.r, color.g, color.b]) {
        *channel = ((u16::from(paint) * alpha + u16::from(*channel) * keep + 127) / 255) as u8;
    }
    pixel[3] = 255;
}
