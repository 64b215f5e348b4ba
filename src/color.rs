//! Text color selection: fixed colors, background-contrast colors found by
//! clustering the sampled region, and the decorative per-character modes.

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub const CLUSTER_COUNT: usize = 3;
pub const MAX_CLUSTER_ITERATIONS: usize = 32;
/// Longest side of the region after downsampling, in pixels.
pub const SAMPLE_EDGE: u32 = 32;
const HUE_STEPS: usize = 36;
const TEXT_SATURATION: f32 = 0.95;
const RAINBOW_LIGHTNESS: f32 = 0.8;
const RAINBOW_SATURATION: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const NEUTRAL_GRAY: Rgb = Rgb::new(128, 128, 128);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// BT.601 luma in 0..=255.
    pub fn luminance(self) -> f32 {
        (f32::from(self.r) * 299.0 + f32::from(self.g) * 587.0 + f32::from(self.b) * 114.0)
            / 1000.0
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Converts unit-interval channels, truncating toward zero.
    pub fn from_unit(r: f32, g: f32, b: f32) -> Self {
        let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0) as u8;
        Self::new(channel(r), channel(g), channel(b))
    }

    pub fn to_unit(self) -> [f32; 3] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        ]
    }
}

/// Hue, lightness, saturation, all in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hls {
    pub h: f32,
    pub l: f32,
    pub s: f32,
}

pub fn rgb_to_hls(r: f32, g: f32, b: f32) -> Hls {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let sum = max + min;
    let range = max - min;
    let l = sum / 2.0;
    if range == 0.0 {
        return Hls { h: 0.0, l, s: 0.0 };
    }
    let s = if l <= 0.5 {
        range / sum
    } else {
        range / (2.0 - sum)
    };
    let rc = (max - r) / range;
    let gc = (max - g) / range;
    let bc = (max - b) / range;
    let h = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    Hls {
        h: (h / 6.0).rem_euclid(1.0),
        l,
        s,
    }
}

pub fn hls_to_rgb(hls: Hls) -> [f32; 3] {
    let Hls { h, l, s } = hls;
    if s == 0.0 {
        return [l, l, l];
    }
    let m2 = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let m1 = 2.0 * l - m2;
    [
        hue_channel(m1, m2, h + 1.0 / 3.0),
        hue_channel(m1, m2, h),
        hue_channel(m1, m2, h - 1.0 / 3.0),
    ]
}

fn hue_channel(m1: f32, m2: f32, hue: f32) -> f32 {
    let hue = hue.rem_euclid(1.0);
    if hue < 1.0 / 6.0 {
        m1 + (m2 - m1) * hue * 6.0
    } else if hue < 0.5 {
        m2
    } else if hue < 2.0 / 3.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - hue) * 6.0
    } else {
        m1
    }
}

/// Hue distance on the unit circle, scaled so opposite hues are 1.0 apart.
pub fn circular_hue_distance(a: f32, b: f32) -> f32 {
    let diff = (a - b).abs();
    diff.min(1.0 - diff) * 2.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClusterError {
    #[error("no pixels to cluster")]
    Empty,
    #[error("only {distinct} distinct colors for {k} clusters")]
    Degenerate { distinct: usize, k: usize },
}

/// Cluster center in 0..=255 RGB space and its share of the pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cluster {
    pub center: [f32; 3],
    pub weight: f32,
}

/// Lloyd's k-means seeded by farthest-point selection from the first pixel.
/// Fewer than `k` distinct colors yield one cluster per distinct color; a
/// single color is [`ClusterError::Degenerate`]. Empty clusters are dropped
/// and the rest are ordered by weight, heaviest first.
pub fn kmeans(pixels: &[[f32; 3]], k: usize) -> Result<Vec<Cluster>, ClusterError> {
    if pixels.is_empty() || k == 0 {
        return Err(ClusterError::Empty);
    }

    let mut centers = vec![pixels[0]];
    while centers.len() < k {
        let (best, distance) = pixels
            .iter()
            .map(|pixel| nearest(pixel, &centers).1)
            .enumerate()
            .fold((0, 0.0_f32), |acc, (index, distance)| {
                if distance > acc.1 {
                    (index, distance)
                } else {
                    acc
                }
            });
        if distance == 0.0 {
            break;
        }
        centers.push(pixels[best]);
    }
    if centers.len() < 2 {
        return Err(ClusterError::Degenerate {
            distinct: centers.len(),
            k,
        });
    }

    let mut assignment = vec![usize::MAX; pixels.len()];
    for _ in 0..MAX_CLUSTER_ITERATIONS {
        let mut changed = false;
        for (slot, pixel) in assignment.iter_mut().zip(pixels) {
            let (index, _) = nearest(pixel, &centers);
            if *slot != index {
                *slot = index;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![[0.0_f32; 3]; centers.len()];
        let mut counts = vec![0_usize; centers.len()];
        for (&index, pixel) in assignment.iter().zip(pixels) {
            counts[index] += 1;
            for channel in 0..3 {
                sums[index][channel] += pixel[channel];
            }
        }
        for ((center, sum), &count) in centers.iter_mut().zip(&sums).zip(&counts) {
            if count > 0 {
                *center = sum.map(|total| total / count as f32);
            }
        }
    }

    let mut counts = vec![0_usize; centers.len()];
    for &index in &assignment {
        counts[index] += 1;
    }
    let total = pixels.len() as f32;
    let mut clusters = centers
        .into_iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(center, count)| Cluster {
            center,
            weight: count as f32 / total,
        })
        .collect::<Vec<_>>();
    clusters.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    Ok(clusters)
}

fn nearest(pixel: &[f32; 3], centers: &[[f32; 3]]) -> (usize, f32) {
    centers
        .iter()
        .enumerate()
        .map(|(index, center)| {
            let distance = (0..3)
                .map(|channel| (pixel[channel] - center[channel]).powi(2))
                .sum::<f32>();
            (index, distance)
        })
        .fold((0, f32::MAX), |acc, item| if item.1 < acc.1 { item } else { acc })
}

fn mean_color(pixels: &[[f32; 3]]) -> [f32; 3] {
    let mut sum = [0.0_f32; 3];
    for pixel in pixels {
        for channel in 0..3 {
            sum[channel] += pixel[channel];
        }
    }
    sum.map(|total| total / pixels.len().max(1) as f32)
}

/// Shrinks `region` so neither side exceeds [`SAMPLE_EDGE`], keeping aspect.
pub fn downsample(region: &RgbImage) -> RgbImage {
    let (width, height) = region.dimensions();
    if width <= SAMPLE_EDGE && height <= SAMPLE_EDGE {
        return region.clone();
    }
    let scale = (SAMPLE_EDGE as f32 / width as f32).min(SAMPLE_EDGE as f32 / height as f32);
    let target_w = ((width as f32 * scale).round() as u32).clamp(1, SAMPLE_EDGE);
    let target_h = ((height as f32 * scale).round() as u32).clamp(1, SAMPLE_EDGE);
    image::imageops::thumbnail(region, target_w, target_h)
}

/// Picks a text color and outline that stand out against `region`.
/// An empty region yields white text with a black outline.
pub fn contrast_colors(region: &RgbImage) -> (Rgb, Rgb) {
    if region.width() == 0 || region.height() == 0 {
        return (Rgb::WHITE, Rgb::BLACK);
    }

    let small = downsample(region);
    let pixels = small
        .pixels()
        .map(|pixel| pixel.0.map(f32::from))
        .collect::<Vec<_>>();

    let clusters = match kmeans(&pixels, CLUSTER_COUNT) {
        Ok(clusters) => clusters,
        Err(error) => {
            debug!(%error, "falling back to mean background color");
            let full = region
                .pixels()
                .map(|pixel| pixel.0.map(f32::from))
                .collect::<Vec<_>>();
            vec![Cluster {
                center: mean_color(&full),
                weight: 1.0,
            }]
        }
    };

    let background = clusters
        .iter()
        .map(|cluster| {
            let [r, g, b] = cluster.center.map(|channel| channel / 255.0);
            (rgb_to_hls(r, g, b), cluster.weight)
        })
        .collect::<Vec<_>>();
    contrast_for_palette(&background)
}

/// Scores 36 candidate hues against weighted background colors and builds
/// the text color at the lightness opposite the background's.
pub fn contrast_for_palette(background: &[(Hls, f32)]) -> (Rgb, Rgb) {
    let average_l = background
        .iter()
        .map(|(hls, weight)| hls.l * weight)
        .sum::<f32>();
    let target_l = if average_l >= 0.5 { 0.15 } else { 0.85 };

    let mut best_hue = 0.0;
    let mut best_score = f32::MIN;
    for step in 0..HUE_STEPS {
        let hue = step as f32 / HUE_STEPS as f32;
        let mut score = 0.0;
        for (hls, weight) in background {
            if hls.s > 0.1 {
                score += circular_hue_distance(hue, hls.h).powi(2) * weight * hls.s;
            } else {
                score += weight * 0.5;
            }
        }
        let vibrant = (0..6).any(|k| circular_hue_distance(hue, k as f32 / 6.0) < 0.1);
        if vibrant {
            score += 0.1;
        }
        if score > best_score {
            best_score = score;
            best_hue = hue;
        }
    }

    let [r, g, b] = hls_to_rgb(Hls {
        h: best_hue,
        l: target_l,
        s: TEXT_SATURATION,
    });
    let text = Rgb::from_unit(r, g, b);
    let outline = if text.luminance() > 127.0 {
        Rgb::BLACK
    } else {
        Rgb::WHITE
    };
    (text, outline)
}

/// Band index for character `index` of `len` over `colors` bands.
pub fn flag_band(index: usize, len: usize, colors: usize) -> usize {
    if len == 0 || colors == 0 {
        return 0;
    }
    (index * colors / len).min(colors - 1)
}

/// Band color for each of `len` drawn characters.
pub fn flag_colors(len: usize, flag: &[Rgb]) -> Vec<Rgb> {
    let fallback = [Rgb::WHITE];
    let flag = if flag.is_empty() { &fallback[..] } else { flag };
    (0..len)
        .map(|index| flag[flag_band(index, len, flag.len())])
        .collect()
}

/// One pastel color per frame, cycling the hue across the sequence.
pub fn rainbow_color(frame_index: usize, total_frames: usize) -> Rgb {
    let hue = frame_index as f32 / total_frames.max(1) as f32;
    let [r, g, b] = hls_to_rgb(Hls {
        h: hue,
        l: RAINBOW_LIGHTNESS,
        s: RAINBOW_SATURATION,
    });
    Rgb::from_unit(r, g, b)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColorMode {
    Fixed(Rgb),
    Contrast,
    FlagBand(Vec<Rgb>),
    Rainbow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorModeKind {
    Fixed,
    Contrast,
    FlagBand,
    Rainbow,
}

impl ColorMode {
    pub fn kind(&self) -> ColorModeKind {
        match self {
            Self::Fixed(_) => ColorModeKind::Fixed,
            Self::Contrast => ColorModeKind::Contrast,
            Self::FlagBand(_) => ColorModeKind::FlagBand,
            Self::Rainbow => ColorModeKind::Rainbow,
        }
    }

    /// Decorative modes draw one character at a time.
    pub fn is_per_char(&self) -> bool {
        matches!(self, Self::FlagBand(_) | Self::Rainbow)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorDecision {
    pub mode: ColorModeKind,
    pub primary: Rgb,
    pub outline: Option<Rgb>,
    pub per_char: Option<Vec<Rgb>>,
}

impl ColorDecision {
    pub fn char_color(&self, index: usize) -> Rgb {
        self.per_char
            .as_ref()
            .and_then(|colors| colors.get(index % colors.len().max(1)))
            .copied()
            .unwrap_or(self.primary)
    }
}

/// Inputs for one frame's color decision.
pub struct ColorRequest<'a> {
    /// Characters (shaped clusters) drawn one at a time by decorative modes.
    pub char_count: usize,
    /// Background under the glyph box, before any text is drawn.
    pub region: &'a RgbImage,
    pub frame_index: usize,
    pub total_frames: usize,
    /// Photographic background or smart color: decorative modes get a stroke.
    pub high_contrast: bool,
}

pub fn select_colors(mode: &ColorMode, request: &ColorRequest<'_>) -> ColorDecision {
    let kind = mode.kind();
    match mode {
        ColorMode::Fixed(color) => ColorDecision {
            mode: kind,
            primary: *color,
            outline: None,
            per_char: None,
        },
        ColorMode::Contrast => {
            let (primary, outline) = contrast_colors(request.region);
            ColorDecision {
                mode: kind,
                primary,
                outline: Some(outline),
                per_char: None,
            }
        }
        ColorMode::FlagBand(flag) => {
            decorative(kind, flag_colors(request.char_count, flag), request)
        }
        ColorMode::Rainbow => {
            let color = rainbow_color(request.frame_index, request.total_frames);
            decorative(kind, vec![color; request.char_count], request)
        }
    }
}

fn decorative(mode: ColorModeKind, colors: Vec<Rgb>, request: &ColorRequest<'_>) -> ColorDecision {
    let outline = request
        .high_contrast
        .then(|| contrast_colors(request.region).1);
    ColorDecision {
        mode,
        primary: colors.first().copied().unwrap_or(Rgb::WHITE),
        outline,
        per_char: Some(colors),
    }
}
