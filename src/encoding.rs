use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame as GifFrame, ImageFormat};
use serde::Serialize;
use tracing::info;

use crate::compositor::Frame;
use crate::sequence::FrameTiming;

pub const TIMING_FILE: &str = "timing.json";
/// NeuQuant sampling factor: 1 is slowest and best, 30 fastest.
pub const GIF_QUANTIZER_SPEED: i32 = 10;

/// Receives the final ordered frames of a run. Never called with an empty
/// frame list.
pub trait FrameSink {
    fn label(&self) -> &'static str;
    fn write(&mut self, frames: &[Frame], timing: &FrameTiming, loop_forever: bool) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Gif,
    PngSequence,
}

impl SinkKind {
    /// `.gif` writes an animated GIF; anything without an extension is a
    /// PNG sequence directory.
    pub fn for_output(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("gif") => Ok(Self::Gif),
            None => Ok(Self::PngSequence),
            Some(other) => bail!(
                "unsupported output extension '.{other}' for {}; use .gif or a directory",
                path.display()
            ),
        }
    }
}

pub fn sink_for_output(path: &Path) -> Result<Box<dyn FrameSink>> {
    let sink: Box<dyn FrameSink> = match SinkKind::for_output(path)? {
        SinkKind::Gif => Box::new(GifSink::new(path)),
        SinkKind::PngSequence => Box::new(PngSequenceSink::new(path)),
    };
    Ok(sink)
}

pub struct GifSink {
    output_path: PathBuf,
}

impl GifSink {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }
}

impl FrameSink for GifSink {
    fn label(&self) -> &'static str {
        "gif"
    }

    fn write(&mut self, frames: &[Frame], timing: &FrameTiming, loop_forever: bool) -> Result<()> {
        if frames.is_empty() {
            bail!("refusing to write an empty gif");
        }
        if let Some(parent) = self.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let bytes = encode_gif(frames, timing, loop_forever)?;
        fs::write(&self.output_path, &bytes)
            .with_context(|| format!("failed to write {}", self.output_path.display()))?;

        info!(
            path = %self.output_path.display(),
            frames = frames.len(),
            "wrote gif"
        );
        Ok(())
    }
}

/// Whole animation in memory, trailer included. Consecutive frames sharing
/// pixels (dwell copies) are merged into one frame with the summed delay.
pub fn encode_gif(frames: &[Frame], timing: &FrameTiming, loop_forever: bool) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut bytes, GIF_QUANTIZER_SPEED);
        if loop_forever {
            encoder
                .set_repeat(Repeat::Infinite)
                .context("failed to set gif repeat")?;
        }
        for (index, (frame, delay_ms)) in merge_shared_frames(frames, timing).into_iter().enumerate() {
            let delay = Delay::from_numer_denom_ms(delay_ms, 1);
            encoder
                .encode_frame(GifFrame::from_parts(frame.image().clone(), 0, 0, delay))
                .with_context(|| format!("failed to encode gif frame {index}"))?;
        }
    }
    Ok(bytes)
}

/// Runs of frames that share one pixel buffer, each with its total delay.
pub fn merge_shared_frames<'a>(frames: &'a [Frame], timing: &FrameTiming) -> Vec<(&'a Frame, u32)> {
    let mut merged: Vec<(&Frame, u32)> = Vec::with_capacity(frames.len());
    for (index, frame) in frames.iter().enumerate() {
        let delay = timing.delay_for(index);
        if let Some((last, total)) = merged.last_mut() {
            if last.shares_pixels(frame) {
                *total += delay;
                continue;
            }
        }
        merged.push((frame, delay));
    }
    merged
}

pub struct PngSequenceSink {
    output_dir: PathBuf,
}

#[derive(Serialize)]
struct TimingManifest<'a> {
    frames: usize,
    loop_forever: bool,
    timing: &'a FrameTiming,
    delays_ms: Vec<u32>,
}

impl PngSequenceSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!("frame_{index:04}.png"))
    }
}

impl FrameSink for PngSequenceSink {
    fn label(&self) -> &'static str {
        "png-sequence"
    }

    fn write(&mut self, frames: &[Frame], timing: &FrameTiming, loop_forever: bool) -> Result<()> {
        if frames.is_empty() {
            bail!("refusing to write an empty png sequence");
        }
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;

        for (index, frame) in frames.iter().enumerate() {
            let path = self.frame_path(index);
            frame
                .image()
                .save_with_format(&path, ImageFormat::Png)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }

        let manifest = TimingManifest {
            frames: frames.len(),
            loop_forever,
            timing,
            delays_ms: (0..frames.len()).map(|index| timing.delay_for(index)).collect(),
        };
        let timing_path = self.output_dir.join(TIMING_FILE);
        let json = serde_json::to_string_pretty(&manifest).context("failed to encode timing")?;
        fs::write(&timing_path, json)
            .with_context(|| format!("failed to write {}", timing_path.display()))?;

        info!(
            dir = %self.output_dir.display(),
            frames = frames.len(),
            "wrote png sequence"
        );
        Ok(())
    }
}
