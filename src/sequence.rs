//! Frame ordering and timing: the dwell expansion and pacing curves.

use std::f64::consts::PI;

use serde::Serialize;

use crate::schema::Pacing;

/// Expands `frames` so each frame in turn dwells for `dwell` slots while the
/// rest play around it: for each `r`, `F[..r]`, then `F[r]` × `dwell`, then
/// `F[r+1..]`. Output length is `n × (n − 1 + dwell)`.
pub fn expand_dwell<T: Clone>(frames: &[T], dwell: usize) -> Vec<T> {
    let n = frames.len();
    let mut out = Vec::with_capacity(n * (n.saturating_sub(1) + dwell));
    for (focus, frame) in frames.iter().enumerate() {
        out.extend_from_slice(&frames[..focus]);
        out.extend(std::iter::repeat(frame).take(dwell).cloned());
        out.extend_from_slice(&frames[focus + 1..]);
    }
    out
}

/// Delay for each frame handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "ms", rename_all = "snake_case")]
pub enum FrameTiming {
    Uniform(u32),
    PerFrame(Vec<u32>),
}

impl FrameTiming {
    pub fn delay_for(&self, index: usize) -> u32 {
        match self {
            Self::Uniform(ms) => *ms,
            Self::PerFrame(delays) => delays.get(index).or(delays.last()).copied().unwrap_or(0),
        }
    }
}

/// Per-frame durations for `count` frames at `base_ms`.
pub fn pacing_timing(pacing: Pacing, count: usize, base_ms: u32) -> FrameTiming {
    if pacing == Pacing::Linear {
        return FrameTiming::Uniform(base_ms);
    }
    let base = f64::from(base_ms);
    let delays = (0..count)
        .map(|index| {
            let t = curve_position(pacing, index, count);
            let factor = match pacing {
                Pacing::Linear => 0.0,
                Pacing::EaseIn => t * t,
                Pacing::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
                Pacing::Bounce => (t * PI * 2.0).sin().abs(),
            };
            (base * (1.0 + factor)) as u32
        })
        .collect();
    FrameTiming::PerFrame(delays)
}

fn curve_position(pacing: Pacing, index: usize, count: usize) -> f64 {
    if count > 1 {
        index as f64 / (count - 1) as f64
    } else if pacing == Pacing::EaseOut {
        1.0
    } else {
        0.0
    }
}

/// Final frame order and timing. Dwell wins over pacing: an expanded
/// sequence always plays at the uniform base delay.
pub fn arrange<T: Clone>(frames: Vec<T>, dwell: usize, pacing: Pacing, base_ms: u32) -> (Vec<T>, FrameTiming) {
    if dwell > 0 {
        let expanded = expand_dwell(&frames, dwell);
        return (expanded, FrameTiming::Uniform(base_ms));
    }
    let timing = pacing_timing(pacing, frames.len(), base_ms);
    (frames, timing)
}
