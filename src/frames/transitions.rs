//! Linear cross-fade frames between consecutive key frames.

use std::path::{Path, PathBuf};

use image::RgbImage;

use super::load_rgb;
use super::types::{KeyFrame, TransitionFailure};

/// Number of blended frames inserted between each key frame pair.
pub const TRANSITIONS_PER_PAIR: usize = 3;

/// Blend ratios for the inserted frames, in playback order.
pub const BLEND_RATIOS: [f32; TRANSITIONS_PER_PAIR] = [0.25, 0.5, 0.75];

/// File name for blend step `step` (1-based) after the key frame produced by
/// request `from`.
pub fn transition_file_name(from: usize, step: usize) -> String {
    format!("transition_{:03}_{:02}.png", from, step)
}

/// Frames produced by [`synthesize`] and the pairs that were dropped.
#[derive(Debug, Default)]
pub struct SynthesisReport {
    pub frames: Vec<PathBuf>,
    pub failures: Vec<TransitionFailure>,
}

/// Errors from blending a single pair.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("dimension mismatch: {left:?} vs {right:?}")]
    DimensionMismatch {
        left: (u32, u32),
        right: (u32, u32),
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Pixel-wise linear interpolation `a * (1 - t) + b * t`.
///
/// `t` is clamped to `[0, 1]`; channel values are rounded to nearest.
pub fn blend(a: &RgbImage, b: &RgbImage, t: f32) -> Result<RgbImage, TransitionError> {
    if a.dimensions() != b.dimensions() {
        return Err(TransitionError::DimensionMismatch {
            left: a.dimensions(),
            right: b.dimensions(),
        });
    }

    let t = t.clamp(0.0, 1.0);
    let (width, height) = a.dimensions();
    let mut out = RgbImage::new(width, height);

    for ((dst, pa), pb) in out.pixels_mut().zip(a.pixels()).zip(b.pixels()) {
        for c in 0..3 {
            let mixed = pa.0[c] as f32 * (1.0 - t) + pb.0[c] as f32 * t;
            dst.0[c] = mixed.round().clamp(0.0, 255.0) as u8;
        }
    }

    Ok(out)
}

/// Build the full frame sequence for `key_frames`.
///
/// For every consecutive pair the leading key frame is emitted followed by
/// one blended frame per entry of [`BLEND_RATIOS`], written to `output_dir`.
/// The last key frame is appended once at the end. With no failures the
/// result holds `n + 3 * (n - 1)` frames.
///
/// A pair that cannot be read, has mismatched sizes, or cannot be written
/// loses its whole segment, leading key frame included, and is recorded in
/// the report. Transition files and failure records use the request indices
/// of the key frames, so they line up with `frame_{index}` files even after
/// earlier requests failed.
pub fn synthesize(key_frames: &[KeyFrame], output_dir: &Path) -> SynthesisReport {
    let mut report = SynthesisReport::default();

    let Some(last) = key_frames.last() else {
        return report;
    };

    for pair in key_frames.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        match blend_pair(from, to, output_dir) {
            Ok(transitions) => {
                report.frames.push(from.path.clone());
                report.frames.extend(transitions);
            }
            Err(e) => {
                log::warn!(
                    "Transition error between frames {}-{}: {}",
                    from.index,
                    to.index,
                    e
                );
                report.failures.push(TransitionFailure {
                    pair: (from.index, to.index),
                    reason: e.to_string(),
                });
            }
        }
    }

    report.frames.push(last.path.clone());

    log::info!(
        "Synthesized {} frames from {} key frames ({} pairs skipped)",
        report.frames.len(),
        key_frames.len(),
        report.failures.len()
    );

    report
}

/// Write the blended frames for one pair, returning their paths in order.
///
/// Nothing is returned unless every blend was written; files already written
/// for a failing pair are removed.
fn blend_pair(
    from: &KeyFrame,
    to: &KeyFrame,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, TransitionError> {
    let a = load_rgb(&from.path).map_err(|source| TransitionError::Read {
        path: from.path.clone(),
        source,
    })?;
    let b = load_rgb(&to.path).map_err(|source| TransitionError::Read {
        path: to.path.clone(),
        source,
    })?;

    let mut written = Vec::with_capacity(TRANSITIONS_PER_PAIR);
    for (step, ratio) in BLEND_RATIOS.iter().enumerate() {
        let path = output_dir.join(transition_file_name(from.index, step + 1));
        let result = blend(&a, &b, *ratio).and_then(|blended| match blended.save(&path) {
            Ok(()) => Ok(path),
            Err(source) => Err(TransitionError::Write { path, source }),
        });

        match result {
            Ok(path) => written.push(path),
            Err(e) => {
                for path in &written {
                    let _ = std::fs::remove_file(path);
                }
                return Err(e);
            }
        }
    }

    Ok(written)
}
