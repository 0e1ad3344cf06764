//! Key frame generation and transition synthesis.
//!
//! The supplier asks the inference API for key frames one at a time; the
//! synthesizer then inserts blended frames between each consecutive pair.
//! Both stages skip individual failures and report them alongside their
//! successes.

mod supplier;
mod transitions;
mod types;

use std::path::Path;

use image::RgbImage;

pub use supplier::{
    frame_file_name, FrameGenerationError, FrameSupplier, SupplyReport, DEFAULT_REQUEST_DELAY,
};
pub use transitions::{
    blend, synthesize, transition_file_name, SynthesisReport, TransitionError, BLEND_RATIOS,
    TRANSITIONS_PER_PAIR,
};
pub use types::{FrameAttempt, FrameFailure, FrameSequence, KeyFrame, SkippedFrame, TransitionFailure};

/// Decode an image file into 8-bit RGB.
///
/// The format is detected from the file contents, so a JPEG stored under a
/// `.png` name still decodes.
pub fn load_rgb(path: &Path) -> image::ImageResult<RgbImage> {
    let image = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?;
    Ok(image.to_rgb8())
}
