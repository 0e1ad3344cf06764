//! Frame types shared between the supplier, synthesizer and encoder.

use std::fmt;
use std::path::{Path, PathBuf};

/// Ordered frame file locations in playback order.
pub type FrameSequence = Vec<PathBuf>;

/// A generated still image on disk and its position among the key frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFrame {
    /// Ordinal of the request that produced this frame.
    pub index: usize,
    /// Location of the encoded image.
    pub path: PathBuf,
}

impl KeyFrame {
    pub fn new(index: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A key frame request that produced no image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFailure {
    pub index: usize,
    pub reason: String,
}

impl fmt::Display for FrameFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame {}: {}", self.index, self.reason)
    }
}

/// Outcome of a single key frame request.
#[derive(Debug)]
pub enum FrameAttempt {
    Fetched(KeyFrame),
    Failed(FrameFailure),
}

/// A consecutive key frame pair whose segment was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionFailure {
    /// Indices into the key frame list, `(i, i + 1)`.
    pub pair: (usize, usize),
    pub reason: String,
}

impl fmt::Display for TransitionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "transition {}-{}: {}",
            self.pair.0, self.pair.1, self.reason
        )
    }
}

/// A frame the encoder could not decode and left out of the video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFrame {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for SkippedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}
