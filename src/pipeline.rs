//! Prompt-to-video orchestration.
//!
//! A run requests key frames, synthesizes transitions between them, trims the
//! sequence to the requested length and encodes it. Intermediate frames live
//! in a per-run scratch directory that is removed however the run ends.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::encoder::{EncodeError, FfmpegEncoder, VideoEncoder};
use crate::frames::{
    synthesize, FrameFailure, FrameGenerationError, FrameSupplier, SkippedFrame,
    TransitionFailure,
};
use crate::inference::{InferenceClient, InferenceError};
use crate::library::download_url;
use crate::request::{GenerationRequest, VideoResponse};
use crate::scratch::{new_run_id, RunScratch};

/// Fewest key frames requested for any run.
pub const MIN_KEY_FRAMES: usize = 3;

/// One key frame is requested per this many output frames.
pub const FRAMES_PER_KEY_FRAME: usize = 10;

/// Number of key frames to request for a video of `total_frames` frames.
pub fn key_frame_count(total_frames: usize) -> usize {
    (total_frames / FRAMES_PER_KEY_FRAME).max(MIN_KEY_FRAMES)
}

/// Output file name for a video finished at `timestamp` (Unix seconds).
pub fn video_file_name(timestamp: u64) -> String {
    format!("video_{}.mp4", timestamp)
}

/// Pick an unused `video_{timestamp}.mp4` path in `dir`.
///
/// Starts from the current time and moves forward a second at a time if a
/// file with that name already exists.
pub fn next_video_path(dir: &Path) -> PathBuf {
    let mut timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    loop {
        let candidate = dir.join(video_file_name(timestamp));
        if !candidate.exists() {
            return candidate;
        }
        timestamp += 1;
    }
}

/// A finished video on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoArtifact {
    pub path: PathBuf,
    pub filename: String,
}

/// Everything a successful run produced, including the items it dropped.
#[derive(Debug)]
pub struct GenerationReport {
    pub artifact: VideoArtifact,
    pub run_id: String,
    /// `duration * fps`, the length the sequence was trimmed to.
    pub total_frames: usize,
    pub key_frames_requested: usize,
    pub key_frames_produced: usize,
    /// Sequence length before trimming.
    pub frames_synthesized: usize,
    pub frames_encoded: usize,
    pub frame_failures: Vec<FrameFailure>,
    pub transition_failures: Vec<TransitionFailure>,
    pub skipped_frames: Vec<SkippedFrame>,
}

impl GenerationReport {
    /// True if any key frame, transition or encoded frame was lost.
    pub fn is_degraded(&self) -> bool {
        !self.frame_failures.is_empty()
            || !self.transition_failures.is_empty()
            || !self.skipped_frames.is_empty()
    }

    pub fn response(&self) -> VideoResponse {
        VideoResponse {
            message: "Video generated successfully".to_string(),
            video_path: self.artifact.filename.clone(),
            download_url: download_url(&self.artifact.filename),
        }
    }
}

/// Errors that end a generation run. Scratch files are already gone by the
/// time one of these reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum VideoGenerationError {
    #[error("Video generation failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Video generation failed: {0}")]
    Frames(#[from] FrameGenerationError),

    #[error("Video generation failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("Video generation failed: could not prepare scratch directory {path}: {source}")]
    Scratch {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The prompt-to-video pipeline.
pub struct Pipeline<E: VideoEncoder = FfmpegEncoder> {
    supplier: FrameSupplier,
    encoder: E,
    frames_dir: PathBuf,
    videos_dir: PathBuf,
}

impl Pipeline<FfmpegEncoder> {
    /// Build a pipeline from configuration.
    ///
    /// # Errors
    ///
    /// Returns `VideoGenerationError::Inference(InferenceError::MissingApiKey)`
    /// when neither the config nor the environment provides an API key.
    pub fn from_config(config: &Config) -> Result<Self, VideoGenerationError> {
        let inference = &config.inference;
        let api_key = inference
            .resolve_api_key()
            .ok_or(InferenceError::MissingApiKey)?;
        let client = InferenceClient::with_settings(
            api_key,
            inference.base_url.clone(),
            inference.model.clone(),
            inference.timeout(),
        )?;
        let supplier = FrameSupplier::new(client).with_request_delay(inference.request_delay());

        Ok(Self::new(
            supplier,
            FfmpegEncoder::new(),
            config.storage.frames_dir.clone(),
            config.storage.videos_dir.clone(),
        ))
    }
}

impl<E: VideoEncoder> Pipeline<E> {
    pub fn new(
        supplier: FrameSupplier,
        encoder: E,
        frames_dir: impl Into<PathBuf>,
        videos_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            supplier,
            encoder,
            frames_dir: frames_dir.into(),
            videos_dir: videos_dir.into(),
        }
    }

    pub fn frames_dir(&self) -> &Path {
        &self.frames_dir
    }

    pub fn videos_dir(&self) -> &Path {
        &self.videos_dir
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Generate a video for `request`.
    ///
    /// Bounds on duration and fps are the caller's responsibility; see
    /// [`GenerationRequest::validate`].
    pub async fn run(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationReport, VideoGenerationError> {
        log::info!("Starting video generation for prompt: '{}'", request.prompt);

        let run_id = new_run_id(&request.prompt);
        let scratch = RunScratch::create(&self.frames_dir, run_id).map_err(|source| {
            VideoGenerationError::Scratch {
                path: self.frames_dir.clone(),
                source,
            }
        })?;

        let result = self.run_stages(request, &scratch).await;
        drop(scratch);

        match &result {
            Ok(report) => log::info!(
                "Video successfully created at {}",
                report.artifact.path.display()
            ),
            Err(e) => log::error!("{}", e),
        }
        result
    }

    async fn run_stages(
        &self,
        request: &GenerationRequest,
        scratch: &RunScratch,
    ) -> Result<GenerationReport, VideoGenerationError> {
        let total_frames = request.total_frames();
        let key_frames = key_frame_count(total_frames);
        log::info!(
            "Generating {} key frames for {} total frames",
            key_frames,
            total_frames
        );

        let supplied = self
            .supplier
            .supply(&request.prompt, key_frames, scratch.path())
            .await?;

        log::info!("Creating transitions between frames");
        let synthesis = synthesize(&supplied.frames, scratch.path());
        let frames_synthesized = synthesis.frames.len();

        let mut frames = synthesis.frames;
        if frames.len() > total_frames {
            log::debug!("Trimming {} frames to {}", frames.len(), total_frames);
            frames.truncate(total_frames);
        }

        log::info!("Compiling {} frames into video", frames.len());
        let output = next_video_path(&self.videos_dir);
        let encoded = self.encoder.encode(&frames, &output, request.fps)?;

        let filename = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(GenerationReport {
            artifact: VideoArtifact {
                path: output,
                filename,
            },
            run_id: scratch.run_id().to_string(),
            total_frames,
            key_frames_requested: key_frames,
            key_frames_produced: supplied.frames.len(),
            frames_synthesized,
            frames_encoded: encoded.frames_written,
            frame_failures: supplied.failures,
            transition_failures: synthesis.failures,
            skipped_frames: encoded.skipped,
        })
    }
}
