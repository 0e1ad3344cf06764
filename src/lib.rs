//! text-to-video library crate.
//!
//! Turns a text prompt into a short MP4: key frames come from a hosted
//! text-to-image model, transitions are blended locally, and the sequence is
//! encoded with ffmpeg.

pub mod config;
pub mod encoder;
pub mod frames;
pub mod inference;
pub mod library;
pub mod logging;
pub mod pipeline;
pub mod request;
pub mod scratch;

pub use pipeline::{GenerationReport, Pipeline, VideoArtifact, VideoGenerationError};
pub use request::GenerationRequest;
