//! Generation requests and the response handed back to callers.

use serde::{Deserialize, Serialize};

use crate::config::LimitsConfig;

/// Default clip length in seconds.
pub const DEFAULT_DURATION: u32 = 3;

/// Default frame rate.
pub const DEFAULT_FPS: u32 = 12;

/// A prompt plus the requested clip length and frame rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_duration() -> u32 {
    DEFAULT_DURATION
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, duration: u32, fps: u32) -> Self {
        Self {
            prompt: prompt.into(),
            duration,
            fps,
        }
    }

    /// Check the prompt and the configured duration/fps bounds.
    pub fn validate(&self, limits: &LimitsConfig) -> Result<(), RequestError> {
        if self.prompt.trim().is_empty() {
            return Err(RequestError::EmptyPrompt);
        }
        if self.duration < limits.min_duration || self.duration > limits.max_duration {
            return Err(RequestError::DurationOutOfRange {
                value: self.duration,
                min: limits.min_duration,
                max: limits.max_duration,
            });
        }
        if self.fps < limits.min_fps || self.fps > limits.max_fps {
            return Err(RequestError::FpsOutOfRange {
                value: self.fps,
                min: limits.min_fps,
                max: limits.max_fps,
            });
        }
        Ok(())
    }

    /// Frames the finished video should contain.
    pub fn total_frames(&self) -> usize {
        self.duration as usize * self.fps as usize
    }
}

/// Errors for requests that fall outside the configured limits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("Duration {value}s is outside the allowed range {min}..={max}")]
    DurationOutOfRange { value: u32, min: u32, max: u32 },

    #[error("Frame rate {value} is outside the allowed range {min}..={max}")]
    FpsOutOfRange { value: u32, min: u32, max: u32 },
}

/// Result of a successful generation as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoResponse {
    pub message: String,
    /// File name only, relative to the videos directory.
    pub video_path: String,
    pub download_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_deserializing() {
        let request: GenerationRequest =
            serde_json::from_str(r#"{"prompt": "A beautiful sunset over mountains"}"#).unwrap();
        assert_eq!(request.duration, 3);
        assert_eq!(request.fps, 12);
        assert_eq!(request.total_frames(), 36);
    }

    #[test]
    fn test_validate_bounds() {
        let limits = LimitsConfig::default();
        assert!(GenerationRequest::new("x", 2, 2).validate(&limits).is_ok());
        assert!(GenerationRequest::new("x", 60, 60).validate(&limits).is_ok());

        assert_eq!(
            GenerationRequest::new("x", 1, 12).validate(&limits),
            Err(RequestError::DurationOutOfRange {
                value: 1,
                min: 2,
                max: 60
            })
        );
        assert_eq!(
            GenerationRequest::new("x", 3, 61).validate(&limits),
            Err(RequestError::FpsOutOfRange {
                value: 61,
                min: 2,
                max: 60
            })
        );
        assert_eq!(
            GenerationRequest::new("  ", 3, 12).validate(&limits),
            Err(RequestError::EmptyPrompt)
        );
    }

    #[test]
    fn test_request_error_display() {
        let err = RequestError::DurationOutOfRange {
            value: 90,
            min: 2,
            max: 60,
        };
        assert_eq!(
            err.to_string(),
            "Duration 90s is outside the allowed range 2..=60"
        );
    }

    #[test]
    fn test_video_response_serialization() {
        let response = VideoResponse {
            message: "Video generated successfully".to_string(),
            video_path: "video_1700000000.mp4".to_string(),
            download_url: "/download-video?path=video_1700000000.mp4".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["video_path"], "video_1700000000.mp4");
        assert_eq!(
            json["download_url"],
            "/download-video?path=video_1700000000.mp4"
        );
    }
}
