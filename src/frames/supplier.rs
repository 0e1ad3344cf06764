//! FrameSupplier - requests key frames from the inference API in sequence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::{FrameAttempt, FrameFailure, KeyFrame};
use crate::inference::{validate_prompt, InferenceClient, InferenceError};

/// Pause between consecutive image requests (3 seconds).
///
/// The hosted API throttles free-tier keys aggressively; this spacing keeps a
/// run under the limit. It is a fixed pause, not a retry.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(3);

/// File name for the key frame produced by request `index`.
pub fn frame_file_name(index: usize) -> String {
    format!("frame_{:03}.png", index)
}

/// Key frames produced by one `supply` call plus the requests that failed.
#[derive(Debug, Default)]
pub struct SupplyReport {
    /// Successfully written frames, in request order.
    pub frames: Vec<KeyFrame>,
    /// Requests that produced no frame, in request order.
    pub failures: Vec<FrameFailure>,
}

impl SupplyReport {
    /// Number of requests made.
    pub fn requested(&self) -> usize {
        self.frames.len() + self.failures.len()
    }
}

/// Sequential key frame generator backed by an [`InferenceClient`].
#[derive(Debug)]
pub struct FrameSupplier {
    client: InferenceClient,
    request_delay: Duration,
}

impl FrameSupplier {
    /// Create a supplier with the default 3 second request spacing.
    pub fn new(client: InferenceClient) -> Self {
        Self {
            client,
            request_delay: DEFAULT_REQUEST_DELAY,
        }
    }

    /// Override the pause between requests.
    pub fn with_request_delay(mut self, request_delay: Duration) -> Self {
        self.request_delay = request_delay;
        self
    }

    pub fn client(&self) -> &InferenceClient {
        &self.client
    }

    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    /// Request `count` images for `prompt`, writing each to `scratch_dir`.
    ///
    /// Requests are issued one at a time with `request_delay` between them.
    /// A failed request is logged and recorded; it never aborts the loop.
    ///
    /// # Errors
    ///
    /// Returns `FrameGenerationError::Inference` if the prompt is empty,
    /// `FrameGenerationError::Io` if `scratch_dir` cannot be created and
    /// `FrameGenerationError::AllFramesFailed` if no request produced a frame.
    pub async fn supply(
        &self,
        prompt: &str,
        count: usize,
        scratch_dir: &Path,
    ) -> Result<SupplyReport, FrameGenerationError> {
        validate_prompt(prompt)?;
        tokio::fs::create_dir_all(scratch_dir)
            .await
            .map_err(|source| FrameGenerationError::Io {
                path: scratch_dir.to_path_buf(),
                source,
            })?;

        log::info!("Requesting {} key frames from {}", count, self.client.endpoint());

        let mut report = SupplyReport::default();

        for index in 0..count {
            if index > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            match self.fetch(prompt, index, scratch_dir).await {
                FrameAttempt::Fetched(frame) => {
                    log::info!("Generated frame {}/{}", index + 1, count);
                    report.frames.push(frame);
                }
                FrameAttempt::Failed(failure) => {
                    log::warn!("Failed to generate frame {}/{}: {}", index + 1, count, failure.reason);
                    report.failures.push(failure);
                }
            }
        }

        if report.frames.is_empty() {
            log::error!("No frames were generated successfully ({} requested)", count);
            return Err(FrameGenerationError::AllFramesFailed {
                requested: count,
                failures: report.failures,
            });
        }

        if !report.failures.is_empty() {
            log::warn!(
                "{} of {} key frame requests failed",
                report.failures.len(),
                count
            );
        }

        Ok(report)
    }

    /// Issue a single request and turn its outcome into a [`FrameAttempt`].
    async fn fetch(&self, prompt: &str, index: usize, scratch_dir: &Path) -> FrameAttempt {
        let dest = scratch_dir.join(frame_file_name(index));
        match self.client.generate_image_to(prompt, &dest).await {
            Ok(path) => FrameAttempt::Fetched(KeyFrame::new(index, path)),
            Err(e) => FrameAttempt::Failed(FrameFailure {
                index,
                reason: e.to_string(),
            }),
        }
    }
}

/// Errors that end key frame generation for a run.
#[derive(Debug, thiserror::Error)]
pub enum FrameGenerationError {
    #[error("No frames were generated successfully ({} of {requested} requests failed)", .failures.len())]
    AllFramesFailed {
        /// Number of frames asked for
        requested: usize,
        /// Why each request failed
        failures: Vec<FrameFailure>,
    },

    #[error("Failed to create frame directory {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_frame_file_name_is_zero_padded() {
        assert_eq!(frame_file_name(0), "frame_000.png");
        assert_eq!(frame_file_name(7), "frame_007.png");
        assert_eq!(frame_file_name(123), "frame_123.png");
    }

    #[test]
    fn test_supplier_defaults() {
        let client = InferenceClient::with_api_key("key".to_string()).unwrap();
        let supplier = FrameSupplier::new(client);
        assert_eq!(supplier.request_delay(), Duration::from_secs(3));

        let supplier = supplier.with_request_delay(Duration::ZERO);
        assert_eq!(supplier.request_delay(), Duration::ZERO);
    }

    #[test]
    fn test_all_frames_failed_display() {
        let err = FrameGenerationError::AllFramesFailed {
            requested: 3,
            failures: vec![
                FrameFailure {
                    index: 0,
                    reason: "boom".to_string(),
                },
                FrameFailure {
                    index: 1,
                    reason: "boom".to_string(),
                },
                FrameFailure {
                    index: 2,
                    reason: "boom".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "No frames were generated successfully (3 of 3 requests failed)"
        );
    }

    #[test]
    fn test_supply_report_requested() {
        let report = SupplyReport {
            frames: vec![KeyFrame::new(0, "a.png")],
            failures: vec![FrameFailure {
                index: 1,
                reason: "x".to_string(),
            }],
        };
        assert_eq!(report.requested(), 2);
    }

    #[tokio::test]
    async fn test_supply_rejects_empty_prompt_before_requesting() {
        let dir = tempfile::tempdir().unwrap();
        let client =
            InferenceClient::with_base_url("key".to_string(), "http://127.0.0.1:9".to_string())
                .unwrap();
        let supplier = FrameSupplier::new(client).with_request_delay(Duration::ZERO);

        let result = supplier.supply("   ", 3, dir.path()).await;
        assert!(matches!(
            result,
            Err(FrameGenerationError::Inference(InferenceError::EmptyPrompt))
        ));
    }

    #[tokio::test]
    async fn test_supply_pauses_between_requests_only() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = InferenceClient::with_base_url("key".to_string(), mock_server.uri()).unwrap();
        let delay = Duration::from_millis(200);
        let supplier = FrameSupplier::new(client).with_request_delay(delay);

        let started = Instant::now();
        let result = supplier.supply("fox", 3, dir.path()).await;
        let elapsed = started.elapsed();

        assert!(matches!(
            result,
            Err(FrameGenerationError::AllFramesFailed { requested: 3, .. })
        ));
        // Two pauses for three requests, none after the last.
        assert!(elapsed >= delay * 2, "elapsed {:?}", elapsed);
        assert!(elapsed < delay * 3, "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_supply_reports_unwritable_scratch_dir_as_io() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let scratch = blocker.join("run");

        let client =
            InferenceClient::with_base_url("key".to_string(), "http://127.0.0.1:9".to_string())
                .unwrap();
        let supplier = FrameSupplier::new(client).with_request_delay(Duration::ZERO);

        let err = supplier.supply("fox", 3, &scratch).await.unwrap_err();
        match err {
            FrameGenerationError::Io { ref path, .. } => assert_eq!(path, &scratch),
            ref other => panic!("expected Io, got {:?}", other),
        }
        assert!(err.to_string().starts_with("Failed to create frame directory"));
    }
}
