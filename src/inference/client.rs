//! InferenceClient - handles communication with the hosted text-to-image API.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

/// The environment variable name for the inference API key.
pub const API_KEY_ENV: &str = "HUGGINGFACE_API_KEY";

/// Default base URL for the hosted inference API.
pub const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co/models";

/// Default text-to-image model.
pub const DEFAULT_MODEL: &str = "stabilityai/stable-diffusion-xl-base-1.0";

/// Default timeout for a single image request.
///
/// `wait_for_model` keeps the request open while a cold model loads, so this
/// is much longer than a typical API timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP status code for rate limiting.
const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// HTTP status code returned while the model is loading.
const HTTP_STATUS_SERVICE_UNAVAILABLE: u16 = 503;

/// Error bodies longer than this are cut before they reach logs and errors.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Validate a prompt before sending it to the API.
///
/// # Returns
/// `Ok(())` if the prompt is usable, `Err(InferenceError::EmptyPrompt)` for
/// empty or whitespace-only prompts.
pub fn validate_prompt(prompt: &str) -> Result<(), InferenceError> {
    if prompt.trim().is_empty() {
        return Err(InferenceError::EmptyPrompt);
    }
    Ok(())
}

/// Request body for image generation.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    /// The text prompt to render.
    inputs: &'a str,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    /// Block until the model is loaded instead of failing fast with 503.
    wait_for_model: bool,
}

/// Error payload the API sends while a model is being loaded.
#[derive(Debug, Deserialize)]
struct LoadingResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    estimated_time: Option<f64>,
}

/// Client for the hosted text-to-image inference API.
pub struct InferenceClient {
    api_key: String,
    base_url: String,
    model: String,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for InferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl InferenceClient {
    /// Create a new client by reading the API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError::MissingApiKey` if `HUGGINGFACE_API_KEY` is not
    /// set or is empty.
    pub fn new() -> Result<Self, InferenceError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| InferenceError::MissingApiKey)?;
        Self::with_api_key(api_key)
    }

    /// Create a new client with an explicit API key and the default endpoint.
    pub fn with_api_key(api_key: String) -> Result<Self, InferenceError> {
        Self::with_settings(
            api_key,
            DEFAULT_BASE_URL.to_string(),
            DEFAULT_MODEL.to_string(),
            DEFAULT_TIMEOUT,
        )
    }

    /// Create a new client with a custom base URL.
    ///
    /// Useful for testing against a mock server.
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, InferenceError> {
        Self::with_settings(api_key, base_url, DEFAULT_MODEL.to_string(), DEFAULT_TIMEOUT)
    }

    /// Create a new client with a custom model on the default endpoint.
    pub fn with_model(api_key: String, model: String) -> Result<Self, InferenceError> {
        Self::with_settings(api_key, DEFAULT_BASE_URL.to_string(), model, DEFAULT_TIMEOUT)
    }

    /// Create a new client with every setting spelled out.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError::MissingApiKey` for an empty key and
    /// `InferenceError::HttpError` if the HTTP client cannot be built.
    pub fn with_settings(
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, InferenceError> {
        if api_key.trim().is_empty() {
            return Err(InferenceError::MissingApiKey);
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            http_client,
        })
    }

    /// Get the API key.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the model.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Full URL of the model's inference endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url, self.model)
    }

    /// Request one image for `prompt` and return the raw encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError::EmptyPrompt` if the prompt is empty,
    /// `InferenceError::RateLimit` on 429, `InferenceError::ModelLoading` when
    /// the model is still warming up, `InferenceError::ApiError` for any other
    /// error status, `InferenceError::EmptyImage` for an empty success body, or
    /// `InferenceError::HttpError` if the request fails in transport.
    pub async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, InferenceError> {
        let response = self.send(prompt).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(InferenceError::EmptyImage);
        }
        Ok(bytes.to_vec())
    }

    /// Request one image for `prompt` and stream it to `dest`.
    ///
    /// Parent directories are created as needed. A partially written file is
    /// removed if the transfer fails midway.
    ///
    /// # Returns
    ///
    /// The path the image was written to.
    pub async fn generate_image_to(
        &self,
        prompt: &str,
        dest: &Path,
    ) -> Result<PathBuf, InferenceError> {
        let response = self.send(prompt).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match stream_to_file(response, dest).await {
            Ok(0) => {
                let _ = tokio::fs::remove_file(dest).await;
                Err(InferenceError::EmptyImage)
            }
            Ok(written) => {
                log::debug!("Wrote {} bytes to {}", written, dest.display());
                Ok(dest.to_path_buf())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(dest).await;
                Err(e)
            }
        }
    }

    /// Send the generation request and classify non-success responses.
    async fn send(&self, prompt: &str) -> Result<reqwest::Response, InferenceError> {
        validate_prompt(prompt)?;

        let request_body = GenerateRequest {
            inputs: prompt,
            options: GenerateOptions {
                wait_for_model: true,
            },
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();

        if status.as_u16() == HTTP_STATUS_TOO_MANY_REQUESTS {
            let retry_after_secs = parse_retry_after(&response);
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Rate limit exceeded".to_string());
            log::warn!(
                "Rate limited by inference API. Retry-After: {:?} seconds",
                retry_after_secs
            );
            return Err(InferenceError::RateLimit {
                message: truncate_body(&error_text),
                retry_after_secs,
            });
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if status.as_u16() == HTTP_STATUS_SERVICE_UNAVAILABLE {
            if let Ok(LoadingResponse {
                estimated_time: Some(estimated),
                error,
            }) = serde_json::from_str::<LoadingResponse>(&error_text)
            {
                log::warn!(
                    "Model is loading: {}",
                    error.as_deref().unwrap_or("no detail")
                );
                return Err(InferenceError::ModelLoading {
                    estimated_secs: estimated,
                });
            }
        }

        Err(InferenceError::ApiError(format!(
            "API request failed with status {}: {}",
            status,
            truncate_body(&error_text)
        )))
    }
}

/// Stream a response body to `dest`, returning the number of bytes written.
async fn stream_to_file(response: reqwest::Response, dest: &Path) -> Result<u64, InferenceError> {
    use futures_util::StreamExt;

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

/// Parse the Retry-After header value in seconds.
fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

fn truncate_body(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Errors that can occur while talking to the inference API.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Inference API key not configured (set HUGGINGFACE_API_KEY)")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Rate limited: {message}")]
    RateLimit {
        /// Body of the 429 response
        message: String,
        /// Retry-After header value in seconds, if provided
        retry_after_secs: Option<u64>,
    },

    #[error("Model is loading (estimated {estimated_secs:.0}s)")]
    ModelLoading {
        /// Server estimate until the model is ready
        estimated_secs: f64,
    },

    #[error("API returned an empty image")]
    EmptyImage,

    #[error("Empty prompt")]
    EmptyPrompt,
}
