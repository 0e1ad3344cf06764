//! Hosted text-to-image inference integration.
//!
//! Key frames are produced by a remote diffusion model reached over plain
//! HTTP. This module owns the request format, authentication and response
//! classification; sequencing and rate limiting live in the frame supplier.

mod client;

pub use client::{
    validate_prompt, InferenceClient, InferenceError, API_KEY_ENV, DEFAULT_BASE_URL,
    DEFAULT_MODEL,
};
