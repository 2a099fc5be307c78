//! Upstream generative-language provider integration
//!
//! The proxy forwards exactly one payload per inbound request to either the
//! Imagen `:predict` endpoint or the Gemini `:generateContent` endpoint.

pub mod gemini;
pub mod mock;

pub use gemini::{GeminiHttpClient, UpstreamPayload};
pub use mock::MockUpstreamClient;

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait UpstreamService: Send + Sync {
    /// Sends one payload and returns the provider's JSON body untouched.
    async fn forward(&self, payload: &UpstreamPayload) -> Result<Value>;
}
