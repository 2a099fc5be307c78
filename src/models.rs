//! Data models and structures
//!
//! Defines the inbound request shape sent by the browser client and the
//! process-wide configuration resolved at startup.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8888";
pub const DEFAULT_MAX_BODY_BYTES: usize = 6 * 1024 * 1024;

/// Which upstream endpoint a request is routed to.
///
/// Only the exact JSON string `"image"` selects [`RequestType::Image`]; any
/// other value, including a missing field, falls back to text generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Value")]
pub enum RequestType {
    #[default]
    Text,
    Image,
}

impl From<Value> for RequestType {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) if s == "image" => RequestType::Image,
            _ => RequestType::Text,
        }
    }
}

/// Fields are read leniently: `null` means absent, and `isJson` follows
/// JSON truthiness rather than requiring a boolean.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
    #[serde(default)]
    pub request_type: RequestType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt: String,
    #[serde(default, deserialize_with = "truthy")]
    pub is_json: bool,
    #[serde(default)]
    pub image_data: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

impl InboundRequest {
    /// Parse a raw request body. Only JSON objects are accepted.
    pub fn from_slice(body: &[u8]) -> crate::Result<Self> {
        let value: Value = serde_json::from_slice(body)?;
        if !value.is_object() {
            return Err(crate::Error::InvalidRequest(
                "request body must be a JSON object".to_string(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Base64 attachment, if one was supplied. Empty strings count as absent.
    pub fn attachment(&self) -> Option<&str> {
        self.image_data.as_deref().filter(|data| !data.is_empty())
    }
}

/// How upstream non-success statuses are surfaced to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Every failure becomes a 500, matching existing clients.
    #[default]
    Collapse,
    /// Upstream 4xx/5xx statuses are passed through; local failures stay 500.
    Preserve,
}

/// Where and how the upstream provider is reached.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub timeout: Option<Duration>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            timeout: None,
        }
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub upstream: UpstreamConfig,
    pub bind_addr: SocketAddr,
    pub max_body_bytes: usize,
    pub status_policy: StatusPolicy,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = non_empty("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| crate::Error::Config(format!("BIND_ADDR is invalid: {}", e)))?;

        let max_body_bytes = match non_empty("MAX_BODY_BYTES") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                crate::Error::Config(format!("MAX_BODY_BYTES is invalid: {}", e))
            })?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        let timeout = match non_empty("UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(raw.trim().parse::<u64>().map_err(|e| {
                crate::Error::Config(format!("UPSTREAM_TIMEOUT_SECS is invalid: {}", e))
            })?)),
            None => None,
        };

        let status_policy = match non_empty("PRESERVE_UPSTREAM_STATUS").as_deref() {
            None => StatusPolicy::Collapse,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => StatusPolicy::Preserve,
                "0" | "false" | "no" | "off" => StatusPolicy::Collapse,
                other => {
                    return Err(crate::Error::Config(format!(
                        "PRESERVE_UPSTREAM_STATUS must be a boolean, got '{}'",
                        other
                    )))
                }
            },
        };

        Ok(Self {
            api_key: non_empty("GOOGLE_API_KEY"),
            upstream: UpstreamConfig {
                base_url: non_empty("GEMINI_BASE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                text_model: non_empty("TEXT_MODEL")
                    .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
                image_model: non_empty("IMAGE_MODEL")
                    .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
                timeout,
            },
            bind_addr,
            max_body_bytes,
            status_policy,
        })
    }
}
