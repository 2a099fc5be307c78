//! Gemini and Imagen request payloads forwarded by the proxy.

use serde::Serialize;

/// One outbound body, shaped for the endpoint it is sent to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UpstreamPayload {
    Image(PredictRequest),
    Text(GenerateContentRequest),
}

impl UpstreamPayload {
    /// Short endpoint name used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            UpstreamPayload::Image(_) => "Image",
            UpstreamPayload::Text(_) => "Text",
        }
    }
}

/// Imagen `:predict` request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictRequest {
    pub instances: Vec<Instance>,
    pub parameters: PredictParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instance {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictParameters {
    pub sample_count: u32,
}

/// Gemini `:generateContent` request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
}

/// Gemini content container.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

/// Untagged union of text and inline media content parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

/// Base64 inline payload used for image attachments.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}
