use super::types::UpstreamPayload;
use crate::ai::UpstreamService;
use crate::models::UpstreamConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Gemini/Imagen REST client that forwards payloads using a server-side key.
pub struct GeminiHttpClient {
    client: Client,
    api_key: String,
    text_model: String,
    image_model: String,
    base_url: String,
    timeout: Option<Duration>,
}

impl GeminiHttpClient {
    pub fn new(api_key: String, upstream: &UpstreamConfig) -> Self {
        Self::new_with_client(api_key, upstream, Client::new())
    }

    /// Construct a client over a shared connection pool.
    ///
    /// Model IDs may be given bare (`gemini-2.0-flash`) or with a `models/`
    /// prefix; the prefix is stripped.
    pub fn new_with_client(api_key: String, upstream: &UpstreamConfig, client: Client) -> Self {
        Self {
            client,
            api_key,
            text_model: bare_model(&upstream.text_model),
            image_model: bare_model(&upstream.image_model),
            base_url: upstream.base_url.trim_end_matches('/').to_string(),
            timeout: upstream.timeout,
        }
    }

    /// Endpoint URL (without the credential) a payload is sent to.
    pub fn endpoint_url(&self, payload: &UpstreamPayload) -> String {
        match payload {
            UpstreamPayload::Image(_) => format!(
                "{}/v1beta/models/{}:predict",
                self.base_url, self.image_model
            ),
            UpstreamPayload::Text(_) => format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.text_model
            ),
        }
    }

    async fn post_to_url(&self, url: String, payload: &UpstreamPayload) -> Result<Value> {
        let label = payload.label();

        let mut request = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .header("Content-Type", "application/json")
            .json(payload);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        // The request URL carries the key, so it is stripped from any error.
        let response = request.send().await.map_err(|e| {
            let e = e.without_url();
            tracing::error!("Failed to send {} request to Gemini: {}", label, e);
            e
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| e.without_url())?;

        if !status.is_success() {
            tracing::error!("{} API error (status {}): {}", label, status, body);
            return Err(Error::UpstreamRejected {
                label,
                status: status.as_u16(),
                message: upstream_error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse {} API response: {}\nBody: {}", label, e, body);
            Error::AiProvider(format!("Failed to parse {} API response: {}", label, e))
        })
    }
}

#[async_trait]
impl UpstreamService for GeminiHttpClient {
    async fn forward(&self, payload: &UpstreamPayload) -> Result<Value> {
        let url = self.endpoint_url(payload);
        self.post_to_url(url, payload).await
    }
}

fn bare_model(model: &str) -> String {
    model.strip_prefix("models/").unwrap_or(model).to_string()
}

/// Pulls `error.message` out of an upstream error body, if it is JSON.
pub fn upstream_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::gemini::types::{
        Content, GenerateContentRequest, Instance, Part, PredictParameters, PredictRequest,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_client(server: &MockServer, api_key: &str) -> GeminiHttpClient {
        let upstream = UpstreamConfig {
            base_url: server.uri(),
            ..UpstreamConfig::default()
        };
        GeminiHttpClient::new(api_key.to_string(), &upstream)
    }

    fn text_payload(prompt: &str) -> UpstreamPayload {
        UpstreamPayload::Text(GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part::Text {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: None,
        })
    }

    fn image_payload(prompt: &str) -> UpstreamPayload {
        UpstreamPayload::Image(PredictRequest {
            instances: vec![Instance {
                prompt: prompt.to_string(),
            }],
            parameters: PredictParameters { sample_count: 1 },
        })
    }

    #[test]
    fn test_upstream_error_message_extracts_nested_message() {
        let body = r#"{"error":{"code":429,"message":"quota exceeded"}}"#;
        assert_eq!(
            upstream_error_message(body).as_deref(),
            Some("quota exceeded")
        );
    }

    #[test]
    fn test_upstream_error_message_ignores_other_shapes() {
        assert_eq!(upstream_error_message("forbidden"), None);
        assert_eq!(upstream_error_message(r#"{"error":"flat"}"#), None);
        assert_eq!(upstream_error_message(r#"{"error":{"message":5}}"#), None);
    }

    #[test]
    fn test_endpoint_url_strips_models_prefix() {
        let upstream = UpstreamConfig {
            base_url: "http://stub/".to_string(),
            text_model: "models/gemini-test".to_string(),
            image_model: "imagen-test".to_string(),
            timeout: None,
        };
        let client = GeminiHttpClient::new("k".to_string(), &upstream);

        assert_eq!(
            client.endpoint_url(&text_payload("x")),
            "http://stub/v1beta/models/gemini-test:generateContent"
        );
        assert_eq!(
            client.endpoint_url(&image_payload("x")),
            "http://stub/v1beta/models/imagen-test:predict"
        );
    }

    #[tokio::test]
    async fn test_forward_text_passes_body_through() {
        let server = MockServer::start().await;
        let reply = json!({
            "candidates": [{ "content": { "parts": [{ "text": "hello" }] } }]
        });

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hi" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let client = make_client(&server, "test-key");
        let value = client.forward(&text_payload("hi")).await.unwrap();
        assert_eq!(value, reply);
    }

    #[tokio::test]
    async fn test_forward_keeps_upstream_key_order() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"zeta":1,"alpha":2}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let client = make_client(&server, "test-key");
        let value = client.forward(&text_payload("hi")).await.unwrap();
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"zeta":1,"alpha":2}"#
        );
    }

    #[tokio::test]
    async fn test_forward_image_targets_predict_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/imagen-3.0-generate-002:predict"))
            .and(query_param("key", "test-key"))
            .and(body_json(json!({
                "instances": [{ "prompt": "a red fox" }],
                "parameters": { "sampleCount": 1 }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "predictions": [{ "bytesBase64Encoded": "AAAA" }] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = make_client(&server, "test-key");
        let value = client.forward(&image_payload("a red fox")).await.unwrap();
        assert_eq!(value["predictions"][0]["bytesBase64Encoded"], "AAAA");
    }

    #[tokio::test]
    async fn test_api_error_returns_upstream_rejected_with_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "quota exceeded", "status": "RESOURCE_EXHAUSTED" }
            })))
            .mount(&server)
            .await;

        let client = make_client(&server, "test-key");
        let err = client.forward(&text_payload("hi")).await.unwrap_err();

        match err {
            Error::UpstreamRejected {
                label,
                status,
                ref message,
            } => {
                assert_eq!(label, "Text");
                assert_eq!(status, 429);
                assert_eq!(message.as_deref(), Some("quota exceeded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_api_error_without_json_body_has_no_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = make_client(&server, "bad-key");
        let err = client.forward(&image_payload("x")).await.unwrap_err();
        assert_eq!(err.to_string(), "Image API request failed with status 403");
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_ai_provider_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = make_client(&server, "test-key");
        let err = client.forward(&text_payload("hi")).await.unwrap_err();
        assert!(matches!(err, Error::AiProvider(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_http_error_without_key_in_message() {
        let upstream = UpstreamConfig {
            // Nothing listens on port 1.
            base_url: "http://127.0.0.1:1".to_string(),
            ..UpstreamConfig::default()
        };
        let client = GeminiHttpClient::new("super-secret".to_string(), &upstream);

        let err = client.forward(&text_payload("hi")).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert!(!err.to_string().contains("super-secret"));
    }
}
