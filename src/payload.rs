//! Translates inbound requests into upstream provider payloads.

use crate::ai::gemini::types::{
    Content, GenerateContentRequest, GenerationConfig, InlineData, Instance, Part,
    PredictParameters, PredictRequest, UpstreamPayload,
};
use crate::models::{InboundRequest, RequestType};

/// Media type declared for inline attachments. Clients only send PNG.
pub const ATTACHMENT_MIME_TYPE: &str = "image/png";
pub const JSON_MIME_TYPE: &str = "application/json";
const IMAGE_SAMPLE_COUNT: u32 = 1;

pub fn build(request: &InboundRequest) -> UpstreamPayload {
    match request.request_type {
        RequestType::Image => image_payload(&request.prompt),
        RequestType::Text => {
            text_payload(&request.prompt, request.attachment(), request.is_json)
        }
    }
}

pub fn image_payload(prompt: &str) -> UpstreamPayload {
    UpstreamPayload::Image(PredictRequest {
        instances: vec![Instance {
            prompt: prompt.to_string(),
        }],
        parameters: PredictParameters {
            sample_count: IMAGE_SAMPLE_COUNT,
        },
    })
}

/// Single user turn: the prompt, then the attachment if there is one.
///
/// `generationConfig` is only present when JSON output was asked for; it is
/// never sent with a false/default value.
pub fn text_payload(prompt: &str, attachment: Option<&str>, is_json: bool) -> UpstreamPayload {
    let mut parts = vec![Part::Text {
        text: prompt.to_string(),
    }];
    if let Some(data) = attachment {
        parts.push(Part::InlineData {
            inline_data: InlineData {
                mime_type: ATTACHMENT_MIME_TYPE.to_string(),
                data: data.to_string(),
            },
        });
    }

    UpstreamPayload::Text(GenerateContentRequest {
        contents: vec![Content {
            role: "user".to_string(),
            parts,
        }],
        generation_config: is_json.then(|| GenerationConfig {
            response_mime_type: JSON_MIME_TYPE.to_string(),
        }),
    })
}
