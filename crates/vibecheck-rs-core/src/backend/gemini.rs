//! Gemini `generateContent` backend over HTTP.

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use vibecheck_rs_protocol::{GenerationBackend, GenerationError, GenerationRequest, RawResponse};

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_HARASSMENT",
];
const INPUT_IMAGE_MIME: &str = "image/png";

/// Gemini REST client. The API key is sent as a header, never in the URL.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_base, api_key)
    }

    pub fn with_client(
        client: reqwest::Client,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.api_base, model)
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse, GenerationError> {
        let url = self.endpoint(&request.model);
        debug!(
            "sending gemini request (model={}, image_output={}, has_image={})",
            request.model,
            request.image_output,
            request.prompt_image.is_some()
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request_body(request))
            .send()
            .await
            .map_err(|err| GenerationError::Backend(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Backend(format!(
                "Gemini API error ({status}): {body}"
            )));
        }

        let body = response
            .json::<GeminiResponse>()
            .await
            .map_err(|err| GenerationError::Malformed(err.to_string()))?;
        parse_response(body, request.image_output)
    }
}

/// Build the JSON body for a `generateContent` call.
pub(crate) fn build_request_body(request: &GenerationRequest) -> GeminiRequest {
    let mut parts = Vec::with_capacity(2);
    if let Some(image) = &request.prompt_image {
        let data = image
            .split_once(',')
            .map(|(_, payload)| payload)
            .unwrap_or(image);
        parts.push(GeminiPart {
            inline_data: Some(InlineData {
                mime_type: INPUT_IMAGE_MIME.to_string(),
                data: data.to_string(),
            }),
            ..GeminiPart::default()
        });
    }
    parts.push(GeminiPart {
        text: Some(request.prompt.clone()),
        ..GeminiPart::default()
    });

    let thinking_config = (request.thinking_capable && !request.thinking)
        .then_some(ThinkingConfig { thinking_budget: 0 });
    let response_modalities = request
        .image_output
        .then(|| vec!["TEXT".to_string(), "IMAGE".to_string()]);
    let generation_config = (thinking_config.is_some() || response_modalities.is_some()).then(
        || GenerationConfig {
            thinking_config,
            response_modalities,
        },
    );

    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts,
        }],
        system_instruction: Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: Some(request.system_instruction.clone()),
                ..GeminiPart::default()
            }],
        }),
        safety_settings: SAFETY_CATEGORIES
            .iter()
            .map(|category| SafetySetting {
                category: category.to_string(),
                threshold: "BLOCK_NONE".to_string(),
            })
            .collect(),
        generation_config,
    }
}

/// Extract the first image (image output) or the concatenated non-thought text.
pub(crate) fn parse_response(
    response: GeminiResponse,
    image_output: bool,
) -> Result<RawResponse, GenerationError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Malformed("response has no candidates".to_string()))?;
    let parts = candidate.content.map(|content| content.parts).unwrap_or_default();

    if image_output {
        return parts
            .into_iter()
            .find_map(|part| part.inline_data)
            .map(|inline| RawResponse::Image {
                mime_type: inline.mime_type,
                data: inline.data,
            })
            .ok_or_else(|| GenerationError::Malformed("response has no image part".to_string()));
    }

    let texts: Vec<String> = parts
        .into_iter()
        .filter(|part| !part.thought.unwrap_or(false))
        .filter_map(|part| part.text)
        .collect();
    if texts.is_empty() {
        return Err(GenerationError::Malformed(
            "response has no text part".to_string(),
        ));
    }
    Ok(RawResponse::Text(texts.concat()))
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    safety_settings: Vec<SafetySetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}
