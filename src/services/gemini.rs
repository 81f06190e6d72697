// src/services/gemini.rs
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use reqwest::Client;
use serde_json::{Value, json};

use crate::errors::EaselError;
use crate::models::{GenerationRequest, ImageArtifact, ProviderKind, ResolvedDimensions};
use crate::services::provider::{ImageProvider, classify_upstream_status};

const DEFAULT_MODEL: &str = "gemini-3-pro-image";

/// Synchronous provider: one `generateContent` call returns the image
/// inline as a base64 part.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn build_body(&self, request: &GenerationRequest) -> Value {
        let mut parts = vec![json!({ "text": combined_prompt(request) })];
        if let Some(reference) = &request.reference_image {
            parts.push(json!({
                "inlineData": {
                    "mimeType": reference.mime_type,
                    "data": general_purpose::STANDARD.encode(&reference.data),
                }
            }));
        }

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "candidateCount": 1,
                "imageConfig": {
                    "aspectRatio": request.aspect_ratio.as_str(),
                    "imageSize": request.quality.as_str(),
                }
            },
            "safetySettings": safety_settings(),
        })
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn generate(
        &self,
        credential: &str,
        request: &GenerationRequest,
        dims: ResolvedDimensions,
    ) -> Result<ImageArtifact, EaselError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", credential)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| EaselError::UpstreamUnavailable(format!("gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_upstream_status(status, &body));
        }

        let body: Value = response.json().await.map_err(|e| {
            EaselError::UpstreamUnavailable(format!("failed to parse gemini response: {}", e))
        })?;

        extract_inline_image(&body, dims)
    }
}

/// No native negative-prompt field exists; the negative text rides along in
/// the prompt behind a textual marker. Lossy, and accepted as such.
fn combined_prompt(request: &GenerationRequest) -> String {
    match &request.negative_prompt {
        Some(negative) => format!("{}\n\nAvoid: {}", request.prompt, negative),
        None => request.prompt.clone(),
    }
}

fn safety_settings() -> Value {
    json!([
        { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE" },
        { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE" },
        { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_NONE" },
        { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE" },
    ])
}

/// Scans the candidate parts for the first inline image. A 200 with only
/// text parts (a safety refusal, typically) must not pass silently.
fn extract_inline_image(
    body: &Value,
    dims: ResolvedDimensions,
) -> Result<ImageArtifact, EaselError> {
    let parts = body["candidates"][0]["content"]["parts"].as_array();

    if let Some(parts) = parts {
        for part in parts {
            let inline = &part["inlineData"];
            if let Some(data) = inline["data"].as_str() {
                let bytes = general_purpose::STANDARD.decode(data).map_err(|e| {
                    EaselError::MissingImageData(format!("inline image base64 is invalid: {}", e))
                })?;
                let mime_type = inline["mimeType"].as_str().unwrap_or("image/png").to_string();
                return Ok(ImageArtifact {
                    bytes: Bytes::from(bytes),
                    mime_type,
                    width: dims.width,
                    height: dims.height,
                });
            }
        }
    }

    // Surface whatever text the model produced instead of an image.
    let refusal = parts
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();
    Err(EaselError::MissingImageData(refusal))
}
