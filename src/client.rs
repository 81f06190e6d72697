// src/client.rs
use reqwest::{Client, StatusCode};

use crate::errors::EaselError;
use crate::models::{
    GenerateRequest, GenerationRequest, HistoryEntry, ImageArtifact, ProviderKind,
    ResolvedDimensions,
};
use crate::services::{dimensions, splitter};
use crate::settings::UserSettings;

/// Browser-side orchestration, as a library: picks the relay path and
/// credential header for the chosen provider, receives the binary artifact,
/// and reads the JSON error envelope on failure. Splitting and uploading
/// are explicit follow-up calls; nothing here happens automatically and
/// nothing is retried.
pub struct RelayClient {
    http: Client,
    settings: UserSettings,
}

impl RelayClient {
    pub fn new(settings: UserSettings) -> Self {
        Self {
            http: Client::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    fn relay_url(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.settings.relay_base_url.trim_end_matches('/'),
            path
        )
    }

    /// Requests one generation and returns the artifact. Status codes are
    /// never interpreted here; the relay's envelope is the only error
    /// contract, with a generic fallback when even that cannot be parsed.
    pub async fn generate(
        &self,
        provider: ProviderKind,
        request: &GenerateRequest,
    ) -> Result<ImageArtifact, EaselError> {
        let url = self.relay_url(&format!("/api/v1/generate/{}", provider));
        let mut builder = self.http.post(url).json(request);
        if let Some(key) = self.settings.key_for(provider) {
            builder = builder.header(provider.credential_header(), key);
        }

        let response = builder.send().await.map_err(|e| {
            EaselError::UpstreamUnavailable(format!("relay unreachable: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_error_envelope(status, &body));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let width = dimension_header(&response, "X-Image-Width")?;
        let height = dimension_header(&response, "X-Image-Height")?;
        let bytes = response.bytes().await.map_err(|e| {
            EaselError::UpstreamUnavailable(format!("reading relay response failed: {}", e))
        })?;

        Ok(ImageArtifact {
            bytes,
            mime_type,
            width,
            height,
        })
    }

    /// Persists the artifact for sharing. Failure here leaves the artifact
    /// untouched; only the shareable URL is lost.
    pub async fn upload(&self, artifact: &ImageArtifact) -> Result<String, EaselError> {
        let response = self
            .http
            .post(self.relay_url("/api/v1/upload"))
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(artifact.bytes.clone())
            .send()
            .await
            .map_err(|e| EaselError::UpstreamUnavailable(format!("relay unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_error_envelope(status, &body));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            EaselError::UpstreamUnavailable(format!("unparseable upload response: {}", e))
        })?;
        body["url"].as_str().map(str::to_string).ok_or_else(|| {
            EaselError::UpstreamUnavailable("upload response carried no URL".to_string())
        })
    }

    /// Explicit follow-up: slice the artifact into its nine grid tiles.
    pub fn split_grid(&self, artifact: &ImageArtifact) -> Result<Vec<Vec<u8>>, EaselError> {
        splitter::split(&artifact.bytes)?.collect()
    }

    /// Explicit follow-up: build the history entry (with thumbnail) the
    /// consumer's history list stores.
    pub fn history_entry(
        &self,
        request: &GenerationRequest,
        provider: ProviderKind,
        artifact: &ImageArtifact,
        remote_url: Option<String>,
    ) -> Result<HistoryEntry, EaselError> {
        HistoryEntry::new(request, provider, artifact, remote_url)
    }

    /// Size for the preview canvas before the artifact arrives. Unsupported
    /// pairs fall back to the square lowest tier rather than erroring; the
    /// relay still validates the real request.
    pub fn canvas_size(
        &self,
        provider: ProviderKind,
        request: &GenerationRequest,
    ) -> ResolvedDimensions {
        dimensions::resolve_or_default(provider, request.aspect_ratio, request.quality)
    }
}

fn dimension_header(response: &reqwest::Response, name: &str) -> Result<u32, EaselError> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| {
            EaselError::UpstreamUnavailable(format!("relay response is missing {}", name))
        })
}

fn parse_error_envelope(status: StatusCode, body: &str) -> EaselError {
    let parsed: Option<(String, String)> = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            let error = value.get("error")?;
            Some((
                error.get("code")?.as_str()?.to_string(),
                error.get("message")?.as_str()?.to_string(),
            ))
        });

    match parsed {
        Some((code, message)) => EaselError::Relay { code, message },
        None => EaselError::Relay {
            code: "UNKNOWN".to_string(),
            message: format!("image generation failed (status {})", status.as_u16()),
        },
    }
}
