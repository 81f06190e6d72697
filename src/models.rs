// src/models.rs
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::EaselError;

/// Hard ceiling on incoming prompt size, enforced before any upstream call.
pub const MAX_PROMPT_BYTES: usize = 8192;

/// The two upstream generation backends. Everything past the relay dispatch
/// depends on the `ImageProvider` trait, never on these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    ModelScope,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::ModelScope => "modelscope",
        }
    }

    /// Request header the relay reads the client-supplied credential from.
    pub fn credential_header(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "x-goog-api-key",
            ProviderKind::ModelScope => "x-modelscope-key",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = EaselError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gemini" => Ok(ProviderKind::Gemini),
            "modelscope" => Ok(ProviderKind::ModelScope),
            other => Err(EaselError::InvalidInput(format!(
                "unknown provider '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    Square,
    Portrait2x3,
    Landscape3x2,
    Portrait3x4,
    Landscape4x3,
    Portrait4x5,
    Landscape5x4,
    Portrait9x16,
    Wide16x9,
    UltraWide21x9,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 10] = [
        AspectRatio::Square,
        AspectRatio::Portrait2x3,
        AspectRatio::Landscape3x2,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape4x3,
        AspectRatio::Portrait4x5,
        AspectRatio::Landscape5x4,
        AspectRatio::Portrait9x16,
        AspectRatio::Wide16x9,
        AspectRatio::UltraWide21x9,
    ];

    /// The provider-facing `"W:H"` string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait2x3 => "2:3",
            AspectRatio::Landscape3x2 => "3:2",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Portrait4x5 => "4:5",
            AspectRatio::Landscape5x4 => "5:4",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Wide16x9 => "16:9",
            AspectRatio::UltraWide21x9 => "21:9",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = EaselError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AspectRatio::ALL
            .iter()
            .find(|r| r.as_str() == s)
            .copied()
            .ok_or_else(|| EaselError::InvalidInput(format!("unknown aspect ratio '{}'", s)))
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    OneK,
    TwoK,
    FourK,
}

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [QualityTier::OneK, QualityTier::TwoK, QualityTier::FourK];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::OneK => "1K",
            QualityTier::TwoK => "2K",
            QualityTier::FourK => "4K",
        }
    }
}

impl FromStr for QualityTier {
    type Err = EaselError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1K" => Ok(QualityTier::OneK),
            "2K" => Ok(QualityTier::TwoK),
            "4K" => Ok(QualityTier::FourK),
            other => Err(EaselError::InvalidInput(format!(
                "unknown quality tier '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire shape of the relay's generation request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub aspect_ratio: String,
    pub quality: String,
    /// `data:<mime>;base64,<payload>` URI for an optional reference image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image_base64: Option<String>,
}

impl GenerateRequest {
    /// Validates the wire shape into a domain request. All client-input
    /// checks happen here, before any upstream traffic.
    pub fn validate(&self) -> Result<GenerationRequest, EaselError> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(EaselError::InvalidInput(
                "prompt must not be empty".to_string(),
            ));
        }
        if prompt.len() > MAX_PROMPT_BYTES {
            return Err(EaselError::InvalidInput(format!(
                "prompt exceeds the {} byte limit",
                MAX_PROMPT_BYTES
            )));
        }

        let negative_prompt = self
            .negative_prompt
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let aspect_ratio = self.aspect_ratio.parse()?;
        let quality = self.quality.parse()?;

        let reference_image = self
            .reference_image_base64
            .as_deref()
            .map(ReferenceImage::from_data_uri)
            .transpose()?;

        Ok(GenerationRequest {
            prompt: prompt.to_string(),
            negative_prompt,
            aspect_ratio,
            quality,
            reference_image,
        })
    }
}

/// Validated generation request handed to a provider adapter.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub aspect_ratio: AspectRatio,
    pub quality: QualityTier,
    pub reference_image: Option<ReferenceImage>,
}

/// Inline reference image decoded from a data URI.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ReferenceImage {
    pub fn from_data_uri(uri: &str) -> Result<Self, EaselError> {
        let rest = uri.strip_prefix("data:").ok_or_else(|| {
            EaselError::InvalidInput("reference image must be a data URI".to_string())
        })?;
        let (mime_type, payload) = rest.split_once(";base64,").ok_or_else(|| {
            EaselError::InvalidInput("reference image data URI must be base64 encoded".to_string())
        })?;
        if mime_type.is_empty() {
            return Err(EaselError::InvalidInput(
                "reference image data URI is missing a MIME type".to_string(),
            ));
        }
        let data = general_purpose::STANDARD.decode(payload).map_err(|e| {
            EaselError::InvalidInput(format!("reference image base64 is invalid: {}", e))
        })?;
        Ok(Self {
            mime_type: mime_type.to_string(),
            data,
        })
    }

    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// Pixel dimensions looked up from a provider's static table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDimensions {
    pub width: u32,
    pub height: u32,
}

/// A generated image: raw bytes plus the metadata echoed in relay headers.
#[derive(Debug, Clone)]
pub struct ImageArtifact {
    pub bytes: Bytes,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

/// One finished generation, shaped for the consumer-owned history list.
/// The core's only obligation is the downsized thumbnail; retention and
/// eviction live with the consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub aspect_ratio: AspectRatio,
    pub quality: QualityTier,
    pub provider: ProviderKind,
    pub thumbnail: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
}

impl HistoryEntry {
    pub fn new(
        request: &GenerationRequest,
        provider: ProviderKind,
        artifact: &ImageArtifact,
        remote_url: Option<String>,
    ) -> Result<Self, EaselError> {
        let thumbnail = crate::services::splitter::thumbnail(&artifact.bytes)?;
        Ok(Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            prompt: request.prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            aspect_ratio: request.aspect_ratio,
            quality: request.quality,
            provider,
            thumbnail,
            remote_url,
        })
    }
}
