// src/services/provider.rs
use async_trait::async_trait;
use reqwest::StatusCode;

use crate::errors::EaselError;
use crate::models::{GenerationRequest, ImageArtifact, ProviderKind, ResolvedDimensions};

/// One generation backend. The relay and the client orchestrator depend on
/// this trait only; the synchronous and polling protocols live behind it.
///
/// `dims` is the pre-resolved entry from this provider's dimension table.
/// Adapters use it for request parameters and response metadata as their
/// protocol requires; validation already happened at the relay.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn generate(
        &self,
        credential: &str,
        request: &GenerationRequest,
        dims: ResolvedDimensions,
    ) -> Result<ImageArtifact, EaselError>;
}

/// Maps a non-success upstream HTTP status to the error taxonomy. Statuses
/// without a specific meaning are echoed through `Upstream`.
pub fn classify_upstream_status(status: StatusCode, body: &str) -> EaselError {
    let detail = excerpt(body);
    match status.as_u16() {
        429 => EaselError::RateLimited,
        401 | 403 => EaselError::CredentialRejected(detail),
        400 => EaselError::ProviderRejected(detail),
        413 => EaselError::PayloadTooLarge,
        other => EaselError::Upstream {
            status: other,
            detail,
        },
    }
}

/// Upstream error bodies can be arbitrarily large; keep a bounded excerpt.
fn excerpt(body: &str) -> String {
    const MAX: usize = 512;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}
