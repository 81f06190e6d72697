// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EaselError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("no {ratio} size is defined for the {tier} tier on this provider")]
    UnsupportedDimension { ratio: String, tier: String },

    #[error("no API key was supplied for {0}")]
    CredentialMissing(String),

    #[error("the provider rejected the API key")]
    CredentialRejected(String),

    #[error("the provider rejected the request")]
    ProviderRejected(String),

    #[error("the provider is rate limiting requests; try again later")]
    RateLimited,

    #[error("the request payload is too large for the provider")]
    PayloadTooLarge,

    #[error("the provider returned a response without image data")]
    MissingImageData(String),

    #[error("the provider did not accept the generation job")]
    SubmissionFailed(String),

    #[error("polling the generation job failed")]
    PollingFailed(String),

    #[error("the generation job finished without a result image URL")]
    MissingResultUrl,

    #[error("the generation job failed")]
    GenerationFailed(String),

    #[error("the generation job did not finish within the time budget")]
    GenerationTimedOut,

    #[error("downloading the generated image failed")]
    ResultFetchFailed(String),

    #[error("the provider could not be reached")]
    UpstreamUnavailable(String),

    #[error("upstream request failed with status {status}")]
    Upstream { status: u16, detail: String },

    #[error("object storage is not configured")]
    StorageUnavailable(String),

    #[error("Empty upload body.")]
    EmptyPayload,

    #[error("the payload could not be decoded as an image")]
    DecodeFailed(String),

    #[error("{message}")]
    Relay { code: String, message: String },

    #[error("an unexpected internal error occurred")]
    Internal(String),
}

impl EaselError {
    /// Stable machine-readable code carried in the error envelope.
    pub fn code(&self) -> &str {
        match self {
            EaselError::InvalidInput(_) => "INVALID_INPUT",
            EaselError::UnsupportedDimension { .. } => "UNSUPPORTED_DIMENSION",
            EaselError::CredentialMissing(_) => "CREDENTIAL_MISSING",
            EaselError::CredentialRejected(_) => "CREDENTIAL_REJECTED",
            EaselError::ProviderRejected(_) => "PROVIDER_REJECTED",
            EaselError::RateLimited => "RATE_LIMITED",
            EaselError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            EaselError::MissingImageData(_) => "MISSING_IMAGE_DATA",
            EaselError::SubmissionFailed(_) => "SUBMISSION_FAILED",
            EaselError::PollingFailed(_) => "POLLING_FAILED",
            EaselError::MissingResultUrl => "MISSING_RESULT_URL",
            EaselError::GenerationFailed(_) => "GENERATION_FAILED",
            EaselError::GenerationTimedOut => "GENERATION_TIMEOUT",
            EaselError::ResultFetchFailed(_) => "RESULT_FETCH_FAILED",
            EaselError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            EaselError::Upstream { .. } => "UPSTREAM_ERROR",
            EaselError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            EaselError::EmptyPayload => "EMPTY_PAYLOAD",
            EaselError::DecodeFailed(_) => "DECODE_FAILED",
            EaselError::Relay { code, .. } => code,
            EaselError::Internal(_) => "INTERNAL",
        }
    }

    /// Provider-supplied detail safe to surface alongside the message.
    /// Internal errors keep their detail out of responses.
    fn details(&self) -> Option<&str> {
        match self {
            EaselError::CredentialRejected(d)
            | EaselError::ProviderRejected(d)
            | EaselError::MissingImageData(d)
            | EaselError::SubmissionFailed(d)
            | EaselError::PollingFailed(d)
            | EaselError::GenerationFailed(d)
            | EaselError::ResultFetchFailed(d)
            | EaselError::Upstream { detail: d, .. } => {
                if d.is_empty() { None } else { Some(d) }
            }
            _ => None,
        }
    }
}

impl ResponseError for EaselError {
    fn status_code(&self) -> StatusCode {
        match self {
            EaselError::InvalidInput(_)
            | EaselError::UnsupportedDimension { .. }
            | EaselError::ProviderRejected(_)
            | EaselError::DecodeFailed(_) => StatusCode::BAD_REQUEST,
            EaselError::CredentialMissing(_) => StatusCode::UNAUTHORIZED,
            EaselError::CredentialRejected(_) => StatusCode::FORBIDDEN,
            EaselError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            EaselError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            EaselError::MissingImageData(_)
            | EaselError::SubmissionFailed(_)
            | EaselError::PollingFailed(_)
            | EaselError::MissingResultUrl
            | EaselError::GenerationFailed(_)
            | EaselError::ResultFetchFailed(_)
            | EaselError::UpstreamUnavailable(_)
            | EaselError::Relay { .. } => StatusCode::BAD_GATEWAY,
            EaselError::GenerationTimedOut => StatusCode::GATEWAY_TIMEOUT,
            // Upstream statuses with no more specific mapping are echoed.
            EaselError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            EaselError::StorageUnavailable(_)
            | EaselError::EmptyPayload
            | EaselError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let EaselError::Internal(detail) = self {
            log::error!("internal error: {}", detail);
        }

        let mut body = serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        if let Some(details) = self.details() {
            body["error"]["details"] = serde_json::Value::String(details.to_string());
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn envelope_carries_code_and_message() {
        let err = EaselError::InvalidInput("prompt must not be empty".to_string());
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], "INVALID_INPUT");
        assert_eq!(value["error"]["message"], "prompt must not be empty");
        assert!(value["error"].get("details").is_none());
    }

    #[actix_web::test]
    async fn provider_detail_lands_in_details_field() {
        let err = EaselError::ProviderRejected("prompt blocked by safety filter".to_string());
        let resp = err.error_response();
        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], "PROVIDER_REJECTED");
        assert_eq!(value["error"]["details"], "prompt blocked by safety filter");
    }

    #[test]
    fn internal_detail_is_not_surfaced() {
        let err = EaselError::Internal("secret backtrace".to_string());
        assert!(!err.to_string().contains("secret"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upstream_status_is_echoed() {
        let err = EaselError::Upstream {
            status: 503,
            detail: "overloaded".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "UPSTREAM_ERROR");
    }
}
