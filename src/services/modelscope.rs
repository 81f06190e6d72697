// src/services/modelscope.rs
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::EaselError;
use crate::models::{GenerationRequest, ImageArtifact, ProviderKind, ResolvedDimensions};
use crate::services::provider::{ImageProvider, classify_upstream_status};

const DEFAULT_MODEL: &str = "MAILAND/majicflus_v1";

/// Fixed poll schedule. One second between status reads, 45 seconds of wall
/// clock for the whole job; both are process-wide, not per-request. The
/// interval is deliberately flat: no backoff, matching the external
/// contract this relay replaces.
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const POLL_BUDGET: Duration = Duration::from_secs(45);

/// Conservative margins under the provider's input byte limits, tracked
/// independently for the two text fields.
const PROMPT_BYTE_BUDGET: usize = 1200;
const NEGATIVE_PROMPT_BYTE_BUDGET: usize = 600;

/// Time source for the poll loop. Injectable so tests can walk through the
/// 45-second budget without real waits.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
    async fn sleep(&self, duration: Duration);
}

pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

enum TaskState {
    Pending,
    Succeeded { image_urls: Vec<String> },
    Failed { detail: String },
}

/// Asynchronous provider: submit a job, poll its task until terminal or the
/// budget runs out, then download the bytes at the result URL. Callers
/// never see the third-party URL; the relay always streams bytes.
pub struct ModelScopeProvider {
    client: Client,
    base_url: String,
    model: String,
    clock: Arc<dyn Clock>,
}

impl ModelScopeProvider {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self::with_clock(client, base_url, Arc::new(TokioClock::new()))
    }

    pub fn with_clock(
        client: Client,
        base_url: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: DEFAULT_MODEL.to_string(),
            clock,
        }
    }

    async fn submit(
        &self,
        credential: &str,
        request: &GenerationRequest,
        dims: ResolvedDimensions,
    ) -> Result<String, EaselError> {
        let mut body = json!({
            "model": self.model,
            "prompt": truncate_to_bytes(&request.prompt, PROMPT_BYTE_BUDGET),
            "parameters": { "width": dims.width, "height": dims.height },
        });
        if let Some(negative) = &request.negative_prompt {
            body["negative_prompt"] =
                Value::String(truncate_to_bytes(negative, NEGATIVE_PROMPT_BYTE_BUDGET).to_string());
        }

        let response = self
            .client
            .post(format!(
                "{}/v1/images/generations",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(credential)
            .header("X-ModelScope-Async-Mode", "true")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                EaselError::UpstreamUnavailable(format!("modelscope submit failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_upstream_status(status, &body));
        }

        let body: Value = response.json().await.map_err(|e| {
            EaselError::SubmissionFailed(format!("unparseable submit response: {}", e))
        })?;
        body["task_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                EaselError::SubmissionFailed("submit response carried no task id".to_string())
            })
    }

    async fn poll(&self, credential: &str, task_id: &str) -> Result<TaskState, EaselError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/tasks/{}",
                self.base_url.trim_end_matches('/'),
                task_id
            ))
            .bearer_auth(credential)
            .header("X-ModelScope-Task-Type", "image_generation")
            .send()
            .await
            .map_err(|e| EaselError::PollingFailed(format!("status request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EaselError::PollingFailed(format!(
                "status {} polling task {}: {}",
                status, task_id, body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| EaselError::PollingFailed(format!("unparseable task status: {}", e)))?;

        match body["task_status"].as_str() {
            Some("PENDING") | Some("RUNNING") => Ok(TaskState::Pending),
            Some("SUCCEED") | Some("SUCCEEDED") => {
                let image_urls = body["output_images"]
                    .as_array()
                    .map(|urls| {
                        urls.iter()
                            .filter_map(|u| u.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(TaskState::Succeeded { image_urls })
            }
            Some("FAILED") => Ok(TaskState::Failed {
                detail: body["message"].as_str().unwrap_or_default().to_string(),
            }),
            other => Err(EaselError::PollingFailed(format!(
                "unknown task status {:?}",
                other
            ))),
        }
    }

    /// Drives Submitted -> Succeeded | Failed | TimedOut. Returns the first
    /// result URL. The timeout is fatal: once the budget elapses no further
    /// poll is issued and no partial result exists.
    async fn poll_until_terminal(
        &self,
        credential: &str,
        task_id: &str,
    ) -> Result<String, EaselError> {
        let deadline = self.clock.now() + POLL_BUDGET;
        loop {
            self.clock.sleep(POLL_INTERVAL).await;
            if self.clock.now() > deadline {
                return Err(EaselError::GenerationTimedOut);
            }
            match self.poll(credential, task_id).await? {
                TaskState::Pending => continue,
                TaskState::Succeeded { image_urls } => {
                    return image_urls
                        .into_iter()
                        .next()
                        .ok_or(EaselError::MissingResultUrl);
                }
                TaskState::Failed { detail } => {
                    return Err(EaselError::GenerationFailed(detail));
                }
            }
        }
    }

    async fn fetch_result(
        &self,
        url: &str,
        dims: ResolvedDimensions,
    ) -> Result<ImageArtifact, EaselError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EaselError::ResultFetchFailed(format!("download failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EaselError::ResultFetchFailed(format!(
                "download failed with status {}",
                status
            )));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes: Bytes = response
            .bytes()
            .await
            .map_err(|e| EaselError::ResultFetchFailed(format!("download failed: {}", e)))?;

        Ok(ImageArtifact {
            bytes,
            mime_type,
            width: dims.width,
            height: dims.height,
        })
    }
}

#[async_trait]
impl ImageProvider for ModelScopeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ModelScope
    }

    async fn generate(
        &self,
        credential: &str,
        request: &GenerationRequest,
        dims: ResolvedDimensions,
    ) -> Result<ImageArtifact, EaselError> {
        let task_id = self.submit(credential, request, dims).await?;
        log::info!("modelscope task {} submitted, polling", task_id);
        let url = self.poll_until_terminal(credential, &task_id).await?;
        self.fetch_result(&url, dims).await
    }
}

/// Cuts `text` to at most `budget` bytes without splitting a multi-byte
/// character; the result is always valid UTF-8.
pub(crate) fn truncate_to_bytes(text: &str, budget: usize) -> &str {
    if text.len() <= budget {
        return text;
    }
    let mut end = budget;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
