// CLOVA Studio chat-completions service module
// Sends a streamed completion request and hands back the final result payload.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ClovaCredentials;
use crate::error::AnalysisError;
use crate::services::event_stream::read_result_payload;

const COMPLETION_PATH: &str = "/testapp/v1/chat-completions/HCX-003";

/// Which analysis stage a request belongs to. Each stage is billed under its
/// own request id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Summarize,
    Feedback,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Summarize => "summarize",
            Stage::Feedback => "feedback",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub top_p: f64,
    pub top_k: u32,
    pub max_tokens: u32,
    pub temperature: f64,
    pub repeat_penalty: f64,
    pub stop_before: Vec<String>,
    pub include_ai_filters: bool,
    pub seed: u64,
}

impl CompletionRequest {
    /// Fixed sampling configuration shared by both stages.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            top_p: 0.8,
            top_k: 0,
            max_tokens: 256,
            temperature: 0.1,
            repeat_penalty: 1.2,
            stop_before: Vec::new(),
            include_ai_filters: true,
            seed: 0,
        }
    }
}

/// Transport for one completion round trip. Returns the raw `data:` payload
/// of the result event.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn complete(
        &self,
        stage: Stage,
        request: &CompletionRequest,
    ) -> Result<String, AnalysisError>;
}

/// Transport-level retry: only gateway/server errors, exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_factor: f64,
    pub retry_statuses: &'static [u16],
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_factor: 0.1,
            retry_statuses: &[500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    pub fn should_retry(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status.as_u16())
    }

    /// Delay before retry number `retry` (1-based): `factor * 2^(retry - 1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16) as i32;
        Duration::from_secs_f64(self.backoff_factor * 2f64.powi(exponent))
    }
}

pub struct ClovaTransport {
    http_client: Client,
    credentials: ClovaCredentials,
    retry: RetryPolicy,
}

impl ClovaTransport {
    pub fn new(credentials: ClovaCredentials) -> Self {
        Self {
            http_client: Client::new(),
            credentials,
            retry: RetryPolicy::default(),
        }
    }

    fn headers(&self, stage: Stage) -> Result<HeaderMap, AnalysisError> {
        let request_id = match stage {
            Stage::Summarize => &self.credentials.summarize_request_id,
            Stage::Feedback => &self.credentials.feedback_request_id,
        };
        let invalid = |e: reqwest::header::InvalidHeaderValue| {
            AnalysisError::Network(format!("invalid header value: {}", e))
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            "X-NCP-CLOVASTUDIO-API-KEY",
            self.credentials.api_key.parse().map_err(invalid)?,
        );
        headers.insert(
            "X-NCP-APIGW-API-KEY",
            self.credentials.apigw_api_key.parse().map_err(invalid)?,
        );
        headers.insert(
            "X-NCP-CLOVASTUDIO-REQUEST-ID",
            request_id.parse().map_err(invalid)?,
        );
        headers.insert(
            "Content-Type",
            "application/json; charset=utf-8".parse().map_err(invalid)?,
        );
        headers.insert("Accept", "text/event-stream".parse().map_err(invalid)?);
        Ok(headers)
    }

    async fn send_with_retry(
        &self,
        stage: Stage,
        request: &CompletionRequest,
    ) -> Result<reqwest::Response, AnalysisError> {
        let url = format!("{}{}", self.credentials.host, COMPLETION_PATH);
        let headers = self.headers(stage)?;
        let mut attempt = 1;

        loop {
            let response = self
                .http_client
                .post(&url)
                .headers(headers.clone())
                .json(request)
                .send()
                .await
                .map_err(|e| AnalysisError::Network(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            if self.retry.should_retry(status) && attempt < self.retry.max_attempts {
                let delay = self.retry.delay_for(attempt);
                warn!(
                    stage = stage.as_str(),
                    status = status.as_u16(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "completion api error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Api {
                status: status.as_u16(),
                body,
            });
        }
    }
}

#[async_trait]
impl CompletionTransport for ClovaTransport {
    async fn complete(
        &self,
        stage: Stage,
        request: &CompletionRequest,
    ) -> Result<String, AnalysisError> {
        let response = self.send_with_retry(stage, request).await?;
        let payload = read_result_payload(response.bytes_stream()).await?;
        debug!(stage = stage.as_str(), payload = %payload, "completion result received");
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_api_field_names() {
        let request = CompletionRequest::new(vec![
            ChatMessage::system("sys"),
            ChatMessage::user("hello"),
        ]);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hello"}
                ],
                "topP": 0.8,
                "topK": 0,
                "maxTokens": 256,
                "temperature": 0.1,
                "repeatPenalty": 1.2,
                "stopBefore": [],
                "includeAiFilters": true,
                "seed": 0
            })
        );
    }

    #[test]
    fn retries_only_server_errors() {
        let policy = RetryPolicy::default();
        for code in [500, 502, 503, 504] {
            assert!(policy.should_retry(StatusCode::from_u16(code).unwrap()));
        }
        for code in [400, 401, 429, 501] {
            assert!(!policy.should_retry(StatusCode::from_u16(code).unwrap()));
        }
    }

    #[test]
    fn backoff_doubles_from_factor() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1).as_millis(), 100);
        assert_eq!(policy.delay_for(2).as_millis(), 200);
        assert_eq!(policy.delay_for(4).as_millis(), 800);
    }

    #[test]
    fn stage_request_ids_are_distinct() {
        let transport = ClovaTransport::new(ClovaCredentials {
            host: "https://clova.example.com".into(),
            api_key: "k".into(),
            apigw_api_key: "g".into(),
            summarize_request_id: "one".into(),
            feedback_request_id: "two".into(),
        });

        let summarize = transport.headers(Stage::Summarize).unwrap();
        let feedback = transport.headers(Stage::Feedback).unwrap();
        assert_eq!(summarize["X-NCP-CLOVASTUDIO-REQUEST-ID"], "one");
        assert_eq!(feedback["X-NCP-CLOVASTUDIO-REQUEST-ID"], "two");
        assert_eq!(summarize["Accept"], "text/event-stream");
    }
}
