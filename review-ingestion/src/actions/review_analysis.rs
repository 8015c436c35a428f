use std::path::Path;
use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use shared_types::{AnalysisResult, FeedbackResult};
use tracing::{debug, info, warn};

use crate::actions::prompts::{FEEDBACK_INSTRUCTION, SUMMARIZE_INSTRUCTION};
use crate::dataset::read_reviews;
use crate::error::AnalysisError;
use crate::repository::{FeedbackColumns, FeedbackStore, FeedbackUpdate};
use crate::services::clova::{ChatMessage, CompletionRequest, CompletionTransport, Stage};

#[derive(Debug, Deserialize)]
struct OuterPayload {
    message: OuterMessage,
}

#[derive(Debug, Deserialize)]
struct OuterMessage {
    content: String,
}

/// Decodes a result payload: the outer message's `content` is itself JSON,
/// with escaped quotes and literal `\n` sequences the model tends to emit.
pub fn parse_completion_payload<T: DeserializeOwned>(payload: &str) -> Result<T, AnalysisError> {
    let outer: OuterPayload = serde_json::from_str(payload)
        .map_err(|e| AnalysisError::OuterPayload(e.to_string()))?;
    let inner = outer
        .message
        .content
        .replace("\\\"", "\"")
        .replace("\\n", "");
    serde_json::from_str(&inner).map_err(|e| AnalysisError::InnerPayload(e.to_string()))
}

pub struct AnalysisClient {
    transport: Arc<dyn CompletionTransport>,
}

impl AnalysisClient {
    pub fn new(transport: Arc<dyn CompletionTransport>) -> Self {
        Self { transport }
    }

    /// Stage 1: positive/negative summary and up to five keywords.
    pub async fn summarize(&self, texts: &[String]) -> Option<AnalysisResult> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(SUMMARIZE_INSTRUCTION),
            ChatMessage::user(texts.join(" ")),
        ]);
        self.run(Stage::Summarize, &request).await
    }

    /// Stage 2: owner-facing feedback derived from the stage 1 summary.
    pub async fn feedback(&self, analysis: &AnalysisResult) -> Option<FeedbackResult> {
        let user = format!(
            "\"positive\": \"{}\", \"negative\": \"{}\"",
            analysis.positive, analysis.negative
        );
        let request = CompletionRequest::new(vec![
            ChatMessage::system(FEEDBACK_INSTRUCTION),
            ChatMessage::user(user),
        ]);
        self.run(Stage::Feedback, &request).await
    }

    async fn run<T: DeserializeOwned>(&self, stage: Stage, request: &CompletionRequest) -> Option<T> {
        let result = match self.transport.complete(stage, request).await {
            Ok(payload) => parse_completion_payload(&payload),
            Err(e) => Err(e),
        };
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(stage = stage.as_str(), error = %e, "analysis stage produced no result");
                None
            }
        }
    }
}

/// Where a place's analysis stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Stored,
    NoFeedbackRow,
    EmptyDataset,
    DatasetUnreadable,
    SummaryMissing,
    FeedbackMissing,
    StoreFailed,
}

/// Reads the place's dataset back and runs summarize, feedback and the
/// feedback row update in order. Each missing piece ends the pipeline for
/// this place only.
pub async fn analyze_place(
    client: &AnalysisClient,
    store: &dyn FeedbackStore,
    timezone: FixedOffset,
    place_id: i32,
    dataset: &Path,
) -> AnalysisOutcome {
    let texts = match read_reviews(dataset).await {
        Ok(texts) => texts,
        Err(e) => {
            warn!(place_id, error = %e, "review dataset unreadable, skipping analysis");
            return AnalysisOutcome::DatasetUnreadable;
        }
    };
    if texts.is_empty() {
        info!(place_id, "no reviews collected, skipping analysis");
        return AnalysisOutcome::EmptyDataset;
    }

    let Some(analysis) = client.summarize(&texts).await else {
        return AnalysisOutcome::SummaryMissing;
    };
    debug!(place_id, keywords = ?analysis.keyword, "summary received");

    let Some(feedback) = client.feedback(&analysis).await else {
        return AnalysisOutcome::FeedbackMissing;
    };

    let columns = FeedbackColumns::new(&analysis, &feedback, Utc::now(), timezone);
    match store.update_feedback(place_id, &columns).await {
        Ok(FeedbackUpdate::Updated) => {
            info!(place_id, "feedback updated");
            AnalysisOutcome::Stored
        }
        Ok(FeedbackUpdate::NotFound) => {
            warn!(place_id, "no feedback row for place, nothing written");
            AnalysisOutcome::NoFeedbackRow
        }
        Err(e) => {
            warn!(place_id, error = %e, "feedback update failed");
            AnalysisOutcome::StoreFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::write_reviews;
    use crate::test_dependencies::{InMemoryFeedbackStore, MockCompletion};

    const SUMMARY_JSON: &str =
        r#"{"positive": "음식이 맛있어요", "negative": "대기가 길어요", "keyword": ["맛", "대기"]}"#;
    const FEEDBACK_JSON: &str =
        r#"{"positive_feedback": "맛을 강조하세요", "negative_feedback": "예약제를 고려하세요"}"#;

    fn seoul() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    #[test]
    fn payload_with_escaped_inner_json_parses() {
        let payload = r#"{"message":{"content":"{\"positive\":\"x\",\"negative\":\"y\",\"keyword\":[\"a\"]}"}}"#;
        let result: AnalysisResult = parse_completion_payload(payload).unwrap();
        assert_eq!(result.positive, "x");
        assert_eq!(result.negative, "y");
        assert_eq!(result.keyword, vec!["a".to_string()]);
    }

    #[test]
    fn literal_newline_sequences_are_removed() {
        let payload = r#"{"message":{"content":"{\\n\"positive_feedback\": \"a\",\\n\"negative_feedback\": \"b\"\\n}"}}"#;
        let result: FeedbackResult = parse_completion_payload(payload).unwrap();
        assert_eq!(result.positive_feedback, "a");
        assert_eq!(result.negative_feedback, "b");
    }

    #[test]
    fn non_json_content_is_an_inner_error() {
        let payload = r#"{"message":{"content":"죄송합니다"}}"#;
        let err = parse_completion_payload::<AnalysisResult>(payload).unwrap_err();
        assert!(matches!(err, AnalysisError::InnerPayload(_)));
    }

    #[tokio::test]
    async fn summarize_joins_texts_with_single_space() {
        let transport = Arc::new(MockCompletion::new().with_result(Stage::Summarize, SUMMARY_JSON));
        let client = AnalysisClient::new(transport.clone());

        let result = client
            .summarize(&["맛있어요".to_string(), "친절해요".to_string()])
            .await
            .unwrap();
        assert_eq!(result.keyword, vec!["맛".to_string(), "대기".to_string()]);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let (stage, request) = &requests[0];
        assert_eq!(*stage, Stage::Summarize);
        assert_eq!(request.messages[0].content, SUMMARIZE_INSTRUCTION);
        assert_eq!(request.messages[1].content, "맛있어요 친절해요");
    }

    #[tokio::test]
    async fn feedback_message_quotes_both_summaries() {
        let transport = Arc::new(MockCompletion::new().with_result(Stage::Feedback, FEEDBACK_JSON));
        let client = AnalysisClient::new(transport.clone());
        let analysis = AnalysisResult {
            positive: "p".into(),
            negative: "n".into(),
            keyword: vec![],
        };

        client.feedback(&analysis).await.unwrap();

        let (stage, request) = &transport.requests()[0];
        assert_eq!(*stage, Stage::Feedback);
        assert_eq!(request.messages[1].content, r#""positive": "p", "negative": "n""#);
    }

    #[tokio::test]
    async fn stream_without_result_marker_yields_none() {
        let transport = Arc::new(
            MockCompletion::new().with_stream(Stage::Summarize, "id:1\nevent:token\ndata:{}\n\n"),
        );
        let client = AnalysisClient::new(transport);
        assert!(client.summarize(&["맛있어요".to_string()]).await.is_none());
    }

    #[tokio::test]
    async fn analyze_place_writes_feedback_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_reviews(dir.path(), 3, &["맛있어요!".to_string()])
            .await
            .unwrap();
        let transport = Arc::new(
            MockCompletion::new()
                .with_result(Stage::Summarize, SUMMARY_JSON)
                .with_result(Stage::Feedback, FEEDBACK_JSON),
        );
        let client = AnalysisClient::new(transport);
        let store = InMemoryFeedbackStore::new().with_row(3);

        let outcome = analyze_place(&client, &store, seoul(), 3, &path).await;

        assert_eq!(outcome, AnalysisOutcome::Stored);
        let row = store.row(3).unwrap();
        assert_eq!(row.p_summary, "음식이 맛있어요");
        assert_eq!(row.keyword, "맛, 대기");
        assert_eq!(row.n_body, "예약제를 고려하세요");
    }

    #[tokio::test]
    async fn missing_row_is_reported_without_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_reviews(dir.path(), 8, &["좋아요".to_string()])
            .await
            .unwrap();
        let transport = Arc::new(
            MockCompletion::new()
                .with_result(Stage::Summarize, SUMMARY_JSON)
                .with_result(Stage::Feedback, FEEDBACK_JSON),
        );
        let client = AnalysisClient::new(transport);
        let store = InMemoryFeedbackStore::new();

        let outcome = analyze_place(&client, &store, seoul(), 8, &path).await;

        assert_eq!(outcome, AnalysisOutcome::NoFeedbackRow);
        assert!(!store.has_row(8));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn empty_dataset_makes_no_remote_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_reviews(dir.path(), 5, &[]).await.unwrap();
        let transport = Arc::new(MockCompletion::new());
        let client = AnalysisClient::new(transport.clone());
        let store = InMemoryFeedbackStore::new().with_row(5);

        let outcome = analyze_place(&client, &store, seoul(), 5, &path).await;

        assert_eq!(outcome, AnalysisOutcome::EmptyDataset);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn summary_failure_stops_before_feedback() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_reviews(dir.path(), 6, &["별로".to_string()])
            .await
            .unwrap();
        let transport = Arc::new(
            MockCompletion::new()
                .with_stream(Stage::Summarize, "event:result\ndata:not json\n")
                .with_result(Stage::Feedback, FEEDBACK_JSON),
        );
        let client = AnalysisClient::new(transport.clone());
        let store = InMemoryFeedbackStore::new().with_row(6);

        let outcome = analyze_place(&client, &store, seoul(), 6, &path).await;

        assert_eq!(outcome, AnalysisOutcome::SummaryMissing);
        assert_eq!(transport.requests().len(), 1);
        assert!(store.row(6).is_none());
    }
}
