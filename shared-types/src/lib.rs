use serde::{Deserialize, Serialize};

/// A registered business listing. `place_num` is the map service's own id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Place {
    pub place_id: i32,
    pub place_num: String,
}

/// Sentiment split and keywords produced by the summarize stage.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct AnalysisResult {
    pub positive: String,
    pub negative: String,
    pub keyword: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct FeedbackResult {
    pub positive_feedback: String,
    pub negative_feedback: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResolvePlaceRequest {
    pub place_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResolvePlaceResponse {
    pub code: String,
    pub message: String,
    pub place_num: Option<String>,
}

impl ResolvePlaceResponse {
    pub fn success(place_num: String) -> Self {
        Self {
            code: "SU".to_string(),
            message: "Success".to_string(),
            place_num: Some(place_num),
        }
    }

    pub fn failure(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            place_num: None,
        }
    }
}
