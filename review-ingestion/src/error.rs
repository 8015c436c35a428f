//! Error types for the ingestion pipeline.
//!
//! Every stage converts its failures into one of these enums at its own
//! boundary. Only [`ConfigError`] is allowed to stop the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config document {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config document {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Browser automation failures (driver launch, navigation, DOM access).
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser driver unavailable: {0}")]
    Driver(String),

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("page interaction failed: {0}")]
    Interaction(String),
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("not an absolute http(s) url: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error("no place id in landing url {landing_url}")]
    NoPlaceId { landing_url: String },
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset {path} has no `content` header")]
    MissingHeader { path: String },

    #[error("dataset {path} has an unterminated quoted field")]
    UnterminatedQuote { path: String },
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("invalid selector {selector}")]
    Selector { selector: String },
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("completion request failed: {0}")]
    Network(String),

    #[error("completion api returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("stream ended before an `event:result` marker")]
    MissingResultEvent,

    #[error("stream ended before the result `data:` line")]
    MissingResultData,

    #[error("invalid utf-8 in completion stream: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("outer payload is not a completion message: {0}")]
    OuterPayload(String),

    #[error("inner content is not the expected json: {0}")]
    InnerPayload(String),
}

#[derive(Debug, Error)]
#[error("unknown weekday {0:?}, expected one of sun, mon, tue, wed, thu, fri, sat")]
pub struct WeekdayParseError(pub String);
