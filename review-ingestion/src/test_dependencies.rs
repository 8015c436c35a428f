// Mock implementations of the pipeline's seams (browser, completion API,
// feedback store, place registry) for tests in this crate and its dependents.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shared_types::Place;

use crate::error::{AnalysisError, BrowserError};
use crate::repository::{FeedbackColumns, FeedbackStore, FeedbackUpdate, PlaceSource};
use crate::services::browser::{BrowserLauncher, BrowserSession, LauncherFactory};
use crate::services::clova::{CompletionRequest, CompletionTransport, Stage};
use crate::services::event_stream::read_result_payload;

// =============================================================================
// Mock Browser
// =============================================================================

/// Where a scripted page should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFailure {
    Launch,
    Navigation,
    Click,
    Content,
}

/// Scripted page: a fixed markup, a number of "load more" clicks before the
/// control disappears, and an optional failure point.
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    pub html: String,
    pub landing_url: Option<String>,
    pub more_pages: usize,
    pub fail_at: Option<PageFailure>,
}

impl PageScript {
    pub fn with_html(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Default::default()
        }
    }

    pub fn redirecting_to(url: impl Into<String>) -> Self {
        Self {
            landing_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn more_pages(mut self, pages: usize) -> Self {
        self.more_pages = pages;
        self
    }

    pub fn failing_at(mut self, failure: PageFailure) -> Self {
        self.fail_at = Some(failure);
        self
    }
}

/// Builds review listing markup in the shape the crawler's selectors expect.
pub fn review_listing_html(bodies: &[&str]) -> String {
    let items: String = bodies
        .iter()
        .map(|body| {
            format!(
                r#"<li class="pui__X35jYm place_apply_pui EjjAW"><div><a class="pui__xtsQN-">{}</a></div></li>"#,
                escape_html(body)
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="flicking-camera"></div><ul>{}</ul></body></html>"#,
        items
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Launcher that serves scripted pages keyed by the URL they are opened on.
/// Unknown URLs get `default_script`.
#[derive(Default)]
pub struct MockLauncher {
    scripts: Mutex<HashMap<String, PageScript>>,
    default_script: Mutex<PageScript>,
    launches: Mutex<usize>,
    clicks: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<usize>>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, script: PageScript) -> Self {
        self.scripts.lock().unwrap().insert(url.into(), script);
        self
    }

    pub fn with_default(self, script: PageScript) -> Self {
        *self.default_script.lock().unwrap() = script;
        self
    }

    pub fn launches(&self) -> usize {
        *self.launches.lock().unwrap()
    }

    pub fn closed_sessions(&self) -> usize {
        *self.closed.lock().unwrap()
    }

    /// Selectors clicked across all sessions, in order.
    pub fn clicks(&self) -> Vec<String> {
        self.clicks.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        *self.launches.lock().unwrap() += 1;
        let scripts = self.scripts.lock().unwrap().clone();
        let default_script = self.default_script.lock().unwrap().clone();
        if default_script.fail_at == Some(PageFailure::Launch) {
            return Err(BrowserError::Driver("mock launch failure".into()));
        }
        Ok(Box::new(MockSession {
            scripts,
            default_script,
            state: Mutex::new(SessionState::default()),
            clicks: Arc::clone(&self.clicks),
            closed: Arc::clone(&self.closed),
        }))
    }
}

#[derive(Default)]
struct SessionState {
    script: Option<PageScript>,
    url: String,
    remaining_pages: usize,
}

struct MockSession {
    scripts: HashMap<String, PageScript>,
    default_script: PageScript,
    state: Mutex<SessionState>,
    clicks: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<usize>>,
}

impl MockSession {
    fn fails_at(&self, failure: PageFailure) -> bool {
        let state = self.state.lock().unwrap();
        state
            .script
            .as_ref()
            .map(|s| s.fail_at == Some(failure))
            .unwrap_or(false)
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn goto(&self, url: &str, _timeout_ms: u64) -> Result<(), BrowserError> {
        let script = self
            .scripts
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default_script.clone());
        if script.fail_at == Some(PageFailure::Navigation) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "mock navigation failure".into(),
            });
        }
        let mut state = self.state.lock().unwrap();
        state.url = script.landing_url.clone().unwrap_or_else(|| url.to_string());
        state.remaining_pages = script.more_pages;
        state.script = Some(script);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn press_key(&self, _key: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn hide(&self, _selector: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn is_present(&self, _selector: &str) -> Result<bool, BrowserError> {
        Ok(self.state.lock().unwrap().remaining_pages > 0)
    }

    async fn scroll_into_view(&self, _selector: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        if self.fails_at(PageFailure::Click) {
            return Err(BrowserError::Interaction("mock click failure".into()));
        }
        self.clicks.lock().unwrap().push(selector.to_string());
        let mut state = self.state.lock().unwrap();
        state.remaining_pages = state.remaining_pages.saturating_sub(1);
        Ok(())
    }

    async fn settle(&self, _millis: u64) {}

    async fn content(&self) -> Result<String, BrowserError> {
        if self.fails_at(PageFailure::Content) {
            return Err(BrowserError::Interaction("mock content failure".into()));
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .script
            .as_ref()
            .map(|s| s.html.clone())
            .unwrap_or_default())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        *self.closed.lock().unwrap() += 1;
        Ok(())
    }
}

/// Hands out the same launcher to every chunk and counts driver starts.
pub struct MockLauncherFactory {
    launcher: Arc<MockLauncher>,
    starts: Mutex<usize>,
}

impl MockLauncherFactory {
    pub fn new(launcher: Arc<MockLauncher>) -> Self {
        Self {
            launcher,
            starts: Mutex::new(0),
        }
    }

    pub fn starts(&self) -> usize {
        *self.starts.lock().unwrap()
    }
}

#[async_trait]
impl LauncherFactory for MockLauncherFactory {
    async fn start(&self) -> Result<Arc<dyn BrowserLauncher>, BrowserError> {
        *self.starts.lock().unwrap() += 1;
        Ok(self.launcher.clone())
    }
}

// =============================================================================
// Mock Completion API
// =============================================================================

/// Replays scripted event streams per stage through the real stream reader.
#[derive(Default)]
pub struct MockCompletion {
    streams: Mutex<HashMap<&'static str, Vec<String>>>,
    requests: Mutex<Vec<(Stage, CompletionRequest)>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw event-stream text returned for every request of `stage`.
    pub fn with_stream(self, stage: Stage, body: impl Into<String>) -> Self {
        self.streams
            .lock()
            .unwrap()
            .entry(stage.as_str())
            .or_default()
            .push(body.into());
        self
    }

    /// A well-formed stream whose result message content is `inner_json`.
    pub fn with_result(self, stage: Stage, inner_json: &str) -> Self {
        let outer = serde_json::json!({
            "message": {"role": "assistant", "content": inner_json}
        });
        let body = format!(
            "id:1\nevent:token\ndata:{{\"message\":{{\"content\":\"...\"}}}}\n\nid:2\nevent:result\ndata:{}\n\n",
            outer
        );
        self.with_stream(stage, body)
    }

    pub fn requests(&self) -> Vec<(Stage, CompletionRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionTransport for MockCompletion {
    async fn complete(
        &self,
        stage: Stage,
        request: &CompletionRequest,
    ) -> Result<String, AnalysisError> {
        self.requests.lock().unwrap().push((stage, request.clone()));
        let body = self
            .streams
            .lock()
            .unwrap()
            .get(stage.as_str())
            .and_then(|bodies| bodies.last().cloned())
            .ok_or_else(|| AnalysisError::Network("no scripted stream".into()))?;

        let chunks: Vec<Result<Vec<u8>, String>> = body
            .split_inclusive('\n')
            .map(|line| Ok(line.as_bytes().to_vec()))
            .collect();
        read_result_payload(futures::stream::iter(chunks)).await
    }
}

// =============================================================================
// In-memory Feedback Store
// =============================================================================

#[derive(Default)]
pub struct InMemoryFeedbackStore {
    rows: Mutex<HashMap<i32, Option<FeedbackColumns>>>,
    writes: Mutex<usize>,
}

impl InMemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provisions an empty feedback row, as registration would.
    pub fn with_row(self, place_id: i32) -> Self {
        self.rows.lock().unwrap().insert(place_id, None);
        self
    }

    pub fn row(&self, place_id: i32) -> Option<FeedbackColumns> {
        self.rows.lock().unwrap().get(&place_id).cloned().flatten()
    }

    pub fn has_row(&self, place_id: i32) -> bool {
        self.rows.lock().unwrap().contains_key(&place_id)
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

#[async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn update_feedback(
        &self,
        place_id: i32,
        columns: &FeedbackColumns,
    ) -> Result<FeedbackUpdate, sqlx::Error> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&place_id) {
            Some(row) => {
                *row = Some(columns.clone());
                *self.writes.lock().unwrap() += 1;
                Ok(FeedbackUpdate::Updated)
            }
            None => Ok(FeedbackUpdate::NotFound),
        }
    }
}

// =============================================================================
// Static Place Source
// =============================================================================

/// Place registry backed by a vector that tests can grow between triggers.
#[derive(Default)]
pub struct StaticPlaces {
    places: Mutex<Vec<Place>>,
}

impl StaticPlaces {
    pub fn new(places: Vec<Place>) -> Self {
        Self {
            places: Mutex::new(places),
        }
    }

    pub fn register(&self, place: Place) {
        self.places.lock().unwrap().push(place);
    }
}

#[async_trait]
impl PlaceSource for StaticPlaces {
    async fn places(&self) -> Result<Vec<Place>, sqlx::Error> {
        Ok(self.places.lock().unwrap().clone())
    }

    async fn place(&self, place_id: i32) -> Result<Option<Place>, sqlx::Error> {
        Ok(self
            .places
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.place_id == place_id)
            .cloned())
    }
}
