use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use shared_types::{ResolvePlaceRequest, ResolvePlaceResponse};
use thiserror::Error;

use review_ingestion::error::{BrowserError, ResolutionError};
use review_ingestion::services::browser::{BrowserLauncher, UnavailableLauncher};
use review_ingestion::PlaceUrlResolver;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<PlaceUrlResolver>,
    pub scheduler_active: bool,
}

/// Keeps the server up when the driver cannot start; resolution requests
/// then fail with a browser error.
pub fn launcher_or_unavailable<L>(started: Result<L, BrowserError>) -> Arc<dyn BrowserLauncher>
where
    L: BrowserLauncher + 'static,
{
    match started {
        Ok(launcher) => Arc::new(launcher),
        Err(e) => {
            tracing::error!(error = %e, "browser driver unavailable, place resolution disabled");
            Arc::new(UnavailableLauncher::new(e.to_string()))
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index).post(resolve_place))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Json<Value> {
    let message = if state.scheduler_active {
        "scheduler is running"
    } else {
        "scheduler is not running"
    };
    Json(json!({ "message": message, "scheduler_active": state.scheduler_active }))
}

async fn resolve_place(
    State(state): State<AppState>,
    payload: Result<Json<ResolvePlaceRequest>, JsonRejection>,
) -> Result<Json<ResolvePlaceResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let place_num = state.resolver.resolve(&request.place_url).await?;
    Ok(Json(ResolvePlaceResponse::success(place_num)))
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request body: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BR"),
            ApiError::Resolution(ResolutionError::InvalidUrl(_)) => (StatusCode::BAD_REQUEST, "BR"),
            ApiError::Resolution(ResolutionError::NoPlaceId { .. }) => (StatusCode::NOT_FOUND, "NF"),
            ApiError::Resolution(ResolutionError::Browser(_)) => (StatusCode::BAD_GATEWAY, "ER"),
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "place resolution failed");
        }
        let body = ResolvePlaceResponse::failure(code, self.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use review_ingestion::test_dependencies::{MockLauncher, PageFailure, PageScript};
    use tower::ServiceExt;

    fn app_with(launcher: Arc<dyn BrowserLauncher>, scheduler_active: bool) -> Router {
        let resolver = PlaceUrlResolver::new(launcher)
            .with_redirect_wait(Duration::from_millis(10), Duration::from_millis(5));
        router(AppState {
            resolver: Arc::new(resolver),
            scheduler_active,
        })
    }

    fn app(launcher: MockLauncher) -> Router {
        app_with(Arc::new(launcher), true)
    }

    async fn index_body(app: Router) -> Value {
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn index_reports_scheduler_state() {
        let running = index_body(app(MockLauncher::new())).await;
        assert_eq!(running["scheduler_active"], true);
        assert_eq!(running["message"], "scheduler is running");

        let stopped = index_body(app_with(Arc::new(MockLauncher::new()), false)).await;
        assert_eq!(stopped["scheduler_active"], false);
        assert_eq!(stopped["message"], "scheduler is not running");
    }

    #[tokio::test]
    async fn driver_that_failed_to_start_answers_bad_gateway() {
        let started: Result<MockLauncher, BrowserError> =
            Err(BrowserError::Driver("playwright driver missing".into()));
        let app = app_with(launcher_or_unavailable(started), false);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(post(r#"{"place_url": "https://naver.me/xyz"}"#))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
            let body = json_body(response).await;
            assert_eq!(body["code"], "ER");
            assert_eq!(body["place_num"], Value::Null);
        }
    }

    #[tokio::test]
    async fn started_driver_is_used_as_is() {
        let launcher = MockLauncher::new().with_default(PageScript::redirecting_to(
            "https://m.place.naver.com/place/42/home",
        ));
        let response = app_with(launcher_or_unavailable(Ok(launcher)), true)
            .oneshot(post(r#"{"place_url": "https://naver.me/xyz"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["place_num"], "42");
    }

    #[tokio::test]
    async fn resolves_place_number() {
        let launcher = MockLauncher::new().with_default(PageScript::redirecting_to(
            "https://m.place.naver.com/place/1234567/home",
        ));

        let response = app(launcher)
            .oneshot(post(r#"{"place_url": "https://naver.me/xyz"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"code": "SU", "message": "Success", "place_num": "1234567"})
        );
    }

    #[tokio::test]
    async fn missing_place_id_is_not_found() {
        let launcher =
            MockLauncher::new().with_default(PageScript::redirecting_to("https://www.naver.com/"));

        let response = app(launcher)
            .oneshot(post(r#"{"place_url": "https://naver.me/xyz"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["code"], "NF");
        assert_eq!(body["place_num"], Value::Null);
    }

    #[tokio::test]
    async fn browser_failure_is_bad_gateway() {
        let launcher = MockLauncher::new()
            .with_default(PageScript::default().failing_at(PageFailure::Navigation));

        let response = app(launcher)
            .oneshot(post(r#"{"place_url": "https://naver.me/xyz"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["code"], "ER");
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        for body in [r#"{"url": "https://naver.me/xyz"}"#, "not json"] {
            let response = app(MockLauncher::new()).oneshot(post(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }
}
