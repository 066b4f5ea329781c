pub mod chat;
pub mod conversations;
pub mod image;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::state::AppState;

/// Build the full route tree with CORS applied.
pub fn configure(state: AppState, allowed_origins: Vec<String>) -> Router {
    Router::new()
        .merge(chat::routes(state.clone()))
        .merge(image::routes(state.clone()))
        .merge(conversations::routes(state))
        .layer(cors_layer(allowed_origins))
}

/// Echo the request origin only when it is on the allow-list; otherwise no
/// CORS header is set and the browser blocks the response.
fn cors_layer(allowed_origins: Vec<String>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _request_parts| {
                origin
                    .to_str()
                    .map(|origin| allowed_origins.iter().any(|allowed| allowed == origin))
                    .unwrap_or(false)
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use noor::agent::Agent;
    use noor::errors::{ProviderError, QuranError};
    use noor::models::message::Message;
    use noor::providers::base::Provider;
    use noor::providers::mock::MockProvider;
    use noor::quran::client::QuranApi;
    use noor::quran::types::{SearchResult, Surah, Verse};
    use noor::store::MemoryStore;
    use noor::tools::ToolExecutor;

    use crate::configuration::LimitSettings;
    use crate::ratelimit::MemoryRateLimiter;
    use crate::state::AppState;

    /// A data API that always finds nothing; enough for route-level tests.
    struct StubQuranApi;

    #[async_trait]
    impl QuranApi for StubQuranApi {
        async fn search_verses(
            &self,
            _query: &str,
            _language: &str,
            _page: u32,
        ) -> Result<Vec<SearchResult>, QuranError> {
            Ok(Vec::new())
        }

        async fn ayah_details(
            &self,
            _surah: u32,
            _ayah: u32,
            _translation_id: u32,
        ) -> Result<Verse, QuranError> {
            Err(QuranError::Network("stub".into()))
        }

        async fn surah(&self, _id: u32) -> Result<Surah, QuranError> {
            Err(QuranError::Network("stub".into()))
        }

        async fn surahs(&self) -> Result<Vec<Surah>, QuranError> {
            Ok(Vec::new())
        }
    }

    pub(crate) struct TestStateOptions {
        pub responses: Vec<Result<Message, ProviderError>>,
        pub images: Vec<Result<String, ProviderError>>,
        pub limits: LimitSettings,
    }

    impl Default for TestStateOptions {
        fn default() -> Self {
            Self {
                responses: Vec::new(),
                images: Vec::new(),
                limits: LimitSettings::default(),
            }
        }
    }

    pub(crate) fn test_state(options: TestStateOptions) -> AppState {
        let provider: Arc<dyn Provider> = Arc::new(
            MockProvider::with_results(options.responses).with_images(options.images),
        );
        let agent = Arc::new(Agent::new(
            provider.clone(),
            ToolExecutor::new(Arc::new(StubQuranApi)),
        ));
        AppState {
            agent,
            provider,
            store: Arc::new(MemoryStore::new()),
            limiter: Arc::new(MemoryRateLimiter::new()),
            limits: options.limits,
        }
    }

    pub(crate) async fn post_json(
        app: axum::Router,
        path: &str,
        body: Value,
        ip: &str,
    ) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        app.oneshot(request).await.unwrap()
    }

    pub(crate) async fn body_json(response: Response<Body>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn allowed_origins_are_echoed_back() {
        let state = test_state(TestStateOptions {
            responses: vec![Ok(Message::assistant().with_text("ok"))],
            ..Default::default()
        });
        let app = super::configure(state, vec!["https://noor.app".to_string()]);

        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .header("origin", "https://noor.app")
            .header("x-forwarded-for", "1.1.1.1")
            .body(Body::from(
                serde_json::to_vec(&json!({"message": "salam"})).unwrap(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("https://noor.app")
        );
    }

    #[tokio::test]
    async fn unlisted_origins_get_no_cors_header() {
        let state = test_state(TestStateOptions {
            responses: vec![Ok(Message::assistant().with_text("ok"))],
            ..Default::default()
        });
        let app = super::configure(state, vec!["https://noor.app".to_string()]);

        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .header("origin", "https://evil.example")
            .header("x-forwarded-for", "1.1.1.1")
            .body(Body::from(
                serde_json::to_vec(&json!({"message": "salam"})).unwrap(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert!(response
            .headers()
            .get("access-control-allow-origin")
            .is_none());
    }

    #[tokio::test]
    async fn non_post_methods_are_rejected_on_chat() {
        let state = test_state(TestStateOptions::default());
        let app = super::configure(state, Vec::new());

        let request = Request::builder()
            .method("GET")
            .uri("/api/chat")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
