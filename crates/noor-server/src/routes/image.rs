use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use noor::errors::ProviderError;

use crate::ratelimit::Decision;
use crate::routes::chat::{client_ip, error_body, rate_limited_response};
use crate::state::AppState;

const MAX_THEME_CHARS: usize = 200;
pub(crate) const IMAGE_WINDOW: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub theme: String,
}

#[derive(Debug, Serialize)]
struct ImageResponse {
    image: String,
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ImageRequest>,
) -> Response {
    let ip = client_ip(&headers);
    if let Decision::Limited { retry_after } = state.limiter.check(
        &format!("image:{ip}"),
        state.limits.image_per_hour,
        IMAGE_WINDOW,
    ) {
        tracing::info!(%ip, "image request rate limited");
        return rate_limited_response(retry_after);
    }

    let theme = request.theme.trim();
    if theme.is_empty() {
        return (StatusCode::BAD_REQUEST, error_body("theme is required")).into_response();
    }
    if request.theme.chars().count() > MAX_THEME_CHARS {
        return (
            StatusCode::BAD_REQUEST,
            error_body(&format!("theme must be at most {MAX_THEME_CHARS} characters")),
        )
            .into_response();
    }

    match state.provider.generate_image(theme).await {
        Ok(image) => (StatusCode::OK, Json(ImageResponse { image })).into_response(),
        Err(ProviderError::RateLimited) => (
            StatusCode::TOO_MANY_REQUESTS,
            error_body("The image model is receiving too many requests. Wait and retry."),
        )
            .into_response(),
        Err(ProviderError::QuotaExhausted) => (
            StatusCode::TOO_MANY_REQUESTS,
            error_body("Today's image quota is exhausted. Try again tomorrow."),
        )
            .into_response(),
        Err(ProviderError::Refused) => (
            StatusCode::BAD_GATEWAY,
            error_body("The image model declined this theme. Try a different one."),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "image generation failed");
            (
                StatusCode::BAD_GATEWAY,
                error_body("Image generation is temporarily unavailable. Please try again."),
            )
                .into_response()
        }
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/image", post(handler))
        .with_state(state)
}
