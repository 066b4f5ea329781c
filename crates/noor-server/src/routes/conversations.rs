use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use noor::models::role::Role;
use noor::store::{StoreError, StoredMessage};

use crate::routes::chat::error_body;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub user_id: String,
    #[serde(default)]
    pub q: Option<String>,
}

async fn list_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    match state.store.list(&params.user_id, params.q.as_deref()).await {
        Ok(conversations) => (StatusCode::OK, Json(conversations)).into_response(),
        Err(err) => store_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub user_id: String,
    pub message: String,
}

async fn create_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateRequest>,
) -> Response {
    if request.message.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, error_body("message is required")).into_response();
    }
    match state.store.create(&request.user_id, &request.message).await {
        Ok(conversation) => (StatusCode::CREATED, Json(conversation)).into_response(),
        Err(err) => store_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct AppendRequest {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub tool_calls: Option<Value>,
}

async fn append_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AppendRequest>,
) -> Response {
    let role = match request.role.as_str() {
        "user" => Role::User,
        "assistant" | "model" => Role::Assistant,
        other => {
            return (
                StatusCode::BAD_REQUEST,
                error_body(&format!("unknown role: {other}")),
            )
                .into_response()
        }
    };
    let message = StoredMessage::new(&id, role, &request.content, request.tool_calls);
    match state.store.append(&id, message).await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "ok"}))).into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn delete_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.delete(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => store_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub from_user_id: String,
    pub to_user_id: String,
}

async fn merge_handler(
    State(state): State<AppState>,
    Json(request): Json<MergeRequest>,
) -> Response {
    match state
        .store
        .merge(&request.from_user_id, &request.to_user_id)
        .await
    {
        Ok(moved) => (StatusCode::OK, Json(json!({"moved": moved}))).into_response(),
        Err(err) => store_error_response(err),
    }
}

fn store_error_response(err: StoreError) -> Response {
    match err {
        StoreError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            error_body(&format!("conversation not found: {id}")),
        )
            .into_response(),
        StoreError::Io(reason) => {
            tracing::error!(%reason, "conversation store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("conversation storage is temporarily unavailable"),
            )
                .into_response()
        }
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/conversations",
            get(list_handler).post(create_handler),
        )
        .route("/api/conversations/merge", post(merge_handler))
        .route("/api/conversations/:id/messages", post(append_handler))
        .route("/api/conversations/:id", delete(delete_handler))
        .with_state(state)
}
