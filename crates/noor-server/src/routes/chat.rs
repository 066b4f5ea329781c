use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use noor::agent::TurnError;
use noor::models::message::Message;
use noor::models::role::Role;
use noor::models::tool::ToolOutcome;
use noor::store::{ConversationStore, StoredMessage};

use crate::ratelimit::Decision;
use crate::state::AppState;

const MAX_MESSAGE_CHARS: usize = 2000;
pub(crate) const CHAT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<WireMessage>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    name: String,
    args: Value,
    result: Value,
}

impl From<&ToolOutcome> for WireToolCall {
    fn from(outcome: &ToolOutcome) -> Self {
        Self {
            name: outcome.name.clone(),
            args: outcome.arguments.clone(),
            result: serde_json::to_value(&outcome.payload).unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    text: String,
    #[serde(rename = "toolCalls", skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
}

/// First `X-Forwarded-For` hop, else the real-IP header, else a shared
/// bucket. The proxy always runs behind an edge that sets one of these.
pub(crate) fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .unwrap_or("unknown")
        .to_string()
}

pub(crate) fn error_body(message: &str) -> Json<Value> {
    Json(json!({ "error": message }))
}

pub(crate) fn rate_limited_response(retry_after: Duration) -> Response {
    let seconds = retry_after.as_secs().max(1);
    (
        StatusCode::TOO_MANY_REQUESTS,
        error_body(&format!(
            "Too many requests. Try again in {seconds} seconds."
        )),
    )
        .into_response()
}

fn convert_history(history: &[WireMessage]) -> Vec<Message> {
    let mut messages = Vec::new();
    for wire in history {
        let content = wire.content.trim();
        if content.is_empty() {
            continue;
        }
        match wire.role.as_str() {
            "user" => messages.push(Message::user().with_text(content)),
            // Clients built against the upstream chat API say "model".
            "assistant" | "model" => messages.push(Message::assistant().with_text(content)),
            other => {
                tracing::warn!(role = other, "dropping history entry with unknown role");
            }
        }
    }
    messages
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let ip = client_ip(&headers);
    if let Decision::Limited { retry_after } =
        state
            .limiter
            .check(&format!("chat:{ip}"), state.limits.chat_per_minute, CHAT_WINDOW)
    {
        tracing::info!(%ip, "chat request rate limited");
        return rate_limited_response(retry_after);
    }

    let message = request.message.trim().to_string();
    if message.is_empty() {
        return (StatusCode::BAD_REQUEST, error_body("message is required")).into_response();
    }
    if request.message.chars().count() > MAX_MESSAGE_CHARS {
        return (
            StatusCode::BAD_REQUEST,
            error_body(&format!(
                "message must be at most {MAX_MESSAGE_CHARS} characters"
            )),
        )
            .into_response();
    }

    let mut messages = convert_history(&request.history);
    messages.push(Message::user().with_text(&message));

    match state.agent.reply(&messages, &request.language).await {
        Ok(outcome) => {
            if let Some(user_id) = &request.user_id {
                persist_turn(
                    state.store.clone(),
                    user_id.clone(),
                    request.conversation_id.clone(),
                    message,
                    outcome.text.clone(),
                    &outcome.tool_outcomes,
                );
            }
            let response = ChatResponse {
                text: outcome.text,
                tool_calls: outcome.tool_outcomes.iter().map(WireToolCall::from).collect(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => turn_error_response(err),
    }
}

fn turn_error_response(err: TurnError) -> Response {
    match err {
        TurnError::RateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            error_body("The model is receiving too many requests. Wait a moment and retry."),
        )
            .into_response(),
        TurnError::QuotaExhausted => (
            StatusCode::TOO_MANY_REQUESTS,
            error_body("Today's model quota is exhausted. Try again tomorrow."),
        )
            .into_response(),
        TurnError::Other(reason) => {
            tracing::error!(%reason, "chat turn failed");
            (
                StatusCode::BAD_GATEWAY,
                error_body("The assistant is temporarily unavailable. Please try again."),
            )
                .into_response()
        }
    }
}

/// Record the finished turn in the background; persistence must never fail
/// the user-visible response.
fn persist_turn(
    store: std::sync::Arc<dyn ConversationStore>,
    user_id: String,
    conversation_id: Option<String>,
    user_text: String,
    reply_text: String,
    tool_outcomes: &[ToolOutcome],
) {
    let tool_calls = if tool_outcomes.is_empty() {
        None
    } else {
        serde_json::to_value(tool_outcomes).ok()
    };
    tokio::spawn(async move {
        let result = async {
            let conversation_id = match conversation_id {
                Some(id) => {
                    store
                        .append(&id, StoredMessage::new(&id, Role::User, &user_text, None))
                        .await?;
                    id
                }
                None => {
                    let conversation = store.create(&user_id, &user_text).await?;
                    store
                        .append(
                            &conversation.id,
                            StoredMessage::new(&conversation.id, Role::User, &user_text, None),
                        )
                        .await?;
                    conversation.id
                }
            };
            store
                .append(
                    &conversation_id,
                    StoredMessage::new(&conversation_id, Role::Assistant, &reply_text, tool_calls),
                )
                .await
        }
        .await;
        if let Err(err) = result {
            tracing::warn!(error = %err, "failed to persist chat turn");
        }
    });
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handler))
        .with_state(state)
}
