//! The chat orchestrator.
//!
//! One user turn is at most two model calls: the first offers the registered
//! tools; if the model requests any, they all execute concurrently and a
//! second call composes the answer from the tool results. The raw outcomes
//! ride along in the return value so callers can render provenance.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::errors::ProviderError;
use crate::models::message::{Message, MessageContent, ToolRequest};
use crate::models::tool::{ToolOutcome, ToolPayload};
use crate::prompt_template::load_prompt_file;
use crate::providers::base::Provider;
use crate::tools::{QuranTool, ToolExecutor};

/// Shown when the model produced no text at all for the final answer.
pub const FALLBACK_REPLY: &str =
    "Your request was processed, but no answer text came back. Please try again.";

/// Why a turn failed, coarse enough for status mapping and apologies.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TurnError {
    #[error("the model is rate limiting requests")]
    RateLimited,

    #[error("the model quota is exhausted for today")]
    QuotaExhausted,

    #[error("chat turn failed: {0}")]
    Other(String),
}

impl From<ProviderError> for TurnError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::RateLimited => TurnError::RateLimited,
            ProviderError::QuotaExhausted => TurnError::QuotaExhausted,
            other => TurnError::Other(other.to_string()),
        }
    }
}

/// The result of one completed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub text: String,
    pub tool_outcomes: Vec<ToolOutcome>,
}

#[derive(Serialize)]
struct PromptContext {
    language: String,
}

pub struct Agent {
    provider: Arc<dyn Provider>,
    executor: ToolExecutor,
}

impl Agent {
    pub fn new(provider: Arc<dyn Provider>, executor: ToolExecutor) -> Self {
        Self { provider, executor }
    }

    /// Drive one turn. `messages` is the full history ending with the new
    /// user message; `language` selects the display language for the answer.
    pub async fn reply(
        &self,
        messages: &[Message],
        language: &str,
    ) -> Result<TurnOutcome, TurnError> {
        let context = PromptContext {
            language: language.to_string(),
        };
        let system_prompt = load_prompt_file("system.md", &context)
            .map_err(|e| TurnError::Other(format!("failed to render system prompt: {e}")))?;
        let tools = QuranTool::definitions();

        tracing::info!(
            message_count = messages.len(),
            tool_count = tools.len(),
            "starting chat turn"
        );
        let (first, _usage) = self.provider.complete(&system_prompt, messages, &tools).await?;

        let tool_requests: Vec<&ToolRequest> = first
            .content
            .iter()
            .filter_map(MessageContent::as_tool_request)
            .collect();

        if tool_requests.is_empty() {
            tracing::debug!("no tool calls requested, first answer is final");
            return Ok(TurnOutcome {
                text: non_empty_or_fallback(first.text()),
                tool_outcomes: Vec::new(),
            });
        }

        tracing::info!(tool_calls = tool_requests.len(), "executing tool calls");
        let tool_outcomes = self.run_tool_requests(&tool_requests).await;

        // Second pass: history + the model's tool-call record + every result
        // as a tool response, then the composition instruction.
        let mut followup = messages.to_vec();
        followup.push(first.clone());
        let mut response_message = Message::user();
        for (request, outcome) in tool_requests.iter().zip(tool_outcomes.iter()) {
            response_message =
                response_message.with_tool_response(request.id.clone(), Ok(outcome.clone()));
        }
        followup.push(response_message);

        let instruction = load_prompt_file("answer.md", &context)
            .map_err(|e| TurnError::Other(format!("failed to render answer prompt: {e}")))?;
        followup.push(Message::user().with_text(instruction));

        let (second, _usage) = self.provider.complete(&system_prompt, &followup, &[]).await?;

        Ok(TurnOutcome {
            text: non_empty_or_fallback(second.text()),
            tool_outcomes,
        })
    }

    /// Execute every requested call concurrently. A request the model itself
    /// botched (unparseable name or arguments) still yields an error outcome
    /// in its slot so results pair back to requests positionally.
    async fn run_tool_requests(&self, requests: &[&ToolRequest]) -> Vec<ToolOutcome> {
        let futures = requests.iter().map(|request| {
            let tool_call = request.tool_call.clone();
            async move {
                match tool_call {
                    Ok(call) => self.executor.execute(&call).await,
                    Err(err) => ToolOutcome {
                        name: "unknown".to_string(),
                        arguments: Value::Null,
                        payload: ToolPayload::Error {
                            message: err.to_string(),
                        },
                    },
                }
            }
        });
        futures::future::join_all(futures).await
    }
}

fn non_empty_or_fallback(text: String) -> String {
    if text.trim().is_empty() {
        FALLBACK_REPLY.to_string()
    } else {
        text
    }
}

/// A user-facing apology in the conversation's display language, specific
/// enough to suggest a remedy but free of internal detail.
pub fn apology(language: &str, error: &TurnError) -> String {
    match (language, error) {
        ("ar", TurnError::RateLimited) => {
            "عذراً، الخدمة مشغولة حالياً. يرجى الانتظار قليلاً ثم المحاولة مرة أخرى.".to_string()
        }
        ("ar", TurnError::QuotaExhausted) => {
            "عذراً، استُنفدت حصة اليوم. يرجى المحاولة غداً.".to_string()
        }
        ("ar", TurnError::Other(_)) => {
            "عذراً، حدث خطأ أثناء معالجة رسالتك. يرجى المحاولة مرة أخرى.".to_string()
        }
        ("id", TurnError::RateLimited) => {
            "Maaf, layanan sedang sibuk. Mohon tunggu sebentar lalu coba lagi.".to_string()
        }
        ("id", TurnError::QuotaExhausted) => {
            "Maaf, kuota hari ini sudah habis. Silakan coba lagi besok.".to_string()
        }
        ("id", TurnError::Other(_)) => {
            "Maaf, terjadi kesalahan saat memproses pesan Anda. Silakan coba lagi.".to_string()
        }
        (_, TurnError::RateLimited) => {
            "I am receiving too many requests right now. Please wait a moment and try again."
                .to_string()
        }
        (_, TurnError::QuotaExhausted) => {
            "Today's usage limit has been reached. Please try again tomorrow.".to_string()
        }
        (_, TurnError::Other(_)) => {
            "Something went wrong while handling your message. Please try again.".to_string()
        }
    }
}
