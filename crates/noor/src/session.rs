//! Conversation state for one chat surface, with supersession.
//!
//! `clear()` must invalidate any in-flight turn: the session hands each turn
//! the cancellation token that was live when it started, and the token is
//! checked immediately before every history mutation. A superseded turn's
//! late result is dropped, never appended.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::agent::{apology, Agent, TurnOutcome};
use crate::models::message::Message;

/// The assistant message a fresh or cleared conversation starts with.
pub fn initial_greeting(language: &str) -> &'static str {
    match language {
        "ar" => "السلام عليكم! أنا نور، رفيقك في دراسة القرآن. كيف يمكنني مساعدتك اليوم؟",
        "id" => "Assalamu'alaikum! Saya Noor, teman belajar Al-Qur'an Anda. Ada yang bisa saya bantu?",
        _ => "As-salamu alaykum! I am Noor, your Quran study companion. How can I help you today?",
    }
}

/// One turn's user-visible result.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub message: Message,
    pub outcome: TurnOutcome,
}

struct SessionState {
    history: Vec<Message>,
    cancel: CancellationToken,
}

pub struct ChatSession {
    agent: Arc<Agent>,
    language: String,
    state: Mutex<SessionState>,
}

impl ChatSession {
    pub fn new(agent: Arc<Agent>, language: &str) -> Self {
        Self {
            agent,
            language: language.to_string(),
            state: Mutex::new(SessionState {
                history: vec![Message::assistant().with_text(initial_greeting(language))],
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn history(&self) -> Vec<Message> {
        self.state.lock().unwrap().history.clone()
    }

    /// Reset to the initial greeting and supersede any in-flight turn.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.cancel.cancel();
        state.cancel = CancellationToken::new();
        state.history = vec![Message::assistant().with_text(initial_greeting(&self.language))];
        tracing::debug!("conversation cleared");
    }

    /// Submit one user message. Returns `None` when the turn was superseded
    /// by `clear()` while in flight; the conversation then shows only the
    /// reset state. A turn that completes always ends with an assistant
    /// message appended, apology included.
    pub async fn submit(&self, text: &str) -> Option<TurnReply> {
        let (token, snapshot) = {
            let mut state = self.state.lock().unwrap();
            let token = state.cancel.clone();
            state.history.push(Message::user().with_text(text));
            (token, state.history.clone())
        };

        let outcome = match self.agent.reply(&snapshot, &self.language).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(error = %err, "turn failed, substituting apology");
                TurnOutcome {
                    text: apology(&self.language, &err),
                    tool_outcomes: Vec::new(),
                }
            }
        };
        let message = Message::assistant().with_text(&outcome.text);

        {
            let mut state = self.state.lock().unwrap();
            if token.is_cancelled() {
                tracing::debug!("dropping reply for a superseded turn");
                return None;
            }
            state.history.push(message.clone());
        }

        Some(TurnReply { message, outcome })
    }
}
