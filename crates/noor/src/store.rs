//! Conversation persistence, as the orchestrator sees it.
//!
//! The core depends only on the [`ConversationStore`] trait; the server and
//! tests use the process-local [`MemoryStore`], and other backends implement
//! the same surface. A store failure after a finished turn is logged by the
//! caller and never fails the user-visible reply.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::role::Role;

/// Listings are capped at this many conversations, newest first.
pub const MAX_LISTED_CONVERSATIONS: usize = 50;

const TITLE_MAX_CHARS: usize = 50;
const PREVIEW_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub last_message_preview: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    /// Opaque tool-call payload recorded with the message, if any.
    pub tool_calls: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn new(
        conversation_id: &str,
        role: Role,
        content: &str,
        tool_calls: Option<Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            tool_calls,
            created_at: Utc::now(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("conversation not found: {0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Io(String),
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create a conversation owned by `user_id`, titled from the first message.
    async fn create(&self, user_id: &str, first_message: &str)
        -> Result<Conversation, StoreError>;

    /// Conversations owned by `user_id`, newest first, capped, optionally
    /// filtered by a case-insensitive title/preview match.
    async fn list(
        &self,
        user_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<Conversation>, StoreError>;

    /// Append a message and refresh the conversation's preview and
    /// `updated_at` (which never moves backwards).
    async fn append(&self, conversation_id: &str, message: StoredMessage)
        -> Result<(), StoreError>;

    async fn messages(&self, conversation_id: &str) -> Result<Vec<StoredMessage>, StoreError>;

    async fn delete(&self, conversation_id: &str) -> Result<(), StoreError>;

    /// Reassign every conversation from one identity to another, for
    /// anonymous-to-authenticated account linking. Returns how many moved.
    async fn merge(&self, from_user_id: &str, to_user_id: &str) -> Result<usize, StoreError>;
}

pub fn title_from(first_message: &str) -> String {
    truncate_chars(first_message.trim(), TITLE_MAX_CHARS)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

struct Entry {
    conversation: Conversation,
    messages: Vec<StoredMessage>,
}

/// In-memory store: a single map behind a mutex, gone at process exit.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn create(
        &self,
        user_id: &str,
        first_message: &str,
    ) -> Result<Conversation, StoreError> {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title_from(first_message),
            last_message_preview: truncate_chars(first_message.trim(), PREVIEW_MAX_CHARS),
            created_at: now,
            updated_at: now,
        };
        self.entries.lock().unwrap().insert(
            conversation.id.clone(),
            Entry {
                conversation: conversation.clone(),
                messages: Vec::new(),
            },
        );
        Ok(conversation)
    }

    async fn list(
        &self,
        user_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<Conversation>, StoreError> {
        let entries = self.entries.lock().unwrap();
        let needle = search.map(str::to_lowercase);
        let mut conversations: Vec<Conversation> = entries
            .values()
            .map(|e| &e.conversation)
            .filter(|c| c.user_id == user_id)
            .filter(|c| match &needle {
                Some(n) => {
                    c.title.to_lowercase().contains(n)
                        || c.last_message_preview.to_lowercase().contains(n)
                }
                None => true,
            })
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations.truncate(MAX_LISTED_CONVERSATIONS);
        Ok(conversations)
    }

    async fn append(
        &self,
        conversation_id: &str,
        message: StoredMessage,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))?;
        entry.conversation.last_message_preview =
            truncate_chars(message.content.trim(), PREVIEW_MAX_CHARS);
        // updated_at is monotonically non-decreasing
        let now = Utc::now();
        if now > entry.conversation.updated_at {
            entry.conversation.updated_at = now;
        }
        entry.messages.push(message);
        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<StoredMessage>, StoreError> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(conversation_id)
            .map(|e| e.messages.clone())
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        entries
            .remove(conversation_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))
    }

    async fn merge(&self, from_user_id: &str, to_user_id: &str) -> Result<usize, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let mut moved = 0;
        for entry in entries.values_mut() {
            if entry.conversation.user_id == from_user_id {
                entry.conversation.user_id = to_user_id.to_string();
                moved += 1;
            }
        }
        Ok(moved)
    }
}
