//! File-backed conversation store for the terminal client.
//!
//! One JSON file per conversation under the user's config directory, so
//! local sessions survive restarts without any external service.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use noor::store::{
    title_from, Conversation, ConversationStore, StoreError, StoredMessage,
    MAX_LISTED_CONVERSATIONS,
};

#[derive(Debug, Serialize, Deserialize)]
struct ConversationFile {
    conversation: Conversation,
    messages: Vec<StoredMessage>,
}

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Result<Self, StoreError> {
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(io_error)?;
        }
        Ok(Self { dir })
    }

    /// `~/.config/noor/conversations` on most systems.
    pub fn default_dir() -> Result<PathBuf, StoreError> {
        let home = dirs::home_dir()
            .ok_or_else(|| StoreError::Io("could not determine home directory".into()))?;
        Ok(home.join(".config").join("noor").join("conversations"))
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn load(&self, id: &str) -> Result<ConversationFile, StoreError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let content = fs::read_to_string(path).map_err(io_error)?;
        serde_json::from_str(&content).map_err(|e| StoreError::Io(e.to_string()))
    }

    fn save(&self, file: &ConversationFile) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(file).map_err(|e| StoreError::Io(e.to_string()))?;
        fs::write(self.path_for(&file.conversation.id), content).map_err(io_error)
    }

    fn load_all(&self) -> Result<Vec<ConversationFile>, StoreError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = name.strip_suffix(".json") {
                files.push(self.load(id)?);
            }
        }
        Ok(files)
    }
}

fn io_error(err: std::io::Error) -> StoreError {
    StoreError::Io(err.to_string())
}

#[async_trait]
impl ConversationStore for FileStore {
    async fn create(
        &self,
        user_id: &str,
        first_message: &str,
    ) -> Result<Conversation, StoreError> {
        let now = chrono::Utc::now();
        let conversation = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title_from(first_message),
            last_message_preview: title_from(first_message),
            created_at: now,
            updated_at: now,
        };
        self.save(&ConversationFile {
            conversation: conversation.clone(),
            messages: Vec::new(),
        })?;
        Ok(conversation)
    }

    async fn list(
        &self,
        user_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<Conversation>, StoreError> {
        let needle = search.map(str::to_lowercase);
        let mut conversations: Vec<Conversation> = self
            .load_all()?
            .into_iter()
            .map(|f| f.conversation)
            .filter(|c| c.user_id == user_id)
            .filter(|c| match &needle {
                Some(n) => {
                    c.title.to_lowercase().contains(n)
                        || c.last_message_preview.to_lowercase().contains(n)
                }
                None => true,
            })
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
        let mut file = self.load(conversation_id)?;
        file.conversation.last_message_preview = title_from(&message.content);
        let now = chrono::Utc::now();
        if now > file.conversation.updated_at {
            file.conversation.updated_at = now;
        }
        file.messages.push(message);
        self.save(&file)
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<StoredMessage>, StoreError> {
        Ok(self.load(conversation_id)?.messages)
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), StoreError> {
        let path = self.path_for(conversation_id);
        if !path.exists() {
            return Err(StoreError::NotFound(conversation_id.to_string()));
        }
        fs::remove_file(path).map_err(io_error)
    }

    async fn merge(&self, from_user_id: &str, to_user_id: &str) -> Result<usize, StoreError> {
        let mut moved = 0;
        for mut file in self.load_all()? {
            if file.conversation.user_id == from_user_id {
                file.conversation.user_id = to_user_id.to_string();
                self.save(&file)?;
                moved += 1;
            }
        }
        Ok(moved)
    }
}
