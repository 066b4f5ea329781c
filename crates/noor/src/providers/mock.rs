use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, Usage};

/// A provider that replays pre-configured responses, for tests.
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Result<Message, ProviderError>>>>,
    images: Arc<Mutex<Vec<Result<String, ProviderError>>>>,
    delay: Option<Duration>,
}

impl MockProvider {
    /// Replay a sequence of successful completions.
    pub fn new(responses: Vec<Message>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Replay a sequence of completion results, including failures.
    pub fn with_results(responses: Vec<Result<Message, ProviderError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            images: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Sleep before answering each completion; used to exercise cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_images(self, images: Vec<Result<String, ProviderError>>) -> Self {
        *self.images.lock().unwrap() = images;
        self
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok((Message::assistant().with_text(""), Usage::default()))
        } else {
            responses.remove(0).map(|m| (m, Usage::default()))
        }
    }

    async fn generate_image(&self, _prompt: &str) -> Result<String, ProviderError> {
        let mut images = self.images.lock().unwrap();
        if images.is_empty() {
            Err(ProviderError::Refused)
        } else {
            images.remove(0)
        }
    }
}
