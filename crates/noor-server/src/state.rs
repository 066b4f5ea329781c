use std::sync::Arc;

use noor::agent::Agent;
use noor::providers::base::Provider;
use noor::store::ConversationStore;

use crate::configuration::LimitSettings;
use crate::ratelimit::RateLimiter;

/// Shared application state; everything mutable sits behind its own lock
/// inside the injected collaborators.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub provider: Arc<dyn Provider>,
    pub store: Arc<dyn ConversationStore>,
    pub limiter: Arc<dyn RateLimiter>,
    pub limits: LimitSettings,
}
