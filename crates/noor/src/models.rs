//! The objects passed between the user, the agent, and the model.
//!
//! The internal message format is deliberately close to the chat-completions
//! wire shape (role-tagged messages carrying text, tool requests, and tool
//! responses) but is not identical to it; `providers::utils` owns the
//! conversion in both directions.

pub mod message;
pub mod role;
pub mod tool;
