use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::quran::types::{SearchResult, Surah, Verse};

/// A tool that can be offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON Schema for the parameters the tool accepts
    pub parameters: Value,
}

impl Tool {
    pub fn new<N, D>(name: N, description: D, parameters: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A tool invocation as issued by the model. Produced only by the model and
/// consumed exactly once by the executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// The name the model asked for; parsed into the closed tool set at dispatch
    pub name: String,
    /// The arguments for the invocation
    pub arguments: Value,
}

impl ToolCall {
    pub fn new<S: Into<String>>(name: S, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// The structured result of executing one tool call.
///
/// `name` and `arguments` always echo the originating [`ToolCall`] unchanged;
/// the pairing between calls and outcomes relies on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutcome {
    pub name: String,
    pub arguments: Value,
    pub payload: ToolPayload,
}

impl ToolOutcome {
    pub fn new(call: &ToolCall, payload: ToolPayload) -> Self {
        Self {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            payload,
        }
    }

    /// An error outcome that still echoes the originating call.
    pub fn error<S: Into<String>>(call: &ToolCall, message: S) -> Self {
        Self::new(
            call,
            ToolPayload::Error {
                message: message.into(),
            },
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, ToolPayload::Error { .. })
    }
}

/// What a tool produced. An empty search is `NoResults`, not `Error`, so the
/// model can answer gracefully instead of inventing verses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolPayload {
    SearchResults { results: Vec<SearchResult> },
    Verse { verse: Verse },
    Surah { surah: Surah },
    NoResults { message: String },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_echoes_originating_call() {
        let call = ToolCall::new("search_verse", json!({"query": "mercy"}));
        let outcome = ToolOutcome::new(
            &call,
            ToolPayload::NoResults {
                message: "nothing".into(),
            },
        );
        assert_eq!(outcome.name, call.name);
        assert_eq!(outcome.arguments, call.arguments);
        assert!(!outcome.is_error());
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let payload = ToolPayload::NoResults {
            message: "none".into(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "no_results");
        assert_eq!(value["message"], "none");
    }
}
