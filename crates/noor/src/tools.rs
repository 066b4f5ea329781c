//! The closed set of tools the model may call, and the executor that turns a
//! model-issued [`ToolCall`] into a [`ToolOutcome`].
//!
//! Dispatch never lets a data-client failure escape: an unknown name, bad
//! arguments, or an upstream error all become structured error outcomes so
//! the conversation stays alive.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::{json, Value};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::errors::QuranError;
use crate::models::tool::{Tool, ToolCall, ToolOutcome, ToolPayload};
use crate::quran::client::{QuranApi, DEFAULT_LANGUAGE, DEFAULT_TRANSLATION_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum QuranTool {
    SearchVerse,
    GetAyahDetails,
    GetSurahInfo,
}

impl QuranTool {
    /// The model-facing definitions for every registered tool.
    pub fn definitions() -> Vec<Tool> {
        QuranTool::iter().map(QuranTool::definition).collect()
    }

    pub fn definition(self) -> Tool {
        match self {
            QuranTool::SearchVerse => Tool::new(
                self.to_string(),
                "Search the Quran for verses matching a phrase or topic. \
                 Returns matching verses with their translations.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The phrase or topic to search for, at least 2 characters"
                        },
                        "language": {
                            "type": "string",
                            "description": "Translation language code, e.g. en, ar, id"
                        },
                        "page": {
                            "type": "integer",
                            "description": "Result page, starting at 1"
                        }
                    },
                    "required": ["query"]
                }),
            ),
            QuranTool::GetAyahDetails => Tool::new(
                self.to_string(),
                "Fetch one verse by chapter and verse number, including its \
                 Arabic text and translation.",
                json!({
                    "type": "object",
                    "properties": {
                        "surah_number": {
                            "type": "integer",
                            "description": "Chapter number, 1 to 114"
                        },
                        "ayah_number": {
                            "type": "integer",
                            "description": "Verse number within the chapter, starting at 1"
                        }
                    },
                    "required": ["surah_number", "ayah_number"]
                }),
            ),
            QuranTool::GetSurahInfo => Tool::new(
                self.to_string(),
                "Fetch metadata about one chapter: names, revelation place, \
                 and verse count.",
                json!({
                    "type": "object",
                    "properties": {
                        "surah_number": {
                            "type": "integer",
                            "description": "Chapter number, 1 to 114"
                        }
                    },
                    "required": ["surah_number"]
                }),
            ),
        }
    }
}

#[derive(Clone)]
pub struct ToolExecutor {
    api: Arc<dyn QuranApi>,
}

impl ToolExecutor {
    pub fn new(api: Arc<dyn QuranApi>) -> Self {
        Self { api }
    }

    /// Execute one tool call. Always returns an outcome echoing the call's
    /// name and arguments; failures are carried inside the payload.
    pub async fn execute(&self, call: &ToolCall) -> ToolOutcome {
        let tool = match QuranTool::from_str(&call.name) {
            Ok(tool) => tool,
            Err(_) => {
                tracing::warn!(tool = %call.name, "model requested an unknown tool");
                return ToolOutcome::error(call, format!("Unknown tool: {}", call.name));
            }
        };

        tracing::debug!(tool = %tool, args = %call.arguments, "executing tool call");
        let payload = match tool {
            QuranTool::SearchVerse => self.search_verse(call).await,
            QuranTool::GetAyahDetails => self.get_ayah_details(call).await,
            QuranTool::GetSurahInfo => self.get_surah_info(call).await,
        };
        ToolOutcome::new(call, payload)
    }

    /// Execute every call concurrently. Outcomes come back in call order and
    /// each echoes its originating name and arguments.
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolOutcome> {
        futures::future::join_all(calls.iter().map(|call| self.execute(call))).await
    }

    async fn search_verse(&self, call: &ToolCall) -> ToolPayload {
        let Some(query) = str_arg(&call.arguments, "query") else {
            return ToolPayload::Error {
                message: "Missing required parameter: query".into(),
            };
        };
        let language = str_arg(&call.arguments, "language")
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        let page = int_arg(&call.arguments, "page").unwrap_or(1).max(1) as u32;

        match self.api.search_verses(&query, &language, page).await {
            Ok(results) if results.is_empty() => ToolPayload::NoResults {
                message: "No verses matched this search. Try different wording.".into(),
            },
            Ok(results) => ToolPayload::SearchResults { results },
            Err(err) => ToolPayload::Error {
                message: user_message(&err),
            },
        }
    }

    async fn get_ayah_details(&self, call: &ToolCall) -> ToolPayload {
        let surah = positive_int_arg(&call.arguments, "surah_number");
        let ayah = positive_int_arg(&call.arguments, "ayah_number");
        match self
            .api
            .ayah_details(surah, ayah, DEFAULT_TRANSLATION_ID)
            .await
        {
            Ok(verse) => ToolPayload::Verse { verse },
            Err(err) => ToolPayload::Error {
                message: user_message(&err),
            },
        }
    }

    async fn get_surah_info(&self, call: &ToolCall) -> ToolPayload {
        let surah = positive_int_arg(&call.arguments, "surah_number");
        match self.api.surah(surah).await {
            Ok(surah) => ToolPayload::Surah { surah },
            Err(err) => ToolPayload::Error {
                message: user_message(&err),
            },
        }
    }
}

/// A short human message with no internal detail, suitable for feeding back
/// to the model and showing to the user.
fn user_message(err: &QuranError) -> String {
    match err {
        QuranError::Validation(msg) => msg.clone(),
        QuranError::Network(_) => {
            "The verse service could not be reached. Please try again shortly.".into()
        }
        QuranError::RateLimited => {
            "The verse service is busy right now. Please try again in a moment.".into()
        }
        QuranError::Forbidden => "Access to the verse service was refused.".into(),
        QuranError::Api(_) | QuranError::Unknown(_) => {
            "The verse service returned an error. Please try again.".into()
        }
    }
}

fn str_arg(args: &Value, key: &str) -> Option<String> {
    let value = args.get(key)?;
    let text = value.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Models sometimes send numbers as strings; accept both.
fn int_arg(args: &Value, key: &str) -> Option<i64> {
    let value = args.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_str()?.trim().parse().ok())
}

/// Out-of-range or missing numbers map to 0, which the data client rejects
/// with a validation error before any network call.
fn positive_int_arg(args: &Value, key: &str) -> u32 {
    int_arg(args, key)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}
