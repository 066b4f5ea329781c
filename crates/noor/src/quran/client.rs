use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use super::types::{
    split_verse_key, ChapterEnvelope, ChaptersEnvelope, SearchEnvelope, SearchResult, Surah,
    UthmaniEnvelope, Verse, VerseEnvelope,
};
use crate::errors::QuranError;
use crate::retry::RetryPolicy;

pub const QURAN_API_BASE: &str = "https://api.quran.com/api/v4";

/// Languages the search endpoint accepts; anything else falls back to the default.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "ar", "ur", "id", "tr", "fr", "es", "bn"];
pub const DEFAULT_LANGUAGE: &str = "en";

/// Dr. Mustafa Khattab, The Clear Quran.
pub const DEFAULT_TRANSLATION_ID: u32 = 131;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_QUERY_CHARS: usize = 200;
const SEARCH_PAGE_SIZE: u32 = 10;

/// The verbs the tool layer needs from the reference API. A trait seam so the
/// executor and the orchestrator tests can substitute fakes.
#[async_trait]
pub trait QuranApi: Send + Sync {
    async fn search_verses(
        &self,
        query: &str,
        language: &str,
        page: u32,
    ) -> Result<Vec<SearchResult>, QuranError>;

    async fn ayah_details(
        &self,
        surah: u32,
        ayah: u32,
        translation_id: u32,
    ) -> Result<Verse, QuranError>;

    async fn surah(&self, id: u32) -> Result<Surah, QuranError>;

    async fn surahs(&self) -> Result<Vec<Surah>, QuranError>;
}

pub struct QuranClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl QuranClient {
    pub fn new() -> Result<Self, QuranError> {
        Self::with_settings(QURAN_API_BASE, REQUEST_TIMEOUT, RetryPolicy::default())
    }

    pub fn with_settings(
        base_url: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, QuranError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QuranError::Unknown(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, QuranError> {
        let url = format!("{}/{}", self.base_url, path);
        self.retry.run(|| self.fetch_once::<T>(&url, query)).await
    }

    async fn fetch_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, QuranError> {
        tracing::debug!(url, "fetching from verse service");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| QuranError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(QuranError::RateLimited),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(QuranError::Forbidden),
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| QuranError::Unknown(format!("malformed response: {e}"))),
            status => Err(QuranError::Api(status.as_u16())),
        }
    }
}

#[async_trait]
impl QuranApi for QuranClient {
    async fn search_verses(
        &self,
        query: &str,
        language: &str,
        page: u32,
    ) -> Result<Vec<SearchResult>, QuranError> {
        let query = sanitize_query(query)?;
        let language = normalize_language(language);
        let page = page.max(1);

        let envelope: SearchEnvelope = self
            .get_json(
                "search",
                &[
                    ("q", query),
                    ("language", language.to_string()),
                    ("size", SEARCH_PAGE_SIZE.to_string()),
                    ("page", page.to_string()),
                ],
            )
            .await?;

        let results = envelope
            .search
            .results
            .into_iter()
            .filter_map(|hit| {
                let (surah, ayah) = split_verse_key(&hit.verse_key)?;
                let translation = hit
                    .translations
                    .into_iter()
                    .next()
                    .map(|t| strip_markup(&t.text));
                Some(SearchResult {
                    verse_key: hit.verse_key,
                    surah,
                    ayah,
                    text: strip_markup(&hit.text),
                    translation,
                })
            })
            .collect();
        Ok(results)
    }

    async fn ayah_details(
        &self,
        surah: u32,
        ayah: u32,
        translation_id: u32,
    ) -> Result<Verse, QuranError> {
        validate_surah(surah)?;
        validate_ayah(ayah)?;
        let key = format!("{surah}:{ayah}");

        let envelope: VerseEnvelope = self
            .get_json(
                &format!("verses/by_key/{key}"),
                &[("translations", translation_id.to_string())],
            )
            .await?;

        // The canonical script comes from a separate endpoint; a miss there
        // degrades to an empty field rather than failing the whole call.
        let arabic_text = match self
            .get_json::<UthmaniEnvelope>("quran/verses/uthmani", &[("verse_key", key.clone())])
            .await
        {
            Ok(uthmani) => uthmani
                .verses
                .into_iter()
                .next()
                .map(|v| v.text_uthmani)
                .unwrap_or_default(),
            Err(err) => {
                tracing::warn!(verse_key = %key, error = %err, "uthmani text unavailable");
                String::new()
            }
        };

        let mut translations = envelope.verse.translations.into_iter();
        let (translation, translation_source) = match translations.next() {
            Some(t) => (strip_markup(&t.text), t.resource_name),
            None => (String::new(), None),
        };

        Ok(Verse {
            verse_key: key,
            surah,
            ayah,
            arabic_text,
            translation,
            translation_source,
        })
    }

    async fn surah(&self, id: u32) -> Result<Surah, QuranError> {
        validate_surah(id)?;
        let envelope: ChapterEnvelope = self
            .get_json(
                &format!("chapters/{id}"),
                &[("language", DEFAULT_LANGUAGE.to_string())],
            )
            .await?;
        Ok(envelope.chapter.into())
    }

    async fn surahs(&self) -> Result<Vec<Surah>, QuranError> {
        let envelope: ChaptersEnvelope = self
            .get_json("chapters", &[("language", DEFAULT_LANGUAGE.to_string())])
            .await?;
        Ok(envelope.chapters.into_iter().map(Into::into).collect())
    }
}

/// Trim, drop control characters, and enforce the minimum length the search
/// endpoint needs to return anything meaningful.
fn sanitize_query(query: &str) -> Result<String, QuranError> {
    let cleaned: String = query.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.chars().count() < 2 {
        return Err(QuranError::Validation(
            "search query must be at least 2 characters".into(),
        ));
    }
    Ok(cleaned.chars().take(MAX_QUERY_CHARS).collect())
}

pub fn validate_surah(surah: u32) -> Result<(), QuranError> {
    if (1..=114).contains(&surah) {
        Ok(())
    } else {
        Err(QuranError::Validation(format!(
            "surah number must be between 1 and 114, got {surah}"
        )))
    }
}

/// The ayah upper bound varies per surah and is deferred to the API.
pub fn validate_ayah(ayah: u32) -> Result<(), QuranError> {
    if ayah >= 1 {
        Ok(())
    } else {
        Err(QuranError::Validation(
            "ayah number must be a positive integer".into(),
        ))
    }
}

pub fn normalize_language(language: &str) -> &str {
    let language = language.trim();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|&&l| l.eq_ignore_ascii_case(language))
        .copied()
        .unwrap_or(DEFAULT_LANGUAGE)
}

/// Translation text arrives with footnote markers and highlight tags embedded.
fn strip_markup(text: &str) -> String {
    let no_footnotes = Regex::new(r"<sup[^>]*>.*?</sup>")
        .unwrap()
        .replace_all(text, "");
    Regex::new(r"<[^>]+>")
        .unwrap()
        .replace_all(&no_footnotes, "")
        .trim()
        .to_string()
}
