//! Read-only mirrors of the external API's verse, search-hit, and chapter
//! shapes, plus the wire envelopes they arrive in. Nothing here is mutated
//! locally; records are fetched fresh per request.

use serde::{Deserialize, Serialize};

/// Chapter metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surah {
    pub id: u32,
    pub name_simple: String,
    pub name_arabic: String,
    pub revelation_place: String,
    pub verses_count: u32,
    pub translated_name: String,
}

/// One hit from a verse search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub verse_key: String,
    pub surah: u32,
    pub ayah: u32,
    pub text: String,
    pub translation: Option<String>,
}

/// A single verse with its canonical script text and one translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verse {
    pub verse_key: String,
    pub surah: u32,
    pub ayah: u32,
    /// Uthmani script text; empty when the script fetch yielded nothing.
    pub arabic_text: String,
    pub translation: String,
    pub translation_source: Option<String>,
}

/// Split a `"2:255"`-style verse key into (surah, ayah).
pub fn split_verse_key(key: &str) -> Option<(u32, u32)> {
    let (surah, ayah) = key.split_once(':')?;
    Some((surah.trim().parse().ok()?, ayah.trim().parse().ok()?))
}

// Wire envelopes. The API nests every payload under an endpoint-specific
// top-level key: `chapters`, `chapter`, `search.results`, `verse`, `verses`.

#[derive(Debug, Deserialize)]
pub(crate) struct ChaptersEnvelope {
    pub chapters: Vec<ChapterWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChapterEnvelope {
    pub chapter: ChapterWire,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChapterWire {
    pub id: u32,
    pub name_simple: String,
    pub name_arabic: String,
    pub revelation_place: String,
    pub verses_count: u32,
    pub translated_name: Option<TranslatedNameWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TranslatedNameWire {
    pub name: String,
}

impl From<ChapterWire> for Surah {
    fn from(wire: ChapterWire) -> Self {
        let translated_name = wire
            .translated_name
            .map(|t| t.name)
            .unwrap_or_else(|| wire.name_simple.clone());
        Surah {
            id: wire.id,
            name_simple: wire.name_simple,
            name_arabic: wire.name_arabic,
            revelation_place: wire.revelation_place,
            verses_count: wire.verses_count,
            translated_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchEnvelope {
    pub search: SearchBodyWire,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchBodyWire {
    #[serde(default)]
    pub results: Vec<SearchHitWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchHitWire {
    pub verse_key: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub translations: Vec<TranslationWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TranslationWire {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub resource_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerseEnvelope {
    pub verse: VerseWire,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerseWire {
    #[serde(default)]
    pub translations: Vec<TranslationWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UthmaniEnvelope {
    #[serde(default)]
    pub verses: Vec<UthmaniVerseWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UthmaniVerseWire {
    pub text_uthmani: String,
}
