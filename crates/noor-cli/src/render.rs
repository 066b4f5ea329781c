//! Terminal rendering for answers and verse provenance cards.

use console::style;

use noor::models::tool::{ToolOutcome, ToolPayload};
use noor::quran::types::{SearchResult, Surah, Verse};

pub fn render_answer(text: &str) {
    println!("\n{text}\n");
}

/// Print one card per tool outcome so the user can see where verse content
/// came from.
pub fn render_provenance(outcomes: &[ToolOutcome]) {
    for outcome in outcomes {
        match &outcome.payload {
            ToolPayload::SearchResults { results } => {
                for result in results {
                    render_search_result(result);
                }
            }
            ToolPayload::Verse { verse } => render_verse(verse),
            ToolPayload::Surah { surah } => render_surah(surah),
            ToolPayload::NoResults { message } => {
                println!("  {}", style(message).dim());
            }
            ToolPayload::Error { message } => {
                println!("  {}", style(message).red());
            }
        }
    }
}

fn render_search_result(result: &SearchResult) {
    println!(
        "  {} {}",
        style(format!("[{}]", result.verse_key)).cyan().bold(),
        result.text
    );
    if let Some(translation) = &result.translation {
        println!("      {}", style(translation).dim());
    }
    println!("      {}", link(result.surah, result.ayah));
}

fn render_verse(verse: &Verse) {
    println!(
        "  {}",
        style(format!("[{}]", verse.verse_key)).cyan().bold()
    );
    if !verse.arabic_text.is_empty() {
        println!("      {}", verse.arabic_text);
    }
    println!("      {}", verse.translation);
    if let Some(source) = &verse.translation_source {
        println!("      {}", style(format!("- {source}")).dim());
    }
    println!("      {}", link(verse.surah, verse.ayah));
}

fn render_surah(surah: &Surah) {
    println!(
        "  {} {} ({}) - {} verses, revealed in {}",
        style(format!("Surah {}", surah.id)).cyan().bold(),
        surah.name_simple,
        surah.translated_name,
        surah.verses_count,
        surah.revelation_place
    );
}

fn link(surah: u32, ayah: u32) -> String {
    style(format!("https://quran.com/{surah}/{ayah}"))
        .underlined()
        .to_string()
}
