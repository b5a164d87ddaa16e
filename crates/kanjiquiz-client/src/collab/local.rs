//! Local collaborator implementations for the bundled binary.

use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rand::seq::SliceRandom;

use kanjiquiz_core::error::{QuizError, Result};
use kanjiquiz_core::protocol::payloads::{GameSettings, WordInfo};

use super::{AnswerStat, GlyphRenderer, RenderedGlyphs, StatsStore, WordProvider};
use crate::supply::ContentFilter;

/// Word list loaded once from a JSON array of `WordInfo`.
#[derive(Debug, Clone)]
pub struct StaticWordList {
    words: Vec<WordInfo>,
}

impl StaticWordList {
    pub fn new(words: Vec<WordInfo>) -> Self {
        Self { words }
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let s = fs::read_to_string(path)
            .map_err(|e| QuizError::Collaborator(format!("read word list {path}: {e}")))?;
        let words: Vec<WordInfo> = serde_json::from_str(&s)
            .map_err(|e| QuizError::Collaborator(format!("parse word list {path}: {e}")))?;
        tracing::info!(path, words = words.len(), "word list loaded");
        Ok(Self::new(words))
    }

    fn matches(w: &WordInfo, filter: &ContentFilter) -> bool {
        let part_ok = filter
            .word_part
            .as_deref()
            .map_or(true, |p| w.word.contains(p));
        let reading_ok = filter.word_part_reading.as_deref().map_or(true, |r| {
            w.readings
                .iter()
                .flat_map(|rp| rp.parts.iter())
                .any(|part| part.word_part_reading == r)
        });
        part_ok && reading_ok
    }
}

#[async_trait]
impl WordProvider for StaticWordList {
    async fn get_many(&self, count: usize, filter: &ContentFilter) -> Result<Vec<WordInfo>> {
        let eligible: Vec<&WordInfo> = self.words.iter().filter(|w| Self::matches(w, filter)).collect();
        if eligible.is_empty() {
            return Err(QuizError::Collaborator("no words match the filter".into()));
        }
        let mut rng = rand::thread_rng();
        Ok(eligible
            .choose_multiple(&mut rng, count)
            .map(|w| (*w).clone())
            .collect())
    }
}

/// Emits an SVG `<text>` element; no glyph outlining.
#[derive(Debug, Clone, Default)]
pub struct PlainGlyphRenderer;

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl GlyphRenderer for PlainGlyphRenderer {
    async fn render(&self, text: &str, font_name: &str) -> Result<RenderedGlyphs> {
        if text.is_empty() {
            return Err(QuizError::Collaborator("nothing to render".into()));
        }
        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} 360"><text x="{x}" y="180" font-family="{font}" font-size="300" text-anchor="middle" dominant-baseline="middle">{text}</text></svg>"#,
            w = 320 * text.chars().count(),
            x = 160 * text.chars().count(),
            font = escape_xml(font_name),
            text = escape_xml(text),
        );
        Ok(RenderedGlyphs {
            svg,
            font_name: font_name.to_string(),
        })
    }
}

/// Logs stats instead of storing them.
#[derive(Debug)]
pub struct LogStatsStore {
    next_game: AtomicU64,
}

impl Default for LogStatsStore {
    fn default() -> Self {
        Self {
            next_game: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl StatsStore for LogStatsStore {
    async fn create_game(&self, settings: &GameSettings) -> Result<u64> {
        let id = self.next_game.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            game_id = id,
            rounds = settings.rounds_count,
            round_duration_s = settings.round_duration,
            "game started"
        );
        Ok(id)
    }

    async fn record_answer(&self, stat: &AnswerStat) -> Result<()> {
        tracing::info!(
            game_id = stat.game_id,
            round = stat.round,
            client = %stat.client_name,
            word = %stat.word,
            answer = %stat.answer,
            correct = stat.is_correct,
            duration_ms = stat.duration_ms,
            "answer"
        );
        Ok(())
    }
}
