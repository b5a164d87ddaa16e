//! Question-source duty: produce the next prompt when the host asks.

use std::sync::Arc;

use rand::seq::SliceRandom;

use kanjiquiz_core::error::{QuizError, Result};
use kanjiquiz_core::protocol::payloads::{GameSettings, InRespQuestion, QuestionInfo};

use crate::collab::GlyphRenderer;
use crate::supply::{ContentFilter, SupplyCache};

pub struct QuestionSource {
    supply: Arc<SupplyCache>,
    renderer: Arc<dyn GlyphRenderer>,
    fonts: Vec<String>,
    attempts: u32,
}

impl QuestionSource {
    pub fn new(
        supply: Arc<SupplyCache>,
        renderer: Arc<dyn GlyphRenderer>,
        fonts: Vec<String>,
        attempts: u32,
    ) -> Self {
        Self {
            supply,
            renderer,
            fonts,
            attempts: attempts.max(1),
        }
    }

    pub fn supply(&self) -> &Arc<SupplyCache> {
        &self.supply
    }

    /// One word, rendered in a font from the game's selection.
    /// Retries provider and renderer failures before giving up.
    pub async fn produce(&self, settings: &GameSettings) -> Result<InRespQuestion> {
        let filter = ContentFilter::from_settings(settings);
        let mut last = String::new();

        for attempt in 1..=self.attempts {
            match self.attempt(&filter, settings).await {
                Ok(q) => return Ok(q),
                Err(e) => {
                    tracing::warn!(attempt, max = self.attempts, error = %e, "question generation failed");
                    last = e.to_string();
                }
            }
        }

        Err(QuizError::ContentGeneration {
            attempts: self.attempts,
            last,
        })
    }

    async fn attempt(&self, filter: &ContentFilter, settings: &GameSettings) -> Result<InRespQuestion> {
        // a missing font must not cost a word
        let font = self.pick_font(settings)?;
        let word_info = self.supply.consume(filter).await?;
        let glyphs = self.renderer.render(&word_info.word, &font).await?;
        Ok(InRespQuestion {
            question: QuestionInfo {
                word_info,
                font_name: glyphs.font_name,
            },
            question_svg: glyphs.svg,
        })
    }

    /// `fonts_count` fonts starting at `first_font_name`, or every known
    /// font when the game names none.
    fn selection<'a>(&'a self, settings: &GameSettings) -> &'a [String] {
        let start = settings
            .first_font_name
            .as_deref()
            .and_then(|first| self.fonts.iter().position(|f| f == first));
        match start {
            Some(i) => {
                let count = usize::try_from(settings.fonts_count).unwrap_or(usize::MAX).max(1);
                let end = i.saturating_add(count).min(self.fonts.len());
                &self.fonts[i..end]
            }
            None => &self.fonts,
        }
    }

    fn pick_font(&self, settings: &GameSettings) -> Result<String> {
        self.selection(settings)
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| QuizError::Collaborator("no fonts configured".into()))
    }
}
