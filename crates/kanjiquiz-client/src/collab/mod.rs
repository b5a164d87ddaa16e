//! External collaborators the session depends on.
//!
//! Only the traits live here; `local` has the simple implementations the
//! bundled binary uses. Errors from collaborators should be reported as
//! `QuizError::Collaborator`.

pub mod local;

use std::sync::Arc;

use async_trait::async_trait;

use kanjiquiz_core::error::{QuizError, Result};
use kanjiquiz_core::protocol::payloads::{GameSettings, WordInfo};

use crate::supply::ContentFilter;

#[async_trait]
pub trait WordProvider: Send + Sync {
    async fn get_many(&self, count: usize, filter: &ContentFilter) -> Result<Vec<WordInfo>>;

    async fn get_one(&self, filter: &ContentFilter) -> Result<WordInfo> {
        self.get_many(1, filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| QuizError::Collaborator("word provider returned no words".into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedGlyphs {
    pub svg: String,
    /// Font actually used; may differ from the requested one when it lacks glyphs.
    pub font_name: String,
}

#[async_trait]
pub trait GlyphRenderer: Send + Sync {
    async fn render(&self, text: &str, font_name: &str) -> Result<RenderedGlyphs>;
}

/// One persisted answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerStat {
    pub game_id: u64,
    pub client_key: String,
    pub client_name: String,
    pub round: usize,
    pub word: String,
    pub answer: String,
    pub is_correct: bool,
    pub duration_ms: Option<u64>,
    pub font_name: String,
}

#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn create_game(&self, settings: &GameSettings) -> Result<u64>;
    async fn record_answer(&self, stat: &AnswerStat) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub public_key: String,
    pub name: String,
}

/// Key manager.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn list_accounts(&self) -> Result<Vec<Account>>;
    async fn sign(&self, public_key: &str, message: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct Collaborators {
    pub words: Arc<dyn WordProvider>,
    pub renderer: Arc<dyn GlyphRenderer>,
    pub stats: Arc<dyn StatsStore>,
    /// Without a key manager the signature handshake is skipped.
    pub identity: Option<Arc<dyn IdentityProvider>>,
}
