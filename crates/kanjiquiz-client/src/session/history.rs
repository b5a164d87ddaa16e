//! Per-game round history.
//!
//! A round is pushed when its question is shown, collects answers while it
//! runs, and is finalized once with the host's authoritative answer set.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use kanjiquiz_core::protocol::payloads::{QuestionInfo, RoundResults};

/// Shown for peers whose answer text is not known yet.
pub const ANSWER_PLACEHOLDER: &str = "?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStatus {
    Unknown,
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub answer: String,
    pub status: AnswerStatus,
    pub answer_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundHistory {
    pub question_svg: String,
    /// Known once the round is finalized.
    pub question: Option<QuestionInfo>,
    pub answers: BTreeMap<String, AnswerRecord>,
    pub finalized: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GameHistory {
    rounds: Vec<RoundHistory>,
}

impl GameHistory {
    pub fn rounds(&self) -> &[RoundHistory] {
        &self.rounds
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn last(&self) -> Option<&RoundHistory> {
        self.rounds.last()
    }

    pub fn clear(&mut self) {
        self.rounds.clear();
    }

    pub fn push_round(&mut self, question_svg: String) {
        self.rounds.push(RoundHistory {
            question_svg,
            question: None,
            answers: BTreeMap::new(),
            finalized: false,
        });
    }

    fn open_round(&mut self) -> Option<&mut RoundHistory> {
        self.rounds.last_mut().filter(|r| !r.finalized)
    }

    /// This client's own answer, pending scoring.
    pub fn record_local(&mut self, client_id: &str, answer: &str, elapsed: Duration) -> bool {
        let Some(round) = self.open_round() else { return false };
        round.answers.insert(
            client_id.to_string(),
            AnswerRecord {
                answer: answer.to_string(),
                status: AnswerStatus::Unknown,
                answer_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            },
        );
        true
    }

    /// A peer answered; the text stays hidden. Never overwrites a known answer.
    pub fn placeholder(&mut self, client_id: &str) -> bool {
        let Some(round) = self.open_round() else { return false };
        round
            .answers
            .entry(client_id.to_string())
            .or_insert_with(|| AnswerRecord {
                answer: ANSWER_PLACEHOLDER.to_string(),
                status: AnswerStatus::Unknown,
                answer_time_ms: 0,
            });
        true
    }

    /// Merge the host's results into the open round and close it.
    /// Returns the round index, or `None` if no round was open.
    pub fn finalize(&mut self, results: &RoundResults) -> Option<usize> {
        let index = self.rounds.len().checked_sub(1)?;
        let round = self.open_round()?;
        if results.question.is_some() {
            round.question = results.question.clone();
        }
        for a in &results.answers {
            round.answers.insert(
                a.id.clone(),
                AnswerRecord {
                    answer: a.answer.clone(),
                    status: if a.is_correct {
                        AnswerStatus::Correct
                    } else {
                        AnswerStatus::Incorrect
                    },
                    answer_time_ms: a.answer_time,
                },
            );
        }
        round.finalized = true;
        Some(index)
    }

    /// Correct answers per client over all rounds so far.
    pub fn correct_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for round in &self.rounds {
            for (id, rec) in &round.answers {
                if rec.status == AnswerStatus::Correct {
                    *counts.entry(id.clone()).or_insert(0) += 1;
                }
            }
        }
        counts
    }
}
