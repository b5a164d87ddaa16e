//! Content-selection filter and its fingerprint.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use kanjiquiz_core::protocol::payloads::GameSettings;

/// The subset of `GameSettings` that decides which words are eligible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ContentFilter {
    pub min_frequency: u64,
    /// `None` when the settings do not bound frequency from above.
    pub max_frequency: Option<u64>,
    pub word_part: Option<String>,
    pub word_part_reading: Option<String>,
    pub dictionary_id: Option<u64>,
    pub examples_count: Option<u64>,
}

impl ContentFilter {
    pub fn from_settings(s: &GameSettings) -> Self {
        Self {
            min_frequency: s.min_frequency,
            max_frequency: s.using_max_frequency.then_some(s.max_frequency),
            word_part: s.word_part.clone().filter(|p| !p.is_empty()),
            word_part_reading: s.word_part_reading.clone().filter(|p| !p.is_empty()),
            dictionary_id: s.dictionary_id,
            examples_count: s.examples_count,
        }
    }

    pub fn fingerprint(&self) -> u64 {
        let mut h = DefaultHasher::new();
        self.hash(&mut h);
        h.finish()
    }
}
