//! Prefetching supply cache.
//!
//! Keeps a buffer of words ready ahead of demand. `consume` pops a random
//! entry; when the buffer dips below the low mark a background refill tops it
//! up to the high mark. An empty buffer waits for a small first batch instead
//! of a full refill. At most one refill is in flight at any time; a
//! fingerprint change drops the buffer, and a refill started under the old
//! fingerprint keeps the slot until it lands, then its words are discarded.

use std::sync::Arc;

use rand::Rng;
use tokio::sync::{watch, Mutex};

use kanjiquiz_core::error::{QuizError, Result};
use kanjiquiz_core::protocol::payloads::WordInfo;

use super::fingerprint::ContentFilter;
use crate::collab::WordProvider;
use crate::config::SupplySection;
use crate::obs::ClientMetrics;

// A consumer can lose its refill to a concurrent fingerprint change; give up
// after this many rounds instead of spinning.
const MAX_WAIT_ROUNDS: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct SupplyOptions {
    pub first_batch: usize,
    pub low_mark: usize,
    pub high_mark: usize,
}

impl Default for SupplyOptions {
    fn default() -> Self {
        Self {
            first_batch: 1,
            low_mark: 5,
            high_mark: 10,
        }
    }
}

impl From<&SupplySection> for SupplyOptions {
    fn from(cfg: &SupplySection) -> Self {
        Self {
            first_batch: cfg.first_batch,
            low_mark: cfg.low_mark,
            high_mark: cfg.high_mark,
        }
    }
}

/// Shared outcome of one refill; `None` while it runs.
type RefillSlot = watch::Receiver<Option<std::result::Result<(), String>>>;

#[derive(Default)]
struct State {
    fingerprint: Option<u64>,
    generation: u64,
    buffer: Vec<WordInfo>,
    inflight: Option<RefillSlot>,
}

pub struct SupplyCache {
    provider: Arc<dyn WordProvider>,
    opts: SupplyOptions,
    state: Arc<Mutex<State>>,
    metrics: Arc<ClientMetrics>,
}

impl SupplyCache {
    pub fn new(provider: Arc<dyn WordProvider>, opts: SupplyOptions, metrics: Arc<ClientMetrics>) -> Self {
        Self {
            provider,
            opts,
            state: Arc::new(Mutex::new(State::default())),
            metrics,
        }
    }

    /// Take one word matching `filter`.
    pub async fn consume(&self, filter: &ContentFilter) -> Result<WordInfo> {
        let fp = filter.fingerprint();

        for _ in 0..MAX_WAIT_ROUNDS {
            let mut slot = {
                let mut st = self.state.lock().await;
                self.rekey(&mut st, fp);

                if !st.buffer.is_empty() {
                    let i = rand::thread_rng().gen_range(0..st.buffer.len());
                    let word = st.buffer.swap_remove(i);
                    if st.buffer.len() < self.opts.low_mark && st.inflight.is_none() {
                        let n = self.opts.high_mark.saturating_sub(st.buffer.len());
                        // fire and forget; the slot keeps others from piling on
                        self.spawn_refill(&mut st, n, filter.clone());
                    }
                    return Ok(word);
                }

                match &st.inflight {
                    Some(slot) => slot.clone(),
                    None => self.spawn_refill(&mut st, self.opts.first_batch, filter.clone()),
                }
            };

            let outcome = match slot.wait_for(Option::is_some).await {
                Ok(v) => (*v).clone().unwrap_or(Ok(())),
                Err(_) => Err("refill task ended without a result".to_string()),
            };
            if let Err(e) = outcome {
                return Err(QuizError::Collaborator(e));
            }
        }

        Err(QuizError::Collaborator(
            "supply kept being invalidated while waiting".into(),
        ))
    }

    /// Top the buffer up ahead of the first `consume`.
    pub async fn prefetch(&self, filter: &ContentFilter) {
        let mut st = self.state.lock().await;
        self.rekey(&mut st, filter.fingerprint());
        if st.buffer.len() < self.opts.low_mark && st.inflight.is_none() {
            let n = self.opts.high_mark.saturating_sub(st.buffer.len());
            self.spawn_refill(&mut st, n, filter.clone());
        }
    }

    /// Wait for the refill in flight, if any.
    pub async fn settle(&self) {
        let slot = self.state.lock().await.inflight.clone();
        if let Some(mut slot) = slot {
            let _ = slot.wait_for(Option::is_some).await;
        }
    }

    pub async fn buffered(&self) -> usize {
        self.state.lock().await.buffer.len()
    }

    fn rekey(&self, st: &mut State, fp: u64) {
        if st.fingerprint == Some(fp) {
            return;
        }
        if st.fingerprint.is_some() {
            tracing::debug!(dropped = st.buffer.len(), "content filter changed; supply invalidated");
        }
        st.fingerprint = Some(fp);
        st.generation += 1;
        st.buffer.clear();
    }

    fn spawn_refill(&self, st: &mut State, count: usize, filter: ContentFilter) -> RefillSlot {
        let (tx, rx) = watch::channel(None);
        st.inflight = Some(rx.clone());

        let generation = st.generation;
        let provider = Arc::clone(&self.provider);
        let state = Arc::clone(&self.state);
        let metrics = Arc::clone(&self.metrics);
        tracing::trace!(count, generation, "supply refill");

        tokio::spawn(async move {
            let fetched = provider.get_many(count, &filter).await;

            let mut st = state.lock().await;
            // only one refill runs at a time, so the slot is ours
            st.inflight = None;
            let outcome = match fetched {
                _ if st.generation != generation => {
                    metrics.refills.inc(&[("outcome", "stale")]);
                    Ok(())
                }
                Ok(words) if words.is_empty() => {
                    metrics.refills.inc(&[("outcome", "failed")]);
                    Err("word provider returned no words".to_string())
                }
                Ok(words) => {
                    metrics.refills.inc(&[("outcome", "ok")]);
                    st.buffer.extend(words);
                    Ok(())
                }
                Err(e) => {
                    metrics.refills.inc(&[("outcome", "failed")]);
                    tracing::warn!(error = %e, count, "supply refill failed");
                    Err(e.to_string())
                }
            };
            drop(st);
            let _ = tx.send(Some(outcome));
        });

        rx
    }
}
