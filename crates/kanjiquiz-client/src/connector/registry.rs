//! Correlation registry: pending requests of one link, keyed by correlation id.
//!
//! Every entry is removed exactly once: by the reader when the matching reply
//! arrives, by the requester when its timer fires, or by `close` when the link
//! ends. `DashMap::remove` is the arbiter when two of those race.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::oneshot;
use tokio::time::Instant;

use kanjiquiz_core::error::{QuizError, Result};
use kanjiquiz_core::protocol::{Envelope, MessageType};

pub type Reply = Result<Envelope>;

struct PendingRequest {
    tx: oneshot::Sender<Reply>,
    message_type: MessageType,
    deadline: Instant,
}

#[derive(Default)]
pub struct CorrelationRegistry {
    pending: DashMap<String, PendingRequest>,
    closed: AtomicBool,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request. Rejects an id that is already pending and any
    /// insert after the link ended.
    pub fn insert(
        &self,
        correlation_id: String,
        message_type: MessageType,
        deadline: Instant,
    ) -> Result<oneshot::Receiver<Reply>> {
        if self.is_closed() {
            return Err(QuizError::ConnectionClosed);
        }
        let (tx, rx) = oneshot::channel();
        match self.pending.entry(correlation_id.clone()) {
            Entry::Occupied(e) => return Err(QuizError::DuplicateCorrelationId(e.key().clone())),
            Entry::Vacant(e) => {
                e.insert(PendingRequest {
                    tx,
                    message_type,
                    deadline,
                });
            }
        }
        // close() may have swept between the first check and the insert
        if self.is_closed() {
            self.pending.remove(&correlation_id);
            return Err(QuizError::ConnectionClosed);
        }
        Ok(rx)
    }

    /// Hand a reply to its waiter. Returns the envelope back when no request
    /// with that id is pending.
    pub fn complete(&self, env: Envelope) -> Option<Envelope> {
        match self.pending.remove(&env.correlation_id) {
            Some((_, p)) => {
                // A waiter that already gave up dropped its receiver.
                let _ = p.tx.send(Ok(env));
                None
            }
            None => Some(env),
        }
    }

    /// Remove without completing. True if this call removed the entry.
    pub fn remove(&self, correlation_id: &str) -> bool {
        self.pending.remove(correlation_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mark the link as ended and fail every pending request with
    /// `ConnectionClosed`. Returns how many were failed.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);

        let ids: Vec<String> = self.pending.iter().map(|r| r.key().clone()).collect();
        let now = Instant::now();
        let mut failed = 0;
        for id in ids {
            if let Some((_, p)) = self.pending.remove(&id) {
                tracing::debug!(
                    correlation_id = %id,
                    message_type = %p.message_type,
                    overdue = p.deadline <= now,
                    "pending request failed: link closed"
                );
                let _ = p.tx.send(Err(QuizError::ConnectionClosed));
                failed += 1;
            }
        }
        failed
    }
}
