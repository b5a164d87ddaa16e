//! In-process transport.
//!
//! `MemoryDialer::new()` returns the dialer plus an accept queue; every
//! successful dial delivers a `MemoryPeer` holding the far end of the link.
//! Used by the integration tests as a scripted host, and usable for embedding.

use async_trait::async_trait;
use tokio::sync::mpsc;

use kanjiquiz_core::error::{QuizError, Result};
use kanjiquiz_core::protocol::{Envelope, Payload};

use super::{Channel, Dialer, Frame};

const QUEUE: usize = 256;

#[derive(Debug, Clone)]
pub struct MemoryDialer {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryDialer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (Self { accept_tx }, accept_rx)
    }
}

#[async_trait]
impl Dialer for MemoryDialer {
    async fn dial(&self, address: &str) -> Result<Channel> {
        let (to_peer_tx, to_peer_rx) = mpsc::channel::<Frame>(QUEUE);
        let (to_client_tx, to_client_rx) = mpsc::channel::<Frame>(QUEUE);

        let peer = MemoryPeer {
            address: address.to_string(),
            tx: to_client_tx,
            rx: to_peer_rx,
        };
        self.accept_tx
            .send(peer)
            .map_err(|_| QuizError::ConnectionFailed(format!("{address}: nobody listening")))?;

        Ok(Channel {
            outbound: to_peer_tx,
            inbound: to_client_rx,
        })
    }
}

/// Far end of an in-memory link.
#[derive(Debug)]
pub struct MemoryPeer {
    pub address: String,
    tx: mpsc::Sender<Frame>,
    rx: mpsc::Receiver<Frame>,
}

impl MemoryPeer {
    /// Next envelope from the client. `None` once the client closed the link.
    /// Undecodable frames are skipped.
    pub async fn recv_envelope(&mut self) -> Option<Envelope> {
        loop {
            match self.rx.recv().await? {
                Frame::Text(s) => match Envelope::decode(&s) {
                    Ok(env) => return Some(env),
                    Err(e) => tracing::debug!(error = %e, "peer skipped bad frame"),
                },
                Frame::Close => return None,
            }
        }
    }

    pub async fn send_envelope(&self, env: &Envelope) -> Result<()> {
        self.send_text(env.encode()?).await
    }

    /// Raw text frame, for feeding malformed input.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.tx
            .send(Frame::Text(text.into()))
            .await
            .map_err(|_| QuizError::ConnectionClosed)
    }

    pub async fn reply<P: Payload>(&self, request: &Envelope, payload: &P) -> Result<()> {
        self.send_envelope(&Envelope::reply(payload, request.correlation_id.clone())?)
            .await
    }

    pub async fn notify<P: Payload>(&self, payload: &P) -> Result<()> {
        self.send_envelope(&Envelope::notify(payload)?).await
    }

    /// Close from the host side.
    pub async fn close(self) {
        let _ = self.tx.send(Frame::Close).await;
    }
}
