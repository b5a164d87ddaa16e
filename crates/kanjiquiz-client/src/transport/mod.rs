//! Transport layer.
//!
//! A `Dialer` opens one duplex `Channel` of text frames. The WebSocket dialer
//! pumps a tokio-tungstenite stream; the memory dialer hands the other end to
//! an in-process peer.

pub mod codec;
pub mod memory;
pub mod ws;

use async_trait::async_trait;
use tokio::sync::mpsc;

use kanjiquiz_core::error::Result;

/// One unit on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close,
}

/// Open link. The inbound side ends (`recv() == None`) when the link is gone.
#[derive(Debug)]
pub struct Channel {
    pub outbound: mpsc::Sender<Frame>,
    pub inbound: mpsc::Receiver<Frame>,
}

#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, address: &str) -> Result<Channel>;
}
