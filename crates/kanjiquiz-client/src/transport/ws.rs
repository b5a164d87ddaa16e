//! WebSocket dialer.
//!
//! `dial` connects with tokio-tungstenite and spawns one pump task that owns
//! the socket: outbound frames from the channel are written, inbound text
//! frames are forwarded, pings are answered. The pump ends on close from
//! either side and drops the inbound sender, which ends the link.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use kanjiquiz_core::error::{QuizError, Result};

use super::{Channel, Dialer, Frame};
use crate::config::ConnectionSection;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct WsDialer {
    max_frame_bytes: usize,
    queue: usize,
}

impl WsDialer {
    pub fn new(max_frame_bytes: usize, queue: usize) -> Self {
        Self {
            max_frame_bytes,
            queue: queue.max(1),
        }
    }

    pub fn from_config(cfg: &ConnectionSection) -> Self {
        Self::new(cfg.max_frame_bytes, cfg.outbound_queue)
    }
}

#[async_trait]
impl Dialer for WsDialer {
    async fn dial(&self, address: &str) -> Result<Channel> {
        let (ws, _) = connect_async(address)
            .await
            .map_err(|e| QuizError::ConnectionFailed(format!("{address}: {e}")))?;

        let (out_tx, out_rx) = mpsc::channel::<Frame>(self.queue);
        let (in_tx, in_rx) = mpsc::channel::<Frame>(self.queue);
        tokio::spawn(pump(ws, out_rx, in_tx, self.max_frame_bytes));

        tracing::debug!(address, "websocket open");
        Ok(Channel {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

async fn pump(
    ws: WsStream,
    mut out_rx: mpsc::Receiver<Frame>,
    in_tx: mpsc::Sender<Frame>,
    max_frame_bytes: usize,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            // outbound writer
            maybe_out = out_rx.recv() => {
                match maybe_out {
                    Some(Frame::Text(s)) => {
                        if ws_tx.send(Message::Text(s.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Frame::Close) | None => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            // inbound reader
            incoming = ws_rx.next() => {
                let Some(Ok(msg)) = incoming else { break };
                match msg {
                    Message::Text(text) => {
                        if text.len() > max_frame_bytes {
                            tracing::warn!(bytes = text.len(), max_frame_bytes, "oversized frame dropped");
                            continue;
                        }
                        if in_tx.send(Frame::Text(text.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Message::Binary(b) => {
                        tracing::debug!(bytes = b.len(), "binary frame ignored");
                    }
                    Message::Ping(payload) => {
                        let _ = ws_tx.send(Message::Pong(payload)).await;
                    }
                    Message::Pong(_) | Message::Frame(_) => {}
                    Message::Close(_) => break,
                }
            }
        }
    }

    tracing::debug!("websocket pump finished");
}
