//! Typed connector events and the fan-out bus.
//!
//! Each subscriber owns an unbounded queue, so `publish` never blocks and a
//! slow subscriber never loses events. Dropped receivers are pruned on the
//! next publish.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

use kanjiquiz_core::error::Result;
use kanjiquiz_core::protocol::payloads::{
    ClientInfo, GameSettings, OutNotifAdminMade, OutNotifChatSent, OutNotifClientAnswered,
    OutNotifClientDisconnected, OutNotifClientRegistered, OutNotifGameSettingsChanged,
    OutNotifGameStarted, OutNotifGameStopped, OutNotifQuestion, OutNotifRoundEnded,
    OutReqQuestion, RoundResults,
};
use kanjiquiz_core::protocol::{Envelope, MessageType};

#[derive(Debug, Clone)]
pub enum ConnectorEvent {
    ClientRegistered(ClientInfo),
    ClientDisconnected { id: String },
    ChatSent { id: String, message: String },
    AdminMade { id: String },
    GameStarted(GameSettings),
    Question { question_svg: String },
    RoundEnded(RoundResults),
    ClientAnswered { id: String },
    GameStopped(RoundResults),
    GameSettingsChanged(GameSettings),
    /// The host asks this client to act as question source.
    /// Answer with `IN_RESP_question` echoing `correlation_id`.
    QuestionRequested { correlation_id: String },
    /// The link ended. Published once per link.
    SocketClosed,
}

impl ConnectorEvent {
    /// Map an unsolicited envelope to its event.
    ///
    /// `Ok(None)` for tags that are not events (responses, requests, unknown).
    pub fn from_envelope(env: &Envelope) -> Result<Option<Self>> {
        let ev = match &env.message_type {
            MessageType::OutNotifClientRegistered => {
                Self::ClientRegistered(env.payload_as::<OutNotifClientRegistered>()?.client)
            }
            MessageType::OutNotifClientDisconnected => Self::ClientDisconnected {
                id: env.payload_as::<OutNotifClientDisconnected>()?.id,
            },
            MessageType::OutNotifChatSent => {
                let p = env.payload_as::<OutNotifChatSent>()?;
                Self::ChatSent {
                    id: p.id,
                    message: p.message,
                }
            }
            MessageType::OutNotifAdminMade => Self::AdminMade {
                id: env.payload_as::<OutNotifAdminMade>()?.id,
            },
            MessageType::OutNotifGameStarted => {
                Self::GameStarted(env.payload_as::<OutNotifGameStarted>()?.game_settings)
            }
            MessageType::OutNotifQuestion => Self::Question {
                question_svg: env.payload_as::<OutNotifQuestion>()?.question_svg,
            },
            MessageType::OutNotifRoundEnded => {
                Self::RoundEnded(env.payload_as::<OutNotifRoundEnded>()?.0)
            }
            MessageType::OutNotifClientAnswered => Self::ClientAnswered {
                id: env.payload_as::<OutNotifClientAnswered>()?.id,
            },
            MessageType::OutNotifGameStopped => {
                Self::GameStopped(env.payload_as::<OutNotifGameStopped>()?.0)
            }
            MessageType::OutNotifGameSettingsChanged => Self::GameSettingsChanged(
                env.payload_as::<OutNotifGameSettingsChanged>()?.game_settings,
            ),
            MessageType::OutReqQuestion => {
                env.payload_as::<OutReqQuestion>()?;
                Self::QuestionRequested {
                    correlation_id: env.correlation_id.clone(),
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(ev))
    }

    /// Stable name for logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClientRegistered(_) => "clientRegistered",
            Self::ClientDisconnected { .. } => "clientDisconnected",
            Self::ChatSent { .. } => "chatSent",
            Self::AdminMade { .. } => "adminMade",
            Self::GameStarted(_) => "gameStarted",
            Self::Question { .. } => "question",
            Self::RoundEnded(_) => "roundEnded",
            Self::ClientAnswered { .. } => "clientAnswered",
            Self::GameStopped(_) => "gameStopped",
            Self::GameSettingsChanged(_) => "gameSettingsChanged",
            Self::QuestionRequested { .. } => "questionRequested",
            Self::SocketClosed => "socketClosed",
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    subscribers: DashMap<u64, mpsc::UnboundedSender<ConnectorEvent>>,
    seq: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ConnectorEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, tx);
        rx
    }

    pub fn publish(&self, ev: ConnectorEvent) {
        let mut dead = Vec::new();
        for s in self.subscribers.iter() {
            if s.value().send(ev.clone()).is_err() {
                dead.push(*s.key());
            }
        }
        for id in dead {
            self.subscribers.remove(&id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
