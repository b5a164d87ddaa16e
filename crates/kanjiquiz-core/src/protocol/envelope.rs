//! Envelope (JSON text frame).
//!
//! `payload` is kept as `RawValue` so the reader can route on `messageType`
//! and `correlationId` before paying for the typed parse.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{QuizError, Result};

use super::message_type::MessageType;
use super::payloads::Payload;

/// One message unit exchanged over the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub message_type: MessageType,
    /// Chosen by the request sender, echoed verbatim by the replier.
    #[serde(default)]
    pub correlation_id: String,
    #[serde(default)]
    pub payload: Option<Box<RawValue>>,
}

impl Envelope {
    /// New request envelope with a fresh correlation id.
    pub fn request<P: Payload>(payload: &P) -> Result<Self> {
        Self::with_correlation(payload, new_correlation_id())
    }

    /// Host-pushed notification. Carries its own fresh id, which never
    /// matches a pending request.
    pub fn notify<P: Payload>(payload: &P) -> Result<Self> {
        Self::with_correlation(payload, new_correlation_id())
    }

    /// Reply envelope echoing `correlation_id`.
    pub fn reply<P: Payload>(payload: &P, correlation_id: impl Into<String>) -> Result<Self> {
        Self::with_correlation(payload, correlation_id.into())
    }

    fn with_correlation<P: Payload>(payload: &P, correlation_id: String) -> Result<Self> {
        let raw = serde_json::value::to_raw_value(payload).map_err(|e| {
            QuizError::MalformedPayload {
                message_type: P::MESSAGE_TYPE.to_string(),
                reason: format!("encode failed: {e}"),
            }
        })?;
        Ok(Self {
            message_type: P::MESSAGE_TYPE,
            correlation_id,
            payload: Some(raw),
        })
    }

    /// Parse the payload as the record bound to `P`.
    ///
    /// Fails if the envelope carries a different tag. A missing payload is
    /// treated as `{}` so empty records still decode.
    pub fn payload_as<P: Payload>(&self) -> Result<P> {
        if self.message_type != P::MESSAGE_TYPE {
            return Err(QuizError::UnexpectedResponse(self.message_type.to_string()));
        }
        let raw = self.payload.as_deref().map(RawValue::get).unwrap_or("{}");
        serde_json::from_str(raw).map_err(|e| QuizError::MalformedPayload {
            message_type: self.message_type.to_string(),
            reason: e.to_string(),
        })
    }

    /// Serialize to a text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| QuizError::MalformedEnvelope(format!("encode failed: {e}")))
    }

    /// Parse a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| QuizError::MalformedEnvelope(format!("invalid envelope json: {e}")))
    }
}

/// Fresh correlation id (UUID v4).
pub fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
