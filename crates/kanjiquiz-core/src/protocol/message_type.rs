//! Message tags (`messageType` field).
//!
//! The tag set is closed for the variants we understand, but decoding never
//! fails on a new tag: anything unrecognized becomes [`MessageType::Unknown`]
//! so the reader can log and drop it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction/role of a message, derived from its tag prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Client → host request (`IN_REQ_*`).
    InRequest,
    /// Client → host reply to a host request (`IN_RESP_*`).
    InResponse,
    /// Host → client reply (`OUT_RESP_*`).
    OutResponse,
    /// Host → client request (`OUT_REQ_*`).
    OutRequest,
    /// Host → client broadcast (`OUT_NOTIF_*`).
    OutNotification,
    /// Tag with no known prefix.
    Unknown,
}

impl Family {
    fn of(tag: &str) -> Self {
        if tag.starts_with("IN_REQ_") {
            Family::InRequest
        } else if tag.starts_with("IN_RESP_") {
            Family::InResponse
        } else if tag.starts_with("OUT_RESP_") {
            Family::OutResponse
        } else if tag.starts_with("OUT_REQ_") {
            Family::OutRequest
        } else if tag.starts_with("OUT_NOTIF_") {
            Family::OutNotification
        } else {
            Family::Unknown
        }
    }
}

macro_rules! message_types {
    ($($variant:ident => $tag:literal,)+) => {
        /// Wire tag of an envelope.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum MessageType {
            $($variant,)+
            /// Tag this build does not recognize (kept verbatim).
            Unknown(String),
        }

        impl MessageType {
            /// Wire representation.
            pub fn as_str(&self) -> &str {
                match self {
                    $(MessageType::$variant => $tag,)+
                    MessageType::Unknown(tag) => tag.as_str(),
                }
            }

            /// Parse a wire tag; unrecognized tags map to `Unknown`.
            pub fn parse(tag: &str) -> Self {
                match tag {
                    $($tag => MessageType::$variant,)+
                    other => MessageType::Unknown(other.to_owned()),
                }
            }
        }
    };
}

message_types! {
    InReqSendPublicKey => "IN_REQ_sendPublicKey",
    InReqVerifySignature => "IN_REQ_verifysignature",
    InReqRegisterClient => "IN_REQ_registerClient",
    InReqClientList => "IN_REQ_clientList",
    InReqSendChat => "IN_REQ_sendChat",
    InReqMakeAdmin => "IN_REQ_makeAdmin",
    InReqStartGame => "IN_REQ_startGame",
    InReqSendAnswer => "IN_REQ_sendAnswer",
    InReqStopGame => "IN_REQ_stopGame",
    InReqSendGameSettings => "IN_REQ_sendGameSettings",

    OutRespStatus => "OUT_RESP_status",
    OutRespClientRegistered => "OUT_RESP_clientRegistered",
    OutRespClientList => "OUT_RESP_clientList",
    OutRespSignMessage => "OUT_RESP_signMessage",

    OutReqQuestion => "OUT_REQ_question",
    InRespQuestion => "IN_RESP_question",

    OutNotifClientRegistered => "OUT_NOTIF_clientRegistered",
    OutNotifClientDisconnected => "OUT_NOTIF_clientDisconnected",
    OutNotifChatSent => "OUT_NOTIF_chatSent",
    OutNotifAdminMade => "OUT_NOTIF_adminMade",
    OutNotifGameStarted => "OUT_NOTIF_gameStarted",
    OutNotifQuestion => "OUT_NOTIF_question",
    OutNotifRoundEnded => "OUT_NOTIF_roundEnded",
    OutNotifClientAnswered => "OUT_NOTIF_clientAnswered",
    OutNotifGameStopped => "OUT_NOTIF_gameStopped",
    OutNotifGameSettingsChanged => "OUT_NOTIF_gameSettingsChanged",
}

impl MessageType {
    pub fn family(&self) -> Family {
        match self {
            MessageType::Unknown(_) => Family::Unknown,
            known => Family::of(known.as_str()),
        }
    }
}

impl From<String> for MessageType {
    fn from(tag: String) -> Self {
        match MessageType::parse(&tag) {
            MessageType::Unknown(_) => MessageType::Unknown(tag),
            known => known,
        }
    }
}

impl From<MessageType> for String {
    fn from(t: MessageType) -> Self {
        match t {
            MessageType::Unknown(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_follow_prefix() {
        assert_eq!(MessageType::InReqSendChat.family(), Family::InRequest);
        assert_eq!(MessageType::OutRespStatus.family(), Family::OutResponse);
        assert_eq!(MessageType::OutReqQuestion.family(), Family::OutRequest);
        assert_eq!(MessageType::InRespQuestion.family(), Family::InResponse);
        assert_eq!(MessageType::OutNotifRoundEnded.family(), Family::OutNotification);
        assert_eq!(MessageType::parse("OUT_NOTIF_fireworks").family(), Family::Unknown);
    }

    #[test]
    fn verify_signature_keeps_lowercase_wire_tag() {
        assert_eq!(MessageType::InReqVerifySignature.as_str(), "IN_REQ_verifysignature");
        assert_eq!(
            MessageType::parse("IN_REQ_verifysignature"),
            MessageType::InReqVerifySignature
        );
    }

    #[test]
    fn unknown_tag_is_preserved() {
        let t = MessageType::from("OUT_NOTIF_emote".to_string());
        assert_eq!(t.family(), Family::Unknown);
        assert_eq!(String::from(t), "OUT_NOTIF_emote");
    }
}
