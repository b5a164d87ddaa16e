//! Typed payload records, one per message tag.
//!
//! Field names are camelCase on the wire.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::message_type::MessageType;

/// A payload record bound to exactly one message tag.
pub trait Payload: Serialize + DeserializeOwned {
    const MESSAGE_TYPE: MessageType;
}

macro_rules! bind_payload {
    ($($ty:ty => $variant:ident,)+) => {
        $(impl Payload for $ty {
            const MESSAGE_TYPE: MessageType = MessageType::$variant;
        })+
    };
}

// ---------- shared records ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub id: String,
    /// Public-key identity issued by the key manager.
    pub key: String,
    pub name: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    pub min_frequency: u64,
    pub max_frequency: u64,
    pub using_max_frequency: bool,
    /// Seconds.
    pub round_duration: u64,
    pub rounds_count: u64,
    #[serde(default)]
    pub word_part: Option<String>,
    #[serde(default)]
    pub word_part_reading: Option<String>,
    #[serde(default)]
    pub fonts_count: u64,
    #[serde(default)]
    pub first_font_name: Option<String>,
    #[serde(default)]
    pub dictionary_id: Option<u64>,
    #[serde(default)]
    pub examples_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordPartExample {
    pub word: String,
    pub frequency: Option<f64>,
    pub reading: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordPartInfo {
    pub word_part: String,
    pub word_part_reading: String,
    #[serde(default)]
    pub examples: Vec<WordPartExample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingWithParts {
    pub reading: String,
    #[serde(default)]
    pub parts: Vec<WordPartInfo>,
}

/// One quiz prompt as produced by the word provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordInfo {
    pub word: String,
    #[serde(default)]
    pub meanings: Vec<Vec<Vec<String>>>,
    #[serde(default)]
    pub readings: Vec<ReadingWithParts>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInfo {
    pub word_info: WordInfo,
    pub font_name: String,
}

/// Authoritative answer record from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInfo {
    pub id: String,
    pub answer: String,
    pub is_correct: bool,
    /// Milliseconds from question to answer.
    #[serde(default)]
    pub answer_time: u64,
}

// ---------- IN_REQ ----------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InReqSendPublicKey {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InReqVerifySignature {
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InReqRegisterClient {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InReqClientList {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InReqSendChat {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InReqMakeAdmin {
    pub admin_password: String,
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InReqStartGame {
    pub game_settings: GameSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InReqSendAnswer {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InReqStopGame {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InReqSendGameSettings {
    pub game_settings: GameSettings,
}

// ---------- OUT_RESP ----------

/// Status code string the host uses for success.
pub const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutRespStatus {
    pub status: String,
}

impl OutRespStatus {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutRespClientRegistered {
    pub id: String,
    pub game_settings: GameSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutRespClientList {
    pub clients: Vec<ClientInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutRespSignMessage {
    pub message: String,
}

// ---------- OUT_REQ / IN_RESP ----------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutReqQuestion {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InRespQuestion {
    pub question: QuestionInfo,
    pub question_svg: String,
}

// ---------- OUT_NOTIF ----------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutNotifClientRegistered {
    pub client: ClientInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutNotifClientDisconnected {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutNotifChatSent {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutNotifAdminMade {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutNotifGameStarted {
    pub game_settings: GameSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutNotifQuestion {
    pub question_svg: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutNotifClientAnswered {
    pub id: String,
}

/// Round results; shared shape of `roundEnded` and `gameStopped`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResults {
    #[serde(default)]
    pub question: Option<QuestionInfo>,
    #[serde(default)]
    pub answers: Vec<AnswerInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutNotifRoundEnded(pub RoundResults);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutNotifGameStopped(pub RoundResults);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutNotifGameSettingsChanged {
    pub game_settings: GameSettings,
}

bind_payload! {
    InReqSendPublicKey => InReqSendPublicKey,
    InReqVerifySignature => InReqVerifySignature,
    InReqRegisterClient => InReqRegisterClient,
    InReqClientList => InReqClientList,
    InReqSendChat => InReqSendChat,
    InReqMakeAdmin => InReqMakeAdmin,
    InReqStartGame => InReqStartGame,
    InReqSendAnswer => InReqSendAnswer,
    InReqStopGame => InReqStopGame,
    InReqSendGameSettings => InReqSendGameSettings,
    OutRespStatus => OutRespStatus,
    OutRespClientRegistered => OutRespClientRegistered,
    OutRespClientList => OutRespClientList,
    OutRespSignMessage => OutRespSignMessage,
    OutReqQuestion => OutReqQuestion,
    InRespQuestion => InRespQuestion,
    OutNotifClientRegistered => OutNotifClientRegistered,
    OutNotifClientDisconnected => OutNotifClientDisconnected,
    OutNotifChatSent => OutNotifChatSent,
    OutNotifAdminMade => OutNotifAdminMade,
    OutNotifGameStarted => OutNotifGameStarted,
    OutNotifQuestion => OutNotifQuestion,
    OutNotifClientAnswered => OutNotifClientAnswered,
    OutNotifRoundEnded => OutNotifRoundEnded,
    OutNotifGameStopped => OutNotifGameStopped,
    OutNotifGameSettingsChanged => OutNotifGameSettingsChanged,
}
