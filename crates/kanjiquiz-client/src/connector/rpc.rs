//! Typed RPC helpers, one per host operation.
//!
//! The host answers most requests with `OUT_RESP_status`; anything other than
//! `success` becomes `QuizError::Status` carrying the host's code
//! (`noRightsError`, `alreadyAnswered`, ...).

use kanjiquiz_core::error::{QuizError, Result};
use kanjiquiz_core::protocol::payloads::{
    ClientInfo, GameSettings, InReqClientList, InReqMakeAdmin, InReqRegisterClient,
    InReqSendAnswer, InReqSendChat, InReqSendGameSettings, InReqSendPublicKey, InReqStartGame,
    InReqStopGame, InReqVerifySignature, InRespQuestion, OutRespClientList,
    OutRespClientRegistered, OutRespSignMessage, OutRespStatus,
};
use kanjiquiz_core::protocol::{Envelope, MessageType, Payload};

use super::mux::Connector;

/// Parse `env` as `P`, mapping a failure status to `Status` and any other
/// tag to `UnexpectedResponse`.
fn expect<P: Payload>(env: Envelope) -> Result<P> {
    if env.message_type == P::MESSAGE_TYPE {
        return env.payload_as::<P>();
    }
    if env.message_type == MessageType::OutRespStatus {
        let s = env.payload_as::<OutRespStatus>()?;
        if !s.is_success() {
            return Err(QuizError::Status(s.status));
        }
    }
    Err(QuizError::UnexpectedResponse(env.message_type.to_string()))
}

fn expect_success(env: Envelope) -> Result<()> {
    let s = expect::<OutRespStatus>(env)?;
    if s.is_success() {
        Ok(())
    } else {
        Err(QuizError::Status(s.status))
    }
}

impl Connector {
    async fn call<P: Payload>(&self, payload: &P) -> Result<Envelope> {
        self.request(Envelope::request(payload)?).await
    }

    async fn call_status<P: Payload>(&self, payload: &P) -> Result<()> {
        expect_success(self.call(payload).await?)
    }

    /// Announce the public key; returns the message the host wants signed.
    pub async fn send_public_key(&self, key: &str) -> Result<String> {
        let env = self.call(&InReqSendPublicKey { key: key.to_string() }).await?;
        Ok(expect::<OutRespSignMessage>(env)?.message)
    }

    pub async fn verify_signature(&self, signature: &str) -> Result<()> {
        self.call_status(&InReqVerifySignature {
            signature: signature.to_string(),
        })
        .await
    }

    /// Returns the session-scoped client id and the host's current settings.
    pub async fn register_client(&self, name: &str) -> Result<(String, GameSettings)> {
        let env = self.call(&InReqRegisterClient { name: name.to_string() }).await?;
        let r = expect::<OutRespClientRegistered>(env)?;
        Ok((r.id, r.game_settings))
    }

    pub async fn client_list(&self) -> Result<Vec<ClientInfo>> {
        let env = self.call(&InReqClientList {}).await?;
        Ok(expect::<OutRespClientList>(env)?.clients)
    }

    pub async fn send_chat(&self, message: &str) -> Result<()> {
        self.call_status(&InReqSendChat {
            message: message.to_string(),
        })
        .await
    }

    pub async fn make_admin(&self, admin_password: &str, client_id: &str) -> Result<()> {
        self.call_status(&InReqMakeAdmin {
            admin_password: admin_password.to_string(),
            client_id: client_id.to_string(),
        })
        .await
    }

    pub async fn start_game(&self, game_settings: &GameSettings) -> Result<()> {
        self.call_status(&InReqStartGame {
            game_settings: game_settings.clone(),
        })
        .await
    }

    pub async fn send_answer(&self, answer: &str) -> Result<()> {
        self.call_status(&InReqSendAnswer {
            answer: answer.to_string(),
        })
        .await
    }

    pub async fn stop_game(&self) -> Result<()> {
        self.call_status(&InReqStopGame {}).await
    }

    pub async fn send_game_settings(&self, game_settings: &GameSettings) -> Result<()> {
        self.call_status(&InReqSendGameSettings {
            game_settings: game_settings.clone(),
        })
        .await
    }

    /// Answer the host's `OUT_REQ_question`. No reply is expected.
    pub async fn reply_question(&self, correlation_id: &str, question: &InRespQuestion) -> Result<()> {
        self.send(Envelope::reply(question, correlation_id)?).await
    }
}
