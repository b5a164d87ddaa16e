//! Decode-once codec between frames and envelopes.

use kanjiquiz_core::{
    error::Result,
    protocol::Envelope,
};

use super::Frame;

#[derive(Debug)]
pub enum Inbound {
    Envelope { env: Envelope, bytes_len: usize },
    Close,
}

pub fn decode(frame: Frame) -> Result<Inbound> {
    match frame {
        Frame::Text(s) => {
            let bytes_len = s.len();
            let env = Envelope::decode(&s)?;
            Ok(Inbound::Envelope { env, bytes_len })
        }
        Frame::Close => Ok(Inbound::Close),
    }
}

pub fn encode(env: &Envelope) -> Result<Frame> {
    Ok(Frame::Text(env.encode()?))
}
