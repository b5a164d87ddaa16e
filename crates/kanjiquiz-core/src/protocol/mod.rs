//! Protocol modules.
//!
//! - `message_type`: closed tag set with a forward-compatible `Unknown` case.
//! - `envelope`: JSON envelope with lazily parsed `RawValue` payload.
//! - `payloads`: typed records, each bound to one tag via [`payloads::Payload`].
//!
//! All parsers are panic-free: malformed input is reported as `QuizError`.

pub mod envelope;
pub mod message_type;
pub mod payloads;

pub use envelope::{new_correlation_id, Envelope};
pub use message_type::{Family, MessageType};
pub use payloads::Payload;
