//! Session layer: the state machine driving one player's view of a game.
//!
//! - `controller`: lifecycle, event handling, user operations.
//! - `roster` / `history`: lobby and per-game records.
//! - `countdown`: round timer for display and answer gating.
//! - `question_source`: produces questions when the host delegates to us.

pub mod controller;
pub mod countdown;
pub mod history;
pub mod question_source;
pub mod roster;
pub mod state;

pub use controller::{SessionController, SessionEvent, SessionOptions, SessionSnapshot};
pub use countdown::Countdown;
pub use history::{AnswerRecord, AnswerStatus, GameHistory, RoundHistory};
pub use question_source::QuestionSource;
pub use roster::Roster;
pub use state::SessionState;
