/// Where the session is in its lifecycle. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Off,
    Connecting,
    Lobby,
    WaitingQuestion,
    AnswerQuestion,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Connecting => "connecting",
            Self::Lobby => "lobby",
            Self::WaitingQuestion => "waitingQuestion",
            Self::AnswerQuestion => "answerQuestion",
        }
    }

    pub fn in_game(self) -> bool {
        matches!(self, Self::WaitingQuestion | Self::AnswerQuestion)
    }

    /// Registered with a host (lobby or game).
    pub fn is_online(self) -> bool {
        matches!(self, Self::Lobby) || self.in_game()
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
