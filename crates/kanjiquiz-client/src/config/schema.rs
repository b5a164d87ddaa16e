use serde::Deserialize;
use kanjiquiz_core::error::{QuizError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    #[serde(default)]
    pub connection: ConnectionSection,

    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub supply: SupplySection,

    /// JSON file with the local word list (array of `WordInfo`).
    #[serde(default)]
    pub words_file: Option<String>,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(QuizError::Config(format!("unsupported config version {}", self.version)));
        }

        self.connection.validate()?;
        self.session.validate()?;
        self.supply.validate()?;

        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: 1,
            connection: ConnectionSection::default(),
            session: SessionSection::default(),
            supply: SupplySection::default(),
            words_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSection {
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            address: default_address(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_frame_bytes: default_max_frame_bytes(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

impl ConnectionSection {
    pub fn validate(&self) -> Result<()> {
        if !(self.address.starts_with("ws://") || self.address.starts_with("wss://")) {
            return Err(QuizError::Config(
                "connection.address must be a ws:// or wss:// url".into(),
            ));
        }
        if !(100..=60000).contains(&self.connect_timeout_ms) {
            return Err(QuizError::Config(
                "connection.connect_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        if !(10..=60000).contains(&self.request_timeout_ms) {
            return Err(QuizError::Config(
                "connection.request_timeout_ms must be between 10 and 60000".into(),
            ));
        }
        if self.max_frame_bytes < 1024 {
            return Err(QuizError::Config(
                "connection.max_frame_bytes must be at least 1024".into(),
            ));
        }
        if self.outbound_queue == 0 {
            return Err(QuizError::Config("connection.outbound_queue must be > 0".into()));
        }
        Ok(())
    }
}

fn default_address() -> String {
    "ws://127.0.0.1:8080".into()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_request_timeout_ms() -> u64 {
    5000
}
fn default_max_frame_bytes() -> usize {
    1 << 20
}
fn default_outbound_queue() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSection {
    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// Public key of the key-manager account to authenticate with.
    /// No handshake is performed when unset.
    #[serde(default)]
    pub account: Option<String>,

    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_question_attempts")]
    pub question_attempts: u32,

    /// Font set the question source draws from.
    #[serde(default = "default_fonts")]
    pub fonts: Vec<String>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            account: None,
            tick_ms: default_tick_ms(),
            question_attempts: default_question_attempts(),
            fonts: default_fonts(),
        }
    }
}

impl SessionSection {
    pub fn validate(&self) -> Result<()> {
        if self.display_name.trim().is_empty() {
            return Err(QuizError::Config("session.display_name must not be empty".into()));
        }
        if !(1..=1000).contains(&self.tick_ms) {
            return Err(QuizError::Config("session.tick_ms must be between 1 and 1000".into()));
        }
        if !(1..=10).contains(&self.question_attempts) {
            return Err(QuizError::Config(
                "session.question_attempts must be between 1 and 10".into(),
            ));
        }
        if self.fonts.is_empty() {
            return Err(QuizError::Config("session.fonts must not be empty".into()));
        }
        Ok(())
    }
}

fn default_display_name() -> String {
    "NoName".into()
}
fn default_tick_ms() -> u64 {
    10
}
fn default_question_attempts() -> u32 {
    3
}
fn default_fonts() -> Vec<String> {
    vec!["NotoSansJP-Regular.ttf".into()]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupplySection {
    #[serde(default = "default_first_batch")]
    pub first_batch: usize,

    #[serde(default = "default_low_mark")]
    pub low_mark: usize,

    #[serde(default = "default_high_mark")]
    pub high_mark: usize,
}

impl Default for SupplySection {
    fn default() -> Self {
        Self {
            first_batch: default_first_batch(),
            low_mark: default_low_mark(),
            high_mark: default_high_mark(),
        }
    }
}

impl SupplySection {
    pub fn validate(&self) -> Result<()> {
        if self.first_batch == 0 {
            return Err(QuizError::Config("supply.first_batch must be > 0".into()));
        }
        if self.low_mark >= self.high_mark {
            return Err(QuizError::Config(
                "supply.low_mark must be less than supply.high_mark".into(),
            ));
        }
        if self.first_batch > self.high_mark {
            return Err(QuizError::Config(
                "supply.first_batch must not exceed supply.high_mark".into(),
            ));
        }
        Ok(())
    }
}

fn default_first_batch() -> usize {
    1
}
fn default_low_mark() -> usize {
    5
}
fn default_high_mark() -> usize {
    10
}
