//! Session controller.
//!
//! Owns the session state machine. Connector events are consumed in arrival
//! order by one event-loop task per connection; user operations go through
//! the methods below. Session state sits behind a mutex that is released
//! before every network or collaborator await.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use kanjiquiz_core::error::{QuizError, Result};
use kanjiquiz_core::protocol::payloads::{ClientInfo, GameSettings, RoundResults};

use super::countdown::Countdown;
use super::history::{GameHistory, RoundHistory};
use super::question_source::QuestionSource;
use super::roster::Roster;
use super::state::SessionState;
use crate::collab::{AnswerStat, Collaborators};
use crate::config::SessionSection;
use crate::connector::{Connector, ConnectorEvent};
use crate::supply::{ContentFilter, SupplyCache};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub display_name: String,
    /// Key-manager account; the first listed one when unset.
    pub account: Option<String>,
    pub tick: Duration,
    pub question_attempts: u32,
    pub fonts: Vec<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&SessionSection::default())
    }
}

impl From<&SessionSection> for SessionOptions {
    fn from(cfg: &SessionSection) -> Self {
        Self {
            display_name: cfg.display_name.clone(),
            account: cfg.account.clone(),
            tick: Duration::from_millis(cfg.tick_ms),
            question_attempts: cfg.question_attempts,
            fonts: cfg.fonts.clone(),
        }
    }
}

/// What the session reports to its observers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged { from: SessionState, to: SessionState },
    RosterChanged(Vec<ClientInfo>),
    Chat { id: String, message: String },
    SettingsChanged(GameSettings),
    GameStarted(GameSettings),
    QuestionShown { round: usize, question_svg: String },
    ClientAnswered { id: String },
    /// A round was closed with the host's results; `ranking` is client ids,
    /// best first.
    RoundFinalized { round: usize, ranking: Vec<String> },
    GameStopped { ranking: Vec<String> },
    QuestionSourceFailed { error: String },
    Fault { code: &'static str, error: String },
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub client_id: Option<String>,
    pub settings: GameSettings,
    pub roster: Vec<ClientInfo>,
    pub rounds: Vec<RoundHistory>,
    pub game_id: Option<u64>,
    pub remaining: Option<Duration>,
}

#[derive(Default)]
struct Inner {
    state: SessionState,
    client_id: Option<String>,
    settings: GameSettings,
    roster: Roster,
    history: GameHistory,
    countdown: Option<Countdown>,
    game_id: Option<u64>,
    duty: Option<JoinHandle<()>>,
}

impl Inner {
    fn stop_countdown(&mut self) {
        if let Some(c) = self.countdown.take() {
            c.stop();
        }
    }

    /// Back to `Off` with nothing left over.
    fn reset(&mut self) {
        self.stop_countdown();
        if let Some(d) = self.duty.take() {
            d.abort();
        }
        self.client_id = None;
        self.settings = GameSettings::default();
        self.roster.clear();
        self.history.clear();
        self.game_id = None;
    }
}

struct Shared {
    connector: Arc<Connector>,
    collab: Collaborators,
    source: Arc<QuestionSource>,
    opts: SessionOptions,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

pub struct SessionController {
    shared: Arc<Shared>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    pub fn new(
        connector: Arc<Connector>,
        collab: Collaborators,
        supply: Arc<SupplyCache>,
        opts: SessionOptions,
    ) -> Self {
        let source = Arc::new(QuestionSource::new(
            supply,
            Arc::clone(&collab.renderer),
            opts.fonts.clone(),
            opts.question_attempts,
        ));
        let (state_tx, _) = watch::channel(SessionState::Off);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                connector,
                collab,
                source,
                opts,
                inner: Mutex::new(Inner::default()),
                state_tx,
                events,
            }),
            event_loop: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state_tx.borrow()
    }

    pub fn connector(&self) -> &Arc<Connector> {
        &self.shared.connector
    }

    /// Connect, authenticate if a key manager is present, register and load
    /// the roster. Any failure leaves the session `Off`.
    pub async fn connect(&self, address: &str) -> Result<()> {
        let mut event_loop = self.event_loop.lock().await;
        self.shutdown(&mut event_loop).await;

        let shared = &self.shared;
        {
            let mut inner = shared.inner.lock().await;
            shared.transition(&mut inner, SessionState::Connecting);
        }

        // Subscribed before the link opens so nothing is missed; events
        // queue up until the loop starts.
        let events = shared.connector.subscribe();
        if let Err(e) = shared.connector.connect(address).await {
            tracing::warn!(address, error = %e, "connect failed");
            shared.go_off().await;
            return Err(e);
        }

        match shared.handshake().await {
            Ok((id, settings, clients)) => {
                let mut inner = shared.inner.lock().await;
                inner.client_id = Some(id.clone());
                inner.settings = settings;
                inner.roster.replace_all(clients);
                shared.emit(SessionEvent::RosterChanged(inner.roster.clients().to_vec()));
                shared.transition(&mut inner, SessionState::Lobby);
                tracing::info!(client_id = %id, name = %shared.opts.display_name, "registered");
            }
            Err(e) => {
                tracing::warn!(address, error = %e, "handshake failed");
                shared.connector.disconnect().await;
                shared.go_off().await;
                return Err(e);
            }
        }

        *event_loop = Some(tokio::spawn(run_events(Arc::clone(shared), events)));
        Ok(())
    }

    pub async fn disconnect(&self) {
        let mut event_loop = self.event_loop.lock().await;
        self.shutdown(&mut event_loop).await;
    }

    async fn shutdown(&self, event_loop: &mut Option<JoinHandle<()>>) {
        self.shared.connector.disconnect().await;
        if let Some(handle) = event_loop.take() {
            // The loop ends on the SocketClosed that disconnect published.
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "session event loop failed");
            }
        }
        self.shared.go_off().await;
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.shared.inner.lock().await;
        SessionSnapshot {
            state: inner.state,
            client_id: inner.client_id.clone(),
            settings: inner.settings.clone(),
            roster: inner.roster.clients().to_vec(),
            rounds: inner.history.rounds().to_vec(),
            game_id: inner.game_id,
            remaining: inner.countdown.as_ref().map(Countdown::remaining),
        }
    }

    /// Remaining time of the open round, updated every tick. `None` outside
    /// `AnswerQuestion`.
    pub async fn countdown(&self) -> Option<watch::Receiver<Duration>> {
        self.shared.inner.lock().await.countdown.as_ref().map(Countdown::watch)
    }

    /// Admin flag of `client_id`. Fails with `NoAdmin` when the id is not in
    /// the roster.
    pub async fn is_admin(&self, client_id: &str) -> Result<bool> {
        let res = self.shared.inner.lock().await.roster.is_admin(client_id);
        if let Err(e) = &res {
            self.shared.fault(e);
        }
        res
    }

    /// Submit an answer for the running round.
    pub async fn send_answer(&self, answer: &str) -> Result<()> {
        {
            let mut inner = self.shared.inner.lock().await;
            if inner.state != SessionState::AnswerQuestion {
                return Err(QuizError::InvalidState(format!(
                    "cannot answer in state {}",
                    inner.state
                )));
            }
            let elapsed = match &inner.countdown {
                Some(c) if !c.remaining().is_zero() => c.elapsed(),
                _ => return Err(QuizError::InvalidState("round time is over".into())),
            };
            let id = inner
                .client_id
                .clone()
                .ok_or_else(|| QuizError::InvalidState("not registered".into()))?;
            inner.history.record_local(&id, answer, elapsed);
        }
        self.shared.connector.send_answer(answer).await
    }

    pub async fn send_chat(&self, message: &str) -> Result<()> {
        self.shared.require(|s| s.is_online(), "chat").await?;
        self.shared.connector.send_chat(message).await
    }

    pub async fn make_admin(&self, admin_password: &str, client_id: &str) -> Result<()> {
        self.shared.require(|s| s.is_online(), "make admin").await?;
        self.shared.connector.make_admin(admin_password, client_id).await
    }

    pub async fn start_game(&self, settings: &GameSettings) -> Result<()> {
        self.shared.require(|s| s == SessionState::Lobby, "start a game").await?;
        self.shared.connector.start_game(settings).await
    }

    pub async fn stop_game(&self) -> Result<()> {
        self.shared.require(SessionState::in_game, "stop the game").await?;
        self.shared.connector.stop_game().await
    }

    pub async fn send_game_settings(&self, settings: &GameSettings) -> Result<()> {
        self.shared.require(|s| s == SessionState::Lobby, "change settings").await?;
        self.shared.connector.send_game_settings(settings).await
    }

    /// Re-read the client list from the host.
    pub async fn refresh_roster(&self) -> Result<()> {
        self.shared.require(|s| s.is_online(), "refresh the roster").await?;
        let clients = self.shared.connector.client_list().await?;
        let mut inner = self.shared.inner.lock().await;
        inner.roster.replace_all(clients);
        self.shared.emit(SessionEvent::RosterChanged(inner.roster.clients().to_vec()));
        Ok(())
    }
}

async fn run_events(shared: Arc<Shared>, mut events: mpsc::UnboundedReceiver<ConnectorEvent>) {
    while let Some(ev) = events.recv().await {
        let closed = matches!(ev, ConnectorEvent::SocketClosed);
        shared.handle(ev).await;
        if closed {
            break;
        }
    }
    tracing::debug!("session event loop finished");
}

impl Shared {
    fn emit(&self, ev: SessionEvent) {
        // No receivers is fine.
        let _ = self.events.send(ev);
    }

    fn fault(&self, e: &QuizError) {
        tracing::error!(code = e.kind().as_str(), error = %e, "session fault");
        self.emit(SessionEvent::Fault {
            code: e.kind().as_str(),
            error: e.to_string(),
        });
    }

    fn transition(&self, inner: &mut Inner, to: SessionState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        self.state_tx.send_replace(to);
        tracing::info!(%from, %to, "session state");
        self.emit(SessionEvent::StateChanged { from, to });
    }

    async fn go_off(&self) {
        let mut inner = self.inner.lock().await;
        inner.reset();
        self.transition(&mut inner, SessionState::Off);
    }

    async fn require(&self, ok: impl Fn(SessionState) -> bool, what: &str) -> Result<()> {
        let state = self.inner.lock().await.state;
        if ok(state) {
            Ok(())
        } else {
            Err(QuizError::InvalidState(format!("cannot {what} in state {state}")))
        }
    }

    async fn handshake(&self) -> Result<(String, GameSettings, Vec<ClientInfo>)> {
        if let Some(identity) = &self.collab.identity {
            let account = match &self.opts.account {
                Some(a) => a.clone(),
                None => identity
                    .list_accounts()
                    .await?
                    .into_iter()
                    .next()
                    .map(|a| a.public_key)
                    .ok_or_else(|| QuizError::Collaborator("key manager has no accounts".into()))?,
            };
            let message = self.connector.send_public_key(&account).await?;
            let signature = identity.sign(&account, &message).await?;
            self.connector.verify_signature(&signature).await?;
            tracing::debug!("signature verified");
        }

        let (id, settings) = self.connector.register_client(&self.opts.display_name).await?;
        let clients = self.connector.client_list().await?;
        Ok((id, settings, clients))
    }

    async fn handle(self: &Arc<Self>, ev: ConnectorEvent) {
        let name = ev.name();
        match ev {
            ConnectorEvent::ClientRegistered(client) => {
                let mut inner = self.inner.lock().await;
                inner.roster.add(client);
                self.emit(SessionEvent::RosterChanged(inner.roster.clients().to_vec()));
            }
            ConnectorEvent::ClientDisconnected { id } => {
                let mut inner = self.inner.lock().await;
                if inner.roster.remove(&id).is_some() {
                    self.emit(SessionEvent::RosterChanged(inner.roster.clients().to_vec()));
                }
            }
            ConnectorEvent::ChatSent { id, message } => {
                self.emit(SessionEvent::Chat { id, message });
            }
            ConnectorEvent::AdminMade { id } => {
                let mut inner = self.inner.lock().await;
                match inner.roster.set_admin(&id) {
                    Ok(()) => self.emit(SessionEvent::RosterChanged(inner.roster.clients().to_vec())),
                    Err(e) => self.fault(&e),
                }
            }
            ConnectorEvent::GameStarted(settings) => self.on_game_started(settings).await,
            ConnectorEvent::Question { question_svg } => {
                let mut inner = self.inner.lock().await;
                if inner.state != SessionState::WaitingQuestion {
                    return ignored(name, inner.state);
                }
                inner.stop_countdown();
                inner.history.push_round(question_svg.clone());
                let total = Duration::from_secs(inner.settings.round_duration);
                inner.countdown = Some(Countdown::start(total, self.opts.tick));
                let round = inner.history.len() - 1;
                self.transition(&mut inner, SessionState::AnswerQuestion);
                self.emit(SessionEvent::QuestionShown { round, question_svg });
            }
            ConnectorEvent::ClientAnswered { id } => {
                let mut inner = self.inner.lock().await;
                if inner.state != SessionState::AnswerQuestion {
                    return ignored(name, inner.state);
                }
                inner.history.placeholder(&id);
                self.emit(SessionEvent::ClientAnswered { id });
            }
            ConnectorEvent::RoundEnded(results) => {
                let finalized = {
                    let mut inner = self.inner.lock().await;
                    if inner.state != SessionState::AnswerQuestion {
                        return ignored(name, inner.state);
                    }
                    inner.stop_countdown();
                    let finalized = close_round(&mut inner, &results);
                    self.transition(&mut inner, SessionState::WaitingQuestion);
                    finalized
                };
                if let Some((round, ranking, stats)) = finalized {
                    self.persist(stats).await;
                    self.emit(SessionEvent::RoundFinalized { round, ranking });
                }
            }
            ConnectorEvent::GameStopped(results) => {
                let (finalized, ranking) = {
                    let mut inner = self.inner.lock().await;
                    if !inner.state.in_game() {
                        return ignored(name, inner.state);
                    }
                    inner.stop_countdown();
                    let finalized = close_round(&mut inner, &results);
                    let ranking = inner.roster.ids();
                    inner.history.clear();
                    inner.game_id = None;
                    self.transition(&mut inner, SessionState::Lobby);
                    (finalized, ranking)
                };
                if let Some((round, round_ranking, stats)) = finalized {
                    self.persist(stats).await;
                    self.emit(SessionEvent::RoundFinalized {
                        round,
                        ranking: round_ranking,
                    });
                }
                self.emit(SessionEvent::GameStopped { ranking });
            }
            ConnectorEvent::GameSettingsChanged(settings) => {
                let mut inner = self.inner.lock().await;
                if inner.state != SessionState::Lobby {
                    return ignored(name, inner.state);
                }
                inner.settings = settings.clone();
                self.emit(SessionEvent::SettingsChanged(settings));
            }
            ConnectorEvent::QuestionRequested { correlation_id } => {
                let mut inner = self.inner.lock().await;
                if !inner.state.is_online() {
                    return ignored(name, inner.state);
                }
                let settings = inner.settings.clone();
                if let Some(prev) = inner.duty.take() {
                    if !prev.is_finished() {
                        tracing::warn!("previous question still in progress");
                    }
                }
                inner.duty = Some(tokio::spawn(question_duty(
                    Arc::clone(self),
                    correlation_id,
                    settings,
                )));
            }
            ConnectorEvent::SocketClosed => {
                self.go_off().await;
            }
        }
    }

    async fn on_game_started(&self, settings: GameSettings) {
        let prefetch = {
            let mut inner = self.inner.lock().await;
            if inner.state != SessionState::Lobby {
                return ignored("gameStarted", inner.state);
            }
            inner.stop_countdown();
            inner.history.clear();
            inner.game_id = None;
            inner.settings = settings.clone();
            self.transition(&mut inner, SessionState::WaitingQuestion);
            // The host asks an admin for questions; warm the supply early.
            inner
                .client_id
                .as_deref()
                .is_some_and(|id| inner.roster.is_admin(id).unwrap_or(false))
        };
        self.emit(SessionEvent::GameStarted(settings.clone()));

        if prefetch {
            self.source
                .supply()
                .prefetch(&ContentFilter::from_settings(&settings))
                .await;
        }

        match self.collab.stats.create_game(&settings).await {
            Ok(id) => {
                let mut inner = self.inner.lock().await;
                if inner.state.in_game() {
                    inner.game_id = Some(id);
                }
            }
            Err(e) => tracing::warn!(error = %e, "stats store: game record not created"),
        }
    }

    async fn persist(&self, stats: Vec<AnswerStat>) {
        for stat in &stats {
            if let Err(e) = self.collab.stats.record_answer(stat).await {
                tracing::warn!(error = %e, client = %stat.client_name, round = stat.round, "stats store: answer not recorded");
            }
        }
    }
}

/// Finalize the open round, re-rank, and build the stats to persist.
fn close_round(inner: &mut Inner, results: &RoundResults) -> Option<(usize, Vec<String>, Vec<AnswerStat>)> {
    let Some(round) = inner.history.finalize(results) else {
        tracing::debug!("no open round to finalize");
        return None;
    };
    inner.roster.rank(&inner.history.correct_counts());
    let ranking = inner.roster.ids();

    let stats = match (inner.game_id, inner.history.last().and_then(|r| r.question.as_ref())) {
        (Some(game_id), Some(question)) => results
            .answers
            .iter()
            .map(|a| {
                let client = inner.roster.get(&a.id);
                AnswerStat {
                    game_id,
                    client_key: client.map_or_else(|| a.id.clone(), |c| c.key.clone()),
                    client_name: client.map(|c| c.name.clone()).unwrap_or_default(),
                    round,
                    word: question.word_info.word.clone(),
                    answer: a.answer.clone(),
                    is_correct: a.is_correct,
                    duration_ms: Some(a.answer_time),
                    font_name: question.font_name.clone(),
                }
            })
            .collect(),
        _ => Vec::new(),
    };
    Some((round, ranking, stats))
}

fn ignored(event: &str, state: SessionState) {
    tracing::warn!(event, %state, "event has no transition in this state; ignored");
}

async fn question_duty(shared: Arc<Shared>, correlation_id: String, settings: GameSettings) {
    match shared.source.produce(&settings).await {
        Ok(question) => {
            if let Err(e) = shared.connector.reply_question(&correlation_id, &question).await {
                tracing::warn!(correlation_id = %correlation_id, error = %e, "question reply not sent");
            } else {
                tracing::debug!(correlation_id = %correlation_id, word = %question.question.word_info.word, "question sent");
            }
        }
        Err(e) => {
            tracing::error!(correlation_id = %correlation_id, error = %e, "question source gave up");
            shared.emit(SessionEvent::QuestionSourceFailed { error: e.to_string() });
        }
    }
}
