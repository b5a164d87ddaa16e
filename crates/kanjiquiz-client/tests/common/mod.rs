#![allow(dead_code)]

//! Scripted host over the in-memory transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};

use kanjiquiz_client::collab::local::{LogStatsStore, PlainGlyphRenderer, StaticWordList};
use kanjiquiz_client::collab::{
    AnswerStat, Collaborators, IdentityProvider, StatsStore, WordProvider,
};
use kanjiquiz_client::connector::{Connector, ConnectorOptions};
use kanjiquiz_client::obs::ClientMetrics;
use kanjiquiz_client::session::{SessionController, SessionEvent, SessionOptions, SessionState};
use kanjiquiz_client::supply::{ContentFilter, SupplyCache, SupplyOptions};
use kanjiquiz_client::transport::memory::{MemoryDialer, MemoryPeer};
use kanjiquiz_core::error::{QuizError, Result};
use kanjiquiz_core::protocol::payloads::{
    AnswerInfo, ClientInfo, GameSettings, OutRespClientList, OutRespClientRegistered, WordInfo,
};
use kanjiquiz_core::protocol::{Envelope, MessageType};

pub const ADDRESS: &str = "mem://host";
pub const WAIT: Duration = Duration::from_secs(2);

pub fn client(id: &str, name: &str) -> ClientInfo {
    ClientInfo {
        id: id.into(),
        key: format!("key-{id}"),
        name: name.into(),
        is_admin: false,
    }
}

pub fn word(w: &str) -> WordInfo {
    WordInfo {
        word: w.into(),
        meanings: vec![],
        readings: vec![],
    }
}

pub fn answer(id: &str, text: &str, ok: bool) -> AnswerInfo {
    AnswerInfo {
        id: id.into(),
        answer: text.into(),
        is_correct: ok,
        answer_time: 900,
    }
}

pub fn settings() -> GameSettings {
    GameSettings {
        min_frequency: 0,
        max_frequency: 0,
        using_max_frequency: false,
        round_duration: 30,
        rounds_count: 2,
        ..Default::default()
    }
}

pub fn connector() -> (Arc<Connector>, mpsc::UnboundedReceiver<MemoryPeer>) {
    let (dialer, peers) = MemoryDialer::new();
    (Arc::new(Connector::new(Arc::new(dialer), ConnectorOptions::default())), peers)
}

/// Word provider that always fails and counts its calls.
#[derive(Default)]
pub struct BrokenWords {
    pub calls: AtomicUsize,
}

#[async_trait]
impl WordProvider for BrokenWords {
    async fn get_many(&self, _count: usize, _filter: &ContentFilter) -> Result<Vec<WordInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(QuizError::Collaborator("dictionary offline".into()))
    }
}

/// Stats store that keeps everything in memory. Game ids start at 77.
#[derive(Default)]
pub struct RecordingStats {
    pub games: Mutex<Vec<GameSettings>>,
    pub answers: Mutex<Vec<AnswerStat>>,
}

#[async_trait]
impl StatsStore for RecordingStats {
    async fn create_game(&self, settings: &GameSettings) -> Result<u64> {
        let mut games = self.games.lock().unwrap();
        games.push(settings.clone());
        Ok(76 + games.len() as u64)
    }

    async fn record_answer(&self, stat: &AnswerStat) -> Result<()> {
        self.answers.lock().unwrap().push(stat.clone());
        Ok(())
    }
}

/// Signs by prefixing the message.
pub struct FakeKeys;

#[async_trait]
impl IdentityProvider for FakeKeys {
    async fn list_accounts(&self) -> Result<Vec<kanjiquiz_client::collab::Account>> {
        Ok(vec![kanjiquiz_client::collab::Account {
            public_key: "pk-alice".into(),
            name: "alice".into(),
        }])
    }

    async fn sign(&self, public_key: &str, message: &str) -> Result<String> {
        Ok(format!("{public_key}:{message}"))
    }
}

pub struct Setup {
    pub words: Arc<dyn WordProvider>,
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub stats: Arc<dyn StatsStore>,
    pub name: &'static str,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            words: Arc::new(StaticWordList::new(vec![word("日本"), word("山"), word("川")])),
            identity: None,
            stats: Arc::new(LogStatsStore::default()),
            name: "Alice",
        }
    }
}

pub fn session(setup: Setup) -> (Arc<SessionController>, mpsc::UnboundedReceiver<MemoryPeer>) {
    let (connector, peers) = connector();
    let metrics = Arc::new(ClientMetrics::default());
    let supply = Arc::new(SupplyCache::new(
        Arc::clone(&setup.words),
        SupplyOptions::default(),
        metrics,
    ));
    let collab = Collaborators {
        words: setup.words,
        renderer: Arc::new(PlainGlyphRenderer),
        stats: setup.stats,
        identity: setup.identity,
    };
    let opts = SessionOptions {
        display_name: setup.name.into(),
        fonts: vec!["NotoSansJP-Regular.ttf".into()],
        ..SessionOptions::default()
    };
    (
        Arc::new(SessionController::new(connector, collab, supply, opts)),
        peers,
    )
}

pub async fn expect_request(peer: &mut MemoryPeer, tag: MessageType) -> Envelope {
    let env = tokio::time::timeout(WAIT, peer.recv_envelope())
        .await
        .expect("host waited too long")
        .expect("client closed the link");
    assert_eq!(env.message_type, tag);
    env
}

/// Answer `registerClient` and `clientList` the way the host does.
pub async fn register(peer: &mut MemoryPeer, id: &str, clients: Vec<ClientInfo>) {
    let req = expect_request(peer, MessageType::InReqRegisterClient).await;
    peer.reply(
        &req,
        &OutRespClientRegistered {
            id: id.into(),
            game_settings: settings(),
        },
    )
    .await
    .unwrap();

    let req = expect_request(peer, MessageType::InReqClientList).await;
    peer.reply(&req, &OutRespClientList { clients }).await.unwrap();
}

/// Connect `session` and register it as `id` next to `clients`.
pub async fn join(
    session: &Arc<SessionController>,
    peers: &mut mpsc::UnboundedReceiver<MemoryPeer>,
    id: &str,
    clients: Vec<ClientInfo>,
) -> MemoryPeer {
    let s = Arc::clone(session);
    let connecting = tokio::spawn(async move { s.connect(ADDRESS).await });
    let mut peer = peers.recv().await.unwrap();
    register(&mut peer, id, clients).await;
    connecting.await.unwrap().unwrap();
    peer
}

pub async fn wait_state(rx: &mut watch::Receiver<SessionState>, want: SessionState) {
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == want))
        .await
        .unwrap_or_else(|_| panic!("state never became {want}"))
        .unwrap();
}

pub async fn next_event<T>(
    rx: &mut broadcast::Receiver<SessionEvent>,
    mut pick: impl FnMut(SessionEvent) -> Option<T>,
) -> T {
    tokio::time::timeout(WAIT, async {
        loop {
            if let Some(v) = pick(rx.recv().await.unwrap()) {
                return v;
            }
        }
    })
    .await
    .expect("event never arrived")
}
