//! kanjiquiz client
//!
//! Connects to a host, registers under the configured name and logs what
//! happens in the session until Ctrl-C.
//! - Config: first argument, `kanjiquiz.yaml` by default
//! - Words: `words_file` (JSON list), empty supply otherwise
//! - Log level: `RUST_LOG`

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use kanjiquiz_client::collab::local::{LogStatsStore, PlainGlyphRenderer, StaticWordList};
use kanjiquiz_client::collab::Collaborators;
use kanjiquiz_client::config;
use kanjiquiz_client::connector::{Connector, ConnectorOptions};
use kanjiquiz_client::obs::ClientMetrics;
use kanjiquiz_client::session::{SessionController, SessionEvent, SessionOptions, SessionState};
use kanjiquiz_client::supply::{SupplyCache, SupplyOptions};
use kanjiquiz_client::transport::ws::WsDialer;

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "kanjiquiz.yaml".to_string());
    let cfg = config::load_from_file(&path).expect("config load failed");

    let words = match &cfg.words_file {
        Some(file) => StaticWordList::from_file(file).expect("words_file load failed"),
        None => {
            tracing::warn!("no words_file configured; this client cannot serve questions");
            StaticWordList::new(Vec::new())
        }
    };
    if cfg.session.account.is_some() {
        tracing::warn!("session.account is set but no key manager is bundled; skipping signature");
    }

    let metrics = Arc::new(ClientMetrics::default());
    let dialer = Arc::new(WsDialer::from_config(&cfg.connection));
    let connector = Arc::new(Connector::with_metrics(
        dialer,
        ConnectorOptions::from(&cfg.connection),
        Arc::clone(&metrics),
    ));

    let words = Arc::new(words);
    let collab = Collaborators {
        words: words.clone(),
        renderer: Arc::new(PlainGlyphRenderer),
        stats: Arc::new(LogStatsStore::default()),
        identity: None,
    };
    let supply = Arc::new(SupplyCache::new(
        words,
        SupplyOptions::from(&cfg.supply),
        Arc::clone(&metrics),
    ));
    let session = SessionController::new(
        connector,
        collab,
        supply,
        SessionOptions::from(&cfg.session),
    );

    let mut events = session.subscribe();
    tracing::info!(address = %cfg.connection.address, "kanjiquiz-client starting");
    if let Err(e) = session.connect(&cfg.connection.address).await {
        tracing::error!(code = e.kind().as_str(), error = %e, "could not join host");
        return;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            ev = events.recv() => match ev {
                Ok(SessionEvent::StateChanged { to, .. }) if to == SessionState::Off => {
                    tracing::info!("session ended");
                    break;
                }
                Ok(ev) => tracing::info!(event = ?ev, "session"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "session events lagged");
                }
                Err(_) => break,
            },
        }
    }

    session.disconnect().await;
    tracing::debug!(metrics = %metrics.render(), "final metrics");
}
