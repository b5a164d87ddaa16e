//! RPC multiplexer over one duplex channel.
//!
//! One reader task per link drains inbound frames in arrival order. A frame
//! whose correlation id is pending completes that request; anything else is
//! turned into a `ConnectorEvent` and fanned out on the bus. When the reader
//! exits it fails what is still pending and publishes `SocketClosed`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use kanjiquiz_core::error::{QuizError, Result};
use kanjiquiz_core::protocol::{Envelope, Family};

use super::events::{ConnectorEvent, EventBus};
use super::registry::CorrelationRegistry;
use crate::config::ConnectionSection;
use crate::obs::ClientMetrics;
use crate::transport::codec::{self, Inbound};
use crate::transport::{Dialer, Frame};

#[derive(Debug, Clone, Copy)]
pub struct ConnectorOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&ConnectionSection> for ConnectorOptions {
    fn from(cfg: &ConnectionSection) -> Self {
        Self {
            connect_timeout: Duration::from_millis(cfg.connect_timeout_ms),
            request_timeout: Duration::from_millis(cfg.request_timeout_ms),
        }
    }
}

struct Link {
    id: u64,
    outbound: mpsc::Sender<Frame>,
    registry: Arc<CorrelationRegistry>,
    shutdown: oneshot::Sender<()>,
    reader: JoinHandle<()>,
}

impl Link {
    async fn shutdown(self) {
        let _ = self.outbound.try_send(Frame::Close);
        let _ = self.shutdown.send(());
        if let Err(e) = self.reader.await {
            tracing::error!(link = self.id, error = %e, "reader task failed");
        }
    }
}

pub struct Connector {
    dialer: Arc<dyn Dialer>,
    opts: ConnectorOptions,
    link: Mutex<Option<Link>>,
    link_seq: AtomicU64,
    bus: Arc<EventBus>,
    metrics: Arc<ClientMetrics>,
}

impl Connector {
    pub fn new(dialer: Arc<dyn Dialer>, opts: ConnectorOptions) -> Self {
        Self::with_metrics(dialer, opts, Arc::new(ClientMetrics::default()))
    }

    pub fn with_metrics(
        dialer: Arc<dyn Dialer>,
        opts: ConnectorOptions,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        Self {
            dialer,
            opts,
            link: Mutex::new(None),
            link_seq: AtomicU64::new(1),
            bus: Arc::new(EventBus::new()),
            metrics,
        }
    }

    pub fn options(&self) -> ConnectorOptions {
        self.opts
    }

    pub fn metrics(&self) -> &Arc<ClientMetrics> {
        &self.metrics
    }

    /// Unsolicited events of every link opened from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ConnectorEvent> {
        self.bus.subscribe()
    }

    /// Open a link to `address`, closing any previous one first.
    pub async fn connect(&self, address: &str) -> Result<()> {
        let mut slot = self.link.lock().await;
        if let Some(old) = slot.take() {
            tracing::debug!(link = old.id, "replacing open link");
            old.shutdown().await;
        }

        let channel = match tokio::time::timeout(self.opts.connect_timeout, self.dialer.dial(address)).await {
            Ok(res) => res?,
            Err(_) => {
                tracing::warn!(address, timeout_ms = self.opts.connect_timeout.as_millis() as u64, "connect timed out");
                return Err(QuizError::ConnectTimeout(self.opts.connect_timeout));
            }
        };

        let id = self.link_seq.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::new(CorrelationRegistry::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let reader = tokio::spawn(read_loop(
            id,
            channel.inbound,
            shutdown_rx,
            Arc::clone(&registry),
            Arc::clone(&self.bus),
            Arc::clone(&self.metrics),
        ));

        *slot = Some(Link {
            id,
            outbound: channel.outbound,
            registry,
            shutdown: shutdown_tx,
            reader,
        });
        tracing::info!(link = id, address, "connected");
        Ok(())
    }

    /// Close the link and wait for its reader to finish.
    /// `SocketClosed` has been published by the time this returns.
    pub async fn disconnect(&self) {
        let link = self.link.lock().await.take();
        if let Some(link) = link {
            let id = link.id;
            link.shutdown().await;
            tracing::info!(link = id, "disconnected");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.link
            .lock()
            .await
            .as_ref()
            .map(|l| !l.registry.is_closed())
            .unwrap_or(false)
    }

    /// Requests on the current link still waiting for a reply.
    pub async fn pending_requests(&self) -> usize {
        self.link.lock().await.as_ref().map_or(0, |l| l.registry.len())
    }

    async fn handles(&self) -> Result<(mpsc::Sender<Frame>, Arc<CorrelationRegistry>)> {
        let slot = self.link.lock().await;
        let link = slot.as_ref().ok_or(QuizError::NotConnected)?;
        if link.registry.is_closed() {
            return Err(QuizError::ConnectionClosed);
        }
        Ok((link.outbound.clone(), Arc::clone(&link.registry)))
    }

    /// Request with the default timeout.
    pub async fn request(&self, env: Envelope) -> Result<Envelope> {
        self.request_with_timeout(env, self.opts.request_timeout).await
    }

    /// Send `env` and wait for the envelope carrying the same correlation id.
    ///
    /// Resolves exactly once: with the reply, with `RequestTimeout`, or with
    /// `ConnectionClosed` if the link ends first.
    pub async fn request_with_timeout(&self, env: Envelope, timeout: Duration) -> Result<Envelope> {
        if env.correlation_id.is_empty() {
            return Err(QuizError::MalformedEnvelope("request without correlation id".into()));
        }
        let (outbound, registry) = self.handles().await?;
        let tag = env.message_type.to_string();
        let id = env.correlation_id.clone();
        let frame = codec::encode(&env)?;

        let started = Instant::now();
        let mut rx = registry.insert(id.clone(), env.message_type.clone(), started + timeout)?;
        if outbound.send(frame).await.is_err() {
            registry.remove(&id);
            self.metrics.requests.inc(&[("type", &tag), ("outcome", "closed")]);
            return Err(QuizError::ConnectionClosed);
        }
        tracing::trace!(correlation_id = %id, message_type = %tag, "request sent");

        let res = match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(QuizError::ConnectionClosed),
            Err(_) => {
                if registry.remove(&id) {
                    tracing::debug!(correlation_id = %id, message_type = %tag, "request timed out");
                    Err(QuizError::RequestTimeout {
                        correlation_id: id,
                        timeout,
                    })
                } else {
                    // The reader removed the entry first; its reply is in the channel.
                    rx.await.unwrap_or(Err(QuizError::ConnectionClosed))
                }
            }
        };

        let outcome = match &res {
            Ok(_) => "ok",
            Err(QuizError::RequestTimeout { .. }) => "timeout",
            Err(QuizError::ConnectionClosed) => "closed",
            Err(_) => "error",
        };
        self.metrics.requests.inc(&[("type", &tag), ("outcome", outcome)]);
        self.metrics.request_latency.observe(&[("type", &tag)], started.elapsed());
        res
    }

    /// Fire-and-forget write.
    pub async fn send(&self, env: Envelope) -> Result<()> {
        let (outbound, _) = self.handles().await?;
        let frame = codec::encode(&env)?;
        outbound
            .send(frame)
            .await
            .map_err(|_| QuizError::ConnectionClosed)
    }
}

async fn read_loop(
    link: u64,
    mut inbound: mpsc::Receiver<Frame>,
    mut shutdown: oneshot::Receiver<()>,
    registry: Arc<CorrelationRegistry>,
    bus: Arc<EventBus>,
    metrics: Arc<ClientMetrics>,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            f = inbound.recv() => match f {
                Some(f) => f,
                None => break,
            },
        };

        match codec::decode(frame) {
            Ok(Inbound::Envelope { env, .. }) => route(link, env, &registry, &bus, &metrics),
            Ok(Inbound::Close) => break,
            Err(e) => {
                metrics.dropped.inc(&[("reason", "malformed")]);
                tracing::warn!(link, error = %e, "undecodable frame dropped");
            }
        }
    }

    let failed = registry.close();
    if failed > 0 {
        tracing::debug!(link, failed, "pending requests failed on close");
    }
    tracing::info!(link, "socket closed");
    bus.publish(ConnectorEvent::SocketClosed);
}

fn route(link: u64, env: Envelope, registry: &CorrelationRegistry, bus: &EventBus, metrics: &ClientMetrics) {
    if env.correlation_id.is_empty() {
        metrics.dropped.inc(&[("reason", "no_correlation")]);
        tracing::warn!(link, message_type = %env.message_type, "envelope without correlation id dropped");
        return;
    }

    let Some(env) = registry.complete(env) else {
        return;
    };

    match ConnectorEvent::from_envelope(&env) {
        Ok(Some(ev)) => {
            metrics.notifications.inc(&[("type", ev.name())]);
            tracing::debug!(link, event = ev.name(), correlation_id = %env.correlation_id, "event");
            bus.publish(ev);
        }
        Ok(None) => match env.message_type.family() {
            Family::OutResponse => {
                metrics.dropped.inc(&[("reason", "late_reply")]);
                tracing::debug!(
                    link,
                    message_type = %env.message_type,
                    correlation_id = %env.correlation_id,
                    "reply without pending request dropped"
                );
            }
            Family::Unknown => {
                metrics.dropped.inc(&[("reason", "unknown_type")]);
                tracing::warn!(link, message_type = %env.message_type, "unknown message type dropped");
            }
            family => {
                // client-bound traffic only carries OUT_* tags
                metrics.dropped.inc(&[("reason", "misdirected")]);
                tracing::warn!(link, message_type = %env.message_type, ?family, "host sent a client tag");
            }
        },
        Err(e) => {
            metrics.dropped.inc(&[("reason", "malformed")]);
            tracing::warn!(link, message_type = %env.message_type, error = %e, "bad notification payload dropped");
        }
    }
}
