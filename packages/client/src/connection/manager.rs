//! Resilience manager: one outbound link, its liveness monitor and fallback handling.
//!
//! Locking: the link and status live behind `std::sync::Mutex` and are never
//! held across an `.await`; the monitor slot is a `tokio::sync::Mutex` because
//! reconfiguration awaits the old monitor while holding it.

use std::{
    net::Ipv4Addr,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use parley_shared::protocol::{Frame, MessageType};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;

use super::{
    SignalSender, StatusListener,
    discovery::{
        CANONICAL_LOCAL_URL, DiscoveryConfig, candidate_urls, discover_among, local_ipv4_addrs,
        parse_manual_address,
    },
    liveness::{LivenessAction, LivenessTracker},
    state::ConnectionState,
};
use crate::error::ClientError;

/// Monitor and reconnect settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResilienceConfig {
    pub poll_interval: Duration,
    /// Consecutive failed polls before a fallback decision is requested
    pub failure_threshold: u32,
    pub fallback_cooldown: Duration,
    pub connect_timeout: Duration,
    /// How long reconfiguration waits for the old monitor before aborting it
    pub stop_timeout: Duration,
    pub discovery: DiscoveryConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            failure_threshold: 2,
            fallback_cooldown: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(1),
            discovery: DiscoveryConfig::default(),
        }
    }
}

/// Caller's answer to a fallback request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackDecision {
    /// Scan the LAN again
    Rediscover,
    /// `ip`, `ip:port` or a full `ws://` URL
    Manual(String),
    /// `ws://localhost:8887/ws`
    CanonicalLocal,
    /// Let the monitor resume after its cooldown
    KeepRetrying,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    Connected(String),
    /// Several servers answered; the caller picks one
    Candidates(Vec<String>),
    /// Nothing answered; local addresses are returned for guidance
    NoneFound { local_addrs: Vec<Ipv4Addr> },
    Resumed,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// A live WebSocket: outbound queue to the writer task plus the reader task
struct Link {
    outbound: mpsc::UnboundedSender<Message>,
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Link {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.outbound.is_closed()
    }

    fn send(&self, message: Message) -> bool {
        self.is_alive() && self.outbound.send(message).is_ok()
    }

    fn close(self) {
        self.alive.store(false, Ordering::Release);
        // writer flushes the close frame and exits
        let _ = self.outbound.send(Message::Close(None));
        self.reader.abort();
    }
}

async fn open_link(
    url: &str,
    timeout: Duration,
    inbound: mpsc::UnboundedSender<Frame>,
) -> Result<Link, ClientError> {
    let (ws_stream, _response) = tokio::time::timeout(timeout, connect_async(url))
        .await
        .map_err(|_| ClientError::Timeout(url.to_string()))?
        .map_err(|e| ClientError::Connection(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();
    let alive = Arc::new(AtomicBool::new(true));
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let writer_alive = alive.clone();
    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = write.send(message).await {
                tracing::warn!("WebSocket write failed: {}", e);
                writer_alive.store(false, Ordering::Release);
                break;
            }
            if closing {
                break;
            }
        }
    });

    let reader_alive = alive.clone();
    let reader = tokio::spawn(async move {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => match Frame::decode(text.as_str()) {
                    Ok(frame) => {
                        if inbound.send(frame).is_err() {
                            tracing::debug!("Inbound receiver dropped, discarding frame");
                        }
                    }
                    Err(e) => tracing::warn!("Discarding undecodable frame: {}", e),
                },
                Ok(Message::Close(_)) => {
                    tracing::info!("Server closed the connection");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    break;
                }
            }
        }
        reader_alive.store(false, Ordering::Release);
    });

    Ok(Link {
        outbound,
        alive,
        reader,
    })
}

enum Notification {
    Status { connected: bool, message: String },
    FallbackRequired { url: Option<String>, failures: u32 },
}

type ListenerSlot = Arc<Mutex<Option<Arc<dyn StatusListener>>>>;

/// Delivers notifications one at a time, in order
async fn dispatch_notifications(
    listener: ListenerSlot,
    mut notifications: mpsc::UnboundedReceiver<Notification>,
) {
    while let Some(notification) = notifications.recv().await {
        let Some(listener) = lock(&listener).clone() else {
            continue;
        };
        match notification {
            Notification::Status { connected, message } => {
                listener.on_connection_status_changed(connected, &message)
            }
            Notification::FallbackRequired { url, failures } => {
                listener.on_fallback_required(url.as_deref(), failures)
            }
        }
    }
}

#[derive(Default)]
struct Status {
    state: ConnectionState,
    url: Option<String>,
    last_error: Option<String>,
    /// Connected flag last reported to the listener
    notified: Option<bool>,
}

struct Inner {
    config: ResilienceConfig,
    inbound: mpsc::UnboundedSender<Frame>,
    link: Mutex<Option<Link>>,
    status: Mutex<Status>,
    listener: ListenerSlot,
    notifier: mpsc::UnboundedSender<Notification>,
}

impl Inner {
    fn transition(&self, state: ConnectionState, message: &str) {
        let connected = state.is_connected();
        let changed = {
            let mut status = lock(&self.status);
            if status.state != state {
                tracing::debug!("Connection state {} -> {}", status.state, state);
            }
            status.state = state;
            let changed = status.notified != Some(connected);
            status.notified = Some(connected);
            changed
        };

        if changed {
            tracing::info!("{}", message);
            let _ = self.notifier.send(Notification::Status {
                connected,
                message: message.to_string(),
            });
        }
    }

    fn record_failure(&self, error: &ClientError) {
        let reason = error.to_string();
        lock(&self.status).last_error = Some(reason.clone());
        self.transition(ConnectionState::Disconnected, &reason);
    }

    fn mark_connected(&self, message: &str) {
        lock(&self.status).last_error = None;
        self.transition(ConnectionState::Connected, message);
    }

    fn url(&self) -> Option<String> {
        lock(&self.status).url.clone()
    }

    fn install_link(&self, link: Link) {
        if let Some(old) = lock(&self.link).replace(link) {
            old.close();
        }
    }

    /// Install unless `cancel` fired; checked under the link lock so a
    /// concurrent teardown can never be overwritten.
    fn install_link_unless_cancelled(&self, link: Link, cancel: &CancellationToken) -> bool {
        let mut slot = lock(&self.link);
        if cancel.is_cancelled() {
            drop(slot);
            link.close();
            return false;
        }
        if let Some(old) = slot.replace(link) {
            old.close();
        }
        true
    }

    fn close_link(&self) {
        if let Some(old) = lock(&self.link).take() {
            old.close();
        }
    }

    fn is_link_alive(&self) -> bool {
        lock(&self.link).as_ref().is_some_and(Link::is_alive)
    }

    /// Liveness poll; the ping surfaces a dead socket as a write failure
    fn probe(&self) -> bool {
        lock(&self.link)
            .as_ref()
            .is_some_and(|link| link.send(Message::Ping(Default::default())))
    }

    async fn establish(&self, url: &str) -> Result<(), ClientError> {
        self.transition(
            ConnectionState::Connecting,
            &format!("Connecting to {}", url),
        );
        match open_link(url, self.config.connect_timeout, self.inbound.clone()).await {
            Ok(link) => {
                self.install_link(link);
                self.mark_connected(&format!("Connected to {}", url));
                Ok(())
            }
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }
}

struct Monitor {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

fn spawn_monitor(inner: Arc<Inner>) -> Monitor {
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(monitor_loop(inner, cancel.clone()));
    Monitor { cancel, handle }
}

async fn monitor_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    let config = inner.config.clone();
    let mut tracker = LivenessTracker::new(config.failure_threshold);
    tracing::debug!("Connection monitor started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(config.poll_interval) => {}
        }

        match tracker.observe(inner.probe()) {
            LivenessAction::Healthy => {}
            LivenessAction::Reconnect => {
                inner.transition(ConnectionState::Disconnected, "Connection lost");
                let Some(url) = inner.url() else {
                    continue;
                };

                inner.transition(
                    ConnectionState::Connecting,
                    &format!("Reconnecting to {}", url),
                );
                let attempt = tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = open_link(&url, config.connect_timeout, inner.inbound.clone()) => result,
                };

                match attempt {
                    Ok(link) => {
                        if !inner.install_link_unless_cancelled(link, &cancel) {
                            break;
                        }
                        tracker.reset();
                        inner.mark_connected(&format!("Reconnected to {}", url));
                    }
                    Err(e) => {
                        tracing::warn!("Reconnect to {} failed: {}", url, e);
                        inner.record_failure(&e);
                    }
                }
            }
            LivenessAction::Fallback { failures } => {
                let url = inner.url();
                tracing::warn!(
                    "{} consecutive connection failures, pausing automatic retry",
                    failures
                );
                inner.transition(ConnectionState::Retrying, "Waiting for a fallback decision");
                let _ = inner
                    .notifier
                    .send(Notification::FallbackRequired { url, failures });

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(config.fallback_cooldown) => {}
                }

                if !inner.is_link_alive() {
                    inner.transition(
                        ConnectionState::Disconnected,
                        "Resuming automatic reconnection",
                    );
                }
            }
        }
    }

    tracing::debug!("Connection monitor stopped");
}

/// Owns the process's signaling connection.
///
/// Exactly one monitor runs at a time; [`connect`](Self::connect) tears down
/// the previous link and monitor before starting new ones. Inbound frames are
/// delivered on the channel given to [`new`](Self::new).
pub struct ResilienceManager {
    inner: Arc<Inner>,
    monitor: tokio::sync::Mutex<Option<Monitor>>,
}

impl ResilienceManager {
    /// Must be called inside a Tokio runtime (spawns the notification dispatcher).
    pub fn new(config: ResilienceConfig, inbound: mpsc::UnboundedSender<Frame>) -> Self {
        let (notifier, notifications) = mpsc::unbounded_channel();
        let listener: ListenerSlot = Arc::new(Mutex::new(None));
        tokio::spawn(dispatch_notifications(listener.clone(), notifications));

        Self {
            inner: Arc::new(Inner {
                config,
                inbound,
                link: Mutex::new(None),
                status: Mutex::new(Status::default()),
                listener,
                notifier,
            }),
            monitor: tokio::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.inner.config
    }

    /// Connect to `url`, replacing any previous connection, and start monitoring it.
    ///
    /// On failure the manager stays `Disconnected` with the reason recorded,
    /// and the monitor keeps retrying the URL.
    pub async fn connect(&self, url: &str) -> Result<(), ClientError> {
        let mut monitor = self.monitor.lock().await;
        self.teardown(&mut monitor).await;

        lock(&self.inner.status).url = Some(url.to_string());
        let result = self.inner.establish(url).await;

        *monitor = Some(spawn_monitor(self.inner.clone()));
        result
    }

    /// Start the monitor for the configured URL.
    pub async fn start_monitoring(&self) -> Result<(), ClientError> {
        let mut monitor = self.monitor.lock().await;
        if monitor.as_ref().is_some_and(|m| !m.handle.is_finished()) {
            return Err(ClientError::MonitorAlreadyRunning);
        }
        if self.inner.url().is_none() {
            return Err(ClientError::NoServerUrl);
        }
        *monitor = Some(spawn_monitor(self.inner.clone()));
        Ok(())
    }

    /// Stop monitoring and close the connection.
    pub async fn stop(&self) {
        let mut monitor = self.monitor.lock().await;
        self.teardown(&mut monitor).await;
        self.inner
            .transition(ConnectionState::Disconnected, "Disconnected");
    }

    /// Cancel the monitor, close the link, then join the monitor with a bound.
    async fn teardown(&self, slot: &mut Option<Monitor>) {
        let Some(Monitor { cancel, mut handle }) = slot.take() else {
            self.inner.close_link();
            return;
        };

        cancel.cancel();
        self.inner.close_link();
        if tokio::time::timeout(self.inner.config.stop_timeout, &mut handle)
            .await
            .is_err()
        {
            tracing::warn!("Connection monitor did not stop in time, aborting it");
            handle.abort();
        }
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.inner.status).state
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.inner.status).last_error.clone()
    }

    pub fn current_url(&self) -> Option<String> {
        self.inner.url()
    }

    /// Register the status listener; the current status is reported right away.
    pub fn set_status_listener(&self, listener: Arc<dyn StatusListener>) {
        *lock(&self.inner.listener) = Some(listener);

        let (connected, message) = {
            let mut status = lock(&self.inner.status);
            let connected = status.state.is_connected();
            status.notified = Some(connected);
            let message = match (&status.url, connected) {
                (Some(url), true) => format!("Connected to {}", url),
                (_, false) => match &status.last_error {
                    Some(reason) => reason.clone(),
                    None => "Disconnected".to_string(),
                },
                (None, true) => "Connected".to_string(),
            };
            (connected, message)
        };
        let _ = self
            .inner
            .notifier
            .send(Notification::Status { connected, message });
    }

    pub async fn apply_fallback(
        &self,
        decision: FallbackDecision,
    ) -> Result<FallbackOutcome, ClientError> {
        let discovery = &self.inner.config.discovery;
        match decision {
            FallbackDecision::Rediscover => {
                let candidates = candidate_urls(discovery, &local_ipv4_addrs());
                self.rediscover_among(candidates).await
            }
            FallbackDecision::Manual(address) => {
                let url = parse_manual_address(&address, discovery.port, &discovery.path)?;
                self.connect(&url).await?;
                Ok(FallbackOutcome::Connected(url))
            }
            FallbackDecision::CanonicalLocal => {
                self.connect(CANONICAL_LOCAL_URL).await?;
                Ok(FallbackOutcome::Connected(CANONICAL_LOCAL_URL.to_string()))
            }
            FallbackDecision::KeepRetrying => {
                tracing::info!("Keeping automatic retry");
                Ok(FallbackOutcome::Resumed)
            }
        }
    }

    /// Probe `candidates`; a single responsive server is connected without asking.
    pub async fn rediscover_among(
        &self,
        candidates: Vec<String>,
    ) -> Result<FallbackOutcome, ClientError> {
        let servers = discover_among(&self.inner.config.discovery, candidates).await;
        match servers.as_slice() {
            [] => Ok(FallbackOutcome::NoneFound {
                local_addrs: local_ipv4_addrs(),
            }),
            [only] => {
                let url = only.clone();
                self.connect(&url).await?;
                Ok(FallbackOutcome::Connected(url))
            }
            _ => Ok(FallbackOutcome::Candidates(servers)),
        }
    }
}

impl SignalSender for ResilienceManager {
    fn send(
        &self,
        kind: MessageType,
        room_id: &str,
        sender: &str,
        payload: &str,
    ) -> Result<(), ClientError> {
        let frame = Frame::new(kind, room_id, sender, payload);
        frame.validate()?;

        let sent = lock(&self.inner.link)
            .as_ref()
            .is_some_and(|link| link.send(Message::Text(frame.encode().into())));

        if sent {
            tracing::debug!("Sent {} frame to room '{}'", frame.kind, frame.room_id);
            Ok(())
        } else {
            if self.state().is_connected() {
                self.inner
                    .transition(ConnectionState::Disconnected, "Connection lost while sending");
            }
            Err(ClientError::NotConnected)
        }
    }

    fn is_connected(&self) -> bool {
        self.state().is_connected() && self.inner.is_link_alive()
    }
}

impl Drop for ResilienceManager {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.get_mut().take() {
            monitor.cancel.cancel();
            monitor.handle.abort();
        }
        self.inner.close_link();
    }
}
