//! Reconnecting, heartbeating WebSocket client with subscription replay (spec §4.9, §5).
//!
//! One [`WsClient`] owns exactly one venue URL (spec §3: "a table of WebSocket transports keyed
//! by URL"). Per-channel dispatch filtering and payload shape-transformation is a driver
//! concern built on top of the raw inbound [`WsEvent`] stream this type emits.

use crate::error::SocketError;
use crate::protocol::websocket::{WsConnection, WsMessage, WsTransport};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(60);
const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// A registered `(id, sub-message, ...)` pair (spec §4.9): re-sent verbatim, in registration
/// order, on every reconnect.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: String,
    pub message: WsMessage,
}

/// The two heartbeat families from spec §4.9.
#[derive(Debug, Clone)]
pub enum Heartbeat {
    /// No custom heartbeat: rely on the underlying transport's protocol pings, if any.
    None,
    /// Send protocol-level WebSocket PING frames every `interval`; terminate if no PONG arrives
    /// within `pong_timeout`.
    Protocol {
        interval: Duration,
        pong_timeout: Duration,
    },
    /// Send an application-level JSON payload every `interval` (Kraken/KuCoin/Bitrue/Pionex/
    /// LBank style heartbeats); the driver is responsible for recognising and swallowing the
    /// peer's own ping/pong messages in its dispatch layer.
    AppLevel { interval: Duration, payload: WsMessage },
}

/// An event surfaced to the driver layer above the raw transport.
#[derive(Debug)]
pub enum WsEvent {
    Connected,
    Reconnected,
    Message(WsMessage),
    Error(SocketError),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum ConnState {
    Disconnected,
    Connecting,
    Connected,
}

struct Shared {
    transport: Arc<dyn WsTransport>,
    url: String,
    heartbeat: Heartbeat,
    subscriptions: Mutex<Vec<Subscription>>,
    intentional_close: AtomicBool,
    reconnect_attempts: AtomicU32,
    state: Mutex<ConnState>,
}

/// Handle to a running reconnecting WebSocket client. Dropping the handle does not stop the
/// background task; call [`WsClient::close`] for an intentional, non-reconnecting shutdown.
#[derive(Clone)]
pub struct WsClient {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<OutboundCommand>,
}

enum OutboundCommand {
    Send(WsMessage),
}

impl WsClient {
    /// Connects and spawns the reconnect/heartbeat loop, returning the client handle and the
    /// inbound event receiver.
    pub fn connect(
        transport: Arc<dyn WsTransport>,
        url: impl Into<String>,
        heartbeat: Heartbeat,
    ) -> (Self, mpsc::UnboundedReceiver<WsEvent>) {
        let shared = Arc::new(Shared {
            transport,
            url: url.into(),
            heartbeat,
            subscriptions: Mutex::new(Vec::new()),
            intentional_close: AtomicBool::new(false),
            reconnect_attempts: AtomicU32::new(0),
            state: Mutex::new(ConnState::Disconnected),
        });

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_loop(shared.clone(), event_tx, outbound_rx));

        (
            Self {
                shared,
                outbound: outbound_tx,
            },
            event_rx,
        )
    }

    /// Registers a subscription for (re)send. If already connected, sends it immediately;
    /// otherwise it is sent on the next successful connect (including reconnects).
    ///
    /// Returns an error if [`WsClient::close`] has already begun (spec §5: "no subscription may
    /// be added after close-all begins").
    pub async fn subscribe(&self, subscription: Subscription) -> Result<(), SocketError> {
        if self.shared.intentional_close.load(Ordering::SeqCst) {
            return Err(SocketError::Subscribe(
                "cannot subscribe: client is closing".to_string(),
            ));
        }

        let message = subscription.message.clone();
        self.shared.subscriptions.lock().await.push(subscription);

        if *self.shared.state.lock().await == ConnState::Connected {
            let _ = self.outbound.send(OutboundCommand::Send(message));
        }

        Ok(())
    }

    /// Sends an arbitrary message over the current connection (no-op if disconnected; the
    /// message is not queued for replay).
    pub fn send(&self, message: WsMessage) {
        let _ = self.outbound.send(OutboundCommand::Send(message));
    }

    /// Intentional close: suppresses reconnect and prevents new subscriptions.
    pub fn close(&self) {
        self.shared.intentional_close.store(true, Ordering::SeqCst);
        let _ = self.outbound.send(OutboundCommand::Send(WsMessage::Close));
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.reconnect_attempts.load(Ordering::SeqCst)
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<WsEvent>,
    mut outbound: mpsc::UnboundedReceiver<OutboundCommand>,
) {
    loop {
        if shared.intentional_close.load(Ordering::SeqCst) {
            *shared.state.lock().await = ConnState::Disconnected;
            return;
        }

        *shared.state.lock().await = ConnState::Connecting;

        let mut connection = match shared.transport.connect(&shared.url).await {
            Ok(conn) => conn,
            Err(error) => {
                warn!(?error, url = %shared.url, "WebSocket connect failed");
                let _ = events.send(WsEvent::Error(error));
                backoff_sleep(&shared).await;
                continue;
            }
        };

        let is_first_connect = shared.reconnect_attempts.load(Ordering::SeqCst) == 0;
        *shared.state.lock().await = ConnState::Connected;

        // Replay every active subscription, in registration order, before surfacing any
        // application message (spec §5, §8 scenario 6).
        let replay: Vec<WsMessage> = shared
            .subscriptions
            .lock()
            .await
            .iter()
            .map(|s| s.message.clone())
            .collect();

        let mut replay_failed = false;
        for message in replay {
            if let Err(error) = connection.send(message).await {
                warn!(?error, "failed to replay subscription on connect");
                replay_failed = true;
                break;
            }
        }

        if replay_failed {
            let _ = connection.close().await;
            backoff_sleep(&shared).await;
            continue;
        }

        let _ = events.send(if is_first_connect {
            WsEvent::Connected
        } else {
            WsEvent::Reconnected
        });
        shared.reconnect_attempts.store(0, Ordering::SeqCst);

        let disconnect_reason = drive_connection(&shared, connection.as_mut(), &events, &mut outbound).await;

        *shared.state.lock().await = ConnState::Disconnected;

        if shared.intentional_close.load(Ordering::SeqCst) {
            return;
        }

        debug!(?disconnect_reason, url = %shared.url, "WebSocket disconnected, scheduling reconnect");
        backoff_sleep(&shared).await;
    }
}

#[derive(Debug)]
enum Disconnect {
    PeerClosed,
    PongTimeout,
    Error,
}

async fn drive_connection(
    shared: &Arc<Shared>,
    connection: &mut dyn WsConnection,
    events: &mpsc::UnboundedSender<WsEvent>,
    outbound: &mut mpsc::UnboundedReceiver<OutboundCommand>,
) -> Disconnect {
    let (heartbeat_interval, pong_timeout) = match &shared.heartbeat {
        Heartbeat::Protocol { interval, pong_timeout } => (Some(*interval), Some(*pong_timeout)),
        Heartbeat::AppLevel { interval, .. } => (Some(*interval), None),
        Heartbeat::None => (None, None),
    };

    let mut heartbeat_ticker = heartbeat_interval.map(tokio::time::interval);
    let mut awaiting_pong_since: Option<tokio::time::Instant> = None;

    loop {
        // A sentinel far-future duration when no pong is outstanding, so this branch is a
        // cheap no-op rather than requiring a guarded/pending future.
        let pong_sleep = match (awaiting_pong_since, pong_timeout) {
            (Some(since), Some(timeout)) => {
                (since + timeout).saturating_duration_since(tokio::time::Instant::now())
            }
            _ => Duration::from_secs(365 * 24 * 3600),
        };

        tokio::select! {
            biased;

            _ = tokio::time::sleep(pong_sleep) => {
                if awaiting_pong_since.is_some() {
                    warn!("pong deadline exceeded, terminating connection");
                    let _ = connection.close().await;
                    return Disconnect::PongTimeout;
                }
            }

            Some(tick) = async {
                match &mut heartbeat_ticker {
                    Some(ticker) => Some(ticker.tick().await),
                    None => None,
                }
            } => {
                let _ = tick;
                match &shared.heartbeat {
                    Heartbeat::Protocol { .. } => {
                        if connection.send(WsMessage::Ping(Vec::new())).await.is_err() {
                            return Disconnect::Error;
                        }
                        awaiting_pong_since.get_or_insert_with(tokio::time::Instant::now);
                    }
                    Heartbeat::AppLevel { payload, .. } => {
                        if connection.send(payload.clone()).await.is_err() {
                            return Disconnect::Error;
                        }
                    }
                    Heartbeat::None => {}
                }
            }

            command = outbound.recv() => {
                match command {
                    Some(OutboundCommand::Send(message)) => {
                        if connection.send(message).await.is_err() {
                            return Disconnect::Error;
                        }
                    }
                    None => return Disconnect::Error,
                }
            }

            message = connection.recv() => {
                match message {
                    None => return Disconnect::PeerClosed,
                    Some(Err(error)) => {
                        let _ = events.send(WsEvent::Error(error));
                        return Disconnect::Error;
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        awaiting_pong_since = None;
                    }
                    Some(Ok(WsMessage::Close)) => {
                        return Disconnect::PeerClosed;
                    }
                    Some(Ok(other)) => {
                        let _ = events.send(WsEvent::Message(other));
                    }
                }
            }
        }
    }
}

async fn backoff_sleep(shared: &Arc<Shared>) {
    let attempt = shared.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
    let exponential = BASE_BACKOFF.saturating_mul(1u32 << attempt.min(10));
    let capped = exponential.min(MAX_BACKOFF);
    let jitter_factor = rand::rng().random_range(0.0..0.25);
    let jittered = capped.mul_f64(1.0 + jitter_factor);
    tokio::time::sleep(jittered).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc as tmpsc;

    #[derive(Debug)]
    struct FakeTransport {
        connect_count: Arc<AtomicUsize>,
        inbound: Arc<Mutex<Option<tmpsc::UnboundedReceiver<Result<WsMessage, SocketError>>>>>,
        sent: Arc<Mutex<Vec<WsMessage>>>,
        fail_first_n_connects: usize,
    }

    #[derive(Debug)]
    struct FakeConnection {
        inbound: tmpsc::UnboundedReceiver<Result<WsMessage, SocketError>>,
        sent: Arc<Mutex<Vec<WsMessage>>>,
    }

    #[async_trait]
    impl WsConnection for FakeConnection {
        async fn send(&mut self, message: WsMessage) -> Result<(), SocketError> {
            self.sent.lock().await.push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<WsMessage, SocketError>> {
            self.inbound.recv().await
        }

        async fn close(&mut self) -> Result<(), SocketError> {
            Ok(())
        }
    }

    #[async_trait]
    impl WsTransport for FakeTransport {
        async fn connect(&self, _url: &str) -> Result<Box<dyn WsConnection>, SocketError> {
            let n = self.connect_count.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n_connects {
                return Err(SocketError::Subscribe("simulated connect failure".into()));
            }
            let inbound = self
                .inbound
                .lock()
                .await
                .take()
                .expect("FakeTransport only connects once per test");
            Ok(Box::new(FakeConnection {
                inbound,
                sent: self.sent.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn replays_subscriptions_before_surfacing_messages() {
        let (inbound_tx, inbound_rx) = tmpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(FakeTransport {
            connect_count: Arc::new(AtomicUsize::new(0)),
            inbound: Arc::new(Mutex::new(Some(inbound_rx))),
            sent: sent.clone(),
            fail_first_n_connects: 0,
        });

        let (client, mut events) = WsClient::connect(transport, "wss://fake", Heartbeat::None);

        client
            .subscribe(Subscription {
                id: "a".into(),
                message: WsMessage::Text("sub-a".into()),
            })
            .await
            .unwrap();
        client
            .subscribe(Subscription {
                id: "b".into(),
                message: WsMessage::Text("sub-b".into()),
            })
            .await
            .unwrap();

        inbound_tx
            .send(Ok(WsMessage::Text("app-message".into())))
            .unwrap();

        // Drain the Connected event, then the forwarded application message.
        assert!(matches!(events.recv().await, Some(WsEvent::Connected)));
        assert!(matches!(events.recv().await, Some(WsEvent::Message(_))));

        let sent_snapshot = sent.lock().await.clone();
        let sent_texts: Vec<String> = sent_snapshot
            .into_iter()
            .filter_map(|m| match m {
                WsMessage::Text(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(sent_texts, vec!["sub-a".to_string(), "sub-b".to_string()]);
    }
}
