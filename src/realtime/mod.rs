//! Persistent live-update channel for a single focused match.
//!
//! One background task owns the whole connection lifecycle as an explicit
//! state machine:
//!
//! ```text
//!  Idle ──target──▶ Connecting ──open+subscribe──▶ Open
//!                      ▲   │fail                    │lost
//!                      │   ▼                        ▼
//!                      └── Reconnecting ◀───────────┘
//!                            │attempts exhausted
//!                            ▼
//!                          Closed  (parked until a new target arrives)
//! ```
//!
//! Backoff sleeps and connect attempts are preempted by commands on the
//! same `select!`, so clearing or replacing the target cancels the pending
//! timer before the state settles — a stale retry can never revive a
//! torn-down session. Updates land in a fixed-capacity ring buffer; while
//! disconnected the buffer simply keeps its last entries.

#![allow(dead_code)]

pub mod frames;

pub use frames::{parse_frame, subscribe_frame, FeedFrame, Subscription, Tier};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle of one channel client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "disconnected",
        }
    }
}

/// Exponential backoff with a ceiling and a bounded attempt budget.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base: Duration,
    max: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        ReconnectPolicy {
            base,
            max,
            max_attempts,
            attempt: 0,
        }
    }

    /// Delay before the next retry, or `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(self.attempt).unwrap_or(u32::MAX);
        let delay = self.base.saturating_mul(factor).min(self.max);
        self.attempt += 1;
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[derive(Debug, Clone)]
pub struct MatchFeedConfig {
    pub url: String,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub buffer_capacity: usize,
    pub ping_interval: Duration,
}

impl MatchFeedConfig {
    pub fn new(url: impl Into<String>) -> Self {
        MatchFeedConfig {
            url: url.into(),
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 10,
            buffer_capacity: 256,
            ping_interval: Duration::from_secs(25),
        }
    }
}

/// One buffered inbound update.
#[derive(Debug, Clone)]
pub struct FeedUpdate {
    pub kind: UpdateKind,
    pub match_id: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Snapshot,
    Delta,
    State,
}

/// Fixed-capacity buffer: pushing past capacity evicts the oldest entry.
#[derive(Debug)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        RingBuffer {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> RingBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

enum Command {
    Subscribe(Subscription),
    Clear,
}

/// Live update channel client, scoped to one subscription target at a time.
pub struct MatchFeed {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    buffer: Arc<RwLock<RingBuffer<FeedUpdate>>>,
    task: JoinHandle<()>,
}

impl MatchFeed {
    pub fn new(config: MatchFeedConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let buffer = Arc::new(RwLock::new(RingBuffer::new(config.buffer_capacity)));
        let task = tokio::spawn(feed_loop(config, cmd_rx, state_tx, Arc::clone(&buffer)));
        MatchFeed {
            cmd_tx,
            state_rx,
            buffer,
            task,
        }
    }

    /// Assign a new subscription target. Resets the attempt budget and
    /// connects immediately, replacing any previous target.
    pub fn subscribe(&self, sub: Subscription) {
        let _ = self.cmd_tx.send(Command::Subscribe(sub));
    }

    /// Drop the current target: closes the channel, cancels any pending
    /// retry and parks the client in `Idle`.
    pub fn clear(&self) {
        let _ = self.cmd_tx.send(Command::Clear);
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch channel for state transitions (e.g. a disconnected indicator).
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// All buffered updates, oldest first.
    pub async fn updates(&self) -> Vec<FeedUpdate> {
        self.buffer.read().await.to_vec()
    }

    pub async fn latest_update(&self) -> Option<FeedUpdate> {
        self.buffer.read().await.latest().cloned()
    }
}

impl Drop for MatchFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum OpenExit {
    /// Transport lost; back off and reconnect.
    Lost,
    /// Target cleared while open.
    Cleared,
    /// Target replaced while open.
    Retarget(Subscription),
    /// Command channel gone; the owning handle was dropped.
    Shutdown,
}

async fn feed_loop(
    config: MatchFeedConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    buffer: Arc<RwLock<RingBuffer<FeedUpdate>>>,
) {
    let mut target: Option<Subscription> = None;
    let mut exhausted = false;
    let mut policy = ReconnectPolicy::new(config.base_delay, config.max_delay, config.max_attempts);

    loop {
        // Park while there is nothing to do: no target (Idle) or the
        // attempt budget is spent (Closed, until a new target arrives).
        while target.is_none() || exhausted {
            let parked = if target.is_none() {
                ConnectionState::Idle
            } else {
                ConnectionState::Closed
            };
            let _ = state_tx.send(parked);
            match cmd_rx.recv().await {
                Some(cmd) => {
                    apply_command(cmd, &mut target, &mut policy, &mut exhausted, &buffer).await
                }
                None => return,
            }
        }
        let Some(sub) = target.clone() else { continue };

        let _ = state_tx.send(ConnectionState::Connecting);
        let established = tokio::select! {
            result = connect_and_subscribe(&config, &sub) => result,
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { return };
                apply_command(cmd, &mut target, &mut policy, &mut exhausted, &buffer).await;
                continue;
            }
        };

        match established {
            Ok(socket) => {
                info!("[feed] channel open for {}", sub.match_id);
                policy.reset();
                let _ = state_tx.send(ConnectionState::Open);
                match drive_open(socket, &config, &sub, &mut cmd_rx, &buffer).await {
                    OpenExit::Lost => {}
                    OpenExit::Cleared => {
                        target = None;
                        exhausted = false;
                        continue;
                    }
                    OpenExit::Retarget(new_sub) => {
                        target = Some(new_sub);
                        policy.reset();
                        exhausted = false;
                        buffer.write().await.clear();
                        continue;
                    }
                    OpenExit::Shutdown => return,
                }
            }
            Err(e) => warn!("[feed] connection failed: {}", e),
        }

        // Transport lost or never established: back off before retrying.
        let _ = state_tx.send(ConnectionState::Reconnecting);
        match policy.next_delay() {
            None => {
                warn!("[feed] reconnect attempts exhausted for {}", sub.match_id);
                exhausted = true;
            }
            Some(delay) => {
                debug!(
                    "[feed] reconnecting to {} in {:?} (attempt {})",
                    sub.match_id,
                    delay,
                    policy.attempt()
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else { return };
                        // A command cancels the pending backoff outright.
                        apply_command(cmd, &mut target, &mut policy, &mut exhausted, &buffer).await;
                    }
                }
            }
        }
    }
}

async fn apply_command(
    cmd: Command,
    target: &mut Option<Subscription>,
    policy: &mut ReconnectPolicy,
    exhausted: &mut bool,
    buffer: &Arc<RwLock<RingBuffer<FeedUpdate>>>,
) {
    match cmd {
        Command::Subscribe(sub) => {
            debug!("[feed] target set to {}", sub.match_id);
            *target = Some(sub);
            policy.reset();
            *exhausted = false;
            buffer.write().await.clear();
        }
        Command::Clear => {
            debug!("[feed] target cleared");
            *target = None;
            *exhausted = false;
        }
    }
}

async fn connect_and_subscribe(
    config: &MatchFeedConfig,
    sub: &Subscription,
) -> Result<Socket, tokio_tungstenite::tungstenite::Error> {
    let (mut socket, _response) = tokio_tungstenite::connect_async(config.url.as_str()).await?;
    socket.send(Message::Text(subscribe_frame(sub))).await?;
    Ok(socket)
}

async fn drive_open(
    socket: Socket,
    config: &MatchFeedConfig,
    sub: &Subscription,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    buffer: &Arc<RwLock<RingBuffer<FeedUpdate>>>,
) -> OpenExit {
    let (mut write, mut read) = socket.split();
    let mut ping_interval = tokio::time::interval(config.ping_interval);

    loop {
        tokio::select! {
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let Some(frame) = parse_frame(&text) else {
                            debug!("[feed] malformed frame dropped");
                            continue;
                        };
                        let Some(update) = frame_to_update(frame) else {
                            continue; // pong, transport-level only
                        };
                        // Frames for anything but the current target are
                        // stale cross-generation traffic.
                        if update.match_id == sub.match_id {
                            buffer.write().await.push(update);
                        } else {
                            debug!(
                                "[feed] update for unsubscribed target {} dropped",
                                update.match_id
                            );
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        warn!("[feed] server closed the channel");
                        return OpenExit::Lost;
                    }
                    Some(Err(e)) => {
                        error!("[feed] transport error: {}", e);
                        return OpenExit::Lost;
                    }
                    None => {
                        warn!("[feed] channel stream ended");
                        return OpenExit::Lost;
                    }
                    _ => {}
                }
            }
            cmd = cmd_rx.recv() => {
                // Close the channel before the state machine moves on.
                let _ = write.close().await;
                return match cmd {
                    Some(Command::Clear) => OpenExit::Cleared,
                    Some(Command::Subscribe(new_sub)) => OpenExit::Retarget(new_sub),
                    None => OpenExit::Shutdown,
                };
            }
            _ = ping_interval.tick() => {
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    error!("[feed] ping failed: {}", e);
                    return OpenExit::Lost;
                }
            }
        }
    }
}

fn frame_to_update(frame: FeedFrame) -> Option<FeedUpdate> {
    let (kind, match_id, payload) = match frame {
        FeedFrame::Snapshot { target_id, payload } => (UpdateKind::Snapshot, target_id, payload),
        FeedFrame::Delta { target_id, payload } => (UpdateKind::Delta, target_id, payload),
        FeedFrame::State { target_id, payload } => (UpdateKind::State, target_id, payload),
        FeedFrame::Pong => return None,
    };
    Some(FeedUpdate {
        kind,
        match_id,
        payload,
        received_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    #[test]
    fn test_backoff_sequence_and_exhaustion() {
        let mut policy = ReconnectPolicy::new(
            Duration::from_millis(1000),
            Duration::from_millis(30_000),
            10,
        );
        let mut delays = Vec::new();
        while let Some(d) = policy.next_delay() {
            delays.push(d.as_millis() as u64);
        }
        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16_000, 30_000, 30_000, 30_000, 30_000, 30_000]
        );
        assert_eq!(policy.next_delay(), None, "budget stays spent");

        policy.reset();
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn test_backoff_shift_never_overflows() {
        let mut policy = ReconnectPolicy::new(
            Duration::from_millis(100),
            Duration::from_millis(500),
            u32::MAX,
        );
        for _ in 0..100 {
            assert!(policy.next_delay().unwrap() <= Duration::from_millis(500));
        }
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let mut buf = RingBuffer::new(3);
        for n in 1..=5 {
            buf.push(n);
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.to_vec(), vec![3, 4, 5]);
        assert_eq!(buf.latest(), Some(&5));
    }

    #[test]
    fn test_ring_buffer_minimum_capacity() {
        let mut buf = RingBuffer::new(0);
        buf.push(1);
        buf.push(2);
        assert_eq!(buf.to_vec(), vec![2]);
    }

    #[tokio::test]
    async fn test_feed_buffers_updates_for_the_subscribed_target() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let first = ws.next().await.unwrap().unwrap();
            let sub: Value = serde_json::from_str(first.to_text().unwrap()).unwrap();
            assert_eq!(sub["op"], "subscribe");
            assert_eq!(sub["target_id"], "m-1");
            assert_eq!(sub["tiers"], serde_json::json!([0, 1]));

            ws.send(Message::Text(r#"{"type":"pong"}"#.into())).await.unwrap();
            ws.send(Message::Text("not json".into())).await.unwrap();
            ws.send(Message::Text(
                r#"{"type":"state","target_id":"someone-else","payload":{"phase":"first_half"}}"#
                    .into(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(
                r#"{"type":"snapshot","target_id":"m-1","payload":{"home_score":1}}"#.into(),
            ))
            .await
            .unwrap();

            // Hold the connection open until the client is done.
            while let Some(Ok(_)) = ws.next().await {}
        });

        let feed = MatchFeed::new(MatchFeedConfig::new(format!("ws://{}", addr)));
        feed.subscribe(Subscription::detail("m-1"));

        timeout(Duration::from_secs(5), async {
            loop {
                if !feed.updates().await.is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("snapshot never reached the buffer");

        // Give the dropped frames a moment to (not) arrive.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let updates = feed.updates().await;
        assert_eq!(updates.len(), 1, "pong/malformed/foreign frames dropped");
        assert_eq!(updates[0].kind, UpdateKind::Snapshot);
        assert_eq!(updates[0].match_id, "m-1");
        assert_eq!(updates[0].payload["home_score"], 1);
        assert_eq!(feed.connection_state(), ConnectionState::Open);

        server.abort();
    }

    #[tokio::test]
    async fn test_exhausted_attempts_close_the_feed_until_a_new_target() {
        // Bind then drop to get an address that refuses connections.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let feed = MatchFeed::new(MatchFeedConfig {
            url: format!("ws://{}", addr),
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_attempts: 2,
            buffer_capacity: 8,
            ping_interval: Duration::from_secs(25),
        });
        feed.subscribe(Subscription::new("m-1", vec![Tier::Score]));

        let mut states = feed.state_changes();
        timeout(
            Duration::from_secs(5),
            states.wait_for(|s| *s == ConnectionState::Closed),
        )
        .await
        .expect("never closed")
        .expect("state channel gone");

        // Closed is terminal: no automatic retry without a new target.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(feed.connection_state(), ConnectionState::Closed);

        // A fresh target resets the budget and reconnects immediately —
        // this time a listener is waiting.
        let listener = TcpListener::bind(addr).await.unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        feed.subscribe(Subscription::new("m-2", vec![Tier::Score]));
        timeout(
            Duration::from_secs(5),
            states.wait_for(|s| *s == ConnectionState::Open),
        )
        .await
        .expect("never reconnected after a new target")
        .expect("state channel gone");

        server.abort();
    }

    #[tokio::test]
    async fn test_clearing_the_target_cancels_a_pending_backoff() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let feed = MatchFeed::new(MatchFeedConfig {
            url: format!("ws://{}", addr),
            // Long enough that reaching Idle quickly proves cancellation.
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
            buffer_capacity: 8,
            ping_interval: Duration::from_secs(25),
        });
        feed.subscribe(Subscription::new("m-1", vec![Tier::Score]));

        let mut states = feed.state_changes();
        timeout(
            Duration::from_secs(5),
            states.wait_for(|s| *s == ConnectionState::Reconnecting),
        )
        .await
        .expect("never entered reconnecting")
        .expect("state channel gone");

        feed.clear();
        timeout(
            Duration::from_secs(1),
            states.wait_for(|s| *s == ConnectionState::Idle),
        )
        .await
        .expect("backoff sleep was not cancelled")
        .expect("state channel gone");
    }
}
