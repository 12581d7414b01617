use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::hub::Hub;
use crate::config::SessionConfig;
use crate::error::RelayError;
use crate::presence::Identity;

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Process-unique registry key of one connection. Unlike the session id,
/// two connections never share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionKey(pub u64);

impl SessionKey {
    pub fn next() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registry-side state of a live session.
#[derive(Debug)]
pub struct Member {
    pub identity: Identity,
    pub outbound: mpsc::Sender<Utf8Bytes>,
    /// Dropped together with the member, which wakes the session's inbound
    /// pump through [`Admission::evicted`].
    pub lease: oneshot::Sender<()>,
}

/// What a connection gets back once it has been admitted to the hub.
#[derive(Debug)]
pub struct Admission {
    pub key: SessionKey,
    pub identity: Identity,
    /// Own `user-data` followed by one `user-added` per peer. Written before
    /// anything from the queue.
    pub preamble: Vec<Utf8Bytes>,
    pub outbound: mpsc::Receiver<Utf8Bytes>,
    /// Resolves once the session is no longer a member.
    pub evicted: oneshot::Receiver<()>,
}

/// Why the inbound pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    Closed,
    ReadError,
    IdleTimeout,
    WriterGone,
    Evicted,
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Disconnect::Closed => "closed by peer",
            Disconnect::ReadError => "read error",
            Disconnect::IdleTimeout => "idle timeout",
            Disconnect::WriterGone => "outbound pump terminated",
            Disconnect::Evicted => "evicted",
        };
        f.write_str(reason)
    }
}

/// Write the preamble, then drain the outbound queue onto the socket until
/// the queue closes or a write fails. The sink is closed exactly once on the
/// way out.
pub async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    preamble: Vec<Utf8Bytes>,
    outbound: mpsc::Receiver<Utf8Bytes>,
    config: &SessionConfig,
) -> Result<(), RelayError> {
    let result = pump(&mut sink, preamble, outbound, config).await;
    let _ = sink.close().await;
    result
}

async fn pump(
    sink: &mut SplitSink<WebSocket, Message>,
    preamble: Vec<Utf8Bytes>,
    mut outbound: mpsc::Receiver<Utf8Bytes>,
    config: &SessionConfig,
) -> Result<(), RelayError> {
    for payload in preamble {
        sink.send(Message::Text(payload)).await?;
    }

    let mut heartbeat = config.heartbeat_interval.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            next = outbound.recv() => match next {
                Some(payload) => {
                    sink.send(Message::Text(payload)).await?;
                    if !config.write_pacing.is_zero() {
                        tokio::time::sleep(config.write_pacing).await;
                    }
                }
                None => {
                    // Unregistered or evicted.
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                }
            },
            _ = tick(&mut heartbeat) => sink.send(Message::Ping(Bytes::new())).await?,
        }
    }
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Forward every inbound frame to the hub until the connection ends.
///
/// Frames are relayed opaquely: the hub never parses them. Pings and pongs
/// only count as liveness for the idle timeout. Losing membership ends the
/// pump at once, so an evicted session stops relaying even while its
/// outbound pump is still stuck on a full socket.
pub async fn read_pump(
    stream: &mut SplitStream<WebSocket>,
    hub: &Hub,
    key: SessionKey,
    id: &str,
    idle_timeout: Option<Duration>,
    writer: &mut JoinHandle<()>,
    evicted: &mut oneshot::Receiver<()>,
) -> Disconnect {
    loop {
        let frame = tokio::select! {
            _ = &mut *evicted => return Disconnect::Evicted,
            _ = &mut *writer => return Disconnect::WriterGone,
            frame = next_frame(stream, idle_timeout) => frame,
        };

        let msg = match frame {
            Err(_) => return Disconnect::IdleTimeout,
            Ok(None) => return Disconnect::Closed,
            Ok(Some(Err(e))) => {
                tracing::debug!(session = %id, "websocket read error: {e}");
                return Disconnect::ReadError;
            }
            Ok(Some(Ok(msg))) => msg,
        };

        let payload = match msg {
            Message::Text(text) => text,
            // Takes over the frame's buffer when it isn't shared.
            Message::Binary(bytes) => match String::from_utf8(Vec::from(bytes)) {
                Ok(text) => Utf8Bytes::from(text),
                Err(_) => {
                    tracing::debug!(session = %id, "dropping non-UTF-8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => return Disconnect::Closed,
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        tracing::debug!(session = %id, bytes = payload.len(), "relaying frame");
        if let Err(e) = hub.relay(key, payload).await {
            tracing::warn!(session = %id, "frame not relayed: {e}");
        }
    }
}

async fn next_frame(
    stream: &mut SplitStream<WebSocket>,
    idle_timeout: Option<Duration>,
) -> Result<Option<Result<Message, axum::Error>>, tokio::time::error::Elapsed> {
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next()).await,
        None => Ok(stream.next().await),
    }
}
