#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use coedit::config::{Config, SessionConfig};
use coedit::routes;
use coedit::state::AppState;
use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a test waits for any single frame.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

static NEXT_DIR: AtomicU64 = AtomicU64::new(0);

/// A fresh, empty directory for static assets.
pub fn temp_static_dir() -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "coedit-test-{}-{}",
        std::process::id(),
        NEXT_DIR.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::create_dir_all(&path).expect("failed to create static dir");
    path
}

/// Session settings that keep tests deterministic: no pacing, no pings,
/// no idle timeout.
pub fn quiet_session() -> SessionConfig {
    SessionConfig {
        write_pacing: Duration::ZERO,
        heartbeat_interval: None,
        idle_timeout: None,
        ..SessionConfig::default()
    }
}

/// Test server with its own hub and dispatcher. Each instance is isolated.
pub struct TestServer {
    pub state: AppState,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_session(quiet_session()).await
    }

    pub async fn with_session(session: SessionConfig) -> Self {
        let config = Config {
            port: 0,
            static_dir: temp_static_dir(),
            dispatch_capacity: 64,
            session,
        };
        let (state, dispatcher) = AppState::new(&config);
        tokio::spawn(dispatcher.run());
        Self { state }
    }

    pub fn router(&self) -> axum::Router {
        routes::router(self.state.clone())
    }

    /// Binds a TCP listener on port 0, spawns the server, and returns the
    /// websocket URL of the upgrade endpoint.
    pub async fn spawn(&self) -> String {
        let app = self.router();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });
        format!("ws://127.0.0.1:{}/ws", addr.port())
    }
}

pub async fn connect(url: &str) -> WsClient {
    let (ws, _) = connect_async(url).await.expect("websocket connect failed");
    ws
}

/// The address the server sees for this client, i.e. its session id.
pub fn session_id(ws: &WsClient) -> String {
    let MaybeTlsStream::Plain(tcp) = ws.get_ref() else {
        panic!("expected a plain TCP stream");
    };
    tcp.local_addr().unwrap().to_string()
}

/// Next frame that isn't a ping or pong. `None` once the server closed.
pub async fn next_frame(ws: &mut WsClient) -> Option<Message> {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame");
        match msg {
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(msg)) => return Some(msg),
        }
    }
}

/// Next text frame, as raw text.
pub async fn next_text(ws: &mut WsClient) -> String {
    let msg = next_frame(ws).await.expect("connection closed");
    msg.into_text().expect("expected a text frame").as_str().to_owned()
}

pub async fn next_json(ws: &mut WsClient) -> serde_json::Value {
    let text = next_text(ws).await;
    serde_json::from_str(&text).expect("frame is not JSON")
}

/// Assert that nothing but control frames arrives within `window`.
pub async fn assert_silent(ws: &mut WsClient, window: Duration) {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Ping(_)))) | Ok(Some(Ok(Message::Pong(_)))) => continue,
            Ok(other) => panic!("expected silence, got {other:?}"),
        }
    }
}
