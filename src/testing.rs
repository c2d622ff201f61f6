//! In-process game gateway used by unit tests

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, accept_hdr_async, WebSocketStream};

pub const CONNECTED: &str = r#"{"type":"classic_notification","status":"connected"}"#;
pub const FINISHED: &str = r#"{"type":"classic_notification","status":"finished"}"#;

const STEP: Duration = Duration::from_secs(5);

/// `game_state` frame with this bot's paddle and the ball at the given spots
pub fn state_frame(paddle_x: i32, paddle_y: i32, ball_x: i32, ball_y: i32, vx: i32, vy: i32) -> String {
    serde_json::json!({
        "type": "game_state",
        "status": "playing",
        "player": {"id": "bot", "name": "bot", "score": 0, "X": paddle_x, "Y": paddle_y, "ready": true},
        "opponent": {"id": "p1", "name": "p1", "score": 0, "X": 900 - paddle_x, "Y": 275, "ready": true},
        "ball": {"x": ball_x, "y": ball_y, "vx": vx, "vy": vy},
        "timestamp": 0
    })
    .to_string()
}

/// Address nothing listens on
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}/ws", addr)
}

/// Gateway whose connections are driven by the test
pub struct MockGateway {
    listener: TcpListener,
    addr: SocketAddr,
}

impl MockGateway {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        Self { listener, addr }
    }

    pub fn base_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub async fn accept(&self) -> MockConnection {
        let (stream, _) = timeout(STEP, self.listener.accept()).await.unwrap().unwrap();

        let mut path = String::new();
        let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            path = req
                .uri()
                .path_and_query()
                .map(|p| p.to_string())
                .unwrap_or_default();
            Ok(resp)
        };
        let ws = accept_hdr_async(stream, callback).await.unwrap();

        MockConnection { ws, path }
    }
}

pub struct MockConnection {
    ws: WebSocketStream<TcpStream>,
    path: String,
}

impl MockConnection {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn send_text(&mut self, text: &str) {
        self.ws.send(Message::Text(text.to_string())).await.unwrap();
    }

    /// Next text frame, parsed
    pub async fn recv_json(&mut self) -> serde_json::Value {
        loop {
            let msg = timeout(STEP, self.ws.next()).await.unwrap().unwrap().unwrap();
            if let Message::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    /// Wait for the client to close the connection
    pub async fn expect_close(&mut self) {
        loop {
            match timeout(STEP, self.ws.next()).await.unwrap() {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            }
        }
    }

    /// Server-initiated close
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
        while let Ok(Some(Ok(_))) = timeout(STEP, self.ws.next()).await {}
    }
}

/// Gateway that accepts every bot, notifies it and holds the connection
/// until the bot leaves
pub struct HoldingGateway {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    open: Arc<AtomicUsize>,
}

impl HoldingGateway {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let open = Arc::new(AtomicUsize::new(0));

        let accepted_count = accepted.clone();
        let open_count = open.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let open_count = open_count.clone();
                accepted_count.fetch_add(1, Ordering::SeqCst);
                open_count.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    if let Ok(mut ws) = accept_async(stream).await {
                        let _ = ws.send(Message::Text(CONNECTED.to_string())).await;
                        while let Some(Ok(msg)) = ws.next().await {
                            if matches!(msg, Message::Close(_)) {
                                break;
                            }
                        }
                    }
                    open_count.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            addr,
            accepted,
            open,
        }
    }

    pub fn base_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

/// Poll `cond` until it holds, failing the test after a few seconds
pub async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
