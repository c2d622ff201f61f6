//! Outbound WebSocket connection from one bot to the game gateway

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::game::{GameMode, GameState, MovementCommand};

use super::protocol::ClientMsg;
use super::session::{ClientPhase, Dispatch, ProtocolSession};

/// Commands queued beyond this are dropped
const OUTBOUND_QUEUE: usize = 64;

/// Receives every decoded snapshot, on the connection's reader task
pub type StateHandler = Arc<dyn Fn(GameState) + Send + Sync>;

/// Runs once when the connection is gone, whatever closed it
pub type DisconnectHandler = Box<dyn FnOnce() + Send>;

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Connection is not open")]
    NotConnected,

    #[error("Connection writer has shut down")]
    ChannelClosed,

    #[error("Outbound queue is full")]
    QueueFull,

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Build the per-bot gateway address: `{base}/{mode}?playerId={bot_id}`
pub fn endpoint_url(base_url: &str, mode: GameMode, bot_id: &str) -> String {
    format!(
        "{}/{}?playerId={}",
        base_url.trim_end_matches('/'),
        mode.as_str(),
        bot_id
    )
}

/// Handle to a single bot's game connection
pub struct GameClient {
    inner: Arc<Inner>,
}

struct Inner {
    bot_id: String,
    game_id: String,
    session: Mutex<ProtocolSession>,
    /// Writer task queue; present while the transport is open
    outbound: Mutex<Option<mpsc::Sender<Message>>>,
    on_disconnect: Mutex<Option<DisconnectHandler>>,
    /// Set once a close has been requested
    closing: AtomicBool,
    /// Wakes the writer to send the close frame ahead of queued commands
    close_signal: Notify,
}

impl GameClient {
    pub fn new(
        bot_id: impl Into<String>,
        game_id: impl Into<String>,
        on_disconnect: DisconnectHandler,
    ) -> Self {
        let bot_id = bot_id.into();
        let game_id = game_id.into();
        Self {
            inner: Arc::new(Inner {
                session: Mutex::new(ProtocolSession::new(bot_id.clone(), game_id.clone())),
                bot_id,
                game_id,
                outbound: Mutex::new(None),
                on_disconnect: Mutex::new(Some(on_disconnect)),
                closing: AtomicBool::new(false),
                close_signal: Notify::new(),
            }),
        }
    }

    pub fn phase(&self) -> ClientPhase {
        self.inner.session.lock().phase()
    }

    /// Open the connection on a background task.
    ///
    /// Only the first call on an idle client does anything.
    pub fn connect(&self, base_url: &str, mode: GameMode, on_state: StateHandler) {
        if !self.inner.session.lock().begin_connect() {
            warn!(bot_id = %self.inner.bot_id, phase = ?self.phase(), "Client not idle, not connecting");
            return;
        }

        let url = endpoint_url(base_url, mode, &self.inner.bot_id);
        info!(bot_id = %self.inner.bot_id, url = %url, "Connecting to game");

        let inner = self.inner.clone();
        tokio::spawn(async move {
            run_connection(inner, url, on_state).await;
        });
    }

    /// Queue a movement command.
    ///
    /// Returns `Ok(false)` when nothing was sent: `Stay` is never transmitted
    /// and commands outside the playing phase are dropped.
    pub fn send_command(&self, command: MovementCommand) -> Result<bool, ClientError> {
        if command == MovementCommand::Stay {
            return Ok(false);
        }
        if !self.inner.session.lock().is_playing() {
            debug!(bot_id = %self.inner.bot_id, ?command, "Not playing, dropping command");
            return Ok(false);
        }

        let msg = ClientMsg::PaddleMove {
            bot_id: self.inner.bot_id.clone(),
            game_id: self.inner.game_id.clone(),
            delta_y: command.delta_y(),
        };
        self.inner.send(&msg)?;
        Ok(true)
    }

    /// Close the connection gracefully. Safe to call any number of times.
    pub fn disconnect(&self) {
        self.inner.close();
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl Inner {
    fn send(&self, msg: &ClientMsg) -> Result<(), ClientError> {
        let json = serde_json::to_string(msg)?;
        let outbound = self.outbound.lock();
        let tx = outbound.as_ref().ok_or(ClientError::NotConnected)?;
        tx.try_send(Message::Text(json)).map_err(|e| match e {
            TrySendError::Full(_) => ClientError::QueueFull,
            TrySendError::Closed(_) => ClientError::ChannelClosed,
        })
    }

    fn handle_text(&self, text: &str, on_state: &StateHandler) {
        let dispatch = self.session.lock().handle_text(text);

        match dispatch {
            Dispatch::SendReady(msg) => match self.send(&msg) {
                Ok(()) => {
                    self.session.lock().ready_sent();
                    info!(bot_id = %self.bot_id, game_id = %self.game_id, "Ready sent, playing");
                }
                Err(e) => {
                    error!(bot_id = %self.bot_id, error = %e, "Failed to send ready message");
                }
            },
            Dispatch::State(state) => on_state(state),
            Dispatch::Close => {
                info!(bot_id = %self.bot_id, "Game finished, disconnecting");
                self.close();
            }
            Dispatch::Ignore => {}
        }
    }

    /// Request a graceful close; the reader loop finishes the teardown
    fn close(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        self.session.lock().closed();

        // the permit is kept if the writer is not running yet
        debug!(bot_id = %self.bot_id, "Close requested");
        self.close_signal.notify_one();
    }

    /// Transport is gone. Runs the disconnect handler at most once.
    fn finish(&self) {
        self.session.lock().closed();
        self.outbound.lock().take();

        let handler = self.on_disconnect.lock().take();
        if let Some(handler) = handler {
            info!(bot_id = %self.bot_id, "Disconnected from game");
            handler();
        }
    }
}

/// Runs [`Inner::finish`] when the connection task ends, unwinding included
struct FinishOnDrop(Arc<Inner>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.finish();
    }
}

async fn run_connection(inner: Arc<Inner>, url: String, on_state: StateHandler) {
    let _finish = FinishOnDrop(inner.clone());

    let ws = match connect_async(url.as_str()).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            error!(bot_id = %inner.bot_id, error = %e, "Failed to connect to game");
            return;
        }
    };

    let (mut ws_sink, mut ws_stream) = ws.split();
    let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);

    inner.session.lock().opened();
    *inner.outbound.lock() = Some(tx);
    info!(bot_id = %inner.bot_id, game_id = %inner.game_id, "Connected to game");

    // Writer task: queued messages -> WebSocket, close frame first
    let writer_inner = inner.clone();
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                biased;
                _ = writer_inner.close_signal.notified() => Message::Close(None),
                queued = rx.recv() => match queued {
                    Some(msg) => msg,
                    None => break,
                },
            };

            let is_close = matches!(msg, Message::Close(_));
            if let Err(e) = ws_sink.send(msg).await {
                warn!(bot_id = %writer_inner.bot_id, error = %e, "WebSocket send failed");
                break;
            }
            if is_close {
                debug!(bot_id = %writer_inner.bot_id, "Close frame sent");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> session
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => inner.handle_text(&text, &on_state),
            Ok(Message::Binary(_)) => {
                debug!(bot_id = %inner.bot_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
            // the stream ends once the close handshake completes
            Ok(Message::Close(frame)) => {
                debug!(bot_id = %inner.bot_id, ?frame, "Close frame received");
            }
            Err(e) => {
                warn!(bot_id = %inner.bot_id, error = %e, "WebSocket transport error");
                break;
            }
        }
    }

    writer_handle.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use crate::testing::{state_frame, unreachable_url, wait_for, MockGateway, CONNECTED, FINISHED};

    fn counting_disconnect() -> (Arc<AtomicUsize>, DisconnectHandler) {
        let count = Arc::new(AtomicUsize::new(0));
        let hits = count.clone();
        (
            count,
            Box::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    fn collecting_state() -> (Arc<Mutex<Vec<GameState>>>, StateHandler) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, Arc::new(move |state| sink.lock().push(state)))
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            endpoint_url("ws://gateway-service:3000/ws/", GameMode::Classic, "bot_g1"),
            "ws://gateway-service:3000/ws/classic?playerId=bot_g1"
        );
    }

    #[test]
    fn test_idle_client_drops_commands() {
        let (_, on_disconnect) = counting_disconnect();
        let client = GameClient::new("bot_g1", "g1", on_disconnect);

        assert_eq!(client.phase(), ClientPhase::Idle);
        assert!(!client.send_command(MovementCommand::MoveUp).unwrap());
        assert!(!client.send_command(MovementCommand::Stay).unwrap());
    }

    #[test]
    fn test_disconnect_is_idempotent_when_never_connected() {
        let (count, on_disconnect) = counting_disconnect();
        let client = GameClient::new("bot_g1", "g1", on_disconnect);

        client.disconnect();
        client.disconnect();

        assert_eq!(client.phase(), ClientPhase::Closed);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_ready_send_stays_awaiting() {
        let (count, on_disconnect) = counting_disconnect();
        let (seen, on_state) = collecting_state();
        let client = GameClient::new("bot_g1", "g1", on_disconnect);
        {
            let mut session = client.inner.session.lock();
            session.begin_connect();
            session.opened();
        }

        // no writer yet
        client.inner.handle_text(CONNECTED, &on_state);
        assert_eq!(client.phase(), ClientPhase::AwaitingReady);

        // writer gone
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        *client.inner.outbound.lock() = Some(tx);
        client.inner.handle_text(CONNECTED, &on_state);
        assert_eq!(client.phase(), ClientPhase::AwaitingReady);
        assert!(seen.lock().is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // the next notification can still complete the handshake
        let (tx, mut rx) = mpsc::channel(1);
        *client.inner.outbound.lock() = Some(tx);
        client.inner.handle_text(CONNECTED, &on_state);
        assert_eq!(client.phase(), ClientPhase::Playing);
        match rx.try_recv() {
            Ok(Message::Text(text)) => assert!(text.contains(r#""type":"ready""#)),
            other => panic!("expected ready message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_full_queue_drops_commands() {
        let gateway = MockGateway::start().await;
        let (_, on_disconnect) = counting_disconnect();
        let (_, on_state) = collecting_state();
        let client = GameClient::new("bot_g1", "g1", on_disconnect);

        client.connect(&gateway.base_url(), GameMode::Classic, on_state);
        let mut conn = gateway.accept().await;
        conn.send_text(CONNECTED).await;
        let _ready = conn.recv_json().await;
        wait_for(|| client.phase() == ClientPhase::Playing).await;

        // the writer cannot run until this test yields
        let mut queued = 0;
        let mut dropped = 0;
        for _ in 0..OUTBOUND_QUEUE * 2 {
            match client.send_command(MovementCommand::MoveUp) {
                Ok(true) => queued += 1,
                Err(ClientError::QueueFull) => dropped += 1,
                other => panic!("unexpected send result: {:?}", other),
            }
        }
        assert_eq!(queued, OUTBOUND_QUEUE);
        assert_eq!(dropped, OUTBOUND_QUEUE);

        // once drained the queue accepts commands again
        wait_for(|| client.send_command(MovementCommand::MoveDown).is_ok()).await;
        client.disconnect();
    }

    #[tokio::test]
    async fn test_panicking_state_handler_still_fires_disconnect() {
        let gateway = MockGateway::start().await;
        let (count, on_disconnect) = counting_disconnect();
        let client = GameClient::new("bot_g1", "g1", on_disconnect);

        client.connect(
            &gateway.base_url(),
            GameMode::Classic,
            Arc::new(|_| panic!("state handler failed")),
        );
        let mut conn = gateway.accept().await;
        conn.send_text(CONNECTED).await;
        let _ready = conn.recv_json().await;
        conn.send_text(&state_frame(880, 275, 450, 275, 5, 0)).await;

        wait_for(|| count.load(Ordering::SeqCst) == 1).await;
        assert_eq!(client.phase(), ClientPhase::Closed);
    }

    #[tokio::test]
    async fn test_handshake_state_and_commands() {
        let gateway = MockGateway::start().await;
        let (count, on_disconnect) = counting_disconnect();
        let (seen, on_state) = collecting_state();
        let client = GameClient::new("bot_g1", "g1", on_disconnect);

        client.connect(&gateway.base_url(), GameMode::Classic, on_state);
        let mut conn = gateway.accept().await;
        assert_eq!(conn.path(), "/ws/classic?playerId=bot_g1");

        conn.send_text(CONNECTED).await;
        let ready = conn.recv_json().await;
        assert_eq!(ready["type"], "ready");
        assert_eq!(ready["playerId"], "bot_g1");
        assert_eq!(ready["gameId"], "g1");
        wait_for(|| client.phase() == ClientPhase::Playing).await;

        conn.send_text(&state_frame(880, 200, 450, 275, 5, 2)).await;
        wait_for(|| seen.lock().len() == 1).await;
        assert_eq!(seen.lock()[0].ball.velocity.vx, 5);

        assert!(tokio_test::assert_ok!(client.send_command(MovementCommand::MoveDown)));
        let mv = conn.recv_json().await;
        assert_eq!(
            mv,
            serde_json::json!({"type": "paddle_move", "botId": "bot_g1", "gameId": "g1", "deltaY": 10})
        );

        client.disconnect();
        wait_for(|| count.load(Ordering::SeqCst) == 1).await;
        assert_eq!(client.phase(), ClientPhase::Closed);
    }

    #[tokio::test]
    async fn test_finished_notification_closes_once() {
        let gateway = MockGateway::start().await;
        let (count, on_disconnect) = counting_disconnect();
        let (_, on_state) = collecting_state();
        let client = GameClient::new("bot_g1", "g1", on_disconnect);

        client.connect(&gateway.base_url(), GameMode::Classic, on_state);
        let mut conn = gateway.accept().await;
        conn.send_text(CONNECTED).await;
        let _ready = conn.recv_json().await;

        conn.send_text(FINISHED).await;
        conn.expect_close().await;
        wait_for(|| count.load(Ordering::SeqCst) == 1).await;

        client.disconnect();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!client.send_command(MovementCommand::MoveUp).unwrap());
    }

    #[tokio::test]
    async fn test_remote_close_fires_disconnect_once() {
        let gateway = MockGateway::start().await;
        let (count, on_disconnect) = counting_disconnect();
        let (_, on_state) = collecting_state();
        let client = GameClient::new("bot_g1", "g1", on_disconnect);

        client.connect(&gateway.base_url(), GameMode::Classic, on_state);
        let conn = gateway.accept().await;
        conn.close().await;

        wait_for(|| count.load(Ordering::SeqCst) == 1).await;
        client.disconnect();
        drop(client);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_fires_disconnect() {
        let (count, on_disconnect) = counting_disconnect();
        let (_, on_state) = collecting_state();
        let client = GameClient::new("bot_g1", "g1", on_disconnect);

        client.connect(&unreachable_url().await, GameMode::Classic, on_state);

        wait_for(|| count.load(Ordering::SeqCst) == 1).await;
        assert_eq!(client.phase(), ClientPhase::Closed);
    }
}
