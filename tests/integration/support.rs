//! Local stand-ins for the trading server and the advisory API.
//!
//! `MockFeedServer` plays a fixed script, one entry per accepted TCP
//! connection. The HTTP mocks record every request body they receive.

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use scout::feed::{FeedMessage, MessageHandler};

// ---------------------------------------------------------------------------
// WebSocket feed server
// ---------------------------------------------------------------------------

/// What the server does with one accepted connection.
#[derive(Debug, Clone)]
pub enum Session {
    /// Drop the TCP stream before the WebSocket handshake.
    Refuse,
    /// Complete the handshake, send each frame as text, then stay open
    /// until the client goes away.
    Serve(Vec<String>),
    /// Send the frames, then a Close frame.
    ServeThenClose(Vec<String>),
    /// Send the frames, then drop the socket without a closing handshake.
    ServeThenDrop(Vec<String>),
}

#[derive(Debug, Clone, Copy)]
enum Ending {
    StayOpen,
    Close,
    Drop,
}

pub struct MockFeedServer {
    addr: SocketAddr,
    accepted: Arc<Mutex<Vec<Instant>>>,
    handle: JoinHandle<()>,
}

impl MockFeedServer {
    /// Connections beyond the end of the script are refused.
    pub async fn spawn(script: Vec<Session>) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        let accepted = Arc::new(Mutex::new(Vec::new()));
        let log = accepted.clone();

        let handle = tokio::spawn(async move {
            let mut script: VecDeque<Session> = script.into();
            while let Ok((stream, _peer)) = listener.accept().await {
                log.lock().push(Instant::now());
                let (frames, ending) = match script.pop_front().unwrap_or(Session::Refuse) {
                    Session::Refuse => {
                        drop(stream);
                        continue;
                    }
                    Session::Serve(frames) => (frames, Ending::StayOpen),
                    Session::ServeThenClose(frames) => (frames, Ending::Close),
                    Session::ServeThenDrop(frames) => (frames, Ending::Drop),
                };
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    for frame in frames {
                        if ws.send(Message::Text(frame)).await.is_err() {
                            return;
                        }
                    }
                    match ending {
                        Ending::StayOpen => {
                            while let Some(Ok(msg)) = ws.next().await {
                                if msg.is_close() {
                                    break;
                                }
                            }
                        }
                        Ending::Close => {
                            let _ = ws.close(None).await;
                        }
                        Ending::Drop => drop(ws),
                    }
                });
            }
        });

        Ok(Self {
            addr,
            accepted,
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// When each connection was accepted, in order.
    pub fn accept_times(&self) -> Vec<Instant> {
        self.accepted.lock().clone()
    }
}

impl Drop for MockFeedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn market_frame(player: &str, symbol: &str, price: f64) -> String {
    json!({
        "type": "market_data",
        "data": {
            "player": player,
            "symbol": symbol,
            "price": price,
            "timestamp": "2024-06-01T19:05:00Z"
        }
    })
    .to_string()
}

pub fn event_frame(player: &str, description: &str) -> String {
    json!({
        "type": "player_event",
        "data": {
            "player": player,
            "event_type": "at_bat",
            "description": description,
            "timestamp": "2024-06-01T19:04:00Z"
        }
    })
    .to_string()
}

/// Forwards every message to a channel the test can await.
pub struct RecordingHandler {
    tx: mpsc::UnboundedSender<FeedMessage>,
}

impl RecordingHandler {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FeedMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, message: FeedMessage) -> Result<()> {
        let _ = self.tx.send(message);
        Ok(())
    }
}

pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<FeedMessage>) -> FeedMessage {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a feed message")
        .expect("handler channel closed")
}

// ---------------------------------------------------------------------------
// HTTP order endpoint
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct OrderState {
    status: StatusCode,
    reply: String,
    orders: Arc<Mutex<Vec<Value>>>,
}

pub struct MockOrderServer {
    addr: SocketAddr,
    orders: Arc<Mutex<Vec<Value>>>,
    handle: JoinHandle<()>,
}

async fn accept_order(State(state): State<OrderState>, Json(body): Json<Value>) -> (StatusCode, String) {
    state.orders.lock().push(body);
    (state.status, state.reply.clone())
}

impl MockOrderServer {
    /// Answers every `POST /order` with `status` and `reply`.
    pub async fn spawn(status: u16, reply: &str) -> Result<Self> {
        let orders = Arc::new(Mutex::new(Vec::new()));
        let state = OrderState {
            status: StatusCode::from_u16(status)?,
            reply: reply.to_string(),
            orders: orders.clone(),
        };
        let app = Router::new().route("/order", post(accept_order)).with_state(state);
        let (addr, handle) = serve(app).await?;
        Ok(Self { addr, orders, handle })
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/order", self.addr)
    }

    pub fn orders(&self) -> Vec<Value> {
        self.orders.lock().clone()
    }

    /// Wait until at least `n` orders have arrived.
    pub async fn wait_for_orders(&self, n: usize) -> Vec<Value> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let orders = self.orders();
            if orders.len() >= n {
                return orders;
            }
            assert!(Instant::now() < deadline, "timed out waiting for {n} order(s)");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl Drop for MockOrderServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Gemini generateContent endpoint
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct GeminiState {
    reply: String,
    prompts: Arc<Mutex<Vec<String>>>,
}

pub struct MockGemini {
    addr: SocketAddr,
    prompts: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

async fn generate_content(
    State(state): State<GeminiState>,
    Path(_model): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if query.get("key").map(String::as_str) != Some("test-key") {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "bad key" })));
    }
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or_default();
    state.prompts.lock().push(prompt.to_string());
    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{ "content": { "parts": [{ "text": state.reply }] } }]
        })),
    )
}

impl MockGemini {
    pub async fn spawn(reply: &str) -> Result<Self> {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let state = GeminiState {
            reply: reply.to_string(),
            prompts: prompts.clone(),
        };
        let app = Router::new()
            .route("/models/:model", post(generate_content))
            .with_state(state);
        let (addr, handle) = serve(app).await?;
        Ok(Self { addr, prompts, handle })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

impl Drop for MockGemini {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(app: Router) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((addr, handle))
}
