//! Feed connection behaviour against a scripted WebSocket server.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use scout::config::DecodeErrorPolicy;
use scout::engine::orchestrator::Orchestrator;
use scout::feed::stream::{StreamConnection, StreamSettings};
use scout::feed::{FeedKind, FeedMessage, MessageHandler};

use crate::support::{event_frame, market_frame, next_message, MockFeedServer, RecordingHandler, Session};

fn settings(delay_ms: u64, policy: DecodeErrorPolicy) -> StreamSettings {
    StreamSettings {
        reconnect_delay: Duration::from_millis(delay_ms),
        connect_timeout: Duration::from_secs(2),
        decode_error_policy: policy,
    }
}

fn player(message: &FeedMessage) -> &str {
    message.entity_id()
}

#[tokio::test]
async fn test_reconnects_after_failures_with_fixed_delay() {
    let delay = Duration::from_millis(50);
    let server = MockFeedServer::spawn(vec![
        Session::Refuse,
        Session::Refuse,
        Session::Refuse,
        Session::Serve(vec![market_frame("Gunnar Henderson", "GHEN", 27.5)]),
    ])
    .await
    .unwrap();

    let conn = Arc::new(StreamConnection::new(
        "market",
        server.url("/ws/market"),
        FeedKind::Market,
        settings(50, DecodeErrorPolicy::Skip),
    ));
    let (handler, mut rx) = RecordingHandler::new();
    let task = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.run(handler.as_ref()).await })
    };

    let message = next_message(&mut rx).await;
    assert_eq!(player(&message), "Gunnar Henderson");
    assert_eq!(conn.connection_attempts(), 4);

    let times = server.accept_times();
    assert_eq!(times.len(), 4);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= delay, "reconnect came too early: {:?}", pair[1] - pair[0]);
    }

    assert!(!task.is_finished());
    task.abort();
}

#[tokio::test]
async fn test_skip_policy_keeps_session_open() {
    let server = MockFeedServer::spawn(vec![Session::Serve(vec![
        "this is not json".to_string(),
        r#"{"type":"market_data","data":{"player":"missing price"}}"#.to_string(),
        market_frame("Jackson Holliday", "JHOL", 14.0),
    ])])
    .await
    .unwrap();

    let conn = Arc::new(StreamConnection::new(
        "market",
        server.url("/ws/market"),
        FeedKind::Market,
        settings(50, DecodeErrorPolicy::Skip),
    ));
    let (handler, mut rx) = RecordingHandler::new();
    let task = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.run(handler.as_ref()).await })
    };

    let message = next_message(&mut rx).await;
    assert_eq!(player(&message), "Jackson Holliday");
    assert_eq!(conn.connection_attempts(), 1);
    task.abort();
}

#[tokio::test]
async fn test_reconnect_policy_ends_session() {
    let server = MockFeedServer::spawn(vec![
        Session::Serve(vec![
            "{broken".to_string(),
            market_frame("Never Delivered", "NONE", 1.0),
        ]),
        Session::Serve(vec![market_frame("Second Session", "SEC", 2.0)]),
    ])
    .await
    .unwrap();

    let conn = Arc::new(StreamConnection::new(
        "market",
        server.url("/ws/market"),
        FeedKind::Market,
        settings(20, DecodeErrorPolicy::Reconnect),
    ));
    let (handler, mut rx) = RecordingHandler::new();
    let task = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.run(handler.as_ref()).await })
    };

    let message = next_message(&mut rx).await;
    assert_eq!(player(&message), "Second Session");
    assert_eq!(conn.connection_attempts(), 2);
    task.abort();
}

#[tokio::test]
async fn test_feed_ignores_other_feeds_message_type() {
    let server = MockFeedServer::spawn(vec![Session::Serve(vec![
        event_frame("Adley Rutschman", "Walk"),
        r#"{"type":"heartbeat","data":{}}"#.to_string(),
        market_frame("Adley Rutschman", "ARUT", 22.0),
    ])])
    .await
    .unwrap();

    let conn = StreamConnection::new(
        "market",
        server.url("/ws/market"),
        FeedKind::Market,
        settings(50, DecodeErrorPolicy::Reconnect),
    );
    let (handler, mut rx) = RecordingHandler::new();
    let task = tokio::spawn(async move { conn.run(handler.as_ref()).await });

    match next_message(&mut rx).await {
        FeedMessage::MarketData(tick) => assert_eq!(tick.symbol, "ARUT"),
        other => panic!("expected market data, got {other:?}"),
    }
    task.abort();
}

#[tokio::test]
async fn test_event_feed_delivers_player_events() {
    let server = MockFeedServer::spawn(vec![Session::Serve(vec![
        market_frame("Corbin Burnes", "CBUR", 30.0),
        event_frame("Corbin Burnes", "Strikeout"),
    ])])
    .await
    .unwrap();

    let conn = StreamConnection::new(
        "events",
        server.url("/ws/events"),
        FeedKind::Events,
        settings(50, DecodeErrorPolicy::Skip),
    );
    let (handler, mut rx) = RecordingHandler::new();
    let task = tokio::spawn(async move { conn.run(handler.as_ref()).await });

    match next_message(&mut rx).await {
        FeedMessage::PlayerEvent(event) => assert_eq!(event.description(), Some("Strikeout")),
        other => panic!("expected player event, got {other:?}"),
    }
    task.abort();
}

async fn reconnects_after(first: Session) {
    let server = MockFeedServer::spawn(vec![
        first,
        Session::Serve(vec![market_frame("Second Session", "SEC", 2.0)]),
    ])
    .await
    .unwrap();

    let conn = Arc::new(StreamConnection::new(
        "market",
        server.url("/ws/market"),
        FeedKind::Market,
        settings(20, DecodeErrorPolicy::Skip),
    ));
    let (handler, mut rx) = RecordingHandler::new();
    let task = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.run(handler.as_ref()).await })
    };

    assert_eq!(player(&next_message(&mut rx).await), "First Session");
    assert_eq!(player(&next_message(&mut rx).await), "Second Session");
    assert_eq!(conn.connection_attempts(), 2);
    assert!(!task.is_finished());
    task.abort();
}

#[tokio::test]
async fn test_reconnects_after_server_close_frame() {
    reconnects_after(Session::ServeThenClose(vec![market_frame("First Session", "FST", 1.0)])).await;
}

#[tokio::test]
async fn test_reconnects_after_server_drops_socket() {
    reconnects_after(Session::ServeThenDrop(vec![market_frame("First Session", "FST", 1.0)])).await;
}

/// Fails on the first message, records the rest.
struct FailOnce {
    tripped: AtomicBool,
    tx: mpsc::UnboundedSender<FeedMessage>,
}

#[async_trait]
impl MessageHandler for FailOnce {
    async fn handle(&self, message: FeedMessage) -> Result<()> {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            anyhow::bail!("store unavailable");
        }
        let _ = self.tx.send(message);
        Ok(())
    }
}

#[tokio::test]
async fn test_handler_error_forces_reconnect() {
    let server = MockFeedServer::spawn(vec![
        Session::Serve(vec![
            market_frame("Rejected", "REJ", 1.0),
            market_frame("Never Read", "NONE", 1.5),
        ]),
        Session::Serve(vec![market_frame("After Reconnect", "AFT", 2.0)]),
    ])
    .await
    .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handler = Arc::new(FailOnce {
        tripped: AtomicBool::new(false),
        tx,
    });
    let conn = Arc::new(StreamConnection::new(
        "market",
        server.url("/ws/market"),
        FeedKind::Market,
        settings(20, DecodeErrorPolicy::Skip),
    ));
    let task = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.run(handler.as_ref()).await })
    };

    assert_eq!(player(&next_message(&mut rx).await), "After Reconnect");
    assert_eq!(conn.connection_attempts(), 2);
    assert!(!task.is_finished());
    task.abort();
}

/// Panics on the first message, records the rest.
struct PanicOnce {
    tripped: AtomicBool,
    tx: mpsc::UnboundedSender<FeedMessage>,
}

#[async_trait]
impl MessageHandler for PanicOnce {
    async fn handle(&self, message: FeedMessage) -> Result<()> {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            panic!("handler failure");
        }
        let _ = self.tx.send(message);
        Ok(())
    }
}

#[tokio::test]
async fn test_supervisor_restarts_panicked_feed() {
    let server = MockFeedServer::spawn(vec![
        Session::Serve(vec![market_frame("First", "ONE", 1.0)]),
        Session::Serve(vec![market_frame("Second", "TWO", 2.0)]),
    ])
    .await
    .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handler = Arc::new(PanicOnce {
        tripped: AtomicBool::new(false),
        tx,
    });
    let orchestrator = Arc::new(Orchestrator::new(
        vec![StreamConnection::new(
            "market",
            server.url("/ws/market"),
            FeedKind::Market,
            settings(20, DecodeErrorPolicy::Skip),
        )],
        handler,
    ));
    let task = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run().await })
    };

    let message = next_message(&mut rx).await;
    assert_eq!(player(&message), "Second");
    assert_eq!(orchestrator.feeds()[0].connection_attempts(), 2);
    task.abort();
}
