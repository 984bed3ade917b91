// tests/integration/keepalive_test.rs

//! Liveness: pings from the gateway and the read deadline on silent clients.

use super::test_helpers::{TestGateway, eventually};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn test_responsive_client_is_pinged_and_kept_alive() {
    let gw = TestGateway::with_config(|config| {
        config.websocket.ping_period = Duration::from_millis(100);
        config.websocket.pong_wait = Duration::from_millis(400);
    })
    .await;
    let (mut ws, mut peer) = gw.connect_pair().await;

    // Reading lets the client answer each ping with a pong.
    let mut pings = 0;
    let until = tokio::time::Instant::now() + Duration::from_millis(1200);
    while let Ok(frame) = tokio::time::timeout_at(until, ws.next()).await {
        match frame {
            Some(Ok(Message::Ping(_))) => pings += 1,
            Some(Ok(other)) => panic!("unexpected frame {other:?}"),
            Some(Err(e)) => panic!("socket failed: {e}"),
            None => panic!("gateway closed a responsive client"),
        }
    }
    assert!(pings >= 3, "expected several pings, got {pings}");

    assert_eq!(gw.state.sessions.len(), 1);
    ws.send(Message::text("still here")).await.unwrap();
    peer.expect_line("still here\n").await;
}

#[tokio::test]
async fn test_silent_client_hits_read_deadline() {
    let gw = TestGateway::with_config(|config| {
        config.websocket.ping_period = Duration::from_millis(100);
        config.websocket.pong_wait = Duration::from_millis(300);
    })
    .await;
    // Never polled, so the client never answers pings.
    let (_ws, mut peer) = gw.connect_pair().await;

    peer.expect_closed().await;
    eventually(|| gw.state.sessions.is_empty()).await;
}
