// tests/integration/bridge_test.rs

//! End-to-end forwarding and teardown between a WebSocket client and its backend.

use super::test_helpers::{RawClient, TestGateway, expect_close, next_text, text_until_close};
use futures::SinkExt;
use std::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

#[tokio::test]
async fn test_client_text_reaches_backend_with_terminator() {
    let gw = TestGateway::start().await;
    let (mut ws, mut peer) = gw.connect_pair().await;

    ws.send(Message::text("look")).await.unwrap();
    peer.expect_line("look\n").await;
}

#[tokio::test]
async fn test_binary_frames_are_forwarded_as_lines() {
    let gw = TestGateway::start().await;
    let (mut ws, mut peer) = gw.connect_pair().await;

    ws.send(Message::binary(b"north".to_vec())).await.unwrap();
    peer.expect_line("north\n").await;
}

#[tokio::test]
async fn test_backend_bytes_reach_client_unchanged() {
    let gw = TestGateway::start().await;
    let (mut ws, mut peer) = gw.connect_pair().await;

    peer.write(b"You see a room.\r\n").await;
    assert_eq!(next_text(&mut ws).await, "You see a room.\r\n");
}

#[tokio::test]
async fn test_client_messages_keep_their_order() {
    let gw = TestGateway::start().await;
    let (mut ws, mut peer) = gw.connect_pair().await;

    let mut expected = String::new();
    for i in 0..200 {
        let command = format!("say {i}");
        expected.push_str(&command);
        expected.push('\n');
        ws.send(Message::text(command)).await.unwrap();
    }

    assert_eq!(peer.read_text(expected.len()).await, expected);
}

#[tokio::test]
async fn test_backend_output_keeps_its_order() {
    let gw = TestGateway::start().await;
    let (mut ws, mut peer) = gw.connect_pair().await;

    let mut expected = String::new();
    for i in 0..50 {
        let line = format!("tick {i}\r\n");
        expected.push_str(&line);
        peer.write(line.as_bytes()).await;
    }

    // Chunk boundaries are whatever the socket delivered; only the byte order is fixed.
    let mut received = String::new();
    while received.len() < expected.len() {
        received.push_str(&next_text(&mut ws).await);
    }
    assert_eq!(received, expected);
}

#[tokio::test]
async fn test_each_connection_gets_its_own_backend() {
    let gw = TestGateway::start().await;
    let (mut ws_a, mut peer_a) = gw.connect_pair().await;
    let (mut ws_b, mut peer_b) = gw.connect_pair().await;
    assert_eq!(gw.state.sessions.len(), 2);

    ws_a.send(Message::text("from a")).await.unwrap();
    ws_b.send(Message::text("from b")).await.unwrap();
    peer_a.expect_line("from a\n").await;
    peer_b.expect_line("from b\n").await;

    peer_b.write(b"to b\n").await;
    peer_a.write(b"to a\n").await;
    assert_eq!(next_text(&mut ws_a).await, "to a\n");
    assert_eq!(next_text(&mut ws_b).await, "to b\n");
}

#[tokio::test]
async fn test_backend_hangup_sends_close_frame_and_tears_down() {
    let gw = TestGateway::start().await;
    let (mut ws, peer) = gw.connect_pair().await;

    drop(peer);

    let frame = expect_close(&mut ws).await.expect("close frame without a code");
    assert_eq!(frame.code, CloseCode::Normal);
    gw.wait_until_idle().await;
}

#[tokio::test]
async fn test_client_disconnect_closes_backend() {
    let gw = TestGateway::start().await;
    let (mut ws, mut peer) = gw.connect_pair().await;

    ws.send(Message::text("quit")).await.unwrap();
    peer.expect_line("quit\n").await;
    ws.close(None).await.unwrap();

    peer.expect_closed().await;
    gw.wait_until_idle().await;
}

#[tokio::test]
async fn test_dropped_client_socket_closes_backend() {
    let gw = TestGateway::start().await;
    let (ws, mut peer) = gw.connect_pair().await;

    drop(ws);

    peer.expect_closed().await;
    gw.wait_until_idle().await;
}

#[tokio::test]
async fn test_unreachable_backend_closes_client() {
    let gw = TestGateway::with_config(|config| {
        // A port that was just released has nobody listening on it.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        config.backend.address = format!("127.0.0.1:{port}");
    })
    .await;
    let mut ws = gw.connect().await;

    expect_close(&mut ws).await;
    gw.wait_until_idle().await;
}

#[tokio::test]
async fn test_messages_after_backend_teardown_end_the_reader() {
    let gw = TestGateway::start().await;
    let (mut ws, peer) = gw.connect_pair().await;
    drop(peer);
    gw.wait_until_idle().await;

    // The session is gone and is never recreated for this connection.
    let _ = ws.send(Message::text("anyone there?")).await;
    assert!(!gw.backend.accepts_within(Duration::from_millis(300)).await);
    assert!(gw.state.sessions.is_empty());
}

#[tokio::test]
async fn test_backend_last_words_arrive_before_close_frame() {
    let gw = TestGateway::start().await;
    let (mut ws, mut peer) = gw.connect_pair().await;

    peer.write(b"Goodbye.\r\n").await;
    drop(peer);

    let (text, frame) = text_until_close(&mut ws).await;
    assert_eq!(text, "Goodbye.\r\n");
    assert_eq!(frame.map(|f| f.code), Some(CloseCode::Normal));
    gw.wait_until_idle().await;
}

#[tokio::test]
async fn test_unanswered_close_is_forced_after_grace_period() {
    let grace = Duration::from_millis(700);
    let gw = TestGateway::with_config(|config| config.websocket.close_grace_period = grace).await;
    let mut client = RawClient::connect(gw.addr).await;
    let peer = gw.backend.accept().await;

    let hangup = Instant::now();
    drop(peer);

    // FIN + close opcode, 2-byte payload carrying 1000 (normal closure).
    client.read_at_least(4).await;
    assert_eq!(&client.pending[..4], &[0x88, 0x02, 0x03, 0xE8]);
    assert!(hangup.elapsed() < grace, "close frame was not sent promptly");

    client.wait_for_eof().await;
    let closed_after = hangup.elapsed();
    assert!(
        closed_after >= grace - Duration::from_millis(100),
        "socket closed after {closed_after:?}, before the grace period"
    );
    gw.wait_until_idle().await;
}

#[tokio::test]
async fn test_oversize_message_tears_down_the_session() {
    let gw = TestGateway::with_config(|config| config.websocket.max_message_size = 64).await;
    let (mut ws, mut peer) = gw.connect_pair().await;

    let _ = ws.send(Message::text("x".repeat(200))).await;

    peer.expect_closed().await;
    gw.wait_until_idle().await;
}
