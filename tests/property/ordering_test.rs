// tests/property/ordering_test.rs

//! Ordering holds end to end for arbitrary message sequences.

use crate::test_helpers::{TestGateway, next_text};
use futures::SinkExt;
use proptest::prelude::*;
use tokio_tungstenite::tungstenite::Message;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 16, // Each case starts a gateway and a backend
        max_shrink_iters: 50,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_client_messages_arrive_in_order(
        messages in prop::collection::vec("[a-zA-Z0-9 ]{0,40}", 1..40)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let gw = TestGateway::start().await;
            let (mut ws, mut peer) = gw.connect_pair().await;

            let mut expected = String::new();
            for message in &messages {
                expected.push_str(message);
                expected.push('\n');
                ws.send(Message::text(message.clone())).await.unwrap();
            }

            assert_eq!(peer.read_text(expected.len()).await, expected);
        });
    }

    #[test]
    fn test_backend_chunks_arrive_in_order(
        chunks in prop::collection::vec("[a-zA-Z0-9 .,!?]{1,60}\r\n", 1..20)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let gw = TestGateway::start().await;
            let (mut ws, mut peer) = gw.connect_pair().await;

            let expected: String = chunks.concat();
            for chunk in &chunks {
                peer.write(chunk.as_bytes()).await;
            }

            let mut received = String::new();
            while received.len() < expected.len() {
                received.push_str(&next_text(&mut ws).await);
            }
            assert_eq!(received, expected);
        });
    }
}
