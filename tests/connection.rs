//! Server and client connections driven against each other in memory.

use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};
use tokio::time::timeout;
use wsconn::{BinaryStream, CloseCode, Config, Connection, ConnectionState, Error, Event};

async fn pair_over(
    capacity: usize,
    server_config: Config,
    client_config: Config,
) -> (Connection<DuplexStream>, Connection<DuplexStream>) {
    let (a, b) = duplex(capacity);
    let (server, client) = tokio::join!(
        Connection::accept(a, server_config),
        Connection::connect(b, "example.com", "/feed", client_config),
    );
    (server.unwrap(), client.unwrap())
}

async fn pair_with(
    server_config: Config,
    client_config: Config,
) -> (Connection<DuplexStream>, Connection<DuplexStream>) {
    pair_over(1024 * 1024, server_config, client_config).await
}

async fn pair() -> (Connection<DuplexStream>, Connection<DuplexStream>) {
    pair_with(Config::default(), Config::default()).await
}

fn expect_binary(event: Option<Event>) -> BinaryStream {
    match event {
        Some(Event::Binary(stream)) => stream,
        other => panic!("expected binary, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_exposes_request() {
    let (server, client) = pair().await;
    assert_eq!(server.state(), ConnectionState::Open);
    assert_eq!(client.state(), ConnectionState::Open);
    assert_eq!(server.path(), Some("/feed"));
    assert_eq!(client.path(), Some("/feed"));
    assert_eq!(server.headers().get("host").unwrap(), "example.com");
    assert!(client.headers().contains_key("sec-websocket-accept"));
}

#[tokio::test]
async fn test_messages_in_order() {
    let (mut server, mut client) = pair().await;

    for i in 0..10 {
        client.send_text(&format!("message {i}")).await.unwrap();
    }
    for i in 0..10 {
        match server.next_event().await {
            Some(Event::Text(text)) => assert_eq!(text, format!("message {i}")),
            other => panic!("expected text, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_binary_in_one_frame() {
    let (mut server, mut client) = pair().await;
    server.send_binary(vec![1u8, 2, 3]).await.unwrap();

    let stream = expect_binary(client.next_event().await);
    assert_eq!(&stream.read_to_end().await[..], &[1, 2, 3]);
}

#[tokio::test]
async fn test_chunked_binary_streams_to_peer() {
    let (mut server, mut client) =
        pair_with(Config::default(), Config::default().with_fragment_size(4)).await;

    let mut writer = client.begin_binary().unwrap();
    writer.write(b"abcdef").await.unwrap();
    writer.write(b"gh").await.unwrap();
    writer.write(b"ij").await.unwrap();
    writer.finish().await.unwrap();
    client.send_text("done").await.unwrap();

    let stream = expect_binary(server.next_event().await);
    assert!(matches!(server.next_event().await, Some(Event::Text(t)) if t == "done"));

    // One chunk per fragment: "abcdef", "ghij", then an empty final fragment
    // that adds no chunk.
    let chunks: Vec<_> = stream.collect().await;
    assert_eq!(chunks.len(), 2);
    assert_eq!(&chunks[0][..], b"abcdef");
    assert_eq!(&chunks[1][..], b"ghij");
}

#[tokio::test]
async fn test_binary_stream_drained_from_task() {
    let (mut server, mut client) =
        pair_with(Config::default(), Config::default().with_fragment_size(4)).await;

    let mut writer = client.begin_binary().unwrap();
    writer.write(b"abcd").await.unwrap();

    let stream = expect_binary(server.next_event().await);
    let reader = tokio::spawn(stream.read_to_end());

    // The rest of the message is still on its way while the task reads.
    writer.write(b"efgh").await.unwrap();
    writer.write(b"ij").await.unwrap();
    writer.finish().await.unwrap();
    client.send_text("done").await.unwrap();

    assert!(matches!(server.next_event().await, Some(Event::Text(t)) if t == "done"));
    let received = timeout(Duration::from_secs(2), reader)
        .await
        .expect("reader finished")
        .unwrap();
    assert_eq!(&received[..], b"abcdefghij");
}

#[tokio::test]
async fn test_cancelled_next_event_keeps_unwritten_bytes() {
    let (mut server, mut client) = pair_over(200, Config::default(), Config::default()).await;

    // Fill most of the server-to-client pipe; the client is not reading.
    let filler = "x".repeat(180);
    server.send_text(&filler).await.unwrap();

    // The pong for this ping no longer fits, so its write stalls.
    client.ping(vec![7u8; 125]).await.unwrap();
    let stalled = timeout(Duration::from_millis(200), server.next_event()).await;
    assert!(stalled.is_err());

    let receive = async {
        let mut texts = Vec::new();
        while texts.len() < 2 {
            match client.next_event().await {
                Some(Event::Text(text)) => texts.push(text),
                other => panic!("expected text, got {other:?}"),
            }
        }
        texts
    };
    let (sent, texts) = tokio::join!(server.send_text("after"), receive);
    sent.unwrap();
    assert_eq!(texts, vec![filler, "after".to_string()]);
}

#[tokio::test]
async fn test_small_chunked_binary_is_single_message() {
    let (mut server, mut client) = pair().await;

    let mut writer = server.begin_binary().unwrap();
    writer.write(b"tiny").await.unwrap();
    writer.finish().await.unwrap();

    let stream = expect_binary(client.next_event().await);
    assert_eq!(&stream.read_to_end().await[..], b"tiny");
}

#[tokio::test]
async fn test_large_binary_crosses_reads() {
    let (mut server, mut client) = pair().await;
    let payload: Vec<u8> = (0..200_000u32).map(|i| i as u8).collect();

    let send = async {
        client.send_binary(payload.clone()).await.unwrap();
        client.send_text("end").await.unwrap();
    };
    let recv = async {
        let stream = expect_binary(server.next_event().await);
        assert!(matches!(server.next_event().await, Some(Event::Text(t)) if t == "end"));
        stream.read_to_end().await
    };
    let ((), received) = tokio::join!(send, recv);
    assert_eq!(received.len(), payload.len());
    assert_eq!(&received[..], &payload[..]);
}

#[tokio::test]
async fn test_server_initiated_close() {
    let (mut server, mut client) = pair().await;

    server.close(CloseCode::GoingAway, "restart").await.unwrap();
    assert!(matches!(
        server.next_event().await,
        Some(Event::Close { code: 1001, .. })
    ));

    match client.next_event().await {
        Some(Event::Close { code, reason }) => {
            assert_eq!(code, 1001);
            assert_eq!(reason, "restart");
        }
        other => panic!("expected close, got {other:?}"),
    }
    assert!(client.next_event().await.is_none());
    assert!(server.next_event().await.is_none());
    assert_eq!(server.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_peer_vanishes() {
    let (server, mut client) = pair().await;
    drop(server);

    assert!(matches!(
        client.next_event().await,
        Some(Event::Close { code: 1006, .. })
    ));
    assert!(client.next_event().await.is_none());
    assert_eq!(client.send_text("anyone?").await, Err(Error::NotOpen));
}

#[tokio::test]
async fn test_unmasked_client_frame_closes_1002() {
    let (a, mut raw) = duplex(64 * 1024);
    raw.write_all(
        b"GET / HTTP/1.1\r\n\
          Host: x\r\n\
          Upgrade: websocket\r\n\
          Connection: Upgrade\r\n\
          Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
          Sec-WebSocket-Version: 13\r\n\r\n",
    )
    .await
    .unwrap();
    let mut server = Connection::accept(a, Config::default()).await.unwrap();

    // Unmasked text frame "hi".
    raw.write_all(&[0x81, 0x02, b'h', b'i']).await.unwrap();
    assert!(matches!(
        server.next_event().await,
        Some(Event::Close { code: 1002, .. })
    ));
    assert!(server.next_event().await.is_none());

    let mut written = Vec::new();
    raw.read_to_end(&mut written).await.unwrap();
    // Handshake response, then a close frame carrying 1002.
    assert!(written.ends_with(&[0x88, 0x02, 0x03, 0xEA]));
}

#[tokio::test]
async fn test_rejected_upgrade_gets_400() {
    let (a, mut raw) = duplex(64 * 1024);
    raw.write_all(b"GET / HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\n\r\n")
        .await
        .unwrap();

    let result = Connection::accept(a, Config::default()).await;
    assert!(matches!(result, Err(Error::InvalidHandshake(_))));

    let mut written = Vec::new();
    raw.read_to_end(&mut written).await.unwrap();
    assert_eq!(written, b"HTTP/1.1 400 Bad Request\r\n\r\n");
}

#[tokio::test]
async fn test_oversized_handshake_rejected() {
    let (a, mut raw) = duplex(64 * 1024);
    raw.write_all(&[b'A'; 300]).await.unwrap();

    let result = Connection::accept(a, Config::default().with_max_buffer_size(256)).await;
    assert!(matches!(result, Err(Error::HandshakeTooLarge { .. })));
}

#[tokio::test]
async fn test_slow_binary_consumer_closes_1009() {
    let (mut server, mut client) = pair_with(
        Config::default().with_max_buffer_size(1024),
        Config::default().with_fragment_size(600),
    )
    .await;

    let mut writer = client.begin_binary().unwrap();
    writer.write(&[1u8; 600]).await.unwrap();
    let _stream = expect_binary(server.next_event().await);

    // The stream is held but never read.
    writer.write(&[2u8; 600]).await.unwrap();
    assert!(matches!(
        server.next_event().await,
        Some(Event::Close { code: 1009, .. })
    ));
    assert!(matches!(
        client.next_event().await,
        Some(Event::Close { code: 1009, .. })
    ));
}
