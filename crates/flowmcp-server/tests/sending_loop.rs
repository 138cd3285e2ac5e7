//! Sending-loop tests: SSE framing, event id monotonicity, idle pings, and
//! streamed payload delivery.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use serde_json::json;

use flowmcp_server::{McpServer, Payload};

fn server() -> Arc<McpServer> {
    McpServer::builder()
        .name("loop-test")
        .version("0.0.0")
        .build()
        .expect("empty server builds")
}

async fn next_bytes<S>(stream: &mut S) -> Bytes
where
    S: futures::Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("stream produces within the deadline")
        .expect("stream not finished")
        .expect("no io error")
}

#[tokio::test]
async fn events_are_framed_with_increasing_ids() {
    let server = server();
    let session = server.create_session("sse");

    session.send("endpoint", Bytes::from_static(b"http://127.0.0.1/sse"));
    session.send("message", Bytes::from_static(b"{\"jsonrpc\":\"2.0\"}"));

    let stream = session.clone().event_stream(Duration::from_secs(60));
    futures::pin_mut!(stream);

    assert_eq!(&next_bytes(&mut stream).await[..], b"id: 0\nevent: endpoint\ndata: ");
    assert_eq!(&next_bytes(&mut stream).await[..], b"http://127.0.0.1/sse");
    assert_eq!(&next_bytes(&mut stream).await[..], b"\n\n");

    assert_eq!(&next_bytes(&mut stream).await[..], b"id: 1\nevent: message\ndata: ");
    assert_eq!(&next_bytes(&mut stream).await[..], b"{\"jsonrpc\":\"2.0\"}");
    assert_eq!(&next_bytes(&mut stream).await[..], b"\n\n");
}

#[tokio::test]
async fn idle_session_is_pinged() {
    let server = server();
    let session = server.create_session("idle");

    // Idle for longer than the ping timeout: the loop's queue wait times
    // out after 1 s, cleanup runs, and a ping notification is enqueued.
    let stream = session.clone().event_stream(Duration::from_millis(500));
    futures::pin_mut!(stream);

    let header = next_bytes(&mut stream).await;
    assert_eq!(&header[..], b"id: 0\nevent: message\ndata: ");
    let data = next_bytes(&mut stream).await;
    assert_eq!(&data[..], br#"{"jsonrpc":"2.0","method":"ping"}"#);
}

#[tokio::test]
async fn streamed_payloads_are_written_chunkwise_inside_one_event() {
    use flowmcp_protocol::jsonrpc::RequestId;
    use flowmcp_protocol::streaming::{ContentStream, StreamingResponse};

    let server = server();
    let session = server.create_session("streaming");

    let encoder = StreamingResponse::with_chunk_size(
        &RequestId::Number(1),
        vec![ContentStream::from_bytes(
            "res://blob",
            "application/octet-stream",
            vec![7u8; 100],
        )],
        30,
    )
    .unwrap();
    session.send("message", Payload::Stream(encoder));

    let stream = session.clone().event_stream(Duration::from_secs(60));
    futures::pin_mut!(stream);

    let mut event = Vec::new();
    loop {
        let bytes = next_bytes(&mut stream).await;
        event.extend_from_slice(&bytes);
        if event.ends_with(b"\n\n") {
            break;
        }
    }

    let text = String::from_utf8(event).unwrap();
    let data = text
        .strip_prefix("id: 0\nevent: message\ndata: ")
        .and_then(|rest| rest.strip_suffix("\n\n"))
        .expect("sse framing");

    let value: serde_json::Value = serde_json::from_str(data).expect("one valid json document");
    assert_eq!(value["id"], json!(1));
    assert!(value["result"]["contents"][0]["blob"].is_string());
}

#[tokio::test]
async fn second_sending_loop_is_refused() {
    let server = server();
    let session = server.create_session("twice");

    let first = session.clone().event_stream(Duration::from_secs(60));
    let second = session.clone().event_stream(Duration::from_secs(60));
    futures::pin_mut!(first, second);

    // The second loop cannot claim the queue and ends immediately.
    assert!(second.next().await.is_none());

    session.send("message", Bytes::from_static(b"{}"));
    assert_eq!(&next_bytes(&mut first).await[..], b"id: 0\nevent: message\ndata: ");
}
