//! Integration tests for the HTTP transport.
//!
//! Uses a mock hyper HTTP server to emit SSE responses, verifying the full
//! request → decode → parse → dispatch pipeline.

use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use hpx_eventsource::{EventSource, EventSourceConfig, HttpTransport, ReadyState, SseEvent};
use http_body_util::Full;
use hyper::{
    HeaderMap, Request, Response,
    body::{Bytes, Incoming},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpListener, sync::mpsc, time::timeout};

// ---------------------------------------------------------------------------
// Mock SSE server helpers
// ---------------------------------------------------------------------------

type Reply = (&'static str, &'static str, u16);

/// Start a mock server that answers requests with `replies` in order, then
/// with the last one forever. Request headers are recorded.
async fn start_sse_server(replies: Vec<Reply>) -> (SocketAddr, Arc<Mutex<Vec<HeaderMap>>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    let replies = Arc::new(replies);
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&requests);

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let replies = Arc::clone(&replies);
            let requests = Arc::clone(&requests);
            let io = TokioIo::new(stream);
            tokio::spawn(async move {
                let _ = http1::Builder::new()
                    .serve_connection(
                        io,
                        service_fn(move |req: Request<Incoming>| {
                            let (body, content_type, status) = {
                                let mut requests = requests.lock().expect("lock requests");
                                requests.push(req.headers().clone());
                                let index = (requests.len() - 1).min(replies.len() - 1);
                                replies[index]
                            };
                            let resp = Response::builder()
                                .status(status)
                                .header("content-type", content_type)
                                .header("set-cookie", "session=abc")
                                .body(Full::new(Bytes::from(body)))
                                .expect("build response");
                            async move { Ok::<_, Infallible>(resp) }
                        }),
                    )
                    .await;
            });
        }
    });

    (addr, recorded)
}

fn describe(event: &SseEvent) -> String {
    match event {
        SseEvent::Connection(conn) => format!("{}:{}", conn.event_type, conn.status.as_u16()),
        SseEvent::Message(msg) => {
            format!("{}:{}:{}", msg.event_type, msg.data, msg.last_event_id)
        }
        SseEvent::Error(_) => "error".to_string(),
    }
}

/// Connect to `addr` over HTTP, forwarding every dispatched event.
fn connect(
    config: EventSourceConfig,
) -> (EventSource, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (open_tx, message_tx, error_tx) = (tx.clone(), tx.clone(), tx);
    let source = EventSource::builder(config)
        .transport(HttpTransport::new().expect("http transport"))
        .on_open(move |event| {
            let _ = open_tx.send(describe(event));
        })
        .on_message(move |event| {
            let _ = message_tx.send(describe(event));
        })
        .on_error(move |event| {
            let _ = error_tx.send(describe(event));
        })
        .connect()
        .expect("connect");
    (source, rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timeout")
        .expect("event")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_basic_connection_and_events() {
    let body = "event: update\ndata: {\"price\":42000}\nid: evt-1\n\ndata: hello\ndata: world\n\n";
    let (addr, requests) = start_sse_server(vec![(body, "text/event-stream", 200)]).await;

    let (source, mut rx) = connect(EventSourceConfig::new(format!("http://{addr}/stream")));

    assert_eq!(next(&mut rx).await, "open:200");
    // `update` has no listener here; only the default type reaches onmessage.
    assert_eq!(next(&mut rx).await, "message:hello\nworld:evt-1");
    assert_eq!(next(&mut rx).await, "error");

    let headers = requests.lock().unwrap()[0].clone();
    assert_eq!(headers["accept"], "text/event-stream");
    assert!(headers.get("last-event-id").is_none());
    source.close();
}

#[tokio::test]
async fn test_reconnect_sends_last_event_id() {
    let (addr, requests) = start_sse_server(vec![
        ("id: 7\ndata: first\n\n", "text/event-stream", 200),
        ("data: second\n\n", "text/event-stream; charset=utf-8", 200),
    ])
    .await;

    let (source, mut rx) = connect(
        EventSourceConfig::new(format!("http://{addr}/stream")).header("X-Client", "tests"),
    );

    assert_eq!(next(&mut rx).await, "open:200");
    assert_eq!(next(&mut rx).await, "message:first:7");
    assert_eq!(next(&mut rx).await, "error");
    assert_eq!(next(&mut rx).await, "open:200");
    assert_eq!(next(&mut rx).await, "message:second:7");

    let headers = requests.lock().unwrap()[1].clone();
    assert_eq!(headers["last-event-id"], "7");
    assert_eq!(headers["x-client"], "tests");
    source.close();
}

#[tokio::test]
async fn test_non_200_status_is_an_error() {
    let (addr, _) = start_sse_server(vec![("", "text/event-stream", 403)]).await;

    let (source, mut rx) = connect(EventSourceConfig::new(format!("http://{addr}/stream")));

    assert_eq!(next(&mut rx).await, "error:403");
    assert_eq!(source.ready_state(), ReadyState::Connecting);
    source.close();
    assert_eq!(source.ready_state(), ReadyState::Closed);
}

#[tokio::test]
async fn test_invalid_content_type_is_an_error() {
    let (addr, _) = start_sse_server(vec![("data: test\n\n", "application/json", 200)]).await;

    let (source, mut rx) = connect(EventSourceConfig::new(format!("http://{addr}/stream")));

    assert_eq!(next(&mut rx).await, "error:200");
    source.close();
}

#[tokio::test]
async fn test_bom_and_multibyte_text() {
    let (addr, _) = start_sse_server(vec![(
        "\u{feff}data: h\u{e9}llo \u{2713}\n\n",
        "text/event-stream",
        200,
    )])
    .await;

    let (source, mut rx) = connect(EventSourceConfig::new(format!("http://{addr}/stream")));

    assert_eq!(next(&mut rx).await, "open:200");
    assert_eq!(next(&mut rx).await, "message:h\u{e9}llo \u{2713}:");
    source.close();
}

#[tokio::test]
async fn test_close_stops_reconnecting() {
    let (addr, requests) = start_sse_server(vec![("", "text/event-stream", 500)]).await;

    let (source, mut rx) = connect(EventSourceConfig::new(format!("http://{addr}/stream")));

    assert_eq!(next(&mut rx).await, "error:500");
    source.close();

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(requests.lock().unwrap().len(), 1);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_connection_refused_is_retried() {
    // Bind then drop to get a port nobody listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        listener.local_addr().expect("local addr")
    };

    let (source, mut rx) = connect(EventSourceConfig::new(format!("http://{addr}/stream")));

    assert_eq!(next(&mut rx).await, "error");
    assert_eq!(source.ready_state(), ReadyState::Connecting);
    source.close();
}
