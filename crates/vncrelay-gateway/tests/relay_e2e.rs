#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::Uri;
use axum::response::Response;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use vncrelay_gateway::app_state::AppState;
use vncrelay_gateway::assets::MemoryScriptCache;
use vncrelay_gateway::config::RoutesSection;
use vncrelay_gateway::relay::RelayEngine;
use vncrelay_gateway::router;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct Backend {
    seen: Arc<Mutex<Vec<String>>>,
    ended: mpsc::UnboundedSender<String>,
}

/// Echo backend recording every request URI it upgrades. The receiver yields
/// the URI of each backend session once its read loop has finished.
async fn spawn_backend_observed() -> (
    SocketAddr,
    Arc<Mutex<Vec<String>>>,
    mpsc::UnboundedReceiver<String>,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (ended, ended_rx) = mpsc::unbounded_channel();
    let backend = Backend { seen: Arc::clone(&seen), ended };
    let app = Router::new().fallback(backend_ws).with_state(backend);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, seen, ended_rx)
}

async fn spawn_backend() -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let (addr, seen, _) = spawn_backend_observed().await;
    (addr, seen)
}

async fn backend_ws(State(backend): State<Backend>, uri: Uri, ws: WebSocketUpgrade) -> Response {
    let uri = uri.to_string();
    backend.seen.lock().unwrap().push(uri.clone());
    ws.protocols(["binary"]).on_upgrade(move |socket| async move {
        echo(socket).await;
        let _ = backend.ended.send(uri);
    })
}

async fn echo(mut socket: WebSocket) {
    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            AxumMessage::Text(t) if t == "close-now" => {
                let _ = socket.send(AxumMessage::Close(None)).await;
                break;
            }
            m @ (AxumMessage::Text(_) | AxumMessage::Binary(_)) => {
                if socket.send(m).await.is_err() {
                    break;
                }
            }
            AxumMessage::Close(_) => break,
            _ => {}
        }
    }
}

async fn spawn_gateway(state: AppState) -> SocketAddr {
    let app = router::build_app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Gateway whose resolver points every identifier at `backend` and counts calls.
async fn spawn_relay_to(backend: SocketAddr) -> (SocketAddr, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let state = AppState::with_resolver(move |id: &str| {
        c.fetch_add(1, Ordering::SeqCst);
        format!("ws://{backend}/backend/{id}")
    })
    .unwrap();
    (spawn_gateway(state).await, calls)
}

async fn connect(gateway: SocketAddr, query: &str) -> Client {
    let mut req = format!("ws://{gateway}/cloud_vnc?{query}")
        .into_client_request()
        .unwrap();
    req.headers_mut()
        .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static("binary"));
    let (client, resp) = connect_async(req).await.unwrap();
    assert_eq!(
        resp.headers().get(SEC_WEBSOCKET_PROTOCOL).unwrap(),
        "binary"
    );
    client
}

async fn next_data(client: &mut Client) -> Message {
    loop {
        let msg = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read failed");
        match msg {
            Message::Ping(_) | Message::Pong(_) => continue,
            m => return m,
        }
    }
}

/// True once the browser leg is closed (close frame, EOF or reset).
async fn closed_within(client: &mut Client, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        match tokio::time::timeout_at(deadline, client.next()).await {
            Err(_) => return false,
            Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
            Ok(Some(Ok(_))) => continue,
        }
    }
}

async fn http_get(addr: SocketAddr, path: &str) -> (String, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let req = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(req.as_bytes()).await.unwrap();
    let mut raw = Vec::new();
    tokio::time::timeout(WAIT, stream.read_to_end(&mut raw))
        .await
        .unwrap()
        .unwrap();
    let text = String::from_utf8_lossy(&raw).into_owned();
    let (head, body) = text.split_once("\r\n\r\n").unwrap_or((&text, ""));
    (head.to_string(), body.to_string())
}

#[tokio::test]
async fn query_string_is_forwarded_verbatim() {
    let (backend, seen) = spawn_backend().await;
    let (gateway, calls) = spawn_relay_to(backend).await;

    let mut client = connect(gateway, "vnc_id=desk-7&autoconnect=1&path=a%2Fb").await;
    client.send(Message::Text("hello".into())).await.unwrap();
    assert_eq!(next_data(&mut client).await, Message::Text("hello".into()));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        ["/backend/desk-7?vnc_id=desk-7&autoconnect=1&path=a%2Fb"]
    );
    client.close(None).await.unwrap();
}

#[tokio::test]
async fn plain_http_request_gets_400_without_resolving() {
    let (backend, _) = spawn_backend().await;
    let (gateway, calls) = spawn_relay_to(backend).await;

    let (head, body) = http_get(gateway, "/cloud_vnc?vnc_id=desk-1").await;
    assert!(head.starts_with("HTTP/1.1 400"), "{head}");
    let json: serde_json::Value = serde_json::from_str(body.trim()).unwrap();
    let msg = json["error"].as_str().unwrap();
    assert!(msg.starts_with("websocket upgrade error:"), "{msg}");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn refused_backend_closes_browser() {
    // Grab a free port and release it so the dial is refused.
    let port = {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap().port()
    };
    let state = AppState::with_resolver(move |id: &str| format!("ws://127.0.0.1:{port}/{id}")).unwrap();
    let gateway = spawn_gateway(state).await;

    let mut client = connect(gateway, "vnc_id=gone").await;
    assert!(closed_within(&mut client, WAIT).await);
}

#[tokio::test]
async fn silent_backend_is_bounded_by_dial_timeout() {
    // Accepts TCP but never answers the handshake.
    let blackhole = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let hole = blackhole.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((s, _)) = blackhole.accept().await {
            held.push(s);
        }
    });

    let engine = RelayEngine::builder()
        .resolver(move |_: &str| format!("ws://{hole}/"))
        .dial_timeout(Duration::from_millis(300))
        .close_grace(Duration::from_millis(200))
        .build()
        .unwrap();
    let state = AppState::new(
        RoutesSection::default(),
        engine,
        Arc::new(MemoryScriptCache::new()),
    );
    let gateway = spawn_gateway(state.clone()).await;

    let mut client = connect(gateway, "vnc_id=slow").await;
    assert!(closed_within(&mut client, Duration::from_secs(3)).await);
    assert_eq!(state.metrics().dials.get(&[("result", "timeout")]), 1);
}

#[tokio::test]
async fn frames_keep_type_and_payload() {
    let (backend, _) = spawn_backend().await;
    let (gateway, _) = spawn_relay_to(backend).await;
    let mut client = connect(gateway, "vnc_id=fidelity").await;

    let big: Vec<u8> = (0..70 * 1024).map(|i| (i % 251) as u8).collect();
    let frames = vec![
        Message::Binary(Vec::new()),
        Message::Binary(vec![0x2a]),
        Message::Binary(big.clone()),
        Message::Text(String::new()),
        Message::Text("x".into()),
        Message::Text("é".repeat(40 * 1024)),
    ];
    for f in frames {
        client.send(f.clone()).await.unwrap();
        assert_eq!(next_data(&mut client).await, f);
    }
    client.close(None).await.unwrap();
}

#[tokio::test]
async fn backend_close_closes_browser() {
    let (backend, _) = spawn_backend().await;
    let (gateway, _) = spawn_relay_to(backend).await;
    let mut client = connect(gateway, "vnc_id=bye").await;

    client.send(Message::Text("close-now".into())).await.unwrap();
    assert!(closed_within(&mut client, WAIT).await);
}

#[tokio::test]
async fn browser_close_closes_backend() {
    let (backend, _, mut ended) = spawn_backend_observed().await;
    let (gateway, _) = spawn_relay_to(backend).await;
    let mut client = connect(gateway, "vnc_id=leaving").await;

    client.send(Message::Binary(vec![7])).await.unwrap();
    assert_eq!(next_data(&mut client).await, Message::Binary(vec![7]));

    client.close(None).await.unwrap();
    let uri = tokio::time::timeout(WAIT, ended.recv())
        .await
        .expect("backend leg still open")
        .unwrap();
    assert_eq!(uri, "/backend/leaving?vnc_id=leaving");
}

#[tokio::test]
async fn concurrent_sessions_do_not_cross_talk() {
    let (backend, seen) = spawn_backend().await;
    let (gateway, calls) = spawn_relay_to(backend).await;

    let mut tasks = Vec::new();
    for n in 0..8u8 {
        tasks.push(tokio::spawn(async move {
            let mut client = connect(gateway, &format!("vnc_id=desk-{n}")).await;
            for round in 0..20u8 {
                let payload = vec![n, round, n ^ round];
                client.send(Message::Binary(payload.clone())).await.unwrap();
                assert_eq!(next_data(&mut client).await, Message::Binary(payload));
            }
            client.close(None).await.unwrap();
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 8);
    let mut uris = seen.lock().unwrap().clone();
    uris.sort();
    assert_eq!(uris.len(), 8);
    assert!(uris[0].starts_with("/backend/desk-0?vnc_id=desk-0"));
}

#[tokio::test]
async fn viewer_and_scripts_are_served_with_routes_filled_in() {
    let state = AppState::with_resolver(|id: &str| format!("ws://127.0.0.1:1/{id}")).unwrap();
    let gateway = spawn_gateway(state).await;

    let (head, page) = http_get(gateway, "/no_vnc?vnc_id=desk-1").await;
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");
    assert!(head.to_ascii_lowercase().contains("content-type: text/html"));
    assert!(page.contains("/scripts/websock.js"));
    assert!(page.contains("'/cloud_vnc'"));
    assert!(!page.contains("@wsRoute@"));

    let (head, js) = http_get(gateway, "/scripts/websock.js").await;
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");
    assert!(head.to_ascii_lowercase().contains("content-type: text/javascript"));
    assert!(!js.contains("@scriptsRoute@"));

    let (head, body) = http_get(gateway, "/scripts/missing.js").await;
    assert!(head.starts_with("HTTP/1.1 500"), "{head}");
    assert!(body.contains("file not found"));
}

#[tokio::test]
async fn ops_endpoints_report_relay_activity() {
    let (backend, _) = spawn_backend().await;
    let (gateway, _) = spawn_relay_to(backend).await;

    let (head, body) = http_get(gateway, "/healthz").await;
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");
    assert!(body.contains("ok"));

    let mut client = connect(gateway, "vnc_id=m").await;
    client.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    next_data(&mut client).await;

    let (_, metrics) = http_get(gateway, "/metrics").await;
    assert!(metrics.contains("vncrelay_upgrades_total{result=\"accepted\"} 1"), "{metrics}");
    assert!(metrics.contains("vncrelay_dials_total{result=\"ok\"} 1"), "{metrics}");
    assert!(metrics.contains("vncrelay_sessions_active 1"), "{metrics}");
    client.close(None).await.unwrap();
}
