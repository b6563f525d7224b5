//! Transport-level tests against in-process servers: a real websocket echo
//! peer for the bridge and a canned HTTP/1.1 responder for the executor.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use netconsole_host::bridge::{BridgeError, SocketNotice, WebsocketBridge};
use netconsole_host::config::{ConfigurationManager, ConsoleConfig};
use netconsole_host::executor::{ExecutorError, HttpExecutor, RequestExecutor};
use netconsole_host::hooks::NoopHooks;
use netconsole_host::surface::ChannelSurface;
use netconsole_host::tab::{TabController, TabDeps, TabEvent};
use netconsole_host::theme::ThemeStore;
use netconsole_protocol::{
    AuthorizationDescriptor, BodyPayload, FrontendMessage, HostMessage, HttpHeader, OutcomeStatus,
    PacketDirection, PayloadEncoding, RequestDescriptor, ResponseOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

async fn next_notice(rx: &mut mpsc::UnboundedReceiver<TabEvent>) -> SocketNotice {
    let event = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for socket notice")
        .expect("event channel closed");
    match event {
        TabEvent::Socket(notice) => notice,
        other => panic!("unexpected tab event: {other:?}"),
    }
}

/// Accepts one websocket client and echoes every data frame back.
async fn spawn_echo_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("websocket handshake");
        while let Some(Ok(frame)) = ws.next().await {
            match frame {
                Message::Text(_) | Message::Binary(_) => {
                    if ws.send(frame).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });
    format!("ws://{addr}/live")
}

fn descriptor(verb: &str, url: &str, body: Option<BodyPayload>) -> RequestDescriptor {
    RequestDescriptor {
        name: String::new(),
        description: String::new(),
        verb: verb.to_string(),
        url: url.to_string(),
        headers: vec![HttpHeader::new("accept", "text/plain")],
        body,
    }
}

#[tokio::test]
async fn bridge_mirrors_sends_and_forwards_echoed_frames() {
    let url = spawn_echo_server().await;
    let (events, mut rx) = mpsc::unbounded_channel();
    let mut bridge = WebsocketBridge::new(url, "req-live".to_string(), 0, events);
    bridge.connect();

    match next_notice(&mut rx).await {
        SocketNotice::Connected { request_id } => assert_eq!(request_id, "req-live"),
        other => panic!("unexpected notice: {other:?}"),
    }

    bridge
        .send("ping", PayloadEncoding::Text)
        .expect("send after connect");

    // The mirror fires on acceptance, before any wire round trip.
    match next_notice(&mut rx).await {
        SocketNotice::Packet {
            data, direction, ..
        } => {
            assert_eq!(data, "ping");
            assert_eq!(direction, PacketDirection::Send);
        }
        other => panic!("unexpected notice: {other:?}"),
    }
    match next_notice(&mut rx).await {
        SocketNotice::Packet {
            data,
            direction,
            encoding,
            ..
        } => {
            assert_eq!(data, "ping");
            assert_eq!(direction, PacketDirection::Recv);
            assert_eq!(encoding, PayloadEncoding::Text);
        }
        other => panic!("unexpected notice: {other:?}"),
    }

    // Binary payloads travel base64 in both directions.
    bridge
        .send("AQID", PayloadEncoding::Base64)
        .expect("binary send");
    match next_notice(&mut rx).await {
        SocketNotice::Packet { direction, .. } => assert_eq!(direction, PacketDirection::Send),
        other => panic!("unexpected notice: {other:?}"),
    }
    match next_notice(&mut rx).await {
        SocketNotice::Packet {
            data,
            encoding,
            direction,
            ..
        } => {
            assert_eq!(data, "AQID");
            assert_eq!(encoding, PayloadEncoding::Base64);
            assert_eq!(direction, PacketDirection::Recv);
        }
        other => panic!("unexpected notice: {other:?}"),
    }

    bridge.disconnect();
    match next_notice(&mut rx).await {
        SocketNotice::Disconnected { request_id, .. } => assert_eq!(request_id, "req-live"),
        other => panic!("unexpected notice: {other:?}"),
    }

    // A second disconnect must not manufacture another notice.
    bridge.disconnect();
    let silence = timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(silence.is_err(), "unexpected extra notice: {silence:?}");
}

struct UnusedExecutor;

#[async_trait]
impl RequestExecutor for UnusedExecutor {
    async fn execute(
        &self,
        _request: &RequestDescriptor,
        _authorization: &AuthorizationDescriptor,
    ) -> Result<ResponseOutcome, ExecutorError> {
        panic!("no http execution expected");
    }
}

async fn next_host(rx: &mut mpsc::UnboundedReceiver<HostMessage>) -> HostMessage {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for host message")
        .expect("surface channel closed")
}

fn ws_descriptor(url: &str) -> RequestDescriptor {
    RequestDescriptor {
        name: String::new(),
        description: String::new(),
        verb: "GET".to_string(),
        url: url.to_string(),
        headers: Vec::new(),
        body: None,
    }
}

#[tokio::test]
async fn replacing_a_live_bridge_keeps_the_replacement_reachable() {
    let first_url = spawn_echo_server().await;
    let second_url = spawn_echo_server().await;

    let (surface, mut rx) = ChannelSurface::new();
    let deps = TabDeps {
        theme: Arc::new(ThemeStore::default()),
        executor: Arc::new(UnusedExecutor),
        hooks: Arc::new(NoopHooks),
    };
    let tab = TabController::spawn(
        "tab-replace".to_string(),
        Arc::new(surface),
        deps,
        true,
        None,
    );

    tab.frontend(FrontendMessage::OpenNewUnattachedRequest {
        request_id: "req-A".to_string(),
    });
    tab.frontend(FrontendMessage::ConsoleReady);
    assert!(matches!(next_host(&mut rx).await, HostMessage::InitHost(_)));

    tab.frontend(FrontendMessage::ExecuteRequest {
        id: 1,
        configuration: ws_descriptor(&first_url),
        authorization: AuthorizationDescriptor::None,
    });
    assert!(matches!(
        next_host(&mut rx).await,
        HostMessage::RequestComplete { id: 1, .. }
    ));
    assert!(matches!(
        next_host(&mut rx).await,
        HostMessage::WebsocketConnected { .. }
    ));

    // Re-executing under the same request id replaces the live bridge.
    tab.frontend(FrontendMessage::ExecuteRequest {
        id: 2,
        configuration: ws_descriptor(&second_url),
        authorization: AuthorizationDescriptor::None,
    });
    assert!(matches!(
        next_host(&mut rx).await,
        HostMessage::RequestComplete { id: 2, .. }
    ));

    // Wait for the replacement to open. The replaced bridge's exit happens
    // somewhere in here and must not surface as a disconnect.
    loop {
        match next_host(&mut rx).await {
            HostMessage::WebsocketConnected { request_id } => {
                assert_eq!(request_id, "req-A");
                break;
            }
            HostMessage::WebsocketDisconnected { request_id } => {
                panic!("spurious disconnect for {request_id}")
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    // The replacement is still routable under the shared id.
    tab.frontend(FrontendMessage::WebsocketSendMessage {
        request_id: "req-A".to_string(),
        message: "ping".to_string(),
        encoding: PayloadEncoding::Text,
    });
    loop {
        match next_host(&mut rx).await {
            HostMessage::WebsocketPacket {
                data, direction, ..
            } => {
                if direction == PacketDirection::Recv {
                    assert_eq!(data, "ping");
                    break;
                }
            }
            HostMessage::WebsocketDisconnected { request_id } => {
                panic!("spurious disconnect for {request_id}")
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    // The current bridge is the one an explicit disconnect reaches.
    tab.frontend(FrontendMessage::DisconnectWebsocket {
        request_id: "req-A".to_string(),
    });
    match next_host(&mut rx).await {
        HostMessage::WebsocketDisconnected { request_id } => assert_eq!(request_id, "req-A"),
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn send_before_connect_is_a_state_error() {
    let (events, _rx) = mpsc::unbounded_channel();
    let bridge = WebsocketBridge::new(
        "ws://127.0.0.1:9/never".to_string(),
        "req-cold".to_string(),
        0,
        events,
    );
    let result = bridge.send("ping", PayloadEncoding::Text);
    assert!(matches!(result, Err(BridgeError::NotConnected(_))));
}

/// One-shot HTTP/1.1 responder. Reads the full request (headers plus any
/// Content-Length body), hands the raw bytes to the caller, then writes the
/// canned response and closes.
async fn spawn_http_responder(response: &'static str) -> (String, mpsc::Receiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (captured_tx, captured_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).await.expect("read request");
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            if let Some(header_end) = find_header_end(&raw) {
                let body_len = content_length(&raw[..header_end]);
                if raw.len() >= header_end + body_len {
                    break;
                }
            }
        }
        let _ = captured_tx.send(raw).await;
        stream
            .write_all(response.as_bytes())
            .await
            .expect("write response");
        stream.shutdown().await.expect("shutdown");
    });
    (format!("http://{addr}/endpoint"), captured_rx)
}

fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn content_length(head: &[u8]) -> usize {
    let head = String::from_utf8_lossy(head);
    head.lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0)
}

#[tokio::test]
async fn executor_captures_status_headers_body_and_duration() {
    let (url, _captured) = spawn_http_responder(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/plain\r\n\
         Set-Cookie: a=1\r\n\
         Set-Cookie: b=2\r\n\
         Content-Length: 5\r\n\
         Connection: close\r\n\
         \r\n\
         hello",
    )
    .await;

    let executor = HttpExecutor::new(Arc::new(ConfigurationManager::default()));
    let outcome = executor
        .execute(
            &descriptor("GET", &url, None),
            &AuthorizationDescriptor::None,
        )
        .await
        .expect("completed outcome");

    assert_eq!(outcome.status, OutcomeStatus::Complete);
    assert_eq!(outcome.response.status_code, 200);
    assert_eq!(outcome.response.status_text, "OK");
    assert_eq!(outcome.response.size, 5);
    assert_eq!(outcome.response.body.decode().expect("body"), b"hello");

    let cookies: Vec<&str> = outcome
        .response
        .headers
        .iter()
        .filter(|h| h.key == "set-cookie")
        .map(|h| h.value.as_str())
        .collect();
    assert_eq!(cookies, vec!["a=1", "b=2"]);
}

#[tokio::test]
async fn get_with_body_transmits_the_body() {
    let (url, mut captured) = spawn_http_responder(
        "HTTP/1.1 204 No Content\r\n\
         Connection: close\r\n\
         \r\n",
    )
    .await;

    let executor = HttpExecutor::new(Arc::new(ConfigurationManager::new(ConsoleConfig {
        ignore_https_certificate_errors: false,
        ..ConsoleConfig::default()
    })));
    let body = BodyPayload::from_bytes(b"{\"probe\":true}");
    let outcome = executor
        .execute(
            &descriptor("GET", &url, Some(body)),
            &AuthorizationDescriptor::None,
        )
        .await
        .expect("completed outcome");
    assert_eq!(outcome.response.status_code, 204);

    let raw = timeout(Duration::from_secs(5), captured.recv())
        .await
        .expect("timed out waiting for captured request")
        .expect("responder task gone");
    let raw = String::from_utf8_lossy(&raw);
    assert!(raw.starts_with("GET /endpoint"), "raw request: {raw}");
    assert!(raw.contains("{\"probe\":true}"), "raw request: {raw}");
}

#[tokio::test]
async fn connection_refused_surfaces_as_a_transport_error() {
    // Bind then drop so the port is known-dead.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let executor = HttpExecutor::new(Arc::new(ConfigurationManager::default()));
    let result = executor
        .execute(
            &descriptor("GET", &format!("http://{addr}/gone"), None),
            &AuthorizationDescriptor::None,
        )
        .await;
    assert!(matches!(result, Err(ExecutorError::Transport(_))));
}
