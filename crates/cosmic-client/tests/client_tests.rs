use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use cosmic_client::testing::MockTransport;
use cosmic_client::*;
use cosmic_protocol::{names, Frame};

fn local_backend() -> BackendConfig {
    BackendConfig::from_origin("http://localhost:3000")
}

fn record(client: &WebSocketClient, event: &str) -> Arc<Mutex<Vec<Value>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.on(event, move |v| {
        sink.lock().unwrap().push(v.clone());
        Ok(())
    });
    seen
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn options(base_ms: u64, max_attempts: u32) -> ClientOptions {
    let mut opts = ClientOptions::default();
    opts.reconnect.base_interval = Duration::from_millis(base_ms);
    opts.reconnect.max_attempts = max_attempts;
    opts
}

#[tokio::test(start_paused = true)]
async fn test_send_while_idle_opens_exactly_one_socket() {
    let transport = MockTransport::new();
    let client = WebSocketClient::new(local_backend(), transport.clone());

    assert!(!client.send(names::GET_AI_STATUS, json!({})));
    assert!(!client.send(names::GET_AI_STATUS, json!({})));
    settle().await;
    assert_eq!(transport.open_count(), 1);
    assert!(client.connection_status().is_connecting);

    // Already connecting: resolves without a second open.
    client.connect().await.unwrap();
    assert_eq!(transport.open_count(), 1);
    assert_eq!(transport.url(0).as_deref(), Some("ws://localhost:8080"));
}

#[tokio::test(start_paused = true)]
async fn test_socket_options_disable_transport_reconnection() {
    let transport = MockTransport::replying(vec![TransportEvent::Connected]);
    let client = WebSocketClient::new(local_backend(), transport.clone());
    client.connect().await.unwrap();

    let opts = transport.options(0).unwrap();
    assert!(!opts.reconnection);
    assert!(opts.force_new);
    assert_eq!(opts.timeout, Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn test_demo_mode_never_opens_a_socket() {
    let transport = MockTransport::new();
    let client = WebSocketClient::new(
        BackendConfig::from_origin("https://preview-42.vercel.app"),
        transport.clone(),
    );
    let disconnects = record(&client, names::DISCONNECTED);

    client.connect().await.unwrap();
    assert!(client.is_demo_mode());
    assert!(!client.connected());
    assert!(!client.send(names::GET_AI_STATUS, json!({})));
    settle().await;

    assert_eq!(transport.open_count(), 0);
    assert_eq!(*disconnects.lock().unwrap(), vec![json!("demo-mode")]);
}

#[tokio::test(start_paused = true)]
async fn test_connected_client_sends_and_relays() {
    let transport = MockTransport::replying(vec![TransportEvent::Connected]);
    let client = WebSocketClient::new(local_backend(), transport.clone());
    let connected = record(&client, names::CONNECTED);
    let agents = record(&client, names::AGENT_UPDATE);

    client.connect().await.unwrap();
    settle().await;
    assert!(client.connected());
    assert_eq!(*connected.lock().unwrap(), vec![json!({})]);

    let mut out = transport.take_outbound(0).unwrap();
    assert!(client.send(names::GET_TOPOLOGY_DATA, json!({})));
    match out.recv().await {
        Some(Outbound::Frame(frame)) => assert_eq!(frame.event, names::GET_TOPOLOGY_DATA),
        other => panic!("unexpected outbound: {other:?}"),
    }

    assert!(transport.push(
        0,
        TransportEvent::Message(Frame::new(names::AGENT_UPDATE, json!({ "id": "a1" })))
    ));
    settle().await;
    assert_eq!(*agents.lock().unwrap(), vec![json!({ "id": "a1" })]);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_pings_while_connected() {
    let transport = MockTransport::replying(vec![TransportEvent::Connected]);
    let client = WebSocketClient::new(local_backend(), transport.clone());
    client.connect().await.unwrap();
    let mut out = transport.take_outbound(0).unwrap();

    tokio::time::sleep(Duration::from_millis(24_000)).await;
    assert!(out.try_recv().is_err());

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    match out.try_recv() {
        Ok(Outbound::Frame(frame)) => {
            assert_eq!(frame.event, names::PING);
            assert!(frame.data.get("timestamp").is_some());
        }
        other => panic!("expected a ping, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_transport_failures_bypass_backoff() {
    let transport = MockTransport::replying(vec![TransportEvent::Connected]);
    let client = WebSocketClient::with_options(local_backend(), options(5_000, 10), transport.clone());
    let disconnects = record(&client, names::DISCONNECTED);
    client.connect().await.unwrap();

    for round in 1..=3 {
        assert!(transport.push_latest(TransportEvent::Disconnected("transport error".into())));
        tokio::time::sleep(Duration::from_millis(1_001)).await;
        assert_eq!(transport.open_count(), round + 1);
        assert!(client.connected());
    }

    let opened = transport.opened_at();
    for pair in opened.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(1_000), "gap {gap:?}");
        assert!(gap < Duration::from_millis(5_000), "gap {gap:?}");
    }
    assert_eq!(client.reconnect_attempts(), 0);
    assert!(disconnects.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_ends_with_one_reconnect_failed() {
    let transport = MockTransport::replying(vec![TransportEvent::ConnectError("refused".into())]);
    let client = WebSocketClient::with_options(local_backend(), options(1_000, 3), transport.clone());
    let errors = record(&client, names::ERROR);
    let failed = record(&client, names::RECONNECT_FAILED);

    assert!(matches!(client.connect().await, Err(ClientError::Connect(_))));
    tokio::time::sleep(Duration::from_secs(60)).await;

    // Initial attempt plus three retries.
    assert_eq!(transport.open_count(), 4);
    assert_eq!(errors.lock().unwrap().len(), 4);
    assert_eq!(failed.lock().unwrap().len(), 1);
    assert!(client.connection_status().reconnect_failed);

    let opened = transport.opened_at();
    assert_eq!(opened[1] - opened[0], Duration::from_millis(1_000));
    assert_eq!(opened[2] - opened[1], Duration::from_millis(1_500));
    assert_eq!(opened[3] - opened[2], Duration::from_millis(2_250));

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.open_count(), 4);
    assert_eq!(failed.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_errors_and_backs_off() {
    let transport = MockTransport::new();
    let client = WebSocketClient::new(local_backend(), transport.clone());
    let errors = record(&client, names::ERROR);

    let result = client.connect().await;
    assert!(matches!(result, Err(ClientError::Timeout(d)) if d == Duration::from_secs(20)));
    assert!(!client.connection_status().is_connecting);
    let message = errors.lock().unwrap()[0]["message"].as_str().unwrap().to_string();
    assert!(message.contains("timeout"));

    // Events on the abandoned socket are no longer delivered.
    assert!(!transport.push(0, TransportEvent::Connected));

    tokio::time::sleep(Duration::from_millis(1_001)).await;
    assert_eq!(transport.open_count(), 2);
    assert_eq!(client.reconnect_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_server_disconnect_is_relayed_and_backs_off() {
    let transport = MockTransport::replying(vec![TransportEvent::Connected]);
    let client = WebSocketClient::new(local_backend(), transport.clone());
    let disconnects = record(&client, names::DISCONNECTED);
    client.connect().await.unwrap();

    assert!(transport.push(0, TransportEvent::Disconnected("io server disconnect".into())));
    settle().await;
    assert!(!client.connected());
    assert_eq!(*disconnects.lock().unwrap(), vec![json!("io server disconnect")]);
    assert_eq!(client.reconnect_attempts(), 1);

    tokio::time::sleep(Duration::from_millis(1_001)).await;
    assert_eq!(transport.open_count(), 2);
    assert!(client.connected());
    assert_eq!(client.reconnect_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_manual_disconnect_does_not_reconnect() {
    let transport = MockTransport::replying(vec![TransportEvent::Connected]);
    let client = WebSocketClient::new(local_backend(), transport.clone());
    let disconnects = record(&client, names::DISCONNECTED);
    client.connect().await.unwrap();
    let mut out = transport.take_outbound(0).unwrap();

    client.disconnect();
    assert_eq!(out.recv().await, Some(Outbound::Close));
    assert!(transport.push(0, TransportEvent::Disconnected("io client disconnect".into())));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.open_count(), 1);
    assert!(disconnects.lock().unwrap().is_empty());
    assert!(client.connection_status().manual_disconnect);
    assert!(!client.connected());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_connecting_ignores_late_ack() {
    let transport = MockTransport::new();
    let client = WebSocketClient::new(local_backend(), transport.clone());
    let connected = record(&client, names::CONNECTED);

    assert!(!client.send(names::GET_AI_STATUS, json!({})));
    settle().await;
    assert!(client.connection_status().is_connecting);

    client.disconnect();
    transport.push(0, TransportEvent::Connected);
    settle().await;

    let status = client.connection_status();
    assert!(!status.is_connected);
    assert!(!status.is_connecting);
    assert!(status.manual_disconnect);
    assert!(!client.connected());
    assert!(connected.lock().unwrap().is_empty());

    // Not stuck: the next send starts a fresh attempt.
    assert!(!client.send(names::GET_AI_STATUS, json!({})));
    settle().await;
    assert_eq!(transport.open_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_connecting_skips_timeout_error() {
    let transport = MockTransport::new();
    let client = WebSocketClient::new(local_backend(), transport.clone());
    let errors = record(&client, names::ERROR);

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.connect().await })
    };
    settle().await;
    client.disconnect();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(matches!(
        pending.await.unwrap(),
        Err(ClientError::Superseded)
    ));
    assert!(errors.lock().unwrap().is_empty());
    assert_eq!(transport.open_count(), 1);
    assert_eq!(client.reconnect_attempts(), 0);
}

#[test]
fn test_failing_handler_is_isolated() {
    let client = WebSocketClient::new(local_backend(), MockTransport::new());
    client.on("custom", |_| Err(anyhow::anyhow!("boom")));
    let seen = record(&client, "custom");

    client.emit("custom", &json!({ "n": 1 }));
    assert_eq!(*seen.lock().unwrap(), vec![json!({ "n": 1 })]);
}

#[test]
fn test_off_stops_delivery() {
    let client = WebSocketClient::new(local_backend(), MockTransport::new());
    let seen = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&seen);
    let id = client.on("custom", move |_| {
        *sink.lock().unwrap() += 1;
        Ok(())
    });
    client.emit("custom", &Value::Null);
    assert!(client.off("custom", id));
    client.emit("custom", &Value::Null);
    assert_eq!(*seen.lock().unwrap(), 1);
}
