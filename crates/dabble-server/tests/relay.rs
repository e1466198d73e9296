use dabble_core::brush::{Brush, PALETTE};
use dabble_core::event::DrawEvent;
use dabble_core::session::SessionId;
use dabble_core::sync::{CanvasSnapshot, ClientMessage, ServerMessage};
use dabble_server::{AppState, ServerConfig};
use futures_util::{SinkExt, StreamExt};
use kurbo::Point;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start(history_limit: usize) -> SocketAddr {
    start_with(ServerConfig {
        history_limit,
        ..Default::default()
    })
    .await
}

async fn start_with(config: ServerConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(AppState::new(config));
    tokio::spawn(dabble_server::serve(listener, state));
    addr
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (ws, _) = connect_async(format!("ws://{}{}", addr, path)).await.unwrap();
    ws
}

async fn send(ws: &mut Client, msg: &ClientMessage) {
    let json = serde_json::to_string(msg).unwrap();
    ws.send(Message::Text(json.into())).await.unwrap();
}

async fn recv(ws: &mut Client) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for the relay")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Round-trip an invalid frame so everything sent before it has been handled.
async fn sync(ws: &mut Client) {
    ws.send(Message::Text("{".into())).await.unwrap();
    assert!(matches!(recv(ws).await, ServerMessage::Error { .. }));
}

async fn share(ws: &mut Client) -> SessionId {
    send(ws, &ClientMessage::Share).await;
    match recv(ws).await {
        ServerMessage::Joined {
            session,
            peer_count,
            ..
        } => {
            assert_eq!(peer_count, 0);
            session
        }
        other => panic!("expected joined, got {:?}", other),
    }
}

fn dot(x: f64) -> DrawEvent {
    DrawEvent::dot(&Brush::new(10.0, PALETTE[1]), Point::new(x, 20.0))
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_health_and_uuid_routes() {
    let addr = start(100).await;

    let health = http_get(addr, "/health").await;
    assert!(health.starts_with("HTTP/1.1 200"));
    assert!(health.ends_with("ok"));

    let uuid = http_get(addr, "/get-uuid").await;
    let body = uuid.split("\r\n\r\n").nth(1).unwrap();
    let value: serde_json::Value = serde_json::from_str(body).unwrap();
    let id = value["uuid"].as_str().unwrap();
    assert!(SessionId::parse(id).is_ok());
}

#[tokio::test]
async fn test_draw_events_reach_other_peers_only() {
    let addr = start(100).await;

    let mut alice = connect(addr, "/ws").await;
    let session = share(&mut alice).await;

    let mut bob = connect(addr, &format!("/ws/{}", session)).await;
    match recv(&mut bob).await {
        ServerMessage::Joined {
            session: joined,
            peer_count,
            snapshot,
            history,
        } => {
            assert_eq!(joined, session);
            assert_eq!(peer_count, 1);
            assert!(snapshot.is_none());
            assert!(history.is_empty());
        }
        other => panic!("expected joined, got {:?}", other),
    }
    assert!(matches!(
        recv(&mut alice).await,
        ServerMessage::PeerJoined { .. }
    ));

    send(&mut bob, &ClientMessage::Data { event: dot(1.0) }).await;
    match recv(&mut alice).await {
        ServerMessage::Data { event, .. } => assert_eq!(event, dot(1.0)),
        other => panic!("expected data, got {:?}", other),
    }

    // Bob's next frame is Alice's event, not an echo of his own.
    send(&mut alice, &ClientMessage::Data { event: dot(2.0) }).await;
    match recv(&mut bob).await {
        ServerMessage::Data { event, .. } => assert_eq!(event, dot(2.0)),
        other => panic!("expected data, got {:?}", other),
    }

    drop(bob);
    assert!(matches!(
        recv(&mut alice).await,
        ServerMessage::PeerLeft { .. }
    ));
}

#[tokio::test]
async fn test_late_joiner_catches_up() {
    let addr = start(100).await;

    let mut alice = connect(addr, "/ws").await;
    let session = share(&mut alice).await;

    let snapshot = CanvasSnapshot {
        width: 2,
        height: 2,
        data: "AAA=".to_string(),
    };
    send(
        &mut alice,
        &ClientMessage::Snapshot {
            snapshot: snapshot.clone(),
        },
    )
    .await;
    send(&mut alice, &ClientMessage::Data { event: dot(3.0) }).await;
    send(&mut alice, &ClientMessage::Data { event: dot(4.0) }).await;
    sync(&mut alice).await;

    let mut carol = connect(addr, "/ws").await;
    send(
        &mut carol,
        &ClientMessage::Join {
            session: session.clone(),
        },
    )
    .await;
    match recv(&mut carol).await {
        ServerMessage::Joined {
            snapshot: joined_snapshot,
            history,
            ..
        } => {
            assert_eq!(joined_snapshot, Some(snapshot));
            assert_eq!(history, vec![dot(3.0), dot(4.0)]);
        }
        other => panic!("expected joined, got {:?}", other),
    }
}

#[tokio::test]
async fn test_full_history_requests_snapshot() {
    let addr = start(2).await;

    let mut alice = connect(addr, "/ws").await;
    share(&mut alice).await;

    for x in 0..3 {
        send(
            &mut alice,
            &ClientMessage::Data {
                event: dot(x as f64),
            },
        )
        .await;
    }
    assert_eq!(recv(&mut alice).await, ServerMessage::SnapshotRequested);
}

#[tokio::test]
async fn test_bad_frames_get_errors() {
    let addr = start(100).await;
    let mut ws = connect(addr, "/ws").await;

    send(&mut ws, &ClientMessage::Data { event: dot(1.0) }).await;
    assert!(matches!(recv(&mut ws).await, ServerMessage::Error { .. }));

    ws.send(Message::Binary(vec![1u8, 2, 3].into())).await.unwrap();
    assert!(matches!(recv(&mut ws).await, ServerMessage::Error { .. }));

    ws.send(Message::Text(r#"{"type":"data","event":{"name":"eval","args":{}}}"#.into()))
        .await
        .unwrap();
    assert!(matches!(recv(&mut ws).await, ServerMessage::Error { .. }));
}

#[tokio::test]
async fn test_invalid_session_path_is_refused() {
    let addr = start(100).await;
    let result = connect_async(format!("ws://{}/ws/not.valid", addr)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_invalid_snapshot_is_refused() {
    let addr = start(100).await;

    let mut alice = connect(addr, "/ws").await;
    let session = share(&mut alice).await;

    send(
        &mut alice,
        &ClientMessage::Snapshot {
            snapshot: CanvasSnapshot {
                width: u32::MAX,
                height: u32::MAX,
                data: "AAA=".to_string(),
            },
        },
    )
    .await;
    assert!(matches!(recv(&mut alice).await, ServerMessage::Error { .. }));

    let mut bob = connect(addr, &format!("/ws/{}", session)).await;
    match recv(&mut bob).await {
        ServerMessage::Joined { snapshot, .. } => assert!(snapshot.is_none()),
        other => panic!("expected joined, got {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_peer_skips_ahead_and_stays_connected() {
    let addr = start_with(ServerConfig {
        channel_capacity: 1,
        ..Default::default()
    })
    .await;

    let mut alice = connect(addr, "/ws").await;
    let session = share(&mut alice).await;
    let mut bob = connect(addr, &format!("/ws/{}", session)).await;
    assert!(matches!(recv(&mut bob).await, ServerMessage::Joined { .. }));
    assert!(matches!(
        recv(&mut alice).await,
        ServerMessage::PeerJoined { .. }
    ));

    // Bob is not reading, so his receiver can fall behind the one-slot channel.
    for x in 0..200 {
        send(
            &mut alice,
            &ClientMessage::Data {
                event: dot(x as f64),
            },
        )
        .await;
    }
    sync(&mut alice).await;

    let last = dot(1000.0);
    send(&mut alice, &ClientMessage::Data { event: last }).await;

    loop {
        match recv(&mut bob).await {
            ServerMessage::Data { event, .. } if event == last => break,
            ServerMessage::Data { .. } => {}
            other => panic!("expected data, got {:?}", other),
        }
    }

    // Still connected both ways.
    send(&mut bob, &ClientMessage::Data { event: dot(5.0) }).await;
    match recv(&mut alice).await {
        ServerMessage::Data { event, .. } => assert_eq!(event, dot(5.0)),
        other => panic!("expected data, got {:?}", other),
    }
}
