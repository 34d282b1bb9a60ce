//! End-to-end tests against a tungstenite server on the loopback interface

#![cfg(feature = "transport-tcp")]

use futures_util::{SinkExt, StreamExt};
use skiff::prelude::*;
use std::future::Future;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;

const WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Accept one WebSocket connection and hand it to `handler`
async fn serve<F, Fut>(handler: F) -> (u16, tokio::task::JoinHandle<()>)
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        handler(ws).await;
    });
    (port, task)
}

/// Accept one TCP connection, answer the upgrade by hand and return the raw
/// stream so tests can inspect individual fragments
async fn serve_raw<F, Fut>(handler: F) -> (u16, tokio::task::JoinHandle<()>)
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let task = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        while !head.ends_with(b"\r\n\r\n") {
            head.push(stream.read_u8().await.unwrap());
        }
        let head = String::from_utf8(head).unwrap();
        let key = head
            .lines()
            .find_map(|line| line.strip_prefix("Sec-WebSocket-Key: "))
            .unwrap();
        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
            skiff::handshake::compute_accept_key(key)
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        handler(stream).await;
    });
    (port, task)
}

async fn connect(port: u16, config: ClientConfig) -> (WebSocket, UnboundedReceiver<Event>) {
    init_tracing();
    let (tx, rx) = unbounded_channel();
    let socket = WebSocket::builder(format!("ws://127.0.0.1:{}/", port))
        .config(config)
        .handler(tx)
        .build()
        .await
        .unwrap();
    (socket, rx)
}

async fn wait_for<T>(rx: &mut UnboundedReceiver<Event>, mut pick: impl FnMut(Event) -> Option<T>) -> T {
    loop {
        let event = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if let Some(value) = pick(event) {
            return value;
        }
    }
}

async fn wait_closed(rx: &mut UnboundedReceiver<Event>) -> (CloseCode, Option<String>) {
    wait_for(rx, |event| match event {
        Event::Closed { code, reason } => Some((code, reason)),
        _ => None,
    })
    .await
}

#[tokio::test]
async fn connect_reaches_open() {
    let (port, server) = serve(|mut ws| async move {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;

    let (socket, mut rx) = connect(port, ClientConfig::default()).await;
    assert_eq!(socket.state(), ConnectionState::Open);
    assert_eq!(rx.recv().await, Some(Event::Opened));

    socket.send_close(CloseCode::Normal, None).await.unwrap();
    let (code, _) = wait_closed(&mut rx).await;
    assert_eq!(code, CloseCode::Normal);
    server.await.unwrap();
}

#[tokio::test]
async fn binary_payload_arrives_intact() {
    let payload = rand::random::<[u8; 16]>().to_vec();
    let expected = payload.clone();

    let (port, server) = serve_raw(|mut stream| async move {
        let fragment = Fragment::read(&mut stream).await.unwrap();
        assert_eq!(fragment.opcode, Opcode::Binary);
        assert!(fragment.fin);
        assert_eq!(&fragment.payload[..], &expected[..]);
    })
    .await;

    let (socket, _rx) = connect(port, ClientConfig::default()).await;
    socket.send_binary(payload).await.unwrap();
    tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn large_payload_is_fragmented_and_reassembled() {
    let payload = vec![0xAB; 65536];
    let expected = payload.clone();

    let (port, server) = serve(move |mut ws| async move {
        match ws.next().await {
            Some(Ok(WsMessage::Binary(data))) => assert_eq!(data, expected),
            other => panic!("unexpected message: {:?}", other),
        }
    })
    .await;

    let config = ClientConfig::default().chunking_mode(ChunkingMode::LimitTo16Bit);
    let (socket, _rx) = connect(port, config).await;
    socket.send_binary(payload).await.unwrap();
    tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn large_payload_fragment_layout() {
    let (port, server) = serve_raw(|mut stream| async move {
        let first = Fragment::read(&mut stream).await.unwrap();
        let second = Fragment::read(&mut stream).await.unwrap();
        assert_eq!((first.opcode, first.fin, first.payload_len()), (Opcode::Binary, false, 65535));
        assert_eq!((second.opcode, second.fin, second.payload_len()), (Opcode::Continuation, true, 1));
    })
    .await;

    let (socket, _rx) = connect(port, ClientConfig::default()).await;
    socket.send_binary(vec![1u8; 65536]).await.unwrap();
    tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn server_close_is_reported() {
    let (port, server) = serve(|mut ws| async move {
        ws.close(Some(CloseFrame {
            code: WsCloseCode::Normal,
            reason: "Closing from test".into(),
        }))
        .await
        .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;

    let (_socket, mut rx) = connect(port, ClientConfig::default()).await;
    let (code, reason) = wait_closed(&mut rx).await;
    assert_eq!(code, CloseCode::Normal);
    assert_eq!(reason.as_deref(), Some("Closing from test"));
    server.await.unwrap();
}

#[tokio::test]
async fn server_abort_is_abnormal() {
    let (port, server) = serve(|ws| async move {
        drop(ws);
    })
    .await;

    let (socket, mut rx) = connect(port, ClientConfig::default()).await;
    let (code, reason) = wait_closed(&mut rx).await;
    assert_eq!(code, CloseCode::AbnormalClosure);
    assert_eq!(reason.as_deref(), Some("Unexpected close"));
    assert_eq!(socket.state(), ConnectionState::Closed);
    server.await.unwrap();
}

#[tokio::test]
async fn refused_connection_reports_protocol_error() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (tx, mut rx) = unbounded_channel();
    let result = WebSocket::builder(format!("ws://127.0.0.1:{}", port))
        .handler(tx)
        .build()
        .await;
    assert!(matches!(result, Err(Error::Io(_))));

    let (code, reason) = wait_closed(&mut rx).await;
    assert_eq!(code, CloseCode::ProtocolError);
    assert!(reason.unwrap().to_lowercase().contains("refused"));
}

#[tokio::test]
async fn text_echo_and_ping() {
    let (port, server) = serve(|mut ws| async move {
        ws.send(WsMessage::Ping(vec![4, 2])).await.unwrap();
        while let Some(Ok(message)) = ws.next().await {
            match message {
                WsMessage::Text(text) => ws.send(WsMessage::Text(text)).await.unwrap(),
                WsMessage::Pong(data) => {
                    assert_eq!(data, vec![4, 2]);
                    ws.send(WsMessage::Pong(vec![9])).await.unwrap();
                }
                _ => {}
            }
        }
    })
    .await;

    let (socket, mut rx) = connect(port, ClientConfig::default()).await;
    let pong = wait_for(&mut rx, |event| match event {
        Event::Pong(data) => Some(data),
        _ => None,
    })
    .await;
    assert_eq!(&pong[..], &[9]);

    socket.send_text("héllo skiff").await.unwrap();
    let text = wait_for(&mut rx, |event| match event {
        Event::Text(text) => Some(text),
        _ => None,
    })
    .await;
    assert_eq!(text, "héllo skiff");

    socket.send_close(CloseCode::GoingAway, Some("done")).await.unwrap();
    let (code, _) = wait_closed(&mut rx).await;
    assert_eq!(code, CloseCode::GoingAway);
    server.await.unwrap();
}

#[test]
fn blocking_client_roundtrip() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (port, server) = runtime.block_on(serve(|mut ws| async move {
        if let Some(Ok(WsMessage::Text(text))) = ws.next().await {
            ws.send(WsMessage::Text(text.to_uppercase())).await.unwrap();
        }
        while let Some(Ok(_)) = ws.next().await {}
    }));

    let (tx, rx) = std::sync::mpsc::channel();
    struct Texts(std::sync::Mutex<std::sync::mpsc::Sender<String>>);
    impl EventHandler for Texts {
        fn on_text(&self, text: &str) {
            let _ = self.0.lock().unwrap().send(text.to_string());
        }
    }

    let socket = skiff::blocking::WebSocket::new(
        WebSocket::builder(format!("ws://127.0.0.1:{}", port))
            .handler(Texts(std::sync::Mutex::new(tx))),
    )
    .unwrap();
    socket.send_text("quiet").unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), "QUIET");

    socket.send_close(CloseCode::Normal, None).unwrap();
    runtime.block_on(server).unwrap();
}

#[test]
fn blocking_callback_can_reply() {
    use std::sync::{Arc, Mutex, OnceLock, Weak};

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (port, server) = runtime.block_on(serve(|mut ws| async move {
        match ws.next().await {
            Some(Ok(WsMessage::Text(text))) => assert_eq!(text, "ready"),
            other => panic!("unexpected message: {:?}", other),
        }
        ws.send(WsMessage::Text("marco".into())).await.unwrap();
        match ws.next().await {
            Some(Ok(WsMessage::Text(text))) => assert_eq!(text, "polo"),
            other => panic!("unexpected message: {:?}", other),
        }
        while let Some(Ok(_)) = ws.next().await {}
    }));

    type Slot = Arc<OnceLock<Weak<skiff::blocking::WebSocket>>>;
    struct Reply {
        socket: Slot,
        sent: Mutex<std::sync::mpsc::Sender<bool>>,
    }
    impl EventHandler for Reply {
        fn on_text(&self, text: &str) {
            if text != "marco" {
                return;
            }
            if let Some(socket) = self.socket.get().and_then(Weak::upgrade) {
                let ok = socket.send_text("polo").is_ok();
                let _ = self.sent.lock().unwrap().send(ok);
            }
        }
    }

    let slot: Slot = Arc::new(OnceLock::new());
    let (tx, rx) = std::sync::mpsc::channel();
    let socket = Arc::new(
        skiff::blocking::WebSocket::new(
            WebSocket::builder(format!("ws://127.0.0.1:{}", port)).handler(Reply {
                socket: Arc::clone(&slot),
                sent: Mutex::new(tx),
            }),
        )
        .unwrap(),
    );
    slot.set(Arc::downgrade(&socket)).unwrap();

    socket.send_text("ready").unwrap();
    assert!(rx.recv_timeout(WAIT).unwrap());
    assert_eq!(socket.state(), ConnectionState::Open);

    socket.send_close(CloseCode::Normal, None).unwrap();
    runtime.block_on(server).unwrap();
}
