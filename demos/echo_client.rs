//! Echo Client Example
//!
//! Connects to an echo server, sends a few messages and prints what comes
//! back.
//!
//! ```text
//! cargo run --example echo_client -- ws://127.0.0.1:9001
//! ```

use skiff::prelude::*;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:9001".to_string());

    let (events, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let socket = WebSocket::builder(url)
        .config(ClientConfig::default().user_agent("skiff-echo-client"))
        .handler(events)
        .build()
        .await?;
    println!("Connected to {}", socket.endpoint());

    socket.send_text("Hello, Skiff!").await?;
    socket.send_binary(&b"Binary payload"[..]).await?;
    socket.ping(&b"are you there"[..]).await?;

    let mut pending = 3;
    while let Some(event) = rx.recv().await {
        match event {
            Event::Text(text) => println!("Received text: {}", text),
            Event::Binary(data) => println!("Received binary: {} bytes", data.len()),
            Event::Pong(data) => println!("Received pong: {} bytes", data.len()),
            Event::Closed { code, reason } => {
                println!("Closed: {} {}", code, reason.unwrap_or_default());
                return Ok(());
            }
            _ => continue,
        }

        pending -= 1;
        if pending == 0 {
            socket.send_close(CloseCode::Normal, Some("Goodbye")).await?;
        }
    }

    Ok(())
}
