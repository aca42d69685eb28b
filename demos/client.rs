//! WebSocket client.
//!
//! Start the echo server first: `cargo run --example echo_server`
//! Then run: `cargo run --example client`

use std::error::Error;

use tracing::info;

use wsproto::MessageType;

const SERVER_URL: &str = "ws://127.0.0.1:9001/echo";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("connecting to {SERVER_URL}");
    let mut conn = wsproto::dial(SERVER_URL).await?;

    conn.write_message(MessageType::Text, b"Hello, WebSocket!").await?;
    info!("sent: Hello, WebSocket!");

    let (kind, data) = conn.next_message().await?;
    info!(%kind, "received: {}", String::from_utf8_lossy(&data));

    // A streamed message, written in pieces.
    let mut writer = conn.next_writer(MessageType::Text).await?;
    writer.write(b"streamed ").await?;
    writer.write(b"in ").await?;
    writer.write(b"pieces").await?;
    writer.close().await?;

    let (_, data) = conn.next_message().await?;
    info!("received: {}", String::from_utf8_lossy(&data));

    conn.close().await?;
    info!("closed cleanly");
    Ok(())
}
