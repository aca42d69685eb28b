//! WebSocket echo server.
//!
//! Run: `cargo run --example echo_server`
//! Then connect with: `cargo run --example client`

use std::error::Error;

use tokio::net::TcpListener;
use tracing::{error, info};

use wsproto::Error as WsError;

const LISTEN_ADDR: &str = "127.0.0.1:9001";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let listener = TcpListener::bind(LISTEN_ADDR).await?;
    info!("listening on ws://{LISTEN_ADDR}");

    loop {
        let (stream, addr) = listener.accept().await?;
        tokio::spawn(async move {
            info!(%addr, "connection accepted");
            let mut conn = match wsproto::accept(stream).await {
                Ok(conn) => conn,
                Err(err) => {
                    error!(%addr, %err, "handshake failed");
                    return;
                }
            };

            loop {
                match conn.next_message().await {
                    Ok((kind, data)) => {
                        info!(%addr, %kind, len = data.len(), "echoing message");
                        if let Err(err) = conn.write_message(kind, &data).await {
                            error!(%addr, %err, "echo failed");
                            break;
                        }
                    }
                    Err(WsError::ConnectionClosed) => {
                        info!(%addr, "connection closed");
                        break;
                    }
                    Err(err) => {
                        error!(%addr, %err, "connection failed");
                        break;
                    }
                }
            }
        });
    }
}
