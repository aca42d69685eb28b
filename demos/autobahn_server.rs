//! Echo server for the Autobahn Testsuite server profile.
//!
//! Run: `cargo run --release --example autobahn_server`
//! Then point `wstest -m fuzzingclient` at ws://127.0.0.1:9002.
//!
//! Protocol failures are expected here: the suite probes exactly the error
//! paths, and each case ends when the connection reports its terminal error.

use std::error::Error;

use tokio::net::TcpListener;
use tracing::{debug, info};

use wsproto::{Config, Error as WsError};

const LISTEN_ADDR: &str = "127.0.0.1:9002";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let listener = TcpListener::bind(LISTEN_ADDR).await?;
    info!("autobahn echo server on ws://{LISTEN_ADDR}");

    loop {
        let (stream, addr) = listener.accept().await?;
        tokio::spawn(async move {
            let config = Config::default().with_max_message_size(32 * 1024 * 1024);
            let mut conn = match wsproto::accept_with(stream, config).await {
                Ok(conn) => conn,
                Err(err) => {
                    debug!(%addr, %err, "handshake failed");
                    return;
                }
            };

            loop {
                match conn.next_message().await {
                    Ok((kind, data)) => {
                        if conn.write_message(kind, &data).await.is_err() {
                            break;
                        }
                    }
                    Err(WsError::ConnectionClosed) => break,
                    Err(err) => {
                        debug!(%addr, %err, "case ended with error");
                        break;
                    }
                }
            }
        });
    }
}
