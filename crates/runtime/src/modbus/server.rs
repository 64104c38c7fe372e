//! TCP accept loop and per-connection workers for the Modbus slave. Async
//! equivalent of the original's one-detached-pthread-per-connection model.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use super::strategy::IndexedStrategy;
use super::wire::NET_BUFFER_SIZE;
use crate::services::RunFlag;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub async fn run_modbus_server(bind_addr: SocketAddr, strategy: Arc<IndexedStrategy>, run: RunFlag) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "modbus slave listening");

    while run.load(Ordering::Relaxed) {
        let accepted = tokio::time::timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await;

        let (stream, peer) = match accepted {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                warn!(error = %e, "modbus slave accept failed");
                continue;
            }
            Err(_elapsed) => continue,
        };

        let strategy = Arc::clone(&strategy);
        let conn_run = Arc::clone(&run);
        let connection_id = Uuid::new_v4();
        let span = tracing::info_span!("modbus_connection", %connection_id, %peer);
        tokio::spawn(handle_connection(stream, strategy, conn_run).instrument(span));
    }

    info!("modbus slave shutting down");
    Ok(())
}

async fn handle_connection(mut stream: TcpStream, strategy: Arc<IndexedStrategy>, run: RunFlag) {
    info!("client connected");
    let mut buffer = vec![0u8; NET_BUFFER_SIZE];

    while run.load(Ordering::Relaxed) {
        let n = match stream.read(&mut buffer).await {
            Ok(0) => {
                info!("client closed connection");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "read failed, closing connection");
                break;
            }
        };

        let response_len = crate::modbus::process_message(&mut buffer, n, &strategy).await;

        if let Err(e) = stream.write_all(&buffer[..response_len]).await {
            warn!(error = %e, "write failed, closing connection");
            break;
        }
    }

    debug!("connection worker exiting");
}
