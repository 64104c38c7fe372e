//! End-to-end Modbus/TCP wire tests: a real `TcpListener` on an ephemeral
//! port, driven by an actual client socket, rather than calling
//! `process_message` in-process.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use oplc_runtime::glue::image::{BoolArray, WordArray};
use oplc_runtime::glue::GlueBinding;
use oplc_runtime::modbus::server::run_modbus_server;
use oplc_runtime::modbus::strategy::{IndexedStrategy, IndexedStrategyConfig};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn start_server() -> (SocketAddr, Arc<AtomicBool>, GlueBinding) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let glue = GlueBinding::new(50_000_000);
    glue.with_locked(|image| {
        image.bind_word(WordArray::Output, 0, 0);
        image.bind_bool(BoolArray::Output, 0, 0, false);
    })
    .await;

    let run = Arc::new(AtomicBool::new(true));
    let strategy = Arc::new(IndexedStrategy::new(glue.clone(), IndexedStrategyConfig::default()));

    let server_run = Arc::clone(&run);
    tokio::spawn(async move {
        run_modbus_server(addr, strategy, server_run).await.unwrap();
    });

    // give the listener a moment to bind before the first connection attempt
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, run, glue)
}

async fn connect(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(addr).await.unwrap()
}

#[tokio::test]
async fn write_then_read_holding_register_over_real_socket() {
    let (addr, run, _glue) = start_server().await;
    let mut stream = connect(addr).await;

    // write single register FC=6, addr 0, value 0x00FF
    let write_req = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x00, 0x00, 0xFF];
    stream.write_all(&write_req).await.unwrap();
    let mut resp = [0u8; 64];
    let n = stream.read(&mut resp).await.unwrap();
    assert_eq!(&resp[..n], &write_req);

    // read it back, FC=3
    let read_req = [0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01];
    stream.write_all(&read_req).await.unwrap();
    let n = stream.read(&mut resp).await.unwrap();
    assert_eq!(&resp[..n], &[0x00, 0x02, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0xFF]);

    run.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn unsolicited_garbage_yields_clean_exception_not_a_dropped_connection() {
    let (addr, run, _glue) = start_server().await;
    let mut stream = connect(addr).await;

    let garbage = [0xAA, 0xBB, 0xCC, 0xDD, 0x00, 0x02, 0x01, 0x63];
    stream.write_all(&garbage).await.unwrap();

    let mut resp = [0u8; 64];
    let n = stream.read(&mut resp).await.unwrap();
    assert_eq!(n, 9);
    assert_eq!(resp[7] & 0x80, 0x80);
    assert_eq!(resp[8], 1); // illegal function

    run.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn closing_the_socket_does_not_crash_the_server() {
    let (addr, run, _glue) = start_server().await;
    let stream = connect(addr).await;
    drop(stream);

    // a second client should still be served fine
    let mut stream2 = connect(addr).await;
    let read_req = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0x00, 0x00, 0x00, 0x01];
    stream2.write_all(&read_req).await.unwrap();
    let mut resp = [0u8; 64];
    let n = stream2.read(&mut resp).await.unwrap();
    assert!(n > 0);

    run.store(false, Ordering::Relaxed);
}
