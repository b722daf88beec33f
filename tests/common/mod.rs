//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;

use mux_proxy::config::CertificateConfig;
use mux_proxy::lifecycle::{Proxy, Shutdown};
use mux_proxy::net::tls::load_acceptor;
use mux_proxy::routing::RouteTable;

pub const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// A port that was free a moment ago.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Write a self-signed certificate for `localhost` to scratch files.
pub fn self_signed(name: &str) -> CertificateConfig {
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let dir: PathBuf = std::env::temp_dir().join(format!("mux-proxy-it-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let cert = dir.join("cert.pem");
    let key = dir.join("key.pem");
    std::fs::write(&cert, generated.cert.pem()).unwrap();
    std::fs::write(&key, generated.key_pair.serialize_pem()).unwrap();

    CertificateConfig {
        cert: cert.display().to_string(),
        key: key.display().to_string(),
    }
}

pub fn acceptor(name: &str) -> TlsAcceptor {
    load_acceptor(&self_signed(name)).unwrap()
}

/// Bind and run a proxy for `table`. Dropping the returned `Shutdown` does
/// not stop it; call `trigger`.
pub async fn start_proxy(table: RouteTable, tls: Option<TlsAcceptor>) -> Shutdown {
    let proxy = Proxy::bind(&table, tls, LOCALHOST).await.unwrap();
    let shutdown = Shutdown::new();
    tokio::spawn(proxy.run(shutdown.subscribe()));
    shutdown
}

/// Start a backend echoing every byte back on each connection.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// Start a raw-TLS echo backend.
pub async fn start_tls_echo_backend() -> SocketAddr {
    let tls = acceptor("echo-backend");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let tls = tls.clone();
            tokio::spawn(async move {
                if let Ok(stream) = tls.accept(socket).await {
                    let (mut reader, mut writer) = tokio::io::split(stream);
                    let _ = tokio::io::copy(&mut reader, &mut writer).await;
                }
            });
        }
    });
    addr
}

/// Read an HTTP request head. Returns the head and its `Host` value.
async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> Option<(String, String)> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await.ok()? == 0 {
            return None;
        }
        head.push(byte[0]);
    }
    let head = String::from_utf8_lossy(&head).to_string();
    let host = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("host").then(|| value.trim().to_string())
        })
        .unwrap_or_default();
    Some((head, host))
}

async fn answer<S: AsyncRead + AsyncWrite + Unpin>(mut stream: S, name: &'static str) {
    let Some((_, host)) = read_head(&mut stream).await else {
        return;
    };
    let body = format!("{}|{}", name, host);
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Start a mock HTTP backend answering `<name>|<Host header>`.
pub async fn start_mock_backend(name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(answer(socket, name));
        }
    });
    addr
}

/// Same as `start_mock_backend`, over TLS.
pub async fn start_tls_mock_backend(name: &'static str) -> SocketAddr {
    let tls = acceptor(name);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let tls = tls.clone();
            tokio::spawn(async move {
                if let Ok(stream) = tls.accept(socket).await {
                    answer(stream, name).await;
                }
            });
        }
    });
    addr
}

/// Answer any upgrade request with `101`, then echo bytes.
async fn upgrade_and_echo<S: AsyncRead + AsyncWrite + Unpin>(mut stream: S) {
    if read_head(&mut stream).await.is_none() {
        return;
    }
    let _ = stream
        .write_all(
            b"HTTP/1.1 101 Switching Protocols\r\n\
              Upgrade: websocket\r\n\
              Connection: Upgrade\r\n\r\n",
        )
        .await;
    let (mut reader, mut writer) = tokio::io::split(stream);
    let _ = tokio::io::copy(&mut reader, &mut writer).await;
}

/// Start a backend that accepts any upgrade and then echoes bytes.
pub async fn start_upgrade_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(upgrade_and_echo(socket));
        }
    });
    addr
}

/// Same as `start_upgrade_backend`, over TLS.
pub async fn start_tls_upgrade_backend() -> SocketAddr {
    let tls = acceptor("upgrade-backend");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let tls = tls.clone();
            tokio::spawn(async move {
                if let Ok(stream) = tls.accept(socket).await {
                    upgrade_and_echo(stream).await;
                }
            });
        }
    });
    addr
}

/// Start an echo backend that resets any connection whose first four bytes
/// are `boom`. The rest of that write is left unread, so the kernel answers
/// the close with a reset.
pub async fn start_fragile_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut first = [0u8; 4];
                if socket.read_exact(&mut first).await.is_err() || &first == b"boom" {
                    return;
                }
                if socket.write_all(&first).await.is_err() {
                    return;
                }
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// Start a backend that reads each connection to EOF and reports what it got.
pub async fn start_recording_backend() -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut received = Vec::new();
                if socket.read_to_end(&mut received).await.is_ok() {
                    let _ = tx.send(received);
                }
            });
        }
    });
    (addr, rx)
}

/// Read a response head byte by byte, leaving anything after it unread.
pub async fn read_response_head<S: AsyncRead + Unpin>(stream: &mut S) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut byte))
            .await
            .expect("response head")
            .unwrap();
        assert_ne!(n, 0, "connection closed during handshake");
        head.push(byte[0]);
    }
    String::from_utf8_lossy(&head).to_string()
}

/// Send `request` verbatim and read until the proxy closes the connection.
pub async fn send_raw(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    // a reset after the last byte still counts as closed
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("proxy should close the connection");
    String::from_utf8_lossy(&response).to_string()
}

/// HTTP client resolving `hosts` to the proxy on `port`.
pub fn client(hosts: &[&str], port: u16) -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .no_proxy()
        .timeout(Duration::from_secs(5));
    for host in hosts {
        builder = builder.resolve(host, SocketAddr::new(LOCALHOST, port));
    }
    builder.build().unwrap()
}
