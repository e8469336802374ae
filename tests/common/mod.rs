//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    routing::any,
    Router,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use proxy_cluster::config::{Isolation, RuleConfig, UpstreamConfig};
use proxy_cluster::{HttpServer, ProxyConfig, Shutdown, WorkerPool};

/// Start a raw mock backend that answers every request with `200` and a
/// fixed body.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                // Read the request head before answering.
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }

                let response_str = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = socket.write_all(response_str.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a backend that echoes the request back.
///
/// Status is `201`; `x-echo-method` carries the method, `x-echo-header`
/// the value of the inbound `x-test` header; the body is `<uri>|<body>`.
pub async fn start_echo_backend() -> SocketAddr {
    async fn echo(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> (StatusCode, HeaderMap, String) {
        let mut out = HeaderMap::new();
        out.insert("x-echo-method", method.as_str().parse().unwrap());
        if let Some(value) = headers.get("x-test") {
            out.insert("x-echo-header", value.clone());
        }
        let body = format!("{}|{}", uri, String::from_utf8_lossy(&body));
        (StatusCode::CREATED, out, body)
    }

    serve(Router::new().fallback(echo)).await
}

/// Start a backend that returns the request body byte for byte, labelled
/// `content-encoding: gzip`.
pub async fn start_raw_echo_backend() -> SocketAddr {
    async fn raw(body: Bytes) -> ([(header::HeaderName, &'static str); 1], Bytes) {
        ([(header::CONTENT_ENCODING, "gzip")], body)
    }

    serve(Router::new().fallback(raw)).await
}

/// Start a backend where `GET /delay/{ms}` answers with `ms` after sleeping
/// that many milliseconds.
pub async fn start_delay_backend() -> SocketAddr {
    async fn delayed(Path(ms): Path<u64>) -> String {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        ms.to_string()
    }

    serve(Router::new().route("/delay/{ms}", any(delayed))).await
}

/// An address nothing listens on.
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Build a config from `(rule path, upstream id)` and `(upstream id, url)` pairs.
pub fn config(workers: usize, rules: &[(&str, &str)], upstreams: &[(&str, String)]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.server.workers = Some(workers);
    config.server.isolation = Isolation::Task;
    config.server.rules = rules
        .iter()
        .map(|(path, id)| RuleConfig {
            path: path.to_string(),
            upstreams: vec![id.to_string()],
        })
        .collect();
    config.server.upstreams = upstreams
        .iter()
        .map(|(id, url)| UpstreamConfig {
            id: id.to_string(),
            url: url.clone(),
        })
        .collect();
    config
}

/// A running front end.
pub struct Proxy {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl Proxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Serve `pool` with `config` on an ephemeral port.
pub async fn start_proxy(config: &ProxyConfig, pool: WorkerPool) -> Proxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, pool);
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, stop).await;
    });

    Proxy { addr, shutdown }
}
