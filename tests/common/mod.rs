//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use camo_proxy::codec::{encode_path, Encoding, SigningKey};
use camo_proxy::config::CamoConfig;
use camo_proxy::observability::ProxyStats;
use camo_proxy::{HttpServer, Shutdown};

pub const KEY: &str = "test";
pub const IDENTITY: &str = "camo-test";
pub const IMAGE_HOST: &str = "images.example.com";

/// A canned origin response.
#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    chunked: bool,
    delay: Option<Duration>,
    pace: Option<Duration>,
}

impl Reply {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            chunked: false,
            delay: None,
            pace: None,
        }
    }

    pub fn image(body: &[u8]) -> Self {
        Self::new(200).header("Content-Type", "image/png").body(body)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: &[u8]) -> Self {
        self.body = body.to_vec();
        self
    }

    /// Send the body with chunked encoding and no Content-Length.
    pub fn chunked(mut self) -> Self {
        self.chunked = true;
        self
    }

    /// Wait before writing anything.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Chunked body whose 8-byte chunks are written `pace` apart.
    pub fn trickle(mut self, pace: Duration) -> Self {
        self.chunked = true;
        self.pace = Some(pace);
        self
    }

    /// Wire pieces in write order: head, then one piece per body chunk.
    fn pieces(&self) -> Vec<Vec<u8>> {
        let mut head = format!("HTTP/1.1 {} Mock\r\nConnection: close\r\n", self.status);
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }

        if self.status == 304 {
            head.push_str("\r\n");
            vec![head.into_bytes()]
        } else if self.chunked {
            head.push_str("Transfer-Encoding: chunked\r\n\r\n");
            let mut out = vec![head.into_bytes()];
            for chunk in self.body.chunks(8) {
                let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
                frame.extend_from_slice(chunk);
                frame.extend_from_slice(b"\r\n");
                out.push(frame);
            }
            out.push(b"0\r\n\r\n".to_vec());
            out
        } else {
            head.push_str(&format!("Content-Length: {}\r\n\r\n", self.body.len()));
            let mut out = head.into_bytes();
            out.extend_from_slice(&self.body);
            vec![out]
        }
    }
}

/// A programmable origin server on an ephemeral loopback port.
pub struct Origin {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Origin {
    /// Request heads received so far, lowercased.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Target URL on the pinned image host, carrying the origin's port.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}:{}{}", IMAGE_HOST, self.addr.port(), path)
    }
}

/// Start an origin that answers every request with `f(request_head)`.
pub async fn start_origin<F>(f: F) -> Origin
where
    F: Fn(&str) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let seen = requests.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let seen = seen.clone();
                    tokio::spawn(async move {
                        if let Some(head) = read_head(&mut socket).await {
                            let head = head.to_ascii_lowercase();
                            seen.lock().unwrap().push(head.clone());
                            let reply = f(&head);
                            respond(socket, reply).await;
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });

    Origin { addr, requests }
}

async fn read_head(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            return Some(String::from_utf8_lossy(&buf).into_owned());
        }
    }
}

async fn respond(mut socket: TcpStream, reply: Reply) {
    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }
    match reply.pace {
        Some(pace) => {
            for piece in reply.pieces() {
                if socket.write_all(&piece).await.is_err() {
                    return;
                }
                tokio::time::sleep(pace).await;
            }
        }
        None => {
            let _ = socket.write_all(&reply.pieces().concat()).await;
        }
    }
    let _ = socket.shutdown().await;
    // drain until the client closes so the response is not reset
    let mut sink = [0u8; 256];
    let _ = tokio::time::timeout(Duration::from_millis(200), socket.read(&mut sink)).await;
}

/// Base configuration for tests.
pub fn test_config() -> CamoConfig {
    let mut config = CamoConfig::default();
    config.server_name = IDENTITY.to_string();
    config.signing.hmac_key = KEY.to_string();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

pub struct Proxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub stats: Option<Arc<ProxyStats>>,
}

impl Proxy {
    /// Full proxy URL for a signed target.
    pub fn signed(&self, target: &str, encoding: Encoding) -> String {
        let path = encode_path(&SigningKey::new(KEY), target, encoding);
        format!("http://{}{}", self.addr, path)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a proxy whose upstream client resolves `hosts` to `origin`.
pub async fn start_proxy(config: CamoConfig, origin: SocketAddr, hosts: &[&str]) -> Proxy {
    let pinned = hosts
        .iter()
        .map(|host| (host.to_string(), origin))
        .collect();
    let server = HttpServer::with_pinned_hosts(config, pinned).unwrap();
    let stats = server.stats();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let run_shutdown = shutdown.clone();
    tokio::spawn(async move {
        server.run(listener, run_shutdown).await.unwrap();
    });

    Proxy {
        addr,
        shutdown,
        stats,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
