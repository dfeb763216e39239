//! Shared helpers for integration tests: a raw-TCP mock upstream and a
//! proxy started on an ephemeral port.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use detour::{Error, Fallback, Forwarder, Proxy, RawRule, Router, RuleTable};

/// Start a backend that answers every request with a plain-text echo of
/// what it received:
///
/// ```text
/// POST /upload?name=a.txt
/// host: 127.0.0.1:40123
/// x-forwarded-for: 127.0.0.1
/// x-forwarded-proto: http
/// body: hello
/// ```
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut reader = BufReader::new(read);

                let mut request_line = String::new();
                if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
                    return;
                }
                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap_or_default().to_owned();
                let target = parts.next().unwrap_or_default().to_owned();

                let mut echoed = Vec::new();
                let mut content_length = 0usize;
                let mut chunked = false;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).await.unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    let (name, value) = line.split_once(':').unwrap();
                    let name = name.trim().to_ascii_lowercase();
                    let value = value.trim().to_owned();
                    match name.as_str() {
                        "content-length" => content_length = value.parse().unwrap(),
                        "transfer-encoding" => chunked = value.eq_ignore_ascii_case("chunked"),
                        _ => {}
                    }
                    if matches!(
                        name.as_str(),
                        "host" | "x-forwarded-for" | "x-forwarded-host" | "x-forwarded-proto" | "x-trace"
                    ) {
                        echoed.push(format!("{name}: {value}"));
                    }
                }
                echoed.sort();

                let body = if chunked {
                    read_chunked(&mut reader).await
                } else {
                    let mut body = vec![0u8; content_length];
                    reader.read_exact(&mut body).await.unwrap();
                    body
                };

                let mut reply = format!("{method} {target}\n");
                for line in echoed {
                    reply.push_str(&line);
                    reply.push('\n');
                }
                reply.push_str("body: ");
                reply.push_str(&String::from_utf8_lossy(&body));

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\nKeep-Alive: timeout=5\r\n\r\n{}",
                    reply.len(),
                    reply
                );
                let _ = write.write_all(response.as_bytes()).await;
                let _ = write.shutdown().await;
            });
        }
    });

    addr
}

async fn read_chunked<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> Vec<u8> {
    let mut body = Vec::new();
    loop {
        let mut size = String::new();
        reader.read_line(&mut size).await.unwrap();
        let size = usize::from_str_radix(size.trim(), 16).unwrap();
        let mut chunk = vec![0u8; size + 2];
        reader.read_exact(&mut chunk).await.unwrap();
        if size == 0 {
            return body;
        }
        body.extend_from_slice(&chunk[..size]);
    }
}

/// Start a backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A running proxy. Dropping `shutdown` does not stop it; send on it.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: oneshot::Sender<()>,
    pub handle: JoinHandle<Result<(), Error>>,
}

impl RunningProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

pub async fn start_proxy(rules: Vec<RawRule>, fallback: Fallback, timeout: Duration) -> RunningProxy {
    let table = RuleTable::load(rules).unwrap();
    let proxy = Proxy::new(Router::new(table), Forwarder::new(timeout)).fallback(fallback);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(detour::run(listener, proxy, async move {
        let _ = rx.await;
    }));

    RunningProxy { addr, shutdown, handle }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}
