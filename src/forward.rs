//! Upstream forwarding.
//!
//! Takes an inbound request and a resolved destination URL and replays the
//! request against the upstream, streaming the body both ways. The
//! forwarder never retries: a rewrite target is a single static host, and
//! uploads are not safe to send twice.

use std::net::SocketAddr;
use std::time::Duration;

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{StatusCode, Uri, Version};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::warn;

use crate::response::{self, Response};

/// Headers that describe one connection, not the message; never forwarded.
const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// HTTP/1.1 client for upstream calls. Cheap to clone; clones share one
/// connection pool.
#[derive(Clone, Debug)]
pub struct Forwarder {
    client: Client<HttpConnector, Incoming>,
    timeout: Duration,
}

impl Forwarder {
    /// `timeout` bounds the wait for upstream response headers. Body
    /// streaming afterwards is not bounded.
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `req` to `destination`, keeping its method, headers and body.
    ///
    /// The inbound query string is appended to the destination. Failures are
    /// answered locally: `502` when the upstream cannot be reached, `504`
    /// when it does not answer within the timeout.
    pub async fn forward(
        &self,
        req: http::Request<Incoming>,
        destination: &str,
        peer: SocketAddr,
    ) -> Response {
        let upstream = match upstream_uri(destination, req.uri().query()) {
            Ok(uri) => uri,
            Err(e) => {
                warn!(destination, error = %e, "destination is not a valid URI");
                return response::text(StatusCode::BAD_GATEWAY, "invalid upstream address\n");
            }
        };

        let (mut parts, body) = req.into_parts();
        let original_host = parts.headers.get(header::HOST).cloned()
            .or_else(|| parts.uri.authority().and_then(|a| HeaderValue::from_str(a.as_str()).ok()));

        strip_hop_by_hop(&mut parts.headers);
        add_forwarded_headers(&mut parts.headers, peer, original_host);
        if let Some(authority) = upstream.authority() {
            if let Ok(host) = HeaderValue::from_str(authority.as_str()) {
                parts.headers.insert(header::HOST, host);
            }
        }
        parts.uri = upstream;
        parts.version = Version::HTTP_11;

        let outbound = http::Request::from_parts(parts, body);
        let uri = outbound.uri().clone();

        match tokio::time::timeout(self.timeout, self.client.request(outbound)).await {
            Ok(Ok(res)) => {
                let (mut parts, body) = res.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                http::Response::from_parts(parts, body.boxed())
            }
            Ok(Err(e)) => {
                warn!(upstream = %uri, error = %e, "upstream request failed");
                response::text(StatusCode::BAD_GATEWAY, "upstream unreachable\n")
            }
            Err(_) => {
                warn!(upstream = %uri, timeout = ?self.timeout, "upstream timed out");
                response::text(StatusCode::GATEWAY_TIMEOUT, "upstream timed out\n")
            }
        }
    }
}

/// `destination` with the inbound `query` appended.
pub(crate) fn upstream_uri(destination: &str, query: Option<&str>) -> Result<Uri, http::uri::InvalidUri> {
    match query.filter(|q| !q.is_empty()) {
        None => destination.parse(),
        Some(q) => {
            let sep = if destination.contains('?') { '&' } else { '?' };
            format!("{destination}{sep}{q}").parse()
        }
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named in `Connection` are hop-by-hop for this message too.
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP.iter().chain(&named) {
        headers.remove(name);
    }
}

fn add_forwarded_headers(headers: &mut HeaderMap, peer: SocketAddr, host: Option<HeaderValue>) {
    let ip = peer.ip().to_string();
    let forwarded_for = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{prior}, {ip}"),
        None => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    if let Some(host) = host {
        headers.insert(X_FORWARDED_HOST, host);
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_appended() {
        assert_eq!(
            upstream_uri("http://backend:8080/upload", Some("name=a.txt")).unwrap(),
            "http://backend:8080/upload?name=a.txt"
        );
        assert_eq!(
            upstream_uri("http://backend:8080/upload?v=1", Some("name=a.txt")).unwrap(),
            "http://backend:8080/upload?v=1&name=a.txt"
        );
        assert_eq!(
            upstream_uri("http://backend:8080/upload", Some("")).unwrap(),
            "http://backend:8080/upload"
        );
        assert_eq!(
            upstream_uri("http://backend:8080/upload", None).unwrap(),
            "http://backend:8080/upload"
        );
    }

    #[test]
    fn hop_by_hop_headers_are_removed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-trace"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-trace", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn forwarded_for_appends_peer() {
        let peer: SocketAddr = "10.0.0.7:51000".parse().unwrap();

        let mut headers = HeaderMap::new();
        add_forwarded_headers(&mut headers, peer, Some(HeaderValue::from_static("app.local")));
        assert_eq!(headers[&X_FORWARDED_FOR], "10.0.0.7");
        assert_eq!(headers[&X_FORWARDED_HOST], "app.local");
        assert_eq!(headers[&X_FORWARDED_PROTO], "http");

        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.9"));
        add_forwarded_headers(&mut headers, peer, None);
        assert_eq!(headers[&X_FORWARDED_FOR], "203.0.113.9, 10.0.0.7");
        assert!(headers.get(&X_FORWARDED_HOST).is_none());
    }
}
