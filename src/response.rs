//! Response body type and the proxy's own responses.
//!
//! Upstream responses stream straight through; only the proxy's own
//! answers (400, 404, 502, 504) are built here, always as short
//! `text/plain` bodies so a human reading `curl` output knows which hop
//! failed.

use bytes::Bytes;
use http::{HeaderValue, StatusCode, header};
use http_body_util::{BodyExt, Full, combinators::BoxBody};

/// Body of every response the proxy produces.
///
/// Upstream bodies are `hyper::body::Incoming`; local bodies are `Full`.
/// Boxing unifies them behind one type at the cost of one allocation per
/// response.
pub type Body = BoxBody<Bytes, hyper::Error>;

pub type Response = http::Response<Body>;

/// Marks responses the proxy generated itself, as opposed to upstream ones.
pub const GENERATED_BY: &str = "x-detour-error";

/// `text/plain; charset=utf-8` response with the given status.
pub fn text(code: StatusCode, body: impl Into<String>) -> Response {
    let mut res = build(code, full(body.into()));
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    res
}

fn full(chunk: impl Into<Bytes>) -> Body {
    Full::new(chunk.into()).map_err(|never| match never {}).boxed()
}

fn build(code: StatusCode, body: Body) -> Response {
    let mut res = http::Response::new(body);
    *res.status_mut() = code;
    if code.is_client_error() || code.is_server_error() {
        res.headers_mut().insert(GENERATED_BY, HeaderValue::from_static("1"));
    }
    res
}
