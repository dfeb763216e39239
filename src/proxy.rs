//! Per-request glue: route, then forward or fall back.

use std::net::SocketAddr;

use http::StatusCode;
use hyper::body::Incoming;
use tracing::{debug, warn};

use crate::forward::Forwarder;
use crate::response::{self, Response};
use crate::router::{MatchResult, Router};

/// What to do with a request no rule matches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Fallback {
    /// Answer `404 Not Found`.
    #[default]
    NotFound,
    /// Pass the request through unchanged (path and query kept) to this
    /// base URL, e.g. `http://ui:3000`.
    Upstream(String),
}

/// The proxy: a router, a forwarder, and a fallback policy.
#[derive(Clone, Debug)]
pub struct Proxy {
    router: Router,
    forwarder: Forwarder,
    fallback: Fallback,
}

impl Proxy {
    pub fn new(router: Router, forwarder: Forwarder) -> Self {
        Self { router, forwarder, fallback: Fallback::NotFound }
    }

    pub fn fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Turn one inbound request into one response. Never fails: every
    /// error becomes a status code for this request only.
    pub async fn handle(&self, req: http::Request<Incoming>, peer: SocketAddr) -> Response {
        let path = req.uri().path().to_owned();

        match self.router.route(&path) {
            Ok(MatchResult::Matched { rule, destination }) => {
                debug!(method = %req.method(), path, rule, destination, "rewrite");
                self.forwarder.forward(req, &destination, peer).await
            }
            Ok(MatchResult::NoMatch) => match &self.fallback {
                Fallback::NotFound => {
                    debug!(method = %req.method(), path, "no rule matched");
                    response::text(StatusCode::NOT_FOUND, "no route\n")
                }
                Fallback::Upstream(base) => {
                    let destination = format!("{base}{path}");
                    debug!(method = %req.method(), path, destination, "pass-through");
                    self.forwarder.forward(req, &destination, peer).await
                }
            },
            Err(e) => {
                warn!(peer = %peer, error = %e, "rejected request");
                response::text(StatusCode::BAD_REQUEST, format!("{e}\n"))
            }
        }
    }
}
