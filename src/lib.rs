//! # detour
//!
//! A small path-rewriting reverse proxy. Requests are matched against an
//! ordered table of rules; the first match is rewritten to its destination
//! URL and forwarded there.
//!
//! ## The contract
//!
//! The table is loaded once, validated once, and never changes. After that
//! routing is a pure function of the request path:
//!
//! - **First match wins**: rule order in the table is the only priority.
//! - **One segment per parameter**: `/api/download/:port` matches
//!   `/api/download/9000`, never `/api/download/9000/extra`.
//! - **No guessing**: `..` and `.` segments are rejected before matching;
//!   a destination naming a parameter its pattern does not bind is rejected
//!   at load time.
//!
//! What happens to unmatched requests (404 or pass-through) is policy, and
//! lives in [`Proxy`], not in the [`Router`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use detour::{Forwarder, Proxy, RawRule, Router, RuleTable, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), detour::Error> {
//!     let table = RuleTable::load([
//!         RawRule::new("/api/upload", "http://backend:8080/upload"),
//!         RawRule::new("/api/download/:port", "http://backend:8080/download/:port"),
//!     ])?;
//!
//!     let proxy = Proxy::new(Router::new(table), Forwarder::new(Duration::from_secs(30)));
//!     Server::bind("0.0.0.0:3030".parse().unwrap()).serve(proxy).await
//! }
//! ```

mod error;
mod forward;
mod pattern;
mod proxy;
mod router;
mod server;
mod table;

pub mod config;
pub mod response;

pub use config::Config;
pub use error::{ConfigError, Error, RequestError};
pub use forward::Forwarder;
pub use pattern::{Part, Pattern, Segment, Template};
pub use proxy::{Fallback, Proxy};
pub use router::{MatchResult, Router, validate_path};
pub use server::{Server, run};
pub use table::{RawRule, Rule, RuleTable};
