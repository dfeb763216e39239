//! `detour`: path-rewriting reverse proxy.
//!
//! ```text
//! detour                               # built-in rules, listen on 0.0.0.0:3030
//! detour --config detour.toml          # rules and settings from a file
//! detour --config detour.toml --check  # validate, print the table, exit
//! RUST_LOG=detour=debug detour         # log every rewrite
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use detour::{Config, Error, Fallback, Forwarder, Proxy, Router, Server};

#[derive(Parser, Debug)]
#[command(name = "detour", version, about = "Path-rewriting reverse proxy")]
struct Cli {
    /// TOML configuration file. Without it the built-in rules are used.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address; overrides `listen` from the file.
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Validate the configuration, print the rule table, and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "detour=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    // Every configuration error is fatal here, before a socket is opened.
    let table = config.rule_table()?;
    let timeout = config.forward_timeout()?;
    let fallback = match config.fallback_url()? {
        Some(base) => Fallback::Upstream(base),
        None => Fallback::NotFound,
    };

    if cli.check {
        for (index, rule) in table.rules().iter().enumerate() {
            println!("{index}: {} -> {}", rule.pattern(), rule.destination());
        }
        match &fallback {
            Fallback::NotFound => println!("unmatched: 404"),
            Fallback::Upstream(base) => println!("unmatched: {base}"),
        }
        return Ok(());
    }

    tracing::info!(
        listen = %config.listen,
        rules = table.len(),
        timeout = ?timeout,
        fallback = ?fallback,
        "configuration loaded"
    );

    let proxy = Proxy::new(Router::new(table), Forwarder::new(timeout)).fallback(fallback);
    Server::bind(config.listen).serve(proxy).await
}
