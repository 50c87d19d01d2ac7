//! rsession-demo - a visit counter served behind the session middleware.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rsession::{MemoryBackend, SavePolicy};
use rsession_axum::SessionManager;
use tokio::net::TcpListener;
use tracing::info;

mod config;
mod routes;

use config::DemoConfig;

/// Serve a session-backed visit counter.
#[derive(Parser)]
#[command(name = "rsession-demo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on (overrides the config file)
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Cookie signing secret (overrides the config file)
    #[arg(long, env = "RSESSION_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Session TTL in seconds
    #[arg(long)]
    pub ttl: Option<u64>,

    /// When sessions are written relative to the response
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write JSON logs to a daily-rotated file in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    Deferred,
    Eager,
}

impl From<PolicyArg> for SavePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Deferred => SavePolicy::Deferred,
            PolicyArg::Eager => SavePolicy::Eager,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "rsession=debug,rsession_axum=debug,rsession_demo=debug,tower_http=debug,info"
    } else {
        "rsession=info,rsession_axum=info,rsession_demo=info,warn"
    };

    let (file_layer, _guard) = match &cli.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "rsession-demo.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (Some(non_blocking), Some(guard))
        }
        None => (None, None),
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(file_layer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "rsession=trace,rsession_axum=trace,rsession_demo=trace,info",
                ))
        }))
        .init();

    let mut config = match &cli.config {
        Some(path) => DemoConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DemoConfig::default(),
    };

    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(secret) = cli.secret {
        config.session.secret = secret;
    }
    if let Some(ttl) = cli.ttl {
        config.session.default_ttl_secs = ttl;
    }
    if let Some(policy) = cli.policy {
        config.session.save_policy = policy.into();
    }

    let backend = MemoryBackend::new();
    let _cleanup = backend.spawn_cleanup_task(Duration::from_secs(
        config.server.cleanup_interval_secs.max(1),
    ));

    let manager = SessionManager::builder(config.session.clone())
        .backend(backend)
        .build()
        .context("building session manager")?;

    let router = routes::router(manager);

    info!(
        bind = %config.server.bind,
        policy = ?config.session.save_policy,
        ttl_secs = config.session.default_ttl_secs,
        "Starting rsession demo"
    );

    let listener = TcpListener::bind(config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;

    axum::serve(listener, router).await.context("server error")?;

    Ok(())
}
