//! sw-daemon entry point.
//!
//! Thin on purpose: sets up tracing, wires the components named in the
//! configuration, then waits for ctrl-c or for an agent to stop. All wiring
//! lives in `wiring.rs`; the poll loop in `poller.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use axum::http::{HeaderValue, Method};
use clap::Parser;
use sw_config::{load_layered_yaml, resolve_secrets, SecretNeeds};
use sw_daemon::{poller, routes, state, wiring};
use sw_runtime::SystemClock;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(name = "sw-daemon")]
#[command(about = "Mirror live streams into chat channels", long_about = None)]
struct Args {
    /// Layered config paths (base -> env -> override), merged in order.
    #[arg(long = "config", required = true, num_args = 1..)]
    config_paths: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();
    let args = Args::parse();

    let paths: Vec<&str> = args.config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = load_layered_yaml(&paths).context("load config failed")?;
    let cfg = loaded.typed()?;
    info!(config_hash = %loaded.config_hash, agents = cfg.agents.len(), "config loaded");
    let secrets = resolve_secrets(&cfg, SecretNeeds::ALL)?;

    let store = wiring::build_store(&cfg, &secrets)?;
    let directory = wiring::build_directory(&cfg, &store).await?;
    let source = Arc::new(wiring::build_source(&cfg, &secrets)?);
    let classifier = wiring::build_classifier(&cfg, directory);

    let ctx = wiring::agent_context(&cfg, store, Arc::new(SystemClock))?;
    let (handles, mut agents) = wiring::spawn_agents(&cfg, &ctx);

    let shared = Arc::new(state::AppState::new(handles.clone()));
    poller::spawn_poll_loop(
        poller::Poller::new(source, classifier, handles),
        Arc::clone(&shared),
        cfg.twitch.poll_interval(),
    );

    if let Some(status) = &cfg.status {
        serve_status(Arc::clone(&shared), status.addr).await?;
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            res = &mut shutdown => {
                res.context("listen for ctrl-c failed")?;
                info!("shutdown requested");
                return Ok(());
            }
            exit = agents.join_next() => match exit {
                None => bail!("no agents left running"),
                Some(Err(e)) => bail!("agent supervisor failed: {e}"),
                Some(Ok((id, channel, outcome))) => match outcome {
                    Ok(Ok(())) => info!(agent = id, channel = %channel, "agent stopped"),
                    Ok(Err(e)) => {
                        error!(agent = id, channel = %channel, error = %e, "agent failed");
                        return Err(e).with_context(|| format!("agent {id} for channel {channel} failed"));
                    }
                    Err(e) => bail!("agent {id} for channel {channel} panicked: {e}"),
                },
            },
        }
    }
}

/// Bind the read-only status surface and serve it in the background.
async fn serve_status(shared: Arc<state::AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    state::spawn_heartbeat(Arc::clone(&shared), Duration::from_secs(1));

    let app = routes::build_router(shared)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind status surface on {addr} failed"))?;
    info!("sw-daemon status on http://{}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "status server crashed");
        }
    });
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_headers(tower_http::cors::Any)
}
