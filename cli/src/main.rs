//! CLI entrypoint for relaykit.
//!
//! Wires every layer together using dependency injection: loads config,
//! builds the session engine and its `App`, builds the gateway, and serves
//! whichever transports the config enables.

use anyhow::{bail, Context, Result};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use relaykit_application::{App, ConfirmationPolicy, SessionEngine};
use relaykit_domain::{GuardRule, ToolGuardrail};
use relaykit_infrastructure::{
    AuthMode, BuiltinProvider, ConfigLoader, EchoAdapter, FileConfig, FileSnapshotStore, Gateway, SimpleRenderer,
    ToolRegistry,
};
use relaykit_presentation::{events_get, events_post, socketio_handler, ws_handler};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relaykit-gateway", about = "Hosts conversational sessions and serves them over several wire transports")]
struct Cli {
    /// Path to a TOML config file, taking priority over discovered ones.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity. Repeat for more (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::from(0),
        Err(err) if err.downcast_ref::<ConfigLoadFailure>().is_some() => {
            eprintln!("invalid config: {err}");
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct ConfigLoadFailure(String);

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let config = ConfigLoader::load(cli.config.as_ref()).map_err(|e| ConfigLoadFailure(e.to_string()))?;

    info!(bind = %config.gateway.bind_address, port = config.gateway.port, "starting relaykit gateway");

    let app = Arc::new(build_app(&config).await?);
    let gateway = Arc::new(build_gateway(&config, app));
    gateway.set_self_ref(Arc::downgrade(&gateway));

    let mut transport_handles = Vec::new();

    let http_transports: Vec<&str> = config
        .transport
        .enabled
        .iter()
        .map(String::as_str)
        .filter(|name| *name == "websocket" || *name == "http_sse" || *name == "socketio")
        .collect();

    if !http_transports.is_empty() {
        let mut router = Router::new();
        if http_transports.contains(&"websocket") {
            router = router.route("/ws", get(ws_handler));
        }
        if http_transports.contains(&"http_sse") {
            router = router.route("/events", get(events_get).post(events_post));
        }
        if http_transports.contains(&"socketio") {
            router = router.route("/socket.io/:namespace", get(socketio_handler));
        }
        let router = router.with_state(gateway.clone());

        let addr = format!("{}:{}", config.gateway.bind_address, config.gateway.port);
        let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
        info!(%addr, transports = ?http_transports, "http transports listening");
        transport_handles.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                warn!("http server error: {e}");
            }
        }));
    }

    if config.transport.enabled.iter().any(|name| name == "unix_socket") {
        let Some(path) = config.transport.unix_socket_path.clone() else {
            bail!("transport.unix_socket enabled but transport.unix_socket_path is unset");
        };
        let gateway = gateway.clone();
        transport_handles.push(tokio::spawn(async move {
            if let Err(e) = relaykit_presentation::serve_unix_socket(&path, gateway).await {
                warn!("unix socket server error: {e}");
            }
        }));
    }

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received");

    for handle in transport_handles {
        handle.abort();
    }

    Ok(())
}

async fn build_app(config: &FileConfig) -> Result<App> {
    let adapter: Arc<dyn relaykit_application::ModelAdapter> = match config.model.adapter.as_str() {
        "echo" => Arc::new(EchoAdapter::new()),
        other => {
            warn!(adapter = other, "unknown model adapter, falling back to echo");
            Arc::new(EchoAdapter::new())
        }
    };

    let mut registry = ToolRegistry::new().register(Arc::new(BuiltinProvider::new()));
    registry.discover().await;
    let tool_spec = relaykit_infrastructure::default_tool_spec();
    let renderer = Arc::new(SimpleRenderer::new().with_tools(&tool_spec));
    let tool_runner = Arc::new(registry);

    let mut engine = SessionEngine::new(adapter, tool_runner, renderer).with_confirmation_policy(config.app.confirmation_policy);

    if !config.guardrail.rules.is_empty() {
        let rules: Vec<GuardRule> = config.guardrail.rules.iter().cloned().map(Into::into).collect();
        engine = engine.with_guardrail(ToolGuardrail::new(rules));
    }

    let snapshot_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("relaykit").join("snapshots");
    let snapshot_store = Arc::new(FileSnapshotStore::new(snapshot_dir));

    Ok(App::new(engine).with_snapshot_store(snapshot_store))
}

fn build_gateway(config: &FileConfig, default_app_handle: Arc<App>) -> Gateway {
    let auth = match &config.gateway.auth_token {
        Some(token) => AuthMode::token(token.clone()),
        None => AuthMode::None,
    };

    let mut gateway = Gateway::new(config.app.default_app.clone(), default_app_handle)
        .with_auth(auth)
        .with_buffer_limits(config.gateway.client_buffer_max, config.gateway.overflow_policy.into());

    if config.rate_limit.enabled {
        gateway = gateway.with_rate_limit(config.rate_limit.per_minute, config.rate_limit.per_day);
    }

    gateway
}
