//! beed - Bee command dispatch daemon
//!
//! Accepts commands from the console, the web and realtime websockets,
//! checks them against permission rules and dispatches them to registered
//! handler modules.

mod bus;
mod caps;
mod config;
mod db;
mod dispatch;
mod error;
mod handlers;
mod http;
mod metrics;
mod network;
mod state;
mod telemetry;

use crate::bus::{HookTable, LocalBus, MessageBus, run_listener};
use crate::caps::PermissionAuthority;
use crate::config::{Config, LiveConfig};
use crate::db::Persistence;
use crate::dispatch::{Console, ConsoleEcho, Dispatcher, ShortcutSet, run_console, stdout_sink};
use crate::handlers::{ModuleRegistry, system};
use crate::network::{Gateway, RealtimeRelay};
use crate::state::{Hive, Transport};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "bee.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {config_path}", errors.len());
    }

    info!(server = %config.server.name, debug = config.server.debug, "Starting beed");

    metrics::init();

    let bus: Arc<dyn MessageBus> = Arc::new(LocalBus::bind(&config.bus)?);

    // Persistence is required: handlers reach it through their context.
    let db = Persistence::bind(&config.database.url).await.map_err(|e| {
        error!(url = %config.database.url, error = %e, "Failed to bind persistence");
        e
    })?;

    let registry = Arc::new(ModuleRegistry::new(config.server.debug));
    system::register(&registry);

    let authority = PermissionAuthority::new(&config.free_actions)?;
    let shortcuts = ShortcutSet::load(&config)?;
    let live = Arc::new(LiveConfig::new(&config_path, config.clone()));
    let hive = Arc::new(Hive::new(Arc::clone(&bus), db.clone(), live, registry));
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&hive), authority, shortcuts));

    let shutdown = CancellationToken::new();
    let mut tasks = tokio::task::JoinSet::new();

    // Bus listener with one hook per running transport
    let mut hooks = HookTable::new();
    let mut transports = Vec::new();
    let console_out = config.console.enabled.then(stdout_sink);
    if let Some(out) = &console_out {
        hooks.register(
            HookTable::hook_name(Transport::Console),
            Arc::new(ConsoleEcho::new(out.clone())),
        );
        transports.push(Transport::Console);
    }
    if config.realtime.is_some() {
        hooks.register(
            HookTable::hook_name(Transport::Realtime),
            Arc::new(RealtimeRelay::new(Arc::clone(&hive.sessions))),
        );
        transports.push(Transport::Realtime);
    }
    tasks.spawn(run_listener(
        Arc::clone(&bus),
        Arc::new(hooks),
        transports,
        shutdown.clone(),
    ));

    if let Some(web) = &config.web {
        let listener = http::bind(web).await?;
        tasks.spawn(http::run_http_server(
            listener,
            Arc::clone(&dispatcher),
            shutdown.clone(),
        ));
    }

    if let Some(realtime) = &config.realtime {
        let gateway = Gateway::bind(realtime, Arc::clone(&dispatcher), shutdown.clone()).await?;
        tasks.spawn(gateway.run());
    }

    if let Some(out) = console_out {
        let console = Console::new(Arc::clone(&dispatcher), out);
        let span = telemetry::spans::console(&config.server.name);
        tasks.spawn(run_console(console, shutdown.clone()).instrument(span));
    }

    // Ctrl-C or `@exit` both end up cancelling the token.
    tokio::select! {
        _ = shutdown.cancelled() => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "Failed to listen for ctrl-c");
            }
            shutdown.cancel();
        }
    }
    info!("Shutting down");

    dispatcher.shutdown().await;
    while tasks.join_next().await.is_some() {}
    db.close().await;

    info!("Shutdown complete");
    Ok(())
}
