mod background;
mod handlers;
mod state;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use cpumon_core::{AppConfig, CollectorRegistry, Platform};

use state::AppState;

// ============================================================
// CLI
// ============================================================

#[derive(Parser, Debug)]
#[command(name = "cpumon-web", about = "cpumon web API server", version)]
struct Args {
    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:8080", env = "CPUMON_LISTEN")]
    listen: String,

    /// Path to the JSON configuration file. Platform defaults apply when the
    /// file does not exist.
    #[arg(long, env = "CPUMON_CONFIG")]
    config: Option<PathBuf>,

    /// Override every collector's sampling interval, in seconds.
    #[arg(long, env = "CPUMON_INTERVAL")]
    interval: Option<f64>,

    /// Path to /proc filesystem.
    #[arg(long, default_value = "/proc", env = "CPUMON_PROC_PATH")]
    proc_path: PathBuf,

    /// Path to /sys filesystem.
    #[arg(long, default_value = "/sys", env = "CPUMON_SYS_PATH")]
    sys_path: PathBuf,
}

// ============================================================
// Router
// ============================================================

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(handlers::handle_health))
        .route("/api/v1/platform", get(handlers::handle_platform))
        .route("/api/v1/objects", get(handlers::handle_objects))
        .route(
            "/api/v1/collectors/{name}/snapshot",
            get(handlers::handle_snapshot),
        )
        .route(
            "/api/v1/collectors/{name}/latest",
            get(handlers::handle_latest),
        )
        .route(
            "/api/v1/collectors/{name}/history",
            get(handlers::handle_history),
        )
        .with_state(state)
}

// ============================================================
// Main
// ============================================================

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("cpumon_web=info,cpumon_core=info")
                }),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{}", message);
            ExitCode::FAILURE
        }
    }
}

/// Builds the state from the configuration for the running host, mirroring
/// `cpumond`.
fn build_state(args: &Args) -> Result<AppState, String> {
    let config = match &args.config {
        Some(path) => AppConfig::load_or_default(path, Platform::current()),
        None => Ok(AppConfig::default_for(Platform::current())),
    }
    .map_err(|e| format!("failed to load config: {}", e))?;

    let registry = CollectorRegistry::for_current_platform()
        .with_probe_roots(&args.proc_path, &args.sys_path);
    config
        .check_platform(registry.platform_id())
        .map_err(|e| format!("invalid config: {}", e))?;

    let mut collectors = registry
        .instantiate_enabled(&config)
        .map_err(|e| format!("failed to create collectors: {}", e))?;

    if let Some(interval) = args.interval {
        for (name, collector) in collectors.iter_mut() {
            let mut options = collector.options().clone();
            options.sampling_interval_sec = interval;
            collector
                .configure(options)
                .map_err(|e| format!("invalid --interval for {}: {}", name, e))?;
        }
    }

    let available = registry.available().into_iter().map(String::from).collect();
    Ok(AppState::new(
        registry.platform_id().to_string(),
        available,
        collectors,
    ))
}

async fn async_main(args: Args) -> Result<(), String> {
    info!(version = env!("CARGO_PKG_VERSION"), "starting");

    let state = build_state(&args)?;
    info!(
        platform = %state.0.platform_id,
        collectors = ?state.0.collectors.keys().collect::<Vec<_>>(),
        "collectors ready"
    );

    for (name, collector) in &state.0.collectors {
        let interval = state::lock(collector).options().sampling_interval();
        tokio::spawn(background::tick_loop(
            name.clone(),
            collector.clone(),
            interval,
        ));
    }

    let app = build_router(state)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new());

    let addr: SocketAddr = args
        .listen
        .parse()
        .map_err(|e| format!("invalid listen address '{}': {}", args.listen, e))?;
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("failed to bind {}: {}", addr, e))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("server error: {}", e))
}
