use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use clap::Parser;
use lumendb_core::catalog::Catalog;
use lumendb_core::limits::{self, BoundedAllocator, ConnectionLimiter};
use lumendb_core::pipeline::{self, Batch, BatchResponse, ServerInfo, Version};
use lumendb_core::snapshot::{self, LoadFailurePolicy};
use tower_http::trace::TraceLayer;

const PROTOCOL_MAJOR: u32 = 1;
const DEFAULT_ALLOCATOR_SIZE: u64 = 10 * 1024 * 1024 * 1024;
const MIN_ALLOCATOR_SIZE: u64 = 10 * 1024 * 1024;

fn default_threadpool_size() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// lumendb server: an in-memory vector database with batch-pipeline requests.
#[derive(Debug, Parser)]
#[command(name = "lumendb-server", version)]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 6174)]
    port: u16,

    /// Total bytes the process will allow across all stores.
    #[arg(long, default_value_t = DEFAULT_ALLOCATOR_SIZE)]
    allocator_size: u64,

    /// Maximum accepted request body size, in bytes.
    #[arg(long, default_value_t = 1024 * 1024)]
    message_size: usize,

    #[arg(long, default_value_t = false)]
    enable_persistence: bool,

    #[arg(long)]
    persist_location: Option<PathBuf>,

    /// Interval between periodic snapshot writes, in milliseconds.
    #[arg(long, default_value_t = 300_000)]
    persistence_interval: u64,

    #[arg(long, default_value_t = false)]
    fail_on_startup_if_persist_load_fails: bool,

    #[arg(long, default_value_t = 1024)]
    maximum_clients: usize,

    #[arg(long, default_value_t = default_threadpool_size())]
    threadpool_size: usize,

    #[arg(long, default_value_t = false)]
    enable_tracing: bool,

    #[arg(long)]
    otel_endpoint: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone)]
struct AppState {
    catalog: Arc<Catalog>,
    connections: Arc<ConnectionLimiter>,
    message_size: usize,
    address: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.allocator_size < MIN_ALLOCATOR_SIZE {
        eprintln!(
            "--allocator-size must be at least {MIN_ALLOCATOR_SIZE} bytes, got {}",
            args.allocator_size
        );
        return ExitCode::FAILURE;
    }
    if args.enable_persistence && args.persist_location.is_none() {
        eprintln!("--persist-location is required when --enable-persistence is set");
        return ExitCode::FAILURE;
    }
    if args.threadpool_size == 0 {
        eprintln!("--threadpool-size must be greater than zero");
        return ExitCode::FAILURE;
    }

    let filter = tracing_subscriber::EnvFilter::try_new(&args.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if args.enable_tracing {
        if let Some(endpoint) = &args.otel_endpoint {
            tracing::info!(endpoint, "tracing export requested");
        } else {
            tracing::warn!("--enable-tracing set without --otel-endpoint; spans stay local");
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(args.threadpool_size.max(1))
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), String> {
    let allocator = Arc::new(BoundedAllocator::new(args.allocator_size));
    let catalog = Arc::new(Catalog::new(allocator));
    let connections = Arc::new(ConnectionLimiter::new(args.maximum_clients));

    if args.enable_persistence {
        let location = args
            .persist_location
            .clone()
            .expect("validated at startup: --persist-location is required with --enable-persistence");
        let policy = if args.fail_on_startup_if_persist_load_fails {
            LoadFailurePolicy::Strict
        } else {
            LoadFailurePolicy::Lenient
        };
        match snapshot::load_with_policy(&catalog, &location, policy) {
            Ok(true) => tracing::info!(path = ?location, "loaded snapshot"),
            Ok(false) => tracing::warn!(path = ?location, "snapshot load failed, starting empty"),
            Err(e) => return Err(format!("failed to load persisted snapshot: {e}")),
        }

        let catalog = catalog.clone();
        let path = location;
        let interval = Duration::from_millis(args.persistence_interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = snapshot::save(&catalog, &path) {
                    tracing::error!(error = %e, "periodic snapshot write failed");
                }
            }
        });
    }

    let address = format!("{}:{}", args.host, args.port);
    let state = AppState {
        catalog,
        connections,
        message_size: args.message_size,
        address: address.clone(),
    };

    let app = Router::new()
        .route("/batch", post(handle_batch))
        .layer(DefaultBodyLimit::max(args.message_size))
        .layer(middleware::from_fn_with_state(state.clone(), connection_guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = address.parse().map_err(|e| format!("invalid host/port: {e}"))?;
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("failed to bind {addr}: {e}"))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| format!("server error: {e}"))?;

    Ok(())
}

async fn connection_guard(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: axum::extract::Request,
    next: Next,
) -> axum::response::Response {
    let id = match state.connections.admit(addr.to_string()) {
        Ok(id) => id,
        Err(_) => return (StatusCode::TOO_MANY_REQUESTS, "too many clients").into_response(),
    };
    let response = next.run(request).await;
    state.connections.remove(id);
    response
}

fn protocol_major_from_headers(headers: &HeaderMap) -> Option<u32> {
    headers
        .get("x-protocol-major")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

async fn handle_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    if let Err(e) = limits::check_message_size(body.len(), state.message_size) {
        return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response();
    }

    if let Some(client_major) = protocol_major_from_headers(&headers) {
        if client_major != PROTOCOL_MAJOR {
            let msg = format!(
                "protocol major version mismatch: server={PROTOCOL_MAJOR}, client={client_major}"
            );
            return (StatusCode::PRECONDITION_FAILED, msg).into_response();
        }
    }

    let batch: Batch = match serde_json::from_slice(&body) {
        Ok(b) => b,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let catalog = state.catalog.clone();
    let connections = state.connections.clone();
    let address = state.address.clone();
    let info_catalog = catalog.clone();
    let response: BatchResponse = pipeline::execute_batch(
        &catalog,
        move || ServerInfo {
            address: address.clone(),
            version: Version { major: PROTOCOL_MAJOR, minor: 0, patch: 0 },
            server_type: "lumendb".to_string(),
            allocator_limit_bytes: info_catalog.allocator().limit(),
            allocator_remaining_bytes: info_catalog.allocator().remaining(),
        },
        move || connections.list(),
        batch,
    );

    Json(response).into_response()
}
