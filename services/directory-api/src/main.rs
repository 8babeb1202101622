//! S-100 service directory server.

use anyhow::Result;
use clap::Parser;
use std::{env, net::SocketAddr, sync::Arc};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use directory_api::{build_router, sync_task::SyncTask, AppState, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "directory-api")]
#[command(about = "S-100 maritime service directory")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Number of tokio worker threads (default: number of CPU cores)
    #[arg(long)]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    let threads = args.worker_threads.or_else(|| {
        env::var("TOKIO_WORKER_THREADS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
    });
    if let Some(threads) = threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(args))?;
    Ok(())
}

async fn async_main(args: Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    info!("Prometheus metrics exporter initialized");

    let config = ServerConfig::from_env();
    info!(
        cache_ttl_secs = config.directory.cache_ttl.as_secs(),
        min_confidence = config.directory.min_confidence,
        sync_interval_secs = config.sync.interval_secs,
        "Starting service directory"
    );

    let state = Arc::new(AppState::new(config).await?.with_prometheus(prometheus_handle));

    let sync_config = state.config.sync.clone();
    if sync_config.enabled {
        let task = SyncTask::new(state.directory.clone(), sync_config);
        tokio::spawn(task.run_forever());
    } else {
        warn!("Periodic sync disabled; directory will answer from the registry only");
    }

    let app = build_router(state);

    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
