use std::net::SocketAddr;
use std::sync::Arc;
use uptime_report::report::{
    ReportContext, ReportQueue, ReportService, spawn_report_worker,
};
use uptime_report::store::{MemoryJobRegistry, MemoryStore};
use uptime_report::{api, config, ingest};

fn init_tracing(level: tracing::Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(config.log_level());
    tracing::info!(
        app = %config.app.name,
        config_path = config::DEFAULT_CONFIG_PATH,
        "uptime-report starting"
    );

    let store = Arc::new(MemoryStore::new());
    match config.data_dir() {
        Some(dir) => match ingest::load_dataset(dir, &store) {
            Ok(summary) => tracing::info!(
                observations = summary.observations.loaded,
                skipped = summary.observations.skipped,
                "Dataset ready"
            ),
            Err(err) => tracing::warn!(error = %err, "Failed to load dataset, starting empty"),
        },
        None => tracing::warn!("No data directory configured in [data].dir, starting empty"),
    }

    let settings = Arc::new(config.report_settings());
    std::fs::create_dir_all(&settings.output_dir)?;

    let registry = Arc::new(MemoryJobRegistry::new());
    let ctx = ReportContext {
        store,
        registry: registry.clone(),
        settings: Arc::clone(&settings),
    };
    let (queue, rx) = ReportQueue::channel();
    let _worker = spawn_report_worker(rx, ctx);
    let service = Arc::new(ReportService::new(
        registry,
        queue,
        settings.output_dir.clone(),
    ));

    let app = api::router(service);
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
