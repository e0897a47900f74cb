use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use store_uptime::api::{self, ApiContext};
use store_uptime::config;
use store_uptime::output::ReportFile;
use store_uptime::pipeline::ReportSettings;
use store_uptime::state::AppState;

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
    if config.logging.level.trim().parse::<tracing::Level>().is_err() {
        tracing::warn!(level = %config.logging.level, "Unrecognised log level, using info");
    }
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "store-uptime starting"
    );

    let params = config.engine_params()?;
    let reference = config.reference_time()?;
    let source = config.csv_source();
    tracing::info!(
        status = %source.status_path.display(),
        business_hours = %source.business_hours_path.display(),
        timezones = %source.timezones_path.display(),
        reference = %reference,
        default_timezone = %params.default_timezone,
        lookback_days = params.lookback_days,
        workers = params.workers.get(),
        "Report inputs configured"
    );

    let output = ReportFile::new(config.output_path());
    // A result left over from a previous process belongs to no run.
    if let Err(err) = output.remove() {
        tracing::warn!(error = %err, path = %output.path().display(), "Failed to clear stale report");
    }

    let context = ApiContext {
        state: Arc::new(RwLock::new(AppState::new())),
        source: Arc::new(source),
        settings: Arc::new(ReportSettings {
            params,
            reference,
            output,
        }),
    };

    let app = api::router(context);
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
