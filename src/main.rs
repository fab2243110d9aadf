use tracing::{info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hydro_report_engine::app::Application;
use hydro_report_engine::config::Config;
use hydro_report_engine::store::MemorySeriesStore;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing with environment filter support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hydro_report_engine=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    info!("Starting hydro report engine with config: {:?}", config);

    info!("Loading series from {}", config.data_dir.display());
    let store = MemorySeriesStore::load_dir(&config.data_dir)?;

    let application = Application::build(config, store).await?;
    application.run_until_stopped().await
}
