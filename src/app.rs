use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::config::Config;
use crate::services::{ReportService, ReportSettings};
use crate::store::MemorySeriesStore;

/// Running application: the HTTP server task.
pub struct Application {
    pub server_handle: JoinHandle<Result<(), std::io::Error>>,
}

impl Application {
    /// Build the report service over `store` and spawn the HTTP server.
    pub async fn build(
        config: Config,
        store: MemorySeriesStore,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application components");

        let settings = ReportSettings::from(&config);
        info!(
            "Report settings: water year starts in month {}, {}h extrema padding",
            settings.water_year_start.month(),
            settings.extrema_padding_hours
        );
        let report_service = ReportService::new(Arc::new(store), settings);

        let app_state = AppState { report_service };
        let app = create_router(app_state).layer(TraceLayer::new_for_http());

        let addr = config.server_addr();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Starting HTTP server on {}", addr);

        let server_handle = tokio::spawn(async move { axum::serve(listener, app).await });

        info!("Application initialized successfully");
        Ok(Self { server_handle })
    }

    /// Run until the server stops.
    pub async fn run_until_stopped(self) -> Result<(), Box<dyn std::error::Error>> {
        self.server_handle.await??;
        Ok(())
    }
}
