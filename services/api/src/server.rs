use crate::cli::ServeArgs;
use crate::infra::{build_facade, AppState};
use crate::routes::with_rental_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use hbnb::config::AppConfig;
use hbnb::error::AppError;
use hbnb::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let facade = build_facade(&config.storage, config.access)?;
    info!(
        backend = ?config.storage.backend,
        data_dir = %config.storage.data_dir.display(),
        amenity_access = ?config.access.amenity_access,
        "rental repositories opened"
    );

    let app = with_rental_routes(facade)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "hbnb api ready");

    axum::serve(listener, app).await?;
    Ok(())
}
