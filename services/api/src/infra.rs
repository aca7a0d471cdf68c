use hbnb::config::{AccessConfig, StorageConfig};
use hbnb::error::AppError;
use hbnb::rentals::{AccessPolicy, Argon2Hasher, RentalFacade, Repositories};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Wire the configured storage backend, Argon2 hashing, and access policy into one facade.
pub(crate) fn build_facade(
    storage: &StorageConfig,
    access: AccessConfig,
) -> Result<Arc<RentalFacade>, AppError> {
    let repositories = Repositories::from_config(storage)?;
    Ok(Arc::new(RentalFacade::new(
        repositories,
        Arc::new(Argon2Hasher),
        AccessPolicy::from_config(access),
    )))
}
