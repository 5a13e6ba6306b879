use crate::cli::ServeArgs;
use crate::infra::{AppState, PortalBackend};
use crate::routes::with_portal_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use job_portal::config::{AppConfig, DatabaseTarget};
use job_portal::error::AppError;
use job_portal::telemetry;
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
    if let Some(database) = args.database.take() {
        config.portal.database = DatabaseTarget::parse(&database);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let backend = PortalBackend::open(&config.portal.database, config.portal.limits)?;
    let store_label = backend.label();
    let app = match backend {
        PortalBackend::Memory(service) => with_portal_routes(service),
        PortalBackend::Sqlite(service) => with_portal_routes(service),
    }
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        store = store_label,
        max_active_applications = config.portal.limits.max_active_applications,
        "job portal ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
