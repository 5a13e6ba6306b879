use job_portal::config::DatabaseTarget;
use job_portal::error::AppError;
use job_portal::portal::{JobPortalService, MemoryStore, PortalLimits, SqliteStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// The portal service over whichever store the configuration selected.
pub(crate) enum PortalBackend {
    Memory(Arc<JobPortalService<MemoryStore>>),
    Sqlite(Arc<JobPortalService<SqliteStore>>),
}

impl PortalBackend {
    pub(crate) fn open(target: &DatabaseTarget, limits: PortalLimits) -> Result<Self, AppError> {
        match target {
            DatabaseTarget::Memory => Ok(Self::Memory(memory_service(limits))),
            DatabaseTarget::Sqlite(path) => Ok(Self::Sqlite(sqlite_service(path, limits)?)),
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            PortalBackend::Memory(_) => "memory",
            PortalBackend::Sqlite(_) => "sqlite",
        }
    }
}

pub(crate) fn memory_service(limits: PortalLimits) -> Arc<JobPortalService<MemoryStore>> {
    Arc::new(JobPortalService::new(Arc::new(MemoryStore::new()), limits))
}

pub(crate) fn sqlite_service(
    path: &Path,
    limits: PortalLimits,
) -> Result<Arc<JobPortalService<SqliteStore>>, AppError> {
    let store = SqliteStore::open(path)?;
    Ok(Arc::new(JobPortalService::new(Arc::new(store), limits)))
}
