use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;
use tempfile::TempDir;

use crate::portal::domain::{
    Actor, ApplicantProfileInput, Application, ApplicationId, ApplicationStatus, Job, JobId,
    NewJob, NewUser, RecruiterProfileInput, StatusUpdate, UserProfile,
};
use crate::portal::error::{PortalError, StoreError};
use crate::portal::store::{
    ApplicationFilter, MemoryStore, PortalStore, SqliteStore, StatusSet, StoreTransaction,
};
use crate::portal::{portal_router, JobPortalService, PortalLimits};

pub(super) fn limits() -> PortalLimits {
    PortalLimits::default()
}

pub(super) fn memory_service() -> JobPortalService<MemoryStore> {
    JobPortalService::new(Arc::new(MemoryStore::new()), limits())
}

/// The directory must outlive the service, so callers keep it bound.
pub(super) fn sqlite_service() -> (JobPortalService<SqliteStore>, TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = SqliteStore::open(dir.path().join("portal.db")).expect("sqlite store opens");
    (JobPortalService::new(Arc::new(store), limits()), dir)
}

pub(super) fn recruiter<S: PortalStore + 'static>(
    service: &JobPortalService<S>,
    tag: &str,
) -> Actor {
    let registered = service
        .register_recruiter(
            NewUser {
                email: format!("{tag}@recruiters.example"),
                password_hash: "$argon2id$recruiter".to_string(),
            },
            RecruiterProfileInput {
                name: format!("Recruiter {tag}"),
                contact_number: Some("+911234567890".to_string()),
                bio: Some("Hiring for platform teams".to_string()),
            },
        )
        .expect("recruiter registers");
    match registered {
        UserProfile::Recruiter { user, .. } => Actor::recruiter(user.id),
        other => panic!("expected recruiter profile, got {other:?}"),
    }
}

pub(super) fn applicant<S: PortalStore + 'static>(
    service: &JobPortalService<S>,
    tag: &str,
) -> Actor {
    let registered = service
        .register_applicant(
            NewUser {
                email: format!("{tag}@applicants.example"),
                password_hash: "$argon2id$applicant".to_string(),
            },
            ApplicantProfileInput {
                name: format!("Applicant {tag}"),
                education: Vec::new(),
                skills: vec!["rust".to_string(), "sql".to_string()],
                resume: None,
                profile: None,
            },
        )
        .expect("applicant registers");
    match registered {
        UserProfile::Applicant { user, .. } => Actor::applicant(user.id),
        other => panic!("expected applicant profile, got {other:?}"),
    }
}

pub(super) fn new_job(title: &str, max_applicants: i64, max_positions: i64) -> NewJob {
    NewJob {
        title: title.to_string(),
        max_applicants,
        max_positions,
        deadline: None,
        skillsets: vec!["rust".to_string(), "tokio".to_string()],
        job_type: "Full Time".to_string(),
        duration: 6,
        salary: 50_000,
    }
}

pub(super) fn post_job<S: PortalStore + 'static>(
    service: &JobPortalService<S>,
    owner: Actor,
    max_applicants: i64,
    max_positions: i64,
) -> Job {
    service
        .create_job(owner, new_job("Backend Engineer", max_applicants, max_positions))
        .expect("job posts")
}

pub(super) fn apply<S: PortalStore + 'static>(
    service: &JobPortalService<S>,
    applicant: Actor,
    job_id: JobId,
) -> Application {
    service
        .apply(applicant, job_id, Some("I ship reliable services".to_string()))
        .expect("application accepted")
}

pub(super) fn set_status<S: PortalStore + 'static>(
    service: &JobPortalService<S>,
    actor: Actor,
    application_id: ApplicationId,
    status: ApplicationStatus,
) -> Result<Application, PortalError> {
    service.update_application_status(actor, application_id, StatusUpdate::to(status))
}

pub(super) fn count<S: PortalStore + 'static>(
    service: &JobPortalService<S>,
    filter: ApplicationFilter,
) -> u32 {
    service
        .store()
        .transaction(&mut |tx| Ok(tx.count_applications(&filter)?))
        .expect("count succeeds")
}

pub(super) fn application<S: PortalStore + 'static>(
    service: &JobPortalService<S>,
    id: ApplicationId,
) -> Application {
    service
        .store()
        .transaction(&mut |tx| Ok(tx.find_application(id)?))
        .expect("lookup succeeds")
        .expect("application present")
}

/// Job counters agree with the rows and stay within the job's limits.
pub(super) fn assert_job_consistent<S: PortalStore + 'static>(
    service: &JobPortalService<S>,
    job_id: JobId,
) {
    let job = service.get_job(job_id).expect("job present");
    let active = count(
        service,
        ApplicationFilter::default()
            .job(job_id)
            .statuses(StatusSet::active()),
    );
    let accepted = count(
        service,
        ApplicationFilter::default()
            .job(job_id)
            .statuses(StatusSet::exactly(ApplicationStatus::Accepted)),
    );

    assert_eq!(job.active_applications, active, "active counter drifted");
    assert_eq!(job.accepted_candidates, accepted, "accepted counter drifted");
    assert!(active <= job.max_applicants, "job over max applicants");
    assert!(accepted <= job.max_positions, "job over max positions");
}

/// Store whose first `failures` transactions report contention, then delegates.
pub(super) struct FlakyStore {
    inner: MemoryStore,
    pub(super) attempts: AtomicUsize,
    failures: usize,
}

impl FlakyStore {
    pub(super) fn failing(failures: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            attempts: AtomicUsize::new(0),
            failures,
        }
    }
}

impl PortalStore for FlakyStore {
    fn transaction<T>(
        &self,
        work: &mut dyn FnMut(&mut dyn StoreTransaction) -> Result<T, PortalError>,
    ) -> Result<T, PortalError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(StoreError::contention("begin transaction", "database is locked").into());
        }
        self.inner.transaction(work)
    }
}

pub(super) struct UnavailableStore;

impl PortalStore for UnavailableStore {
    fn transaction<T>(
        &self,
        _work: &mut dyn FnMut(&mut dyn StoreTransaction) -> Result<T, PortalError>,
    ) -> Result<T, PortalError> {
        Err(StoreError::backend("open database", "database offline").into())
    }
}

pub(super) fn router_with_service<S: PortalStore + 'static>(
    service: JobPortalService<S>,
) -> axum::Router {
    portal_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
