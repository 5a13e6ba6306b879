//! End-to-end hiring scenarios driven through the public service facade.
//!
//! Each scenario runs against both store backends so the in-memory store used
//! in demos and the SQLite store used in deployments stay interchangeable.

mod common {
    use std::sync::Arc;

    use job_portal::portal::{
        Actor, ApplicantProfileInput, Education, Job, JobPortalService, MemoryStore, NewJob,
        NewUser, PortalLimits, PortalStore, RecruiterProfileInput, SqliteStore, UserProfile,
    };
    use tempfile::TempDir;

    pub(super) fn memory() -> JobPortalService<MemoryStore> {
        JobPortalService::new(Arc::new(MemoryStore::new()), PortalLimits::default())
    }

    pub(super) fn sqlite() -> (JobPortalService<SqliteStore>, TempDir) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = SqliteStore::open(dir.path().join("hiring.db")).expect("sqlite opens");
        (
            JobPortalService::new(Arc::new(store), PortalLimits::default()),
            dir,
        )
    }

    pub(super) fn hiring_manager<S: PortalStore + 'static>(
        service: &JobPortalService<S>,
        name: &str,
    ) -> Actor {
        let registered = service
            .register_recruiter(
                NewUser {
                    email: format!("{}@acme.example", name.to_lowercase()),
                    password_hash: "$argon2id$v=19$manager".to_string(),
                },
                RecruiterProfileInput {
                    name: name.to_string(),
                    contact_number: Some("+15551234567".to_string()),
                    bio: Some("Engineering manager".to_string()),
                },
            )
            .expect("recruiter registers");
        match registered {
            UserProfile::Recruiter { user, .. } => Actor::recruiter(user.id),
            other => panic!("unexpected profile {other:?}"),
        }
    }

    pub(super) fn candidate<S: PortalStore + 'static>(
        service: &JobPortalService<S>,
        name: &str,
    ) -> Actor {
        let registered = service
            .register_applicant(
                NewUser {
                    email: format!("{}@mail.example", name.to_lowercase()),
                    password_hash: "$argon2id$v=19$candidate".to_string(),
                },
                ApplicantProfileInput {
                    name: name.to_string(),
                    education: vec![Education {
                        institution_name: "State University".to_string(),
                        start_year: 2018,
                        end_year: Some(2022),
                    }],
                    skills: vec!["rust".to_string()],
                    resume: Some("resumes/candidate.pdf".to_string()),
                    profile: None,
                },
            )
            .expect("applicant registers");
        match registered {
            UserProfile::Applicant { user, .. } => Actor::applicant(user.id),
            other => panic!("unexpected profile {other:?}"),
        }
    }

    pub(super) fn opening<S: PortalStore + 'static>(
        service: &JobPortalService<S>,
        owner: Actor,
        title: &str,
        max_positions: i64,
    ) -> Job {
        service
            .create_job(
                owner,
                NewJob {
                    title: title.to_string(),
                    max_applicants: 10,
                    max_positions,
                    deadline: None,
                    skillsets: vec!["rust".to_string()],
                    job_type: "Full Time".to_string(),
                    duration: 0,
                    salary: 80_000,
                },
            )
            .expect("job posts")
    }
}

use common::*;
use job_portal::portal::{
    ApplicantQuery, ApplicationStatus, JobPortalService, PortalError, PortalStore,
    RatingCategory, StatusUpdate, UserProfile,
};

fn hire_rate_and_finish<S: PortalStore + 'static>(service: &JobPortalService<S>) {
    let manager = hiring_manager(service, "Morgan");
    let rival = hiring_manager(service, "Riley");
    let platform = opening(service, manager, "Platform Engineer", 1);
    let payments = opening(service, rival, "Payments Engineer", 1);

    let ada = candidate(service, "Ada");
    let grace = candidate(service, "Grace");

    let ada_platform = service
        .apply(ada, platform.id, Some("Built three schedulers".to_string()))
        .expect("apply");
    let ada_payments = service.apply(ada, payments.id, None).expect("apply");
    let grace_platform = service.apply(grace, platform.id, None).expect("apply");

    service
        .update_application_status(
            manager,
            ada_platform.id,
            StatusUpdate::to(ApplicationStatus::Shortlisted),
        )
        .expect("shortlist");
    let hired = service
        .update_application_status(
            manager,
            ada_platform.id,
            StatusUpdate::to(ApplicationStatus::Accepted),
        )
        .expect("accept");
    assert_eq!(hired.status, ApplicationStatus::Accepted);

    let ada_applications = service.list_applications(ada).expect("list");
    let payments_status = ada_applications
        .iter()
        .find(|application| application.id == ada_payments.id)
        .map(|application| application.status);
    assert_eq!(payments_status, Some(ApplicationStatus::Cancelled));

    assert!(matches!(
        service.update_application_status(
            manager,
            grace_platform.id,
            StatusUpdate::to(ApplicationStatus::Accepted),
        ),
        Err(PortalError::PositionsFull { .. })
    ));

    let accepted = service
        .list_applicants(
            manager,
            ApplicantQuery {
                job_id: Some(platform.id),
                statuses: vec![ApplicationStatus::Accepted],
            },
        )
        .expect("applicants");
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].application.applicant_id, ada.id);

    service.rate(ada, platform.id.0, 5.0).expect("rate job");
    service.rate(manager, ada.id.0, 4.0).expect("rate applicant");
    assert!(matches!(
        service.rate(grace, platform.id.0, 1.0),
        Err(PortalError::NotEligibleToRate)
    ));

    service
        .update_application_status(
            manager,
            ada_platform.id,
            StatusUpdate::to(ApplicationStatus::Finished),
        )
        .expect("finish");

    let job = service.get_job(platform.id).expect("job");
    assert_eq!(job.rating, 5.0);
    assert_eq!(job.accepted_candidates, 0);
    assert_eq!(
        service
            .get_rating(manager, ada.id.0, RatingCategory::Applicant)
            .expect("rating"),
        4.0
    );
    match service.user_profile(ada.id).expect("profile") {
        UserProfile::Applicant { profile, .. } => {
            assert_eq!(profile.rating, 4.0);
            assert_eq!(profile.education.len(), 1);
        }
        other => panic!("unexpected profile {other:?}"),
    }
}

#[test]
fn hire_rate_and_finish_in_memory() {
    hire_rate_and_finish(&memory());
}

#[test]
fn hire_rate_and_finish_on_sqlite() {
    let (service, _dir) = sqlite();
    hire_rate_and_finish(&service);
}
