use std::sync::Arc;

use super::common::*;
use crate::portal::domain::{ApplicationStatus, JobId, JobPatch};
use crate::portal::error::PortalError;
use crate::portal::store::{MemoryStore, PortalStore};
use crate::portal::{JobPortalService, PortalLimits};

fn eleventh_application_waits_for_a_free_slot<S: PortalStore + 'static>(
    service: &JobPortalService<S>,
) {
    let owner = recruiter(service, "busy");
    let candidate = applicant(service, "busy-candidate");
    let jobs: Vec<_> = (0..11).map(|_| post_job(service, owner, 5, 1)).collect();

    let applications: Vec<_> = jobs[..10]
        .iter()
        .map(|job| apply(service, candidate, job.id))
        .collect();

    match service.apply(candidate, jobs[10].id, None) {
        Err(PortalError::TooManyActiveApplications { limit }) => assert_eq!(limit, 10),
        other => panic!("expected active application limit, got {other:?}"),
    }

    set_status(
        service,
        candidate,
        applications[3].id,
        ApplicationStatus::Cancelled,
    )
    .expect("cancel");
    let eleventh = service
        .apply(candidate, jobs[10].id, None)
        .expect("slot freed by cancellation");
    assert_eq!(eleventh.status, ApplicationStatus::Applied);
}

#[test]
fn eleventh_application_waits_for_a_free_slot_on_memory_store() {
    eleventh_application_waits_for_a_free_slot(&memory_service());
}

#[test]
fn eleventh_application_waits_for_a_free_slot_on_sqlite_store() {
    let (service, _dir) = sqlite_service();
    eleventh_application_waits_for_a_free_slot(&service);
}

fn full_job_reopens_after_cancellation<S: PortalStore + 'static>(
    service: &JobPortalService<S>,
) {
    let owner = recruiter(service, "full");
    let job = post_job(service, owner, 1, 1);
    let first = applicant(service, "full-first");
    let second = applicant(service, "full-second");

    let first_app = apply(service, first, job.id);
    match service.apply(second, job.id, None) {
        Err(PortalError::JobFull(job_id)) => assert_eq!(job_id, job.id),
        other => panic!("expected job full, got {other:?}"),
    }
    assert_eq!(service.get_job(job.id).expect("job").active_applications, 1);

    set_status(service, first, first_app.id, ApplicationStatus::Cancelled).expect("cancel");
    apply(service, second, job.id);
    assert_job_consistent(service, job.id);
}

#[test]
fn full_job_reopens_after_cancellation_on_memory_store() {
    full_job_reopens_after_cancellation(&memory_service());
}

#[test]
fn full_job_reopens_after_cancellation_on_sqlite_store() {
    let (service, _dir) = sqlite_service();
    full_job_reopens_after_cancellation(&service);
}

fn job_limits_cannot_drop_below_live_counts<S: PortalStore + 'static>(
    service: &JobPortalService<S>,
) {
    let owner = recruiter(service, "shrink");
    let job = post_job(service, owner, 4, 2);
    let applications: Vec<_> = (0..3)
        .map(|idx| {
            let candidate = applicant(service, &format!("shrink-{idx}"));
            apply(service, candidate, job.id)
        })
        .collect();
    for app in &applications[..2] {
        set_status(service, owner, app.id, ApplicationStatus::Accepted).expect("accept");
    }

    let fewer_positions = JobPatch {
        max_positions: Some(1),
        ..JobPatch::default()
    };
    assert!(matches!(
        service.update_job(owner, job.id, fewer_positions),
        Err(PortalError::Validation(_))
    ));
    let fewer_applicants = JobPatch {
        max_applicants: Some(2),
        ..JobPatch::default()
    };
    assert!(matches!(
        service.update_job(owner, job.id, fewer_applicants),
        Err(PortalError::Validation(_))
    ));

    let unchanged = service.get_job(job.id).expect("job");
    assert_eq!(unchanged.max_positions, 2);
    assert_eq!(unchanged.max_applicants, 4);

    let tight = service
        .update_job(
            owner,
            job.id,
            JobPatch {
                max_applicants: Some(3),
                max_positions: Some(2),
                deadline: None,
            },
        )
        .expect("limits equal to the live counts are allowed");
    assert_eq!(tight.max_applicants, 3);
    assert_job_consistent(service, job.id);
}

#[test]
fn job_limits_cannot_drop_below_live_counts_on_memory_store() {
    job_limits_cannot_drop_below_live_counts(&memory_service());
}

#[test]
fn job_limits_cannot_drop_below_live_counts_on_sqlite_store() {
    let (service, _dir) = sqlite_service();
    job_limits_cannot_drop_below_live_counts(&service);
}

#[test]
fn duplicate_application_is_reported_before_job_full() {
    let service = memory_service();
    let owner = recruiter(&service, "dup");
    let job = post_job(&service, owner, 1, 1);
    let candidate = applicant(&service, "dup-candidate");
    apply(&service, candidate, job.id);

    assert!(matches!(
        service.apply(candidate, job.id, None),
        Err(PortalError::AlreadyApplied)
    ));
}

#[test]
fn withdrawn_application_allows_reapplying() {
    let service = memory_service();
    let owner = recruiter(&service, "reapply");
    let job = post_job(&service, owner, 3, 1);
    let candidate = applicant(&service, "reapply-candidate");
    let first = apply(&service, candidate, job.id);
    set_status(&service, candidate, first.id, ApplicationStatus::Cancelled).expect("cancel");

    let second = apply(&service, candidate, job.id);
    assert_ne!(first.id, second.id);
    assert_job_consistent(&service, job.id);
}

#[test]
fn employed_applicant_cannot_apply_again() {
    let service = memory_service();
    let owner = recruiter(&service, "employed");
    let hired_job = post_job(&service, owner, 3, 1);
    let next_job = post_job(&service, owner, 3, 1);
    let candidate = applicant(&service, "employed-candidate");
    let hired = apply(&service, candidate, hired_job.id);
    set_status(&service, owner, hired.id, ApplicationStatus::Accepted).expect("accept");

    assert!(matches!(
        service.apply(candidate, next_job.id, None),
        Err(PortalError::AlreadyEmployed)
    ));
}

#[test]
fn configured_limit_replaces_default() {
    let service = JobPortalService::new(
        Arc::new(MemoryStore::new()),
        PortalLimits {
            max_active_applications: 2,
        },
    );
    let owner = recruiter(&service, "limit");
    let candidate = applicant(&service, "limit-candidate");
    let jobs: Vec<_> = (0..3).map(|_| post_job(&service, owner, 5, 1)).collect();
    apply(&service, candidate, jobs[0].id);
    apply(&service, candidate, jobs[1].id);

    assert!(matches!(
        service.apply(candidate, jobs[2].id, None),
        Err(PortalError::TooManyActiveApplications { limit: 2 })
    ));
}

#[test]
fn apply_rejects_unknown_job_and_recruiter_actors() {
    let service = memory_service();
    let owner = recruiter(&service, "unknown");
    let job = post_job(&service, owner, 3, 1);
    let candidate = applicant(&service, "unknown-candidate");

    assert!(matches!(
        service.apply(candidate, JobId(4_242), None),
        Err(PortalError::NotFound { entity: "job", .. })
    ));
    assert!(matches!(
        service.apply(owner, job.id, None),
        Err(PortalError::Forbidden(_))
    ));
}

#[test]
fn oversized_statement_of_purpose_is_rejected() {
    let service = memory_service();
    let owner = recruiter(&service, "sop");
    let job = post_job(&service, owner, 3, 1);
    let candidate = applicant(&service, "sop-candidate");

    assert!(matches!(
        service.apply(candidate, job.id, Some("x".repeat(256))),
        Err(PortalError::Validation(_))
    ));
    assert_eq!(service.get_job(job.id).expect("job").active_applications, 0);
}
