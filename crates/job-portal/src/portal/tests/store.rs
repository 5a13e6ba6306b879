use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use super::common::*;
use crate::portal::domain::{ApplicationStatus, NewUser, RatingCategory, Role, UserId, UserProfile};
use crate::portal::error::{PortalError, StoreError};
use crate::portal::store::{
    ApplicationFilter, JobQuery, JobSort, JobSortKey, MemoryStore, PortalStore, SqliteStore,
    StatusSet,
};
use crate::portal::JobPortalService;

fn failed_transaction_leaves_no_trace<S: PortalStore>(store: &S) {
    let outcome: Result<(), PortalError> = store.transaction(&mut |tx| {
        tx.insert_user(
            &NewUser {
                email: "ghost@applicants.example".to_string(),
                password_hash: "hash".to_string(),
            },
            Role::Applicant,
        )?;
        Err(PortalError::Validation("abort after write".to_string()))
    });
    assert!(matches!(outcome, Err(PortalError::Validation(_))));

    let found = store
        .transaction(&mut |tx| Ok(tx.find_user_by_email("ghost@applicants.example")?))
        .expect("lookup");
    assert!(found.is_none(), "rolled back insert must not be visible");
}

#[test]
fn failed_transaction_leaves_no_trace_on_memory_store() {
    failed_transaction_leaves_no_trace(&MemoryStore::new());
}

#[test]
fn failed_transaction_leaves_no_trace_on_sqlite_store() {
    let store = SqliteStore::open_in_memory().expect("sqlite opens");
    failed_transaction_leaves_no_trace(&store);
}

fn store_recovers_after_panicking_transaction<S: PortalStore>(store: &S) {
    let panicked = panic::catch_unwind(AssertUnwindSafe(|| {
        let _: Result<(), PortalError> = store.transaction(&mut |tx| {
            tx.insert_user(
                &NewUser {
                    email: "panic@applicants.example".to_string(),
                    password_hash: "hash".to_string(),
                },
                Role::Applicant,
            )?;
            panic!("worker crashed mid-transaction");
        });
    }));
    assert!(panicked.is_err());

    let found = store
        .transaction(&mut |tx| Ok(tx.find_user_by_email("panic@applicants.example")?))
        .expect("store usable after a panic");
    assert!(found.is_none(), "write from the crashed transaction must not persist");
}

#[test]
fn store_recovers_after_panicking_transaction_on_memory_store() {
    store_recovers_after_panicking_transaction(&MemoryStore::new());
}

#[test]
fn store_recovers_after_panicking_transaction_on_sqlite_store() {
    let store = SqliteStore::open_in_memory().expect("sqlite opens");
    store_recovers_after_panicking_transaction(&store);
}

#[test]
fn sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("nested").join("portal.db");

    let (job_id, app_id) = {
        let service = JobPortalService::new(
            Arc::new(SqliteStore::open(&path).expect("opens")),
            limits(),
        );
        let owner = recruiter(&service, "persist");
        let job = post_job(&service, owner, 3, 1);
        let candidate = applicant(&service, "persist-candidate");
        let app = apply(&service, candidate, job.id);
        (job.id, app.id)
    };

    let service = JobPortalService::new(
        Arc::new(SqliteStore::open(&path).expect("reopens")),
        limits(),
    );
    let job = service.get_job(job_id).expect("job survives reopen");
    assert_eq!(job.active_applications, 1);
    assert_eq!(job.skillsets, vec!["rust".to_string(), "tokio".to_string()]);
    assert_eq!(application(&service, app_id).status, ApplicationStatus::Applied);
}

#[test]
fn duplicate_email_is_a_conflict() {
    let service = memory_service();
    recruiter(&service, "twice");
    let outcome = service.register_applicant(
        NewUser {
            email: "TWICE@recruiters.example".to_string(),
            password_hash: "hash".to_string(),
        },
        crate::portal::domain::ApplicantProfileInput {
            name: "Someone".to_string(),
            education: Vec::new(),
            skills: Vec::new(),
            resume: None,
            profile: None,
        },
    );
    assert!(matches!(outcome, Err(PortalError::Conflict(_))));
}

#[test]
fn contention_is_retried_once() {
    let store = Arc::new(FlakyStore::failing(1));
    let service = JobPortalService::new(store.clone(), limits());

    let owner = recruiter(&service, "flaky");
    assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
    let job = post_job(&service, owner, 2, 1);
    assert_eq!(job.max_applicants, 2);
}

#[test]
fn persistent_contention_surfaces_after_retry() {
    let store = Arc::new(FlakyStore::failing(usize::MAX));
    let service = JobPortalService::new(store.clone(), limits());

    match service.get_job(crate::portal::domain::JobId(1)) {
        Err(PortalError::Store(error)) => assert!(error.is_transient()),
        other => panic!("expected contention, got {other:?}"),
    }
    assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn backend_failures_are_not_retried() {
    let service = JobPortalService::new(Arc::new(UnavailableStore), limits());
    match service.list_applications(crate::portal::domain::Actor::applicant(UserId(1))) {
        Err(PortalError::Store(StoreError::Backend { context, .. })) => {
            assert_eq!(context, "open database")
        }
        other => panic!("expected backend failure, got {other:?}"),
    }
}

fn concurrent_applies_respect_job_limit<S: PortalStore + 'static>(
    service: Arc<JobPortalService<S>>,
) {
    let owner = recruiter(&service, "race");
    let job = post_job(&service, owner, 3, 1);
    let applicants: Vec<_> = (0..8)
        .map(|idx| applicant(&service, &format!("race-{idx}")))
        .collect();

    let handles: Vec<_> = applicants
        .into_iter()
        .map(|actor| {
            let service = Arc::clone(&service);
            thread::spawn(move || service.apply(actor, job.id, None))
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.join().expect("thread completes") {
            Ok(_) => accepted += 1,
            Err(PortalError::JobFull(_)) => {}
            Err(other) => panic!("unexpected refusal: {other:?}"),
        }
    }

    assert_eq!(accepted, 3);
    assert_job_consistent(&service, job.id);
}

#[test]
fn concurrent_applies_respect_job_limit_on_memory_store() {
    concurrent_applies_respect_job_limit(Arc::new(memory_service()));
}

#[test]
fn concurrent_applies_respect_job_limit_on_sqlite_store() {
    let (service, _dir) = sqlite_service();
    concurrent_applies_respect_job_limit(Arc::new(service));
}

fn concurrent_accepts_fill_one_position<S: PortalStore + 'static>(
    service: Arc<JobPortalService<S>>,
) {
    let owner = recruiter(&service, "accept-race");
    let job = post_job(&service, owner, 10, 1);
    let applications: Vec<_> = (0..6)
        .map(|idx| {
            let candidate = applicant(&service, &format!("accept-race-{idx}"));
            apply(&service, candidate, job.id)
        })
        .collect();

    let handles: Vec<_> = applications
        .into_iter()
        .map(|app| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                set_status(&service, owner, app.id, ApplicationStatus::Accepted)
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        match handle.join().expect("thread completes") {
            Ok(_) => winners += 1,
            Err(PortalError::PositionsFull { .. }) => {}
            Err(other) => panic!("unexpected refusal: {other:?}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(
        count(
            &service,
            ApplicationFilter::default()
                .job(job.id)
                .statuses(StatusSet::exactly(ApplicationStatus::Accepted)),
        ),
        1
    );
    assert_job_consistent(&service, job.id);
}

#[test]
fn concurrent_accepts_fill_one_position_on_memory_store() {
    concurrent_accepts_fill_one_position(Arc::new(memory_service()));
}

#[test]
fn concurrent_accepts_fill_one_position_on_sqlite_store() {
    let (service, _dir) = sqlite_service();
    concurrent_accepts_fill_one_position(Arc::new(service));
}

fn concurrent_ratings_average_consistently<S: PortalStore + 'static>(
    service: Arc<JobPortalService<S>>,
) {
    let candidate = applicant(&service, "rated-concurrently");
    let values = [1.0, 2.0, 3.0, 4.0, 5.0, 3.0];
    let raters: Vec<_> = values
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            let owner = recruiter(&service, &format!("rater-{idx}"));
            let job = post_job(&service, owner, 2, 1);
            let app = apply(&service, candidate, job.id);
            set_status(&service, owner, app.id, ApplicationStatus::Accepted).expect("accept");
            // Finishing frees the applicant for the next recruiter's hire.
            set_status(&service, owner, app.id, ApplicationStatus::Finished).expect("finish");
            (owner, *value)
        })
        .collect();

    let handles: Vec<_> = raters
        .into_iter()
        .map(|(owner, value)| {
            let service = Arc::clone(&service);
            thread::spawn(move || service.rate(owner, candidate.id.0, value))
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread completes").expect("rating stored");
    }

    let expected = values.iter().sum::<f64>() / values.len() as f64;
    match service.user_profile(candidate.id).expect("profile") {
        UserProfile::Applicant { profile, .. } => {
            assert!((profile.rating - expected).abs() < 1e-9, "lost rating update")
        }
        other => panic!("expected applicant profile, got {other:?}"),
    }
    let rows = service
        .store()
        .transaction(&mut |tx| {
            Ok(tx.count_ratings(RatingCategory::Applicant, candidate.id.0)?)
        })
        .expect("count");
    assert_eq!(rows as usize, values.len());
}

#[test]
fn concurrent_ratings_average_consistently_on_memory_store() {
    concurrent_ratings_average_consistently(Arc::new(memory_service()));
}

#[test]
fn concurrent_ratings_average_consistently_on_sqlite_store() {
    let (service, _dir) = sqlite_service();
    concurrent_ratings_average_consistently(Arc::new(service));
}

fn title_search_treats_wildcards_literally<S: PortalStore + 'static>(
    service: &JobPortalService<S>,
) {
    let owner = recruiter(service, "wildcard");
    let candidate = applicant(service, "wildcard-candidate");
    service
        .create_job(owner, new_job("Backend Engineer", 5, 1))
        .expect("post");
    let snake = service
        .create_job(owner, new_job("Snake_Case Linter Dev", 5, 1))
        .expect("post");

    let search = |needle: &str| -> Vec<_> {
        service
            .list_jobs(
                candidate,
                false,
                JobQuery {
                    title_contains: Some(needle.to_string()),
                    ..JobQuery::default()
                },
            )
            .expect("search")
            .into_iter()
            .map(|job| job.id)
            .collect()
    };

    assert_eq!(search("_"), vec![snake.id]);
    assert_eq!(search("e_c"), vec![snake.id]);
    assert!(search("%").is_empty());
    assert!(search("Back%").is_empty());
}

#[test]
fn title_search_treats_wildcards_literally_on_memory_store() {
    title_search_treats_wildcards_literally(&memory_service());
}

#[test]
fn title_search_treats_wildcards_literally_on_sqlite_store() {
    let (service, _dir) = sqlite_service();
    title_search_treats_wildcards_literally(&service);
}

fn job_search_filters_and_sorts<S: PortalStore + 'static>(service: &JobPortalService<S>) {
    let owner = recruiter(service, "search");
    let other = recruiter(service, "search-other");
    let candidate = applicant(service, "search-candidate");

    let mut remote = new_job("Remote Rust Engineer", 5, 1);
    remote.salary = 90_000;
    remote.duration = 12;
    remote.job_type = "Work From Home".to_string();
    let remote = service.create_job(owner, remote).expect("post");

    let mut intern = new_job("Rust Intern", 5, 1);
    intern.salary = 20_000;
    intern.duration = 3;
    let intern = service.create_job(owner, intern).expect("post");

    let mut analyst = new_job("Data Analyst", 5, 1);
    analyst.salary = 60_000;
    let analyst = service.create_job(other, analyst).expect("post");

    let by_title = service
        .list_jobs(
            candidate,
            false,
            JobQuery {
                title_contains: Some("rust".to_string()),
                sort: vec![JobSort {
                    key: JobSortKey::Salary,
                    descending: true,
                }],
                ..JobQuery::default()
            },
        )
        .expect("search");
    let ids: Vec<_> = by_title.iter().map(|job| job.id).collect();
    assert_eq!(ids, vec![remote.id, intern.id]);

    let short_and_cheap = service
        .list_jobs(
            candidate,
            false,
            JobQuery {
                salary_max: Some(60_000),
                duration_below: Some(6),
                ..JobQuery::default()
            },
        )
        .expect("search");
    let ids: Vec<_> = short_and_cheap.iter().map(|job| job.id).collect();
    assert_eq!(ids, vec![intern.id]);

    let full_time = service
        .list_jobs(
            candidate,
            false,
            JobQuery {
                job_types: vec!["Full Time".to_string()],
                salary_min: Some(30_000),
                ..JobQuery::default()
            },
        )
        .expect("search");
    let ids: Vec<_> = full_time.iter().map(|job| job.id).collect();
    assert_eq!(ids, vec![analyst.id]);

    let mine = service
        .list_jobs(owner, true, JobQuery::default())
        .expect("own jobs");
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|job| job.owner_id == owner.id));

    assert!(matches!(
        service.list_jobs(candidate, true, JobQuery::default()),
        Err(PortalError::Forbidden(_))
    ));
}

#[test]
fn job_search_filters_and_sorts_on_memory_store() {
    job_search_filters_and_sorts(&memory_service());
}

#[test]
fn job_search_filters_and_sorts_on_sqlite_store() {
    let (service, _dir) = sqlite_service();
    job_search_filters_and_sorts(&service);
}

#[test]
fn job_patch_validates_limits() {
    let service = memory_service();
    let owner = recruiter(&service, "patch");
    let job = post_job(&service, owner, 3, 1);

    let updated = service
        .update_job(
            owner,
            job.id,
            crate::portal::domain::JobPatch {
                max_applicants: Some(8),
                max_positions: Some(2),
                deadline: None,
            },
        )
        .expect("patch");
    assert_eq!(updated.max_applicants, 8);
    assert_eq!(updated.max_positions, 2);

    assert!(matches!(
        service.update_job(
            owner,
            job.id,
            crate::portal::domain::JobPatch {
                max_positions: Some(0),
                ..Default::default()
            },
        ),
        Err(PortalError::Validation(_))
    ));
    assert_eq!(service.get_job(job.id).expect("job").max_positions, 2);
}
