use crate::infra::{memory_service, sqlite_service};
use chrono::{Duration, Utc};
use clap::Args;
use job_portal::error::AppError;
use job_portal::portal::{
    Actor, ApplicantProfileInput, ApplicationStatus, Education, JobPortalService, NewJob, NewUser,
    PortalError, PortalLimits, PortalStore, RatingCategory, RecruiterProfileInput, StatusSet,
    StatusUpdate, UserProfile,
};
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Persist the scenario to this SQLite file instead of memory.
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
    /// Active applications an applicant may hold at once.
    #[arg(long)]
    pub(crate) max_active: Option<u32>,
    /// Print every application record as JSON once the scenario ends.
    #[arg(long)]
    pub(crate) dump: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        database,
        max_active,
        dump,
    } = args;

    let mut limits = PortalLimits::default();
    if let Some(max_active) = max_active.filter(|limit| *limit > 0) {
        limits.max_active_applications = max_active;
    }

    println!("Job portal hiring demo");
    match database {
        Some(path) => {
            println!("- store: sqlite ({})", path.display());
            hiring_scenario(&*sqlite_service(&path, limits)?, dump)
        }
        None => {
            println!("- store: memory");
            hiring_scenario(&memory_service(limits), dump)
        }
    }
}

fn hiring_scenario<S>(service: &JobPortalService<S>, dump: bool) -> Result<(), AppError>
where
    S: PortalStore + 'static,
{
    let suffix = Utc::now().timestamp_millis();
    println!(
        "- limit: {} active applications per applicant",
        service.limits().max_active_applications
    );

    let recruiter = register_recruiter(service, "Priya", suffix)?;
    let other_recruiter = register_recruiter(service, "Tomas", suffix)?;
    let ada = register_applicant(service, "Ada", suffix)?;
    let linus = register_applicant(service, "Linus", suffix)?;

    let backend = service.create_job(recruiter, opening("Backend Engineer", 1))?;
    let data = service.create_job(other_recruiter, opening("Data Engineer", 2))?;
    println!(
        "\nPosted '{}' (#{}) with {} position(s) and '{}' (#{}) with {} position(s)",
        backend.title,
        backend.id,
        backend.max_positions,
        data.title,
        data.id,
        data.max_positions
    );

    let ada_backend = service.apply(
        ada,
        backend.id,
        Some("I have shipped async services in production".to_string()),
    )?;
    let ada_data = service.apply(ada, data.id, None)?;
    let linus_backend = service.apply(linus, backend.id, None)?;
    println!("Ada applied to both openings, Linus applied to '{}'", backend.title);

    service.update_application_status(
        recruiter,
        ada_backend.id,
        StatusUpdate::to(ApplicationStatus::Shortlisted),
    )?;
    let hired = service.update_application_status(
        recruiter,
        ada_backend.id,
        StatusUpdate {
            status: ApplicationStatus::Accepted,
            date_of_joining: Some(Utc::now() + Duration::days(30)),
        },
    )?;
    println!(
        "\nAccepted Ada for '{}', joining {}",
        backend.title,
        hired
            .date_of_joining
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "today".to_string())
    );

    for application in service.list_applications(ada)? {
        if application.id == ada_data.id {
            println!(
                "- Ada's application to '{}' is now {}",
                data.title, application.status
            );
        }
    }

    match service.update_application_status(
        recruiter,
        linus_backend.id,
        StatusUpdate::to(ApplicationStatus::Accepted),
    ) {
        Err(err @ PortalError::PositionsFull { .. }) => {
            println!("- Accepting Linus was refused: {err}");
        }
        Err(err) => return Err(err.into()),
        Ok(application) => println!("- Linus unexpectedly moved to {}", application.status),
    }
    service.update_application_status(
        recruiter,
        linus_backend.id,
        StatusUpdate::to(ApplicationStatus::Rejected),
    )?;

    service.rate(ada, backend.id.0, 4.5)?;
    service.rate(recruiter, ada.id.0, 5.0)?;
    if let Err(err) = service.rate(linus, backend.id.0, 1.0) {
        println!("- Linus could not rate the job: {err}");
    }

    let job = service.get_job(backend.id)?;
    println!(
        "\n'{}' now has {}/{} positions filled and a rating of {:.1}",
        job.title, job.accepted_candidates, job.max_positions, job.rating
    );
    println!(
        "Ada's own rating from {}: {:.1}",
        RatingCategory::Applicant,
        service.get_rating(recruiter, ada.id.0, RatingCategory::Applicant)?
    );

    if dump {
        let applications =
            service.list_applications_for_job(recruiter, backend.id, StatusSet::Any)?;
        match serde_json::to_string_pretty(&applications) {
            Ok(json) => println!("\nApplications for '{}':\n{}", job.title, json),
            Err(err) => println!("\nApplication payload unavailable: {err}"),
        }
    }

    Ok(())
}

fn register_recruiter<S>(
    service: &JobPortalService<S>,
    name: &str,
    suffix: i64,
) -> Result<Actor, AppError>
where
    S: PortalStore + 'static,
{
    let registered = service.register_recruiter(
        NewUser {
            email: format!("{}.{suffix}@recruit.example", name.to_lowercase()),
            password_hash: "demo-hash".to_string(),
        },
        RecruiterProfileInput {
            name: name.to_string(),
            contact_number: None,
            bio: Some(format!("{name} hires for the platform team")),
        },
    )?;
    Ok(actor_for(&registered))
}

fn register_applicant<S>(
    service: &JobPortalService<S>,
    name: &str,
    suffix: i64,
) -> Result<Actor, AppError>
where
    S: PortalStore + 'static,
{
    let registered = service.register_applicant(
        NewUser {
            email: format!("{}.{suffix}@mail.example", name.to_lowercase()),
            password_hash: "demo-hash".to_string(),
        },
        ApplicantProfileInput {
            name: name.to_string(),
            education: vec![Education {
                institution_name: "Open University".to_string(),
                start_year: 2016,
                end_year: Some(2020),
            }],
            skills: vec!["rust".to_string(), "sql".to_string()],
            resume: None,
            profile: None,
        },
    )?;
    Ok(actor_for(&registered))
}

fn actor_for(profile: &UserProfile) -> Actor {
    match profile {
        UserProfile::Applicant { user, .. } => Actor::applicant(user.id),
        UserProfile::Recruiter { user, .. } => Actor::recruiter(user.id),
    }
}

fn opening(title: &str, max_positions: i64) -> NewJob {
    NewJob {
        title: title.to_string(),
        max_applicants: 5,
        max_positions,
        deadline: Some(Utc::now() + Duration::days(21)),
        skillsets: vec!["rust".to_string()],
        job_type: "Full Time".to_string(),
        duration: 0,
        salary: 90_000,
    }
}
