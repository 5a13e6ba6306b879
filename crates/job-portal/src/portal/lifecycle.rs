use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::capacity::CapacityAccountant;
use super::domain::{
    validate_sop, Actor, Application, ApplicationDraft, ApplicationId, ApplicationStatus, JobId,
    Role, StatusUpdate,
};
use super::error::PortalError;
use super::store::{ApplicationFilter, StatusSet, StoreTransaction};

/// Statuses an acceptance leaves untouched on the applicant's other applications.
const CASCADE_EXEMPT: [ApplicationStatus; 5] = [
    ApplicationStatus::Rejected,
    ApplicationStatus::Deleted,
    ApplicationStatus::Cancelled,
    ApplicationStatus::Accepted,
    ApplicationStatus::Finished,
];

/// Result of a status change, including applications cancelled by an acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub application: Application,
    pub cascaded: Vec<Application>,
}

impl TransitionOutcome {
    fn unchanged(application: Application) -> Self {
        Self {
            application,
            cascaded: Vec::new(),
        }
    }
}

/// Owns the application state machine. Every call runs inside the caller's transaction.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleEngine {
    capacity: CapacityAccountant,
}

impl LifecycleEngine {
    pub fn new(capacity: CapacityAccountant) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> &CapacityAccountant {
        &self.capacity
    }

    /// Create an `applied` application after every capacity check passes.
    pub fn submit(
        &self,
        tx: &mut dyn StoreTransaction,
        actor: Actor,
        job_id: JobId,
        sop: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Application, PortalError> {
        actor.require(Role::Applicant, "apply for jobs")?;
        let user = tx
            .find_user(actor.id)?
            .ok_or_else(|| PortalError::not_found("user", actor.id.0))?;
        if user.role != Role::Applicant {
            return Err(PortalError::Forbidden(format!(
                "user {} is not an applicant",
                user.id
            )));
        }

        let job = tx
            .find_job(job_id)?
            .ok_or_else(|| PortalError::not_found("job", job_id.0))?;
        let sop = validate_sop(sop)?;

        self.capacity.can_apply(tx, &job, actor.id)?;

        let application = tx.insert_application(&ApplicationDraft {
            applicant_id: actor.id,
            recruiter_id: job.owner_id,
            job_id,
            status: ApplicationStatus::Applied,
            date_of_application: now,
            sop,
        })?;
        self.capacity.refresh_job_counters(tx, job_id)?;

        Ok(application)
    }

    /// Apply `update` to an application on behalf of `actor`.
    ///
    /// Refusals are reported in a fixed order: missing application, role or
    /// ownership mismatch, locked status, then transitions absent from the table.
    pub fn transition(
        &self,
        tx: &mut dyn StoreTransaction,
        actor: Actor,
        application_id: ApplicationId,
        update: StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, PortalError> {
        let mut application = tx
            .find_application(application_id)?
            .ok_or_else(|| PortalError::not_found("application", application_id.0))?;

        let target = update.status;
        if !target.settable_by(actor.role) {
            return Err(PortalError::Forbidden(format!(
                "{} accounts cannot set status {target}",
                actor.role
            )));
        }
        let owner = match actor.role {
            Role::Recruiter => application.recruiter_id,
            Role::Applicant => application.applicant_id,
        };
        if owner != actor.id {
            return Err(PortalError::Forbidden(format!(
                "application {application_id} does not belong to user {}",
                actor.id
            )));
        }

        if actor.role == Role::Applicant {
            if application.status.is_terminal() {
                debug!(%application_id, status = %application.status, "cancel on terminal application ignored");
                return Ok(TransitionOutcome::unchanged(application));
            }
            application.status = ApplicationStatus::Cancelled;
            tx.update_application(&application)?;
            self.capacity
                .refresh_job_counters(tx, application.job_id)?;
            return Ok(TransitionOutcome::unchanged(application));
        }

        let from = application.status;
        if from.is_locked() {
            return Err(PortalError::TerminalStateLocked(from));
        }
        if !from.can_transition(actor.role, target) {
            return Err(PortalError::InvalidTransition { from, to: target });
        }

        if target == ApplicationStatus::Accepted {
            return self.accept(tx, application, update.date_of_joining.unwrap_or(now));
        }

        application.status = target;
        tx.update_application(&application)?;
        self.capacity
            .refresh_job_counters(tx, application.job_id)?;
        Ok(TransitionOutcome::unchanged(application))
    }

    fn accept(
        &self,
        tx: &mut dyn StoreTransaction,
        mut application: Application,
        date_of_joining: DateTime<Utc>,
    ) -> Result<TransitionOutcome, PortalError> {
        let mut job = tx
            .find_job(application.job_id)?
            .ok_or_else(|| PortalError::not_found("job", application.job_id.0))?;
        let accepted_before = self.capacity.can_accept(tx, &job)?;

        let employed_elsewhere = tx.count_applications(
            &ApplicationFilter::default()
                .applicant(application.applicant_id)
                .excluding(application.id)
                .statuses(StatusSet::exactly(ApplicationStatus::Accepted)),
        )?;
        if employed_elsewhere > 0 {
            return Err(PortalError::AlreadyEmployed);
        }

        application.status = ApplicationStatus::Accepted;
        application.date_of_joining = Some(date_of_joining);
        tx.update_application(&application)?;

        let cascaded = tx.set_application_status(
            &ApplicationFilter::default()
                .applicant(application.applicant_id)
                .excluding(application.id)
                .statuses(StatusSet::Excluding(CASCADE_EXEMPT.to_vec())),
            ApplicationStatus::Cancelled,
        )?;

        job.accepted_candidates = accepted_before + 1;
        job.active_applications = tx.count_applications(
            &ApplicationFilter::default()
                .job(job.id)
                .statuses(StatusSet::active()),
        )?;
        tx.update_job(&job)?;

        let touched: BTreeSet<JobId> = cascaded
            .iter()
            .map(|other| other.job_id)
            .filter(|other| *other != job.id)
            .collect();
        for job_id in touched {
            self.capacity.refresh_job_counters(tx, job_id)?;
        }

        if !cascaded.is_empty() {
            info!(
                application_id = %application.id,
                applicant_id = %application.applicant_id,
                cancelled = cascaded.len(),
                "acceptance cancelled other pending applications"
            );
        }

        Ok(TransitionOutcome {
            application,
            cascaded,
        })
    }

    /// Mark every active application of a job `deleted` ahead of removing the job.
    pub fn retire_job(
        &self,
        tx: &mut dyn StoreTransaction,
        job_id: JobId,
    ) -> Result<Vec<Application>, PortalError> {
        let retired = tx.set_application_status(
            &ApplicationFilter::default()
                .job(job_id)
                .statuses(StatusSet::active()),
            ApplicationStatus::Deleted,
        )?;
        Ok(retired)
    }
}
