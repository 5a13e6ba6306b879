use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::capacity::CapacityAccountant;
use super::config::PortalLimits;
use super::domain::{
    Actor, ApplicantProfile, ApplicantProfileInput, Application, ApplicationId, ApplicationStatus,
    Job, JobId,
    JobPatch, NewJob, NewUser, ProfilePatch, Rating, RatingCategory, RecruiterProfileInput, Role,
    StatusUpdate, User, UserId, UserProfile,
};
use super::error::PortalError;
use super::lifecycle::LifecycleEngine;
use super::rating::RatingAggregator;
use super::store::{
    ApplicantQuery, ApplicationFilter, JobQuery, PortalStore, StatusSet, StoreTransaction,
};

/// An application joined with the applicant's profile, as recruiters see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicantView {
    pub application: Application,
    pub applicant: Option<ApplicantProfile>,
}

/// Facade composing the lifecycle engine, capacity accountant, and rating aggregator.
///
/// Each public operation runs in exactly one store transaction.
pub struct JobPortalService<S> {
    store: Arc<S>,
    lifecycle: LifecycleEngine,
    ratings: RatingAggregator,
    limits: PortalLimits,
}

impl<S> JobPortalService<S>
where
    S: PortalStore + 'static,
{
    pub fn new(store: Arc<S>, limits: PortalLimits) -> Self {
        let capacity = CapacityAccountant::new(&limits);
        Self {
            store,
            lifecycle: LifecycleEngine::new(capacity),
            ratings: RatingAggregator,
            limits,
        }
    }

    pub fn limits(&self) -> PortalLimits {
        self.limits
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run `work` in one transaction, retrying once when the store reports contention.
    fn in_transaction<T>(
        &self,
        operation: &'static str,
        mut work: impl FnMut(&mut dyn StoreTransaction) -> Result<T, PortalError>,
    ) -> Result<T, PortalError> {
        let result = match self.store.transaction(&mut work) {
            Err(PortalError::Store(error)) if error.is_transient() => {
                warn!(operation, %error, "store contention, retrying once");
                self.store.transaction(&mut work)
            }
            other => other,
        };

        if let Err(error) = &result {
            debug!(operation, kind = error.kind(), %error, "portal operation refused");
        }
        result
    }

    pub fn register_applicant(
        &self,
        account: NewUser,
        profile: ApplicantProfileInput,
    ) -> Result<UserProfile, PortalError> {
        account.validate()?;
        let registered = self.in_transaction("register_applicant", |tx| {
            let user = insert_account(tx, &account, Role::Applicant)?;
            let profile = profile.clone().into_profile(user.id)?;
            tx.insert_applicant_profile(&profile)?;
            Ok(UserProfile::Applicant { user, profile })
        })?;
        info!(email = %account.email, "applicant registered");
        Ok(registered)
    }

    pub fn register_recruiter(
        &self,
        account: NewUser,
        profile: RecruiterProfileInput,
    ) -> Result<UserProfile, PortalError> {
        account.validate()?;
        let registered = self.in_transaction("register_recruiter", |tx| {
            let user = insert_account(tx, &account, Role::Recruiter)?;
            let profile = profile.clone().into_profile(user.id)?;
            tx.insert_recruiter_profile(&profile)?;
            Ok(UserProfile::Recruiter { user, profile })
        })?;
        info!(email = %account.email, "recruiter registered");
        Ok(registered)
    }

    pub fn user_profile(&self, user_id: UserId) -> Result<UserProfile, PortalError> {
        self.in_transaction("user_profile", |tx| {
            let user = tx
                .find_user(user_id)?
                .ok_or_else(|| PortalError::not_found("user", user_id.0))?;
            match user.role {
                Role::Applicant => {
                    let profile = tx
                        .find_applicant_profile(user_id)?
                        .ok_or_else(|| PortalError::not_found("applicant", user_id.0))?;
                    Ok(UserProfile::Applicant { user, profile })
                }
                Role::Recruiter => {
                    let profile = tx
                        .find_recruiter_profile(user_id)?
                        .ok_or_else(|| PortalError::not_found("recruiter", user_id.0))?;
                    Ok(UserProfile::Recruiter { user, profile })
                }
            }
        })
    }

    /// Edit the actor's own profile. The stored rating is never touched.
    pub fn update_profile(
        &self,
        actor: Actor,
        patch: ProfilePatch,
    ) -> Result<UserProfile, PortalError> {
        let updated = self.in_transaction("update_profile", |tx| {
            let user = require_user(tx, actor)?;
            match user.role {
                Role::Applicant => {
                    let current = tx
                        .find_applicant_profile(user.id)?
                        .ok_or_else(|| PortalError::not_found("applicant", user.id.0))?;
                    let profile = patch.clone().apply_to_applicant(&current)?;
                    tx.update_applicant_profile(&profile)?;
                    Ok(UserProfile::Applicant { user, profile })
                }
                Role::Recruiter => {
                    let current = tx
                        .find_recruiter_profile(user.id)?
                        .ok_or_else(|| PortalError::not_found("recruiter", user.id.0))?;
                    let profile = patch.clone().apply_to_recruiter(&current)?;
                    tx.update_recruiter_profile(&profile)?;
                    Ok(UserProfile::Recruiter { user, profile })
                }
            }
        })?;
        info!(user_id = %actor.id, role = %actor.role, "profile updated");
        Ok(updated)
    }

    pub fn create_job(&self, actor: Actor, job: NewJob) -> Result<Job, PortalError> {
        actor.require(Role::Recruiter, "post jobs")?;
        let draft = job.validate(actor.id, Utc::now())?;
        let job = self.in_transaction("create_job", |tx| {
            require_user(tx, actor)?;
            Ok(tx.insert_job(&draft)?)
        })?;
        info!(job_id = %job.id, owner_id = %actor.id, "job posted");
        Ok(job)
    }

    pub fn update_job(
        &self,
        actor: Actor,
        job_id: JobId,
        patch: JobPatch,
    ) -> Result<Job, PortalError> {
        actor.require(Role::Recruiter, "edit jobs")?;
        self.in_transaction("update_job", |tx| {
            let mut job = owned_job(tx, actor, job_id)?;
            let for_job = ApplicationFilter::default().job(job_id);
            let active = tx.count_applications(&for_job.clone().statuses(StatusSet::active()))?;
            let accepted = tx.count_applications(
                &for_job.statuses(StatusSet::exactly(ApplicationStatus::Accepted)),
            )?;
            patch.apply_to(&mut job, active, accepted)?;
            tx.update_job(&job)?;
            Ok(job)
        })
    }

    /// Remove a job, marking its active applications `deleted` first.
    pub fn delete_job(&self, actor: Actor, job_id: JobId) -> Result<Job, PortalError> {
        actor.require(Role::Recruiter, "delete jobs")?;
        let (job, retired) = self.in_transaction("delete_job", |tx| {
            let job = owned_job(tx, actor, job_id)?;
            let retired = self.lifecycle.retire_job(tx, job_id)?;
            tx.delete_job(job_id)?;
            Ok((job, retired.len()))
        })?;
        info!(%job_id, retired, "job deleted");
        Ok(job)
    }

    pub fn get_job(&self, job_id: JobId) -> Result<Job, PortalError> {
        self.in_transaction("get_job", |tx| {
            tx.find_job(job_id)?
                .ok_or_else(|| PortalError::not_found("job", job_id.0))
        })
    }

    /// Search posted jobs. `own_only` narrows the result to the recruiter's postings.
    pub fn list_jobs(
        &self,
        actor: Actor,
        own_only: bool,
        mut query: JobQuery,
    ) -> Result<Vec<Job>, PortalError> {
        if own_only {
            actor.require(Role::Recruiter, "list their own jobs")?;
            query.owner_id = Some(actor.id);
        }
        self.in_transaction("list_jobs", |tx| Ok(tx.find_jobs(&query)?))
    }

    pub fn apply(
        &self,
        actor: Actor,
        job_id: JobId,
        sop: Option<String>,
    ) -> Result<Application, PortalError> {
        let now = Utc::now();
        let application = self.in_transaction("apply", |tx| {
            self.lifecycle.submit(tx, actor, job_id, sop.clone(), now)
        })?;
        info!(
            application_id = %application.id,
            %job_id,
            applicant_id = %actor.id,
            "application submitted"
        );
        Ok(application)
    }

    pub fn update_application_status(
        &self,
        actor: Actor,
        application_id: ApplicationId,
        update: StatusUpdate,
    ) -> Result<Application, PortalError> {
        let now = Utc::now();
        let outcome = self.in_transaction("update_application_status", |tx| {
            self.lifecycle
                .transition(tx, actor, application_id, update.clone(), now)
        })?;
        info!(
            %application_id,
            status = %outcome.application.status,
            cascaded = outcome.cascaded.len(),
            "application status updated"
        );
        Ok(outcome.application)
    }

    /// Applications to one of the recruiter's jobs, newest first.
    pub fn list_applications_for_job(
        &self,
        actor: Actor,
        job_id: JobId,
        statuses: StatusSet,
    ) -> Result<Vec<Application>, PortalError> {
        actor.require(Role::Recruiter, "view job applications")?;
        self.in_transaction("list_applications_for_job", |tx| {
            owned_job(tx, actor, job_id)?;
            Ok(tx.find_applications(
                &ApplicationFilter::default()
                    .job(job_id)
                    .statuses(statuses.clone()),
            )?)
        })
    }

    /// The actor's own applications, newest first.
    pub fn list_applications(&self, actor: Actor) -> Result<Vec<Application>, PortalError> {
        let filter = match actor.role {
            Role::Recruiter => ApplicationFilter::default().recruiter(actor.id),
            Role::Applicant => ApplicationFilter::default().applicant(actor.id),
        };
        self.in_transaction("list_applications", |tx| {
            Ok(tx.find_applications(&filter)?)
        })
    }

    pub fn list_applicants(
        &self,
        actor: Actor,
        query: ApplicantQuery,
    ) -> Result<Vec<ApplicantView>, PortalError> {
        actor.require(Role::Recruiter, "view applicants")?;
        let filter = query.filter_for(actor.id);
        self.in_transaction("list_applicants", |tx| {
            let applications = tx.find_applications(&filter)?;
            let mut views = Vec::with_capacity(applications.len());
            for application in applications {
                let applicant = tx.find_applicant_profile(application.applicant_id)?;
                views.push(ApplicantView {
                    application,
                    applicant,
                });
            }
            Ok(views)
        })
    }

    pub fn rate(&self, actor: Actor, receiver_id: i64, value: f64) -> Result<Rating, PortalError> {
        self.in_transaction("rate", |tx| {
            self.ratings.submit(tx, actor, receiver_id, value)
        })
    }

    /// The value `actor` gave `receiver_id`, or -1 when they never rated it.
    pub fn get_rating(
        &self,
        actor: Actor,
        receiver_id: i64,
        category: RatingCategory,
    ) -> Result<f64, PortalError> {
        self.in_transaction("get_rating", |tx| {
            self.ratings.lookup(tx, actor.id, receiver_id, category)
        })
    }
}

fn insert_account(
    tx: &mut dyn StoreTransaction,
    account: &NewUser,
    role: Role,
) -> Result<User, PortalError> {
    if tx.find_user_by_email(&account.email)?.is_some() {
        return Err(PortalError::Conflict(format!(
            "email {} is already registered",
            account.email.trim()
        )));
    }
    Ok(tx.insert_user(account, role)?)
}

fn require_user(tx: &mut dyn StoreTransaction, actor: Actor) -> Result<User, PortalError> {
    let user = tx
        .find_user(actor.id)?
        .ok_or_else(|| PortalError::not_found("user", actor.id.0))?;
    if user.role != actor.role {
        return Err(PortalError::Forbidden(format!(
            "user {} is not a {}",
            user.id, actor.role
        )));
    }
    Ok(user)
}

fn owned_job(tx: &mut dyn StoreTransaction, actor: Actor, job_id: JobId) -> Result<Job, PortalError> {
    let job = tx
        .find_job(job_id)?
        .ok_or_else(|| PortalError::not_found("job", job_id.0))?;
    if job.owner_id != actor.id {
        return Err(PortalError::Forbidden(format!(
            "job {job_id} belongs to another recruiter"
        )));
    }
    Ok(job)
}
