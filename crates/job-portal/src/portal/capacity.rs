use tracing::debug;

use super::config::PortalLimits;
use super::domain::{ApplicationStatus, Job, JobId, UserId};
use super::error::PortalError;
use super::store::{ApplicationFilter, StatusSet, StoreTransaction};

/// Validates job and applicant capacity before the lifecycle engine mutates anything.
#[derive(Debug, Clone, Copy)]
pub struct CapacityAccountant {
    max_active: u32,
}

impl CapacityAccountant {
    pub fn new(limits: &PortalLimits) -> Self {
        Self {
            max_active: limits.max_active_applications,
        }
    }

    pub fn max_active(&self) -> u32 {
        self.max_active
    }

    /// Checks run in a fixed order and the first failure wins.
    pub fn can_apply(
        &self,
        tx: &mut dyn StoreTransaction,
        job: &Job,
        applicant_id: UserId,
    ) -> Result<(), PortalError> {
        let duplicate = tx.count_applications(
            &ApplicationFilter::default()
                .applicant(applicant_id)
                .job(job.id)
                .statuses(StatusSet::active()),
        )?;
        if duplicate > 0 {
            return Err(PortalError::AlreadyApplied);
        }

        let job_active = tx.count_applications(
            &ApplicationFilter::default()
                .job(job.id)
                .statuses(StatusSet::active()),
        )?;
        if job_active >= job.max_applicants {
            debug!(job_id = %job.id, job_active, max = job.max_applicants, "job is full");
            return Err(PortalError::JobFull(job.id));
        }

        let applicant_active = tx.count_applications(
            &ApplicationFilter::default()
                .applicant(applicant_id)
                .statuses(StatusSet::active()),
        )?;
        if applicant_active >= self.max_active {
            return Err(PortalError::TooManyActiveApplications {
                limit: self.max_active,
            });
        }

        let employed = tx.count_applications(
            &ApplicationFilter::default()
                .applicant(applicant_id)
                .statuses(StatusSet::exactly(ApplicationStatus::Accepted)),
        )?;
        if employed > 0 {
            return Err(PortalError::AlreadyEmployed);
        }

        Ok(())
    }

    /// Returns the job's accepted count before the new acceptance.
    pub fn can_accept(
        &self,
        tx: &mut dyn StoreTransaction,
        job: &Job,
    ) -> Result<u32, PortalError> {
        let accepted = tx.count_applications(
            &ApplicationFilter::default()
                .job(job.id)
                .statuses(StatusSet::exactly(ApplicationStatus::Accepted)),
        )?;
        if accepted >= job.max_positions {
            return Err(PortalError::PositionsFull {
                job_id: job.id,
                max_positions: job.max_positions,
            });
        }
        Ok(accepted)
    }

    /// Recompute the denormalized counters from the application rows.
    ///
    /// Returns `None` when the job no longer exists.
    pub fn refresh_job_counters(
        &self,
        tx: &mut dyn StoreTransaction,
        job_id: JobId,
    ) -> Result<Option<Job>, PortalError> {
        let Some(mut job) = tx.find_job(job_id)? else {
            return Ok(None);
        };

        let active = tx.count_applications(
            &ApplicationFilter::default()
                .job(job_id)
                .statuses(StatusSet::active()),
        )?;
        let accepted = tx.count_applications(
            &ApplicationFilter::default()
                .job(job_id)
                .statuses(StatusSet::exactly(ApplicationStatus::Accepted)),
        )?;

        if job.active_applications != active || job.accepted_candidates != accepted {
            job.active_applications = active;
            job.accepted_candidates = accepted;
            tx.update_job(&job)?;
        }
        Ok(Some(job))
    }
}
