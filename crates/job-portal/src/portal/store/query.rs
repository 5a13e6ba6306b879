use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::portal::domain::{Application, ApplicationId, ApplicationStatus, Job, JobId, UserId};

/// Set-membership predicate over the application status column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusSet {
    #[default]
    Any,
    Only(Vec<ApplicationStatus>),
    Excluding(Vec<ApplicationStatus>),
}

impl StatusSet {
    /// Applications that still count against job and applicant capacity.
    pub fn active() -> Self {
        StatusSet::Excluding(ApplicationStatus::TERMINAL.to_vec())
    }

    pub fn exactly(status: ApplicationStatus) -> Self {
        StatusSet::Only(vec![status])
    }

    pub fn contains(&self, status: ApplicationStatus) -> bool {
        match self {
            StatusSet::Any => true,
            StatusSet::Only(statuses) => statuses.contains(&status),
            StatusSet::Excluding(statuses) => !statuses.contains(&status),
        }
    }
}

/// Equality/inequality/set filter over application rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationFilter {
    pub applicant_id: Option<UserId>,
    pub recruiter_id: Option<UserId>,
    pub job_id: Option<JobId>,
    pub excluding_id: Option<ApplicationId>,
    pub statuses: StatusSet,
}

impl ApplicationFilter {
    pub fn applicant(mut self, applicant_id: UserId) -> Self {
        self.applicant_id = Some(applicant_id);
        self
    }

    pub fn recruiter(mut self, recruiter_id: UserId) -> Self {
        self.recruiter_id = Some(recruiter_id);
        self
    }

    pub fn job(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn excluding(mut self, application_id: ApplicationId) -> Self {
        self.excluding_id = Some(application_id);
        self
    }

    pub fn statuses(mut self, statuses: StatusSet) -> Self {
        self.statuses = statuses;
        self
    }

    pub fn matches(&self, application: &Application) -> bool {
        self.applicant_id
            .map_or(true, |id| application.applicant_id == id)
            && self
                .recruiter_id
                .map_or(true, |id| application.recruiter_id == id)
            && self.job_id.map_or(true, |id| application.job_id == id)
            && self.excluding_id.map_or(true, |id| application.id != id)
            && self.statuses.contains(application.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSortKey {
    Salary,
    Duration,
    Rating,
}

impl JobSortKey {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "salary" => Some(JobSortKey::Salary),
            "duration" => Some(JobSortKey::Duration),
            "rating" => Some(JobSortKey::Rating),
            _ => None,
        }
    }

    pub(crate) const fn column(self) -> &'static str {
        match self {
            JobSortKey::Salary => "salary",
            JobSortKey::Duration => "duration",
            JobSortKey::Rating => "rating",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSort {
    pub key: JobSortKey,
    pub descending: bool,
}

/// Search over posted jobs. Empty fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    pub owner_id: Option<UserId>,
    pub title_contains: Option<String>,
    pub job_types: Vec<String>,
    pub salary_min: Option<u32>,
    pub salary_max: Option<u32>,
    /// Exclusive upper bound on duration in months.
    pub duration_below: Option<u32>,
    pub sort: Vec<JobSort>,
}

impl JobQuery {
    pub fn matches(&self, job: &Job) -> bool {
        if self.owner_id.is_some_and(|owner| owner != job.owner_id) {
            return false;
        }
        if let Some(needle) = &self.title_contains {
            if !job.title.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if !self.job_types.is_empty() && !self.job_types.contains(&job.job_type) {
            return false;
        }
        if self.salary_min.is_some_and(|min| job.salary < min) {
            return false;
        }
        if self.salary_max.is_some_and(|max| job.salary > max) {
            return false;
        }
        if self.duration_below.is_some_and(|bound| job.duration >= bound) {
            return false;
        }
        true
    }

    /// Ordering used when the backend cannot sort natively; ties fall back to id.
    pub fn compare(&self, left: &Job, right: &Job) -> Ordering {
        for sort in &self.sort {
            let ordering = match sort.key {
                JobSortKey::Salary => left.salary.cmp(&right.salary),
                JobSortKey::Duration => left.duration.cmp(&right.duration),
                JobSortKey::Rating => left.rating.total_cmp(&right.rating),
            };
            let ordering = if sort.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        left.id.cmp(&right.id)
    }
}

/// Recruiter-side search over applications to their jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicantQuery {
    pub job_id: Option<JobId>,
    /// Empty means every status.
    pub statuses: Vec<ApplicationStatus>,
}

impl ApplicantQuery {
    pub fn filter_for(&self, recruiter_id: UserId) -> ApplicationFilter {
        let filter = ApplicationFilter::default().recruiter(recruiter_id);
        let filter = match self.job_id {
            Some(job_id) => filter.job(job_id),
            None => filter,
        };
        if self.statuses.is_empty() {
            filter
        } else {
            filter.statuses(StatusSet::Only(self.statuses.clone()))
        }
    }
}
