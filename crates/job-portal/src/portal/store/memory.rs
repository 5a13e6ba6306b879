use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use super::query::{ApplicationFilter, JobQuery};
use super::{PortalStore, StoreTransaction};
use crate::portal::domain::{
    ApplicantProfile, Application, ApplicationDraft, ApplicationId, ApplicationStatus, Job,
    JobDraft, JobId, NewUser, Rating, RatingCategory, RecruiterProfile, Role, User, UserId,
    UNRATED,
};
use crate::portal::error::{PortalError, StoreError};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    applicants: BTreeMap<UserId, ApplicantProfile>,
    recruiters: BTreeMap<UserId, RecruiterProfile>,
    jobs: BTreeMap<JobId, Job>,
    applications: BTreeMap<ApplicationId, Application>,
    ratings: BTreeMap<(RatingCategory, UserId, i64), Rating>,
    last_user_id: i64,
    last_job_id: i64,
    last_application_id: i64,
}

/// In-process store used by tests, demos, and `PORTAL_DATABASE=memory`.
///
/// A transaction holds the table mutex for its whole duration and works on a
/// copy of the tables; the copy replaces the live tables only on success.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PortalStore for MemoryStore {
    fn transaction<T>(
        &self,
        work: &mut dyn FnMut(&mut dyn StoreTransaction) -> Result<T, PortalError>,
    ) -> Result<T, PortalError> {
        // A panicking closure never reached the commit below, so the tables are intact.
        let mut guard = self.tables.lock().unwrap_or_else(PoisonError::into_inner);

        let mut scoped = MemoryTransaction {
            tables: guard.clone(),
        };
        let value = work(&mut scoped)?;
        *guard = scoped.tables;
        Ok(value)
    }
}

struct MemoryTransaction {
    tables: Tables,
}

impl MemoryTransaction {
    fn newest_first(mut applications: Vec<Application>) -> Vec<Application> {
        applications.sort_by(|left, right| {
            right
                .date_of_application
                .cmp(&left.date_of_application)
                .then_with(|| right.id.cmp(&left.id))
        });
        applications
    }
}

impl StoreTransaction for MemoryTransaction {
    fn insert_user(&mut self, user: &NewUser, role: Role) -> Result<User, StoreError> {
        let email = user.email.trim().to_lowercase();
        if self.tables.users.values().any(|existing| existing.email == email) {
            return Err(StoreError::backend(
                "insert user",
                format!("email {email} already registered"),
            ));
        }

        self.tables.last_user_id += 1;
        let record = User {
            id: UserId(self.tables.last_user_id),
            email,
            password_hash: user.password_hash.clone(),
            role,
        };
        self.tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    fn find_user(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.users.get(&id).cloned())
    }

    fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.trim().to_lowercase();
        Ok(self
            .tables
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    fn insert_applicant_profile(&mut self, profile: &ApplicantProfile) -> Result<(), StoreError> {
        self.tables
            .applicants
            .insert(profile.user_id, profile.clone());
        Ok(())
    }

    fn find_applicant_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<ApplicantProfile>, StoreError> {
        Ok(self.tables.applicants.get(&user_id).cloned())
    }

    fn update_applicant_profile(&mut self, profile: &ApplicantProfile) -> Result<(), StoreError> {
        match self.tables.applicants.get_mut(&profile.user_id) {
            Some(stored) => {
                *stored = ApplicantProfile {
                    rating: stored.rating,
                    ..profile.clone()
                };
                Ok(())
            }
            None => Err(StoreError::backend(
                "update applicant profile",
                format!("no applicant profile for user {}", profile.user_id),
            )),
        }
    }

    fn set_applicant_rating(&mut self, user_id: UserId, rating: f64) -> Result<(), StoreError> {
        match self.tables.applicants.get_mut(&user_id) {
            Some(profile) => {
                profile.rating = rating;
                Ok(())
            }
            None => Err(StoreError::backend(
                "update applicant rating",
                format!("no applicant profile for user {user_id}"),
            )),
        }
    }

    fn insert_recruiter_profile(&mut self, profile: &RecruiterProfile) -> Result<(), StoreError> {
        self.tables
            .recruiters
            .insert(profile.user_id, profile.clone());
        Ok(())
    }

    fn update_recruiter_profile(&mut self, profile: &RecruiterProfile) -> Result<(), StoreError> {
        match self.tables.recruiters.get_mut(&profile.user_id) {
            Some(stored) => {
                *stored = RecruiterProfile {
                    rating: stored.rating,
                    ..profile.clone()
                };
                Ok(())
            }
            None => Err(StoreError::backend(
                "update recruiter profile",
                format!("no recruiter profile for user {}", profile.user_id),
            )),
        }
    }

    fn find_recruiter_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<RecruiterProfile>, StoreError> {
        Ok(self.tables.recruiters.get(&user_id).cloned())
    }

    fn insert_job(&mut self, draft: &JobDraft) -> Result<Job, StoreError> {
        self.tables.last_job_id += 1;
        let job = Job {
            id: JobId(self.tables.last_job_id),
            owner_id: draft.owner_id,
            title: draft.title.clone(),
            max_applicants: draft.max_applicants,
            max_positions: draft.max_positions,
            active_applications: 0,
            accepted_candidates: 0,
            date_of_posting: draft.date_of_posting,
            deadline: draft.deadline,
            skillsets: draft.skillsets.clone(),
            job_type: draft.job_type.clone(),
            duration: draft.duration,
            salary: draft.salary,
            rating: UNRATED,
        };
        self.tables.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    fn find_job(&mut self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.tables.jobs.get(&id).cloned())
    }

    fn update_job(&mut self, job: &Job) -> Result<(), StoreError> {
        match self.tables.jobs.get_mut(&job.id) {
            Some(existing) => {
                *existing = job.clone();
                Ok(())
            }
            None => Err(StoreError::backend(
                "update job",
                format!("job {} does not exist", job.id),
            )),
        }
    }

    fn delete_job(&mut self, id: JobId) -> Result<bool, StoreError> {
        Ok(self.tables.jobs.remove(&id).is_some())
    }

    fn find_jobs(&mut self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        let mut jobs: Vec<Job> = self
            .tables
            .jobs
            .values()
            .filter(|job| query.matches(job))
            .cloned()
            .collect();
        jobs.sort_by(|left, right| query.compare(left, right));
        Ok(jobs)
    }

    fn insert_application(
        &mut self,
        draft: &ApplicationDraft,
    ) -> Result<Application, StoreError> {
        self.tables.last_application_id += 1;
        let application = Application {
            id: ApplicationId(self.tables.last_application_id),
            applicant_id: draft.applicant_id,
            recruiter_id: draft.recruiter_id,
            job_id: draft.job_id,
            status: draft.status,
            date_of_application: draft.date_of_application,
            date_of_joining: None,
            sop: draft.sop.clone(),
        };
        self.tables
            .applications
            .insert(application.id, application.clone());
        Ok(application)
    }

    fn find_application(
        &mut self,
        id: ApplicationId,
    ) -> Result<Option<Application>, StoreError> {
        Ok(self.tables.applications.get(&id).cloned())
    }

    fn update_application(&mut self, application: &Application) -> Result<(), StoreError> {
        match self.tables.applications.get_mut(&application.id) {
            Some(existing) => {
                *existing = application.clone();
                Ok(())
            }
            None => Err(StoreError::backend(
                "update application",
                format!("application {} does not exist", application.id),
            )),
        }
    }

    fn count_applications(&mut self, filter: &ApplicationFilter) -> Result<u32, StoreError> {
        let count = self
            .tables
            .applications
            .values()
            .filter(|application| filter.matches(application))
            .count();
        u32::try_from(count).map_err(|err| StoreError::backend("count applications", err))
    }

    fn find_applications(
        &mut self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, StoreError> {
        let matching = self
            .tables
            .applications
            .values()
            .filter(|application| filter.matches(application))
            .cloned()
            .collect();
        Ok(Self::newest_first(matching))
    }

    fn set_application_status(
        &mut self,
        filter: &ApplicationFilter,
        status: ApplicationStatus,
    ) -> Result<Vec<Application>, StoreError> {
        let mut updated = Vec::new();
        for application in self.tables.applications.values_mut() {
            if filter.matches(application) {
                application.status = status;
                updated.push(application.clone());
            }
        }
        Ok(updated)
    }

    fn find_rating(
        &mut self,
        category: RatingCategory,
        sender_id: UserId,
        receiver_id: i64,
    ) -> Result<Option<Rating>, StoreError> {
        Ok(self
            .tables
            .ratings
            .get(&(category, sender_id, receiver_id))
            .cloned())
    }

    fn upsert_rating(&mut self, rating: &Rating) -> Result<(), StoreError> {
        self.tables.ratings.insert(
            (rating.category, rating.sender_id, rating.receiver_id),
            rating.clone(),
        );
        Ok(())
    }

    fn average_rating(
        &mut self,
        category: RatingCategory,
        receiver_id: i64,
    ) -> Result<Option<f64>, StoreError> {
        let (sum, count) = self
            .tables
            .ratings
            .values()
            .filter(|rating| rating.category == category && rating.receiver_id == receiver_id)
            .fold((0.0_f64, 0_u32), |(sum, count), rating| {
                (sum + rating.value, count + 1)
            });

        Ok((count > 0).then(|| sum / f64::from(count)))
    }

    fn count_ratings(
        &mut self,
        category: RatingCategory,
        receiver_id: i64,
    ) -> Result<u32, StoreError> {
        let count = self
            .tables
            .ratings
            .values()
            .filter(|rating| rating.category == category && rating.receiver_id == receiver_id)
            .count();
        u32::try_from(count).map_err(|err| StoreError::backend("count ratings", err))
    }
}
