//! Entity store abstraction.
//!
//! The lifecycle rules never touch a backend directly: every operation opens one
//! transaction through [`PortalStore::transaction`] and works against the
//! object-safe [`StoreTransaction`] it is handed. A transaction either commits
//! every write or none of them, and concurrent transactions are serialized.

mod memory;
mod query;
mod sqlite;

pub use memory::MemoryStore;
pub use query::{ApplicantQuery, ApplicationFilter, JobQuery, JobSort, JobSortKey, StatusSet};
pub use sqlite::SqliteStore;

use super::domain::{
    ApplicantProfile, Application, ApplicationDraft, ApplicationId, ApplicationStatus, Job,
    JobDraft, JobId, NewUser, Rating, RatingCategory, RecruiterProfile, Role, User, UserId,
};
use super::error::{PortalError, StoreError};

/// Handle to the shared store. Opened at process start and passed explicitly.
pub trait PortalStore: Send + Sync {
    /// Run `work` in a serializable transaction.
    ///
    /// Commits when `work` returns `Ok`; rolls back every write otherwise.
    fn transaction<T>(
        &self,
        work: &mut dyn FnMut(&mut dyn StoreTransaction) -> Result<T, PortalError>,
    ) -> Result<T, PortalError>;
}

/// Reads and writes available inside a transaction.
pub trait StoreTransaction {
    fn insert_user(&mut self, user: &NewUser, role: Role) -> Result<User, StoreError>;
    fn find_user(&mut self, id: UserId) -> Result<Option<User>, StoreError>;
    fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError>;

    fn insert_applicant_profile(&mut self, profile: &ApplicantProfile) -> Result<(), StoreError>;
    fn find_applicant_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<ApplicantProfile>, StoreError>;
    /// Overwrite the editable profile fields; the stored rating is kept.
    fn update_applicant_profile(&mut self, profile: &ApplicantProfile) -> Result<(), StoreError>;
    fn set_applicant_rating(&mut self, user_id: UserId, rating: f64) -> Result<(), StoreError>;
    fn insert_recruiter_profile(&mut self, profile: &RecruiterProfile) -> Result<(), StoreError>;
    fn update_recruiter_profile(&mut self, profile: &RecruiterProfile) -> Result<(), StoreError>;
    fn find_recruiter_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<RecruiterProfile>, StoreError>;

    fn insert_job(&mut self, draft: &JobDraft) -> Result<Job, StoreError>;
    fn find_job(&mut self, id: JobId) -> Result<Option<Job>, StoreError>;
    fn update_job(&mut self, job: &Job) -> Result<(), StoreError>;
    /// Returns `false` when no job with that id existed.
    fn delete_job(&mut self, id: JobId) -> Result<bool, StoreError>;
    fn find_jobs(&mut self, query: &JobQuery) -> Result<Vec<Job>, StoreError>;

    fn insert_application(&mut self, draft: &ApplicationDraft)
        -> Result<Application, StoreError>;
    fn find_application(&mut self, id: ApplicationId)
        -> Result<Option<Application>, StoreError>;
    fn update_application(&mut self, application: &Application) -> Result<(), StoreError>;
    fn count_applications(&mut self, filter: &ApplicationFilter) -> Result<u32, StoreError>;
    /// Matching applications, newest first.
    fn find_applications(
        &mut self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, StoreError>;
    /// Overwrite the status of every matching application, returning the updated rows.
    fn set_application_status(
        &mut self,
        filter: &ApplicationFilter,
        status: ApplicationStatus,
    ) -> Result<Vec<Application>, StoreError>;

    fn find_rating(
        &mut self,
        category: RatingCategory,
        sender_id: UserId,
        receiver_id: i64,
    ) -> Result<Option<Rating>, StoreError>;
    /// Insert or overwrite the row keyed by (category, sender, receiver).
    fn upsert_rating(&mut self, rating: &Rating) -> Result<(), StoreError>;
    /// Aggregate average over every rating a receiver holds in `category`.
    fn average_rating(
        &mut self,
        category: RatingCategory,
        receiver_id: i64,
    ) -> Result<Option<f64>, StoreError>;
    fn count_ratings(&mut self, category: RatingCategory, receiver_id: i64)
        -> Result<u32, StoreError>;
}
