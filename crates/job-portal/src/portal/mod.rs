//! Job portal core: application lifecycle, capacity accounting, and rating aggregation.
//!
//! Recruiters post jobs, applicants apply, and each application moves through a
//! closed set of statuses. Every operation goes through [`JobPortalService`],
//! which opens one store transaction, validates capacity, applies the
//! transition together with its cascades, and commits.

pub mod capacity;
pub mod config;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod rating;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use capacity::CapacityAccountant;
pub use config::{PortalLimits, DEFAULT_MAX_ACTIVE_APPLICATIONS};
pub use domain::{
    Actor, ApplicantProfile, ApplicantProfileInput, Application, ApplicationId,
    ApplicationStatus, Education, Job, JobId, JobPatch, NewJob, NewUser, ProfilePatch, Rating,
    RatingCategory, RecruiterProfile, RecruiterProfileInput, Role, StatusUpdate, User, UserId,
    UserProfile, UNRATED,
};
pub use error::{PortalError, StoreError};
pub use lifecycle::{LifecycleEngine, TransitionOutcome};
pub use rating::RatingAggregator;
pub use router::{error_response, portal_router, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
pub use service::{ApplicantView, JobPortalService};
pub use store::{
    ApplicantQuery, ApplicationFilter, JobQuery, JobSort, JobSortKey, MemoryStore, PortalStore,
    SqliteStore, StatusSet, StoreTransaction,
};
