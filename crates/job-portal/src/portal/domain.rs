use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PortalError;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a registered user (recruiter or applicant).
    UserId
);
entity_id!(
    /// Identifier of a posted job.
    JobId
);
entity_id!(
    /// Identifier of an application.
    ApplicationId
);

/// Ratings live in [-1, 5]; -1 marks an entity nobody has rated yet.
pub const UNRATED: f64 = -1.0;
pub const MIN_RATING: f64 = -1.0;
pub const MAX_RATING: f64 = 5.0;

const MAX_SOP_LENGTH: usize = 255;

/// Account role, fixed when the user is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Recruiter,
    Applicant,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Recruiter => "recruiter",
            Role::Applicant => "applicant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = PortalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "recruiter" => Ok(Role::Recruiter),
            "applicant" => Ok(Role::Applicant),
            other => Err(PortalError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

/// Pre-authenticated caller handed to the portal by the request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub const fn recruiter(id: UserId) -> Self {
        Self {
            id,
            role: Role::Recruiter,
        }
    }

    pub const fn applicant(id: UserId) -> Self {
        Self {
            id,
            role: Role::Applicant,
        }
    }

    pub(crate) fn require(&self, role: Role, action: &str) -> Result<(), PortalError> {
        if self.role == role {
            Ok(())
        } else {
            Err(PortalError::Forbidden(format!(
                "{} accounts cannot {action}",
                self.role
            )))
        }
    }
}

/// Status of an application as it moves from submission to resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Applied,
    Shortlisted,
    Accepted,
    Rejected,
    Deleted,
    Cancelled,
    Finished,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 7] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Shortlisted,
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
        ApplicationStatus::Deleted,
        ApplicationStatus::Cancelled,
        ApplicationStatus::Finished,
    ];

    /// Statuses that take an application out of every capacity count.
    pub const TERMINAL: [ApplicationStatus; 4] = [
        ApplicationStatus::Rejected,
        ApplicationStatus::Deleted,
        ApplicationStatus::Cancelled,
        ApplicationStatus::Finished,
    ];

    /// Statuses the recruiter can no longer overwrite.
    pub const LOCKED: [ApplicationStatus; 3] = [
        ApplicationStatus::Rejected,
        ApplicationStatus::Deleted,
        ApplicationStatus::Cancelled,
    ];

    /// Statuses that prove the applicant worked on the job.
    pub const EMPLOYED: [ApplicationStatus; 2] =
        [ApplicationStatus::Accepted, ApplicationStatus::Finished];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Deleted => "deleted",
            ApplicationStatus::Cancelled => "cancelled",
            ApplicationStatus::Finished => "finished",
        }
    }

    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn is_locked(self) -> bool {
        Self::LOCKED.contains(&self)
    }

    /// Whether `role` may ever request this status, regardless of the current one.
    pub fn settable_by(self, role: Role) -> bool {
        match role {
            Role::Recruiter => matches!(
                self,
                ApplicationStatus::Shortlisted
                    | ApplicationStatus::Accepted
                    | ApplicationStatus::Rejected
                    | ApplicationStatus::Finished
            ),
            Role::Applicant => self == ApplicationStatus::Cancelled,
        }
    }

    /// Transition table: the statuses `role` may move an application to from `self`.
    pub fn allowed_targets(self, role: Role) -> &'static [ApplicationStatus] {
        use ApplicationStatus::*;

        match (self, role) {
            (Applied | Shortlisted, Role::Recruiter) => &[Shortlisted, Accepted, Rejected],
            (Accepted, Role::Recruiter) => &[Finished],
            (Rejected | Deleted | Cancelled | Finished, Role::Recruiter) => &[],
            (_, Role::Applicant) => &[Cancelled],
        }
    }

    pub fn can_transition(self, role: Role, target: ApplicationStatus) -> bool {
        self.allowed_targets(role).contains(&target)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApplicationStatus {
    type Err = PortalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.label() == normalized)
            .ok_or_else(|| {
                PortalError::Validation(format!("unknown application status '{normalized}'"))
            })
    }
}

/// Rating direction: applicants rate jobs, recruiters rate applicants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingCategory {
    Job,
    Applicant,
}

impl RatingCategory {
    pub const fn label(self) -> &'static str {
        match self {
            RatingCategory::Job => "job",
            RatingCategory::Applicant => "applicant",
        }
    }

    /// The category a rater of the given role writes into.
    pub const fn rated_by(role: Role) -> Self {
        match role {
            Role::Recruiter => RatingCategory::Applicant,
            Role::Applicant => RatingCategory::Job,
        }
    }
}

impl fmt::Display for RatingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RatingCategory {
    type Err = PortalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "job" => Ok(RatingCategory::Job),
            "applicant" => Ok(RatingCategory::Applicant),
            other => Err(PortalError::Validation(format!(
                "unknown rating category '{other}'"
            ))),
        }
    }
}

pub fn validate_rating(value: f64) -> Result<f64, PortalError> {
    if value.is_finite() && (MIN_RATING..=MAX_RATING).contains(&value) {
        Ok(value)
    } else {
        Err(PortalError::Validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}, found {value}"
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
}

/// Registration payload. The password arrives already hashed by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), PortalError> {
        let email = self.email.trim();
        let well_formed = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);
        if !well_formed {
            return Err(PortalError::Validation(format!(
                "'{email}' is not a valid email address"
            )));
        }
        if self.password_hash.is_empty() {
            return Err(PortalError::Validation("password hash is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
    pub institution_name: String,
    pub start_year: i32,
    #[serde(default)]
    pub end_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub user_id: UserId,
    pub name: String,
    pub education: Vec<Education>,
    pub skills: Vec<String>,
    pub rating: f64,
    pub resume: Option<String>,
    pub profile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApplicantProfileInput {
    pub name: String,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub resume: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

impl ApplicantProfileInput {
    pub(crate) fn into_profile(self, user_id: UserId) -> Result<ApplicantProfile, PortalError> {
        require_text("name", &self.name)?;
        for entry in &self.education {
            if let Some(end) = entry.end_year {
                if end < entry.start_year {
                    return Err(PortalError::Validation(format!(
                        "education at {} ends before it starts",
                        entry.institution_name
                    )));
                }
            }
        }

        Ok(ApplicantProfile {
            user_id,
            name: self.name.trim().to_string(),
            education: self.education,
            skills: self.skills,
            rating: UNRATED,
            resume: self.resume,
            profile: self.profile,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecruiterProfile {
    pub user_id: UserId,
    pub name: String,
    pub contact_number: Option<String>,
    pub bio: Option<String>,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecruiterProfileInput {
    pub name: String,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

impl RecruiterProfileInput {
    pub(crate) fn into_profile(self, user_id: UserId) -> Result<RecruiterProfile, PortalError> {
        require_text("name", &self.name)?;
        let contact_number = match self.contact_number {
            Some(number) if !number.trim().is_empty() => {
                let number = number.trim().to_string();
                if !is_phone_number(&number) {
                    return Err(PortalError::Validation(format!(
                        "'{number}' is not a valid phone number"
                    )));
                }
                Some(number)
            }
            _ => None,
        };

        Ok(RecruiterProfile {
            user_id,
            name: self.name.trim().to_string(),
            contact_number,
            bio: self.bio,
            rating: UNRATED,
        })
    }
}

/// Profile fields a user may edit after registering. Absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub education: Option<Vec<Education>>,
    #[serde(default)]
    pub skills: Option<Vec<String>>,
    #[serde(default)]
    pub resume: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

impl ProfilePatch {
    pub(crate) fn apply_to_applicant(
        self,
        current: &ApplicantProfile,
    ) -> Result<ApplicantProfile, PortalError> {
        if self.contact_number.is_some() || self.bio.is_some() {
            return Err(PortalError::Validation(
                "applicant profiles have no contact number or bio".to_string(),
            ));
        }
        let input = ApplicantProfileInput {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            education: self.education.unwrap_or_else(|| current.education.clone()),
            skills: self.skills.unwrap_or_else(|| current.skills.clone()),
            resume: self.resume.or_else(|| current.resume.clone()),
            profile: self.profile.or_else(|| current.profile.clone()),
        };
        let mut updated = input.into_profile(current.user_id)?;
        updated.rating = current.rating;
        Ok(updated)
    }

    pub(crate) fn apply_to_recruiter(
        self,
        current: &RecruiterProfile,
    ) -> Result<RecruiterProfile, PortalError> {
        if self.education.is_some()
            || self.skills.is_some()
            || self.resume.is_some()
            || self.profile.is_some()
        {
            return Err(PortalError::Validation(
                "recruiter profiles only carry a name, contact number and bio".to_string(),
            ));
        }
        let input = RecruiterProfileInput {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            contact_number: self
                .contact_number
                .or_else(|| current.contact_number.clone()),
            bio: self.bio.or_else(|| current.bio.clone()),
        };
        let mut updated = input.into_profile(current.user_id)?;
        updated.rating = current.rating;
        Ok(updated)
    }
}

/// `+` followed by a 1-3 digit country code and a 10 digit number.
fn is_phone_number(value: &str) -> bool {
    match value.strip_prefix('+') {
        Some(digits) => {
            (11..=13).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub owner_id: UserId,
    pub title: String,
    pub max_applicants: u32,
    pub max_positions: u32,
    pub active_applications: u32,
    pub accepted_candidates: u32,
    pub date_of_posting: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub skillsets: Vec<String>,
    pub job_type: String,
    pub duration: u32,
    pub salary: u32,
    pub rating: f64,
}

/// Job posting as submitted by a recruiter, before range checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub max_applicants: i64,
    pub max_positions: i64,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub skillsets: Vec<String>,
    pub job_type: String,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub salary: i64,
}

/// Validated job ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDraft {
    pub owner_id: UserId,
    pub title: String,
    pub max_applicants: u32,
    pub max_positions: u32,
    pub date_of_posting: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub skillsets: Vec<String>,
    pub job_type: String,
    pub duration: u32,
    pub salary: u32,
}

impl NewJob {
    pub fn validate(self, owner_id: UserId, now: DateTime<Utc>) -> Result<JobDraft, PortalError> {
        require_text("title", &self.title)?;
        require_text("job type", &self.job_type)?;

        Ok(JobDraft {
            owner_id,
            title: self.title.trim().to_string(),
            max_applicants: bounded("max applicants", self.max_applicants, 1)?,
            max_positions: bounded("max positions", self.max_positions, 1)?,
            date_of_posting: now,
            deadline: self.deadline,
            skillsets: self
                .skillsets
                .into_iter()
                .map(|skill| skill.trim().to_string())
                .filter(|skill| !skill.is_empty())
                .collect(),
            job_type: self.job_type.trim().to_string(),
            duration: bounded("duration", self.duration, 0)?,
            salary: bounded("salary", self.salary, 0)?,
        })
    }
}

/// Fields a recruiter may change after posting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPatch {
    #[serde(default)]
    pub max_applicants: Option<i64>,
    #[serde(default)]
    pub max_positions: Option<i64>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

impl JobPatch {
    /// Apply the patch to `job`. Limits may not drop below the live `active`
    /// and `accepted` counts for the job.
    pub fn apply_to(&self, job: &mut Job, active: u32, accepted: u32) -> Result<(), PortalError> {
        if let Some(max_applicants) = self.max_applicants {
            let max_applicants = bounded("max applicants", max_applicants, 1)?;
            if max_applicants < active {
                return Err(PortalError::Validation(format!(
                    "max applicants cannot drop below the {active} active applications"
                )));
            }
            job.max_applicants = max_applicants;
        }
        if let Some(max_positions) = self.max_positions {
            let max_positions = bounded("max positions", max_positions, 1)?;
            if max_positions < accepted {
                return Err(PortalError::Validation(format!(
                    "max positions cannot drop below the {accepted} accepted candidates"
                )));
            }
            job.max_positions = max_positions;
        }
        if let Some(deadline) = self.deadline {
            job.deadline = Some(deadline);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub applicant_id: UserId,
    pub recruiter_id: UserId,
    pub job_id: JobId,
    pub status: ApplicationStatus,
    pub date_of_application: DateTime<Utc>,
    pub date_of_joining: Option<DateTime<Utc>>,
    pub sop: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDraft {
    pub applicant_id: UserId,
    pub recruiter_id: UserId,
    pub job_id: JobId,
    pub status: ApplicationStatus,
    pub date_of_application: DateTime<Utc>,
    pub sop: Option<String>,
}

pub fn validate_sop(sop: Option<String>) -> Result<Option<String>, PortalError> {
    match sop {
        Some(text) if text.trim().is_empty() => Ok(None),
        Some(text) if text.chars().count() > MAX_SOP_LENGTH => Err(PortalError::Validation(
            format!("statement of purpose exceeds {MAX_SOP_LENGTH} characters"),
        )),
        other => Ok(other),
    }
}

/// Requested status change plus the optional joining date used on acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: ApplicationStatus,
    #[serde(default)]
    pub date_of_joining: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    pub const fn to(status: ApplicationStatus) -> Self {
        Self {
            status,
            date_of_joining: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub category: RatingCategory,
    pub sender_id: UserId,
    pub receiver_id: i64,
    pub value: f64,
}

/// A user together with the profile matching their role.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UserProfile {
    Recruiter {
        user: User,
        profile: RecruiterProfile,
    },
    Applicant {
        user: User,
        profile: ApplicantProfile,
    },
}

fn require_text(field: &str, value: &str) -> Result<(), PortalError> {
    if value.trim().is_empty() {
        Err(PortalError::Validation(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

fn bounded(field: &str, value: i64, min: i64) -> Result<u32, PortalError> {
    if value < min {
        return Err(PortalError::Validation(format!(
            "{field} should be at least {min}, found {value}"
        )));
    }
    u32::try_from(value)
        .map_err(|_| PortalError::Validation(format!("{field} is too large: {value}")))
}
