use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    Actor, ApplicantProfileInput, ApplicationId, ApplicationStatus, JobId, JobPatch, NewJob,
    NewUser, ProfilePatch, RatingCategory, RecruiterProfileInput, Role, StatusUpdate, UserId,
};
use super::error::{PortalError, StoreError};
use super::service::JobPortalService;
use super::store::{ApplicantQuery, JobQuery, JobSort, JobSortKey, PortalStore, StatusSet};

/// Header carrying the authenticated user id, set by the upstream auth layer.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";
/// Header carrying the authenticated user's role.
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Router builder exposing the portal under `/api/v1`.
pub fn portal_router<S>(service: Arc<JobPortalService<S>>) -> Router
where
    S: PortalStore + 'static,
{
    Router::new()
        .route("/api/v1/users", post(register_handler::<S>))
        .route(
            "/api/v1/users/me",
            get(own_profile_handler::<S>).put(update_profile_handler::<S>),
        )
        .route("/api/v1/users/:user_id", get(profile_handler::<S>))
        .route(
            "/api/v1/jobs",
            post(create_job_handler::<S>).get(list_jobs_handler::<S>),
        )
        .route(
            "/api/v1/jobs/:job_id",
            get(get_job_handler::<S>)
                .put(update_job_handler::<S>)
                .delete(delete_job_handler::<S>),
        )
        .route(
            "/api/v1/jobs/:job_id/applications",
            post(apply_handler::<S>).get(job_applications_handler::<S>),
        )
        .route("/api/v1/applications", get(my_applications_handler::<S>))
        .route(
            "/api/v1/applications/:application_id",
            put(update_status_handler::<S>),
        )
        .route("/api/v1/applicants", get(applicants_handler::<S>))
        .route(
            "/api/v1/rating",
            put(rate_handler::<S>).get(get_rating_handler::<S>),
        )
        .with_state(service)
}

/// Rejection returned when the actor headers are missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorRejection(String);

impl IntoResponse for ActorRejection {
    fn into_response(self) -> Response {
        let payload = json!({
            "error": self.0,
            "kind": "unauthenticated",
        });
        (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
    }
}

#[axum::async_trait]
impl<St> FromRequestParts<St> for Actor
where
    St: Send + Sync,
{
    type Rejection = ActorRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers)
    }
}

pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ActorRejection> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ActorRejection(format!("missing {name} header")))
    };

    let id = header(ACTOR_ID_HEADER)?
        .parse::<i64>()
        .map_err(|_| ActorRejection(format!("{ACTOR_ID_HEADER} must be an integer")))?;
    let role = header(ACTOR_ROLE_HEADER)?
        .parse::<Role>()
        .map_err(|err| ActorRejection(err.to_string()))?;

    Ok(Actor {
        id: UserId(id),
        role,
    })
}

/// Map a portal refusal to its HTTP status and JSON body.
pub fn error_response(error: PortalError) -> Response {
    let status = match &error {
        PortalError::Forbidden(_) => StatusCode::FORBIDDEN,
        PortalError::NotFound { .. } => StatusCode::NOT_FOUND,
        PortalError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PortalError::Conflict(_) => StatusCode::CONFLICT,
        PortalError::AlreadyApplied
        | PortalError::JobFull(_)
        | PortalError::TooManyActiveApplications { .. }
        | PortalError::AlreadyEmployed
        | PortalError::PositionsFull { .. }
        | PortalError::TerminalStateLocked(_)
        | PortalError::InvalidTransition { .. }
        | PortalError::NotEligibleToRate => StatusCode::BAD_REQUEST,
        PortalError::Store(StoreError::Contention { .. }) => StatusCode::SERVICE_UNAVAILABLE,
        PortalError::Store(StoreError::Backend { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": error.to_string(),
        "kind": error.kind(),
    });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, PortalError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

/// Registration payload; `type` selects the account role.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Registration {
    Applicant {
        account: NewUser,
        profile: ApplicantProfileInput,
    },
    Recruiter {
        account: NewUser,
        profile: RecruiterProfileInput,
    },
}

pub(crate) async fn register_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    Json(registration): Json<Registration>,
) -> Response
where
    S: PortalStore + 'static,
{
    let result = match registration {
        Registration::Applicant { account, profile } => {
            service.register_applicant(account, profile)
        }
        Registration::Recruiter { account, profile } => {
            service.register_recruiter(account, profile)
        }
    };
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn profile_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    _actor: Actor,
    Path(user_id): Path<i64>,
) -> Response
where
    S: PortalStore + 'static,
{
    respond(StatusCode::OK, service.user_profile(UserId(user_id)))
}

pub(crate) async fn own_profile_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    actor: Actor,
) -> Response
where
    S: PortalStore + 'static,
{
    respond(StatusCode::OK, service.user_profile(actor.id))
}

pub(crate) async fn update_profile_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    actor: Actor,
    Json(patch): Json<ProfilePatch>,
) -> Response
where
    S: PortalStore + 'static,
{
    respond(StatusCode::OK, service.update_profile(actor, patch))
}

pub(crate) async fn create_job_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    actor: Actor,
    Json(job): Json<NewJob>,
) -> Response
where
    S: PortalStore + 'static,
{
    respond(StatusCode::CREATED, service.create_job(actor, job))
}

/// Query string accepted by `GET /api/v1/jobs`. List values are comma separated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListParams {
    #[serde(default)]
    pub myjobs: bool,
    pub q: Option<String>,
    #[serde(rename = "jobType")]
    pub job_type: Option<String>,
    #[serde(rename = "salaryMin")]
    pub salary_min: Option<u32>,
    #[serde(rename = "salaryMax")]
    pub salary_max: Option<u32>,
    pub duration: Option<u32>,
    pub asc: Option<String>,
    pub desc: Option<String>,
}

impl JobListParams {
    fn into_query(self) -> Result<JobQuery, PortalError> {
        let mut sort = Vec::new();
        for (raw, descending) in [(self.asc, false), (self.desc, true)] {
            for key in split_list(raw.as_deref()) {
                let key = JobSortKey::parse(&key).ok_or_else(|| {
                    PortalError::Validation(format!("cannot sort jobs by '{key}'"))
                })?;
                sort.push(JobSort { key, descending });
            }
        }

        Ok(JobQuery {
            owner_id: None,
            title_contains: self.q.filter(|q| !q.trim().is_empty()),
            job_types: split_list(self.job_type.as_deref()),
            salary_min: self.salary_min,
            salary_max: self.salary_max,
            duration_below: self.duration,
            sort,
        })
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_statuses(raw: Option<&str>) -> Result<Vec<ApplicationStatus>, PortalError> {
    split_list(raw)
        .iter()
        .map(|status| status.parse::<ApplicationStatus>())
        .collect()
}

pub(crate) async fn list_jobs_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    actor: Actor,
    Query(params): Query<JobListParams>,
) -> Response
where
    S: PortalStore + 'static,
{
    let own_only = params.myjobs;
    let result = params
        .into_query()
        .and_then(|query| service.list_jobs(actor, own_only, query));
    respond(StatusCode::OK, result)
}

pub(crate) async fn get_job_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    _actor: Actor,
    Path(job_id): Path<i64>,
) -> Response
where
    S: PortalStore + 'static,
{
    respond(StatusCode::OK, service.get_job(JobId(job_id)))
}

pub(crate) async fn update_job_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    actor: Actor,
    Path(job_id): Path<i64>,
    Json(patch): Json<JobPatch>,
) -> Response
where
    S: PortalStore + 'static,
{
    respond(StatusCode::OK, service.update_job(actor, JobId(job_id), patch))
}

pub(crate) async fn delete_job_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    actor: Actor,
    Path(job_id): Path<i64>,
) -> Response
where
    S: PortalStore + 'static,
{
    respond(StatusCode::OK, service.delete_job(actor, JobId(job_id)))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub sop: Option<String>,
}

pub(crate) async fn apply_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    actor: Actor,
    Path(job_id): Path<i64>,
    Json(request): Json<ApplyRequest>,
) -> Response
where
    S: PortalStore + 'static,
{
    respond(
        StatusCode::CREATED,
        service.apply(actor, JobId(job_id), request.sop),
    )
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusParams {
    pub status: Option<String>,
}

pub(crate) async fn job_applications_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    actor: Actor,
    Path(job_id): Path<i64>,
    Query(params): Query<StatusParams>,
) -> Response
where
    S: PortalStore + 'static,
{
    let result = parse_statuses(params.status.as_deref()).and_then(|statuses| {
        let statuses = if statuses.is_empty() {
            StatusSet::Any
        } else {
            StatusSet::Only(statuses)
        };
        service.list_applications_for_job(actor, JobId(job_id), statuses)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn my_applications_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    actor: Actor,
) -> Response
where
    S: PortalStore + 'static,
{
    respond(StatusCode::OK, service.list_applications(actor))
}

pub(crate) async fn update_status_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    actor: Actor,
    Path(application_id): Path<i64>,
    Json(update): Json<StatusUpdate>,
) -> Response
where
    S: PortalStore + 'static,
{
    respond(
        StatusCode::OK,
        service.update_application_status(actor, ApplicationId(application_id), update),
    )
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicantParams {
    #[serde(rename = "jobId")]
    pub job_id: Option<i64>,
    pub status: Option<String>,
}

pub(crate) async fn applicants_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    actor: Actor,
    Query(params): Query<ApplicantParams>,
) -> Response
where
    S: PortalStore + 'static,
{
    let result = parse_statuses(params.status.as_deref()).and_then(|statuses| {
        let query = ApplicantQuery {
            job_id: params.job_id.map(JobId),
            statuses,
        };
        service.list_applicants(actor, query)
    });
    respond(StatusCode::OK, result)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateRequest {
    #[serde(rename = "receiverId")]
    pub receiver_id: i64,
    pub rating: f64,
}

pub(crate) async fn rate_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    actor: Actor,
    Json(request): Json<RateRequest>,
) -> Response
where
    S: PortalStore + 'static,
{
    respond(
        StatusCode::OK,
        service.rate(actor, request.receiver_id, request.rating),
    )
}

#[derive(Debug, Clone, Deserialize)]
pub struct RatingParams {
    #[serde(rename = "receiverId")]
    pub receiver_id: i64,
    pub category: Option<RatingCategory>,
}

pub(crate) async fn get_rating_handler<S>(
    State(service): State<Arc<JobPortalService<S>>>,
    actor: Actor,
    Query(params): Query<RatingParams>,
) -> Response
where
    S: PortalStore + 'static,
{
    let category = params
        .category
        .unwrap_or_else(|| RatingCategory::rated_by(actor.role));
    match service.get_rating(actor, params.receiver_id, category) {
        Ok(rating) => {
            let payload = json!({ "rating": rating });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}
