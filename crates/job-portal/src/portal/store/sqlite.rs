//! SQLite implementation of `PortalStore`.
//!
//! Every portal transaction runs as `BEGIN IMMEDIATE`, so the writer lock is
//! taken before the first capacity count is read. Two accepts on the same job,
//! two applies against the same job limit, or two ratings for the same receiver
//! are therefore serialized by the database itself. A writer that cannot get
//! the lock within `busy_timeout` surfaces as `StoreError::Contention`.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Value, ValueRef};
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row, ToSql, Transaction,
    TransactionBehavior,
};
use tracing::warn;

use super::query::{ApplicationFilter, JobQuery, StatusSet};
use super::{PortalStore, StoreTransaction};
use crate::portal::domain::{
    ApplicantProfile, Application, ApplicationDraft, ApplicationId, ApplicationStatus, Job,
    JobDraft, JobId, NewUser, Rating, RatingCategory, RecruiterProfile, Role, User, UserId,
    UNRATED,
};
use crate::portal::error::{PortalError, StoreError};

/// Current schema version. Bump together with a step in `run_migrations`.
const CURRENT_SCHEMA_VERSION: i64 = 1;

const BUSY_TIMEOUT_MS: u32 = 5_000;

const JOB_COLUMNS: &str = "id, owner_id, title, max_applicants, max_positions, \
    active_applications, accepted_candidates, date_of_posting, deadline, skillsets, job_type, \
    duration, salary, rating";

const APPLICATION_COLUMNS: &str = "id, applicant_id, recruiter_id, job_id, status, \
    date_of_application, date_of_joining, sop";

/// SQLite-backed store.
///
/// The connection sits behind a mutex so one process never interleaves two
/// transactions on it; other processes are fenced by SQLite's own locking.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bring its schema up to date.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy();
        let in_memory = path_str == ":memory:";

        if !in_memory {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|err| {
                        StoreError::backend(
                            "create database directory",
                            format!("{}: {err}", parent.display()),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref).map_err(sqlite_error("open database"))?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(sqlite_error("set journal_mode"))?;
        if !journal_mode.eq_ignore_ascii_case("wal") && !in_memory {
            warn!(%journal_mode, "SQLite refused WAL mode, continuing with rollback journal");
        }

        conn.execute_batch(&format!(
            "PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}; PRAGMA foreign_keys = ON;"
        ))
        .map_err(sqlite_error("configure pragmas"))?;

        Self::run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(sqlite_error("create schema_version table"))?;

        let current: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(sqlite_error("read schema version"))?
            .unwrap_or(0);

        if current > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::backend(
                "check schema version",
                format!(
                    "database schema version {current} is newer than supported version {CURRENT_SCHEMA_VERSION}"
                ),
            ));
        }

        if current < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL CHECK (role IN ('recruiter', 'applicant'))
                );

                CREATE TABLE IF NOT EXISTS job_applicants (
                    user_id INTEGER PRIMARY KEY REFERENCES users(id),
                    name TEXT NOT NULL,
                    education TEXT NOT NULL,
                    skills TEXT NOT NULL,
                    rating REAL NOT NULL DEFAULT -1.0 CHECK (rating BETWEEN -1.0 AND 5.0),
                    resume TEXT,
                    profile TEXT
                );

                CREATE TABLE IF NOT EXISTS recruiters (
                    user_id INTEGER PRIMARY KEY REFERENCES users(id),
                    name TEXT NOT NULL,
                    contact_number TEXT,
                    bio TEXT,
                    rating REAL NOT NULL DEFAULT -1.0 CHECK (rating BETWEEN -1.0 AND 5.0)
                );

                CREATE TABLE IF NOT EXISTS jobs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    owner_id INTEGER NOT NULL REFERENCES users(id),
                    title TEXT NOT NULL,
                    max_applicants INTEGER NOT NULL CHECK (max_applicants >= 1),
                    max_positions INTEGER NOT NULL CHECK (max_positions >= 1),
                    active_applications INTEGER NOT NULL DEFAULT 0,
                    accepted_candidates INTEGER NOT NULL DEFAULT 0,
                    date_of_posting TEXT NOT NULL,
                    deadline TEXT,
                    skillsets TEXT NOT NULL DEFAULT '',
                    job_type TEXT NOT NULL,
                    duration INTEGER NOT NULL CHECK (duration >= 0),
                    salary INTEGER NOT NULL CHECK (salary >= 0),
                    rating REAL NOT NULL DEFAULT -1.0 CHECK (rating BETWEEN -1.0 AND 5.0)
                );

                -- job_id carries no foreign key: applications outlive deleted jobs.
                CREATE TABLE IF NOT EXISTS applications (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    applicant_id INTEGER NOT NULL REFERENCES users(id),
                    recruiter_id INTEGER NOT NULL REFERENCES users(id),
                    job_id INTEGER NOT NULL,
                    status TEXT NOT NULL CHECK (status IN (
                        'applied', 'shortlisted', 'accepted', 'rejected',
                        'deleted', 'cancelled', 'finished'
                    )),
                    date_of_application TEXT NOT NULL,
                    date_of_joining TEXT,
                    sop TEXT
                );

                CREATE TABLE IF NOT EXISTS ratings (
                    category TEXT NOT NULL CHECK (category IN ('job', 'applicant')),
                    sender_id INTEGER NOT NULL REFERENCES users(id),
                    receiver_id INTEGER NOT NULL,
                    value REAL NOT NULL CHECK (value BETWEEN -1.0 AND 5.0),
                    PRIMARY KEY (category, sender_id, receiver_id)
                );

                CREATE INDEX IF NOT EXISTS idx_applications_job_status
                    ON applications(job_id, status);
                CREATE INDEX IF NOT EXISTS idx_applications_applicant_status
                    ON applications(applicant_id, status);
                CREATE INDEX IF NOT EXISTS idx_applications_recruiter
                    ON applications(recruiter_id);
                CREATE INDEX IF NOT EXISTS idx_jobs_owner ON jobs(owner_id);
                CREATE INDEX IF NOT EXISTS idx_ratings_receiver
                    ON ratings(category, receiver_id);
                "#,
            )
            .map_err(sqlite_error("apply schema v1"))?;
        }

        conn.execute(
            "INSERT INTO schema_version (id, version) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET version = excluded.version",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(sqlite_error("record schema version"))?;

        Ok(())
    }
}

impl PortalStore for SqliteStore {
    fn transaction<T>(
        &self,
        work: &mut dyn FnMut(&mut dyn StoreTransaction) -> Result<T, PortalError>,
    ) -> Result<T, PortalError> {
        // A transaction left open by a panicking closure was rolled back when it dropped.
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sqlite_error("begin transaction"))?;

        // Dropping `scoped` on the error path rolls the transaction back.
        let mut scoped = SqliteTransaction { tx };
        let value = work(&mut scoped)?;
        scoped.tx.commit().map_err(sqlite_error("commit"))?;
        Ok(value)
    }
}

struct SqliteTransaction<'conn> {
    tx: Transaction<'conn>,
}

impl SqliteTransaction<'_> {
    fn find_applications_where(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, StoreError> {
        let (clause, values) = application_clause(filter);
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE {clause}
             ORDER BY date_of_application DESC, id DESC"
        );
        let mut stmt = self
            .tx
            .prepare(&sql)
            .map_err(sqlite_error("prepare application query"))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), row_to_application)
            .map_err(sqlite_error("query applications"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(sqlite_error("read applications"))
    }
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn insert_user(&mut self, user: &NewUser, role: Role) -> Result<User, StoreError> {
        let email = user.email.trim().to_lowercase();
        self.tx
            .execute(
                "INSERT INTO users (email, password_hash, role) VALUES (?1, ?2, ?3)",
                params![email, user.password_hash, role],
            )
            .map_err(sqlite_error("insert user"))?;

        Ok(User {
            id: UserId(self.tx.last_insert_rowid()),
            email,
            password_hash: user.password_hash.clone(),
            role,
        })
    }

    fn find_user(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        self.tx
            .query_row(
                "SELECT id, email, password_hash, role FROM users WHERE id = ?1",
                params![id.0],
                row_to_user,
            )
            .optional()
            .map_err(sqlite_error("find user"))
    }

    fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        self.tx
            .query_row(
                "SELECT id, email, password_hash, role FROM users WHERE email = ?1",
                params![email.trim().to_lowercase()],
                row_to_user,
            )
            .optional()
            .map_err(sqlite_error("find user by email"))
    }

    fn insert_applicant_profile(&mut self, profile: &ApplicantProfile) -> Result<(), StoreError> {
        let education = serde_json::to_string(&profile.education)
            .map_err(|err| StoreError::backend("encode education", err))?;
        let skills = serde_json::to_string(&profile.skills)
            .map_err(|err| StoreError::backend("encode skills", err))?;

        self.tx
            .execute(
                "INSERT INTO job_applicants (user_id, name, education, skills, rating, resume, profile)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    profile.user_id.0,
                    profile.name,
                    education,
                    skills,
                    profile.rating,
                    profile.resume,
                    profile.profile,
                ],
            )
            .map_err(sqlite_error("insert applicant profile"))?;
        Ok(())
    }

    fn find_applicant_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<ApplicantProfile>, StoreError> {
        let raw = self
            .tx
            .query_row(
                "SELECT user_id, name, education, skills, rating, resume, profile
                 FROM job_applicants WHERE user_id = ?1",
                params![user_id.0],
                |row| {
                    Ok((
                        UserId(row.get(0)?),
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )
            .optional()
            .map_err(sqlite_error("find applicant profile"))?;

        let Some((user_id, name, education, skills, rating, resume, profile)) = raw else {
            return Ok(None);
        };

        Ok(Some(ApplicantProfile {
            user_id,
            name,
            education: serde_json::from_str(&education)
                .map_err(|err| StoreError::backend("decode education", err))?,
            skills: serde_json::from_str(&skills)
                .map_err(|err| StoreError::backend("decode skills", err))?,
            rating,
            resume,
            profile,
        }))
    }

    fn update_applicant_profile(&mut self, profile: &ApplicantProfile) -> Result<(), StoreError> {
        let education = serde_json::to_string(&profile.education)
            .map_err(|err| StoreError::backend("encode education", err))?;
        let skills = serde_json::to_string(&profile.skills)
            .map_err(|err| StoreError::backend("encode skills", err))?;

        let updated = self
            .tx
            .execute(
                "UPDATE job_applicants
                 SET name = ?1, education = ?2, skills = ?3, resume = ?4, profile = ?5
                 WHERE user_id = ?6",
                params![
                    profile.name,
                    education,
                    skills,
                    profile.resume,
                    profile.profile,
                    profile.user_id.0,
                ],
            )
            .map_err(sqlite_error("update applicant profile"))?;
        if updated == 0 {
            return Err(StoreError::backend(
                "update applicant profile",
                format!("no applicant profile for user {}", profile.user_id),
            ));
        }
        Ok(())
    }

    fn set_applicant_rating(&mut self, user_id: UserId, rating: f64) -> Result<(), StoreError> {
        let updated = self
            .tx
            .execute(
                "UPDATE job_applicants SET rating = ?1 WHERE user_id = ?2",
                params![rating, user_id.0],
            )
            .map_err(sqlite_error("update applicant rating"))?;
        if updated == 0 {
            return Err(StoreError::backend(
                "update applicant rating",
                format!("no applicant profile for user {user_id}"),
            ));
        }
        Ok(())
    }

    fn insert_recruiter_profile(&mut self, profile: &RecruiterProfile) -> Result<(), StoreError> {
        self.tx
            .execute(
                "INSERT INTO recruiters (user_id, name, contact_number, bio, rating)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    profile.user_id.0,
                    profile.name,
                    profile.contact_number,
                    profile.bio,
                    profile.rating,
                ],
            )
            .map_err(sqlite_error("insert recruiter profile"))?;
        Ok(())
    }

    fn update_recruiter_profile(&mut self, profile: &RecruiterProfile) -> Result<(), StoreError> {
        let updated = self
            .tx
            .execute(
                "UPDATE recruiters SET name = ?1, contact_number = ?2, bio = ?3 WHERE user_id = ?4",
                params![
                    profile.name,
                    profile.contact_number,
                    profile.bio,
                    profile.user_id.0,
                ],
            )
            .map_err(sqlite_error("update recruiter profile"))?;
        if updated == 0 {
            return Err(StoreError::backend(
                "update recruiter profile",
                format!("no recruiter profile for user {}", profile.user_id),
            ));
        }
        Ok(())
    }

    fn find_recruiter_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<RecruiterProfile>, StoreError> {
        self.tx
            .query_row(
                "SELECT user_id, name, contact_number, bio, rating
                 FROM recruiters WHERE user_id = ?1",
                params![user_id.0],
                |row| {
                    Ok(RecruiterProfile {
                        user_id: UserId(row.get(0)?),
                        name: row.get(1)?,
                        contact_number: row.get(2)?,
                        bio: row.get(3)?,
                        rating: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(sqlite_error("find recruiter profile"))
    }

    fn insert_job(&mut self, draft: &JobDraft) -> Result<Job, StoreError> {
        self.tx
            .execute(
                "INSERT INTO jobs (owner_id, title, max_applicants, max_positions,
                    active_applications, accepted_candidates, date_of_posting, deadline,
                    skillsets, job_type, duration, salary, rating)
                 VALUES (?1, ?2, ?3, ?4, 0, 0, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    draft.owner_id.0,
                    draft.title,
                    draft.max_applicants,
                    draft.max_positions,
                    draft.date_of_posting,
                    draft.deadline,
                    join_skillsets(&draft.skillsets),
                    draft.job_type,
                    draft.duration,
                    draft.salary,
                    UNRATED,
                ],
            )
            .map_err(sqlite_error("insert job"))?;

        Ok(Job {
            id: JobId(self.tx.last_insert_rowid()),
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
        })
    }

    fn find_job(&mut self, id: JobId) -> Result<Option<Job>, StoreError> {
        self.tx
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id.0],
                row_to_job,
            )
            .optional()
            .map_err(sqlite_error("find job"))
    }

    fn update_job(&mut self, job: &Job) -> Result<(), StoreError> {
        let updated = self
            .tx
            .execute(
                "UPDATE jobs SET title = ?1, max_applicants = ?2, max_positions = ?3,
                    active_applications = ?4, accepted_candidates = ?5, deadline = ?6,
                    skillsets = ?7, job_type = ?8, duration = ?9, salary = ?10, rating = ?11
                 WHERE id = ?12",
                params![
                    job.title,
                    job.max_applicants,
                    job.max_positions,
                    job.active_applications,
                    job.accepted_candidates,
                    job.deadline,
                    join_skillsets(&job.skillsets),
                    job.job_type,
                    job.duration,
                    job.salary,
                    job.rating,
                    job.id.0,
                ],
            )
            .map_err(sqlite_error("update job"))?;
        if updated == 0 {
            return Err(StoreError::backend(
                "update job",
                format!("job {} does not exist", job.id),
            ));
        }
        Ok(())
    }

    fn delete_job(&mut self, id: JobId) -> Result<bool, StoreError> {
        let deleted = self
            .tx
            .execute("DELETE FROM jobs WHERE id = ?1", params![id.0])
            .map_err(sqlite_error("delete job"))?;
        Ok(deleted > 0)
    }

    fn find_jobs(&mut self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(owner) = query.owner_id {
            clauses.push("owner_id = ?".to_string());
            values.push(Value::Integer(owner.0));
        }
        if let Some(needle) = &query.title_contains {
            // Plain substring match; `%` and `_` in the needle are literal.
            clauses.push("instr(lower(title), lower(?)) > 0".to_string());
            values.push(Value::Text(needle.clone()));
        }
        if !query.job_types.is_empty() {
            clauses.push(format!(
                "job_type IN ({})",
                placeholders(query.job_types.len())
            ));
            values.extend(query.job_types.iter().cloned().map(Value::Text));
        }
        if let Some(min) = query.salary_min {
            clauses.push("salary >= ?".to_string());
            values.push(Value::Integer(i64::from(min)));
        }
        if let Some(max) = query.salary_max {
            clauses.push("salary <= ?".to_string());
            values.push(Value::Integer(i64::from(max)));
        }
        if let Some(bound) = query.duration_below {
            clauses.push("duration < ?".to_string());
            values.push(Value::Integer(i64::from(bound)));
        }

        let clause = if clauses.is_empty() {
            "1 = 1".to_string()
        } else {
            clauses.join(" AND ")
        };
        let mut order: Vec<String> = query
            .sort
            .iter()
            .map(|sort| {
                format!(
                    "{} {}",
                    sort.key.column(),
                    if sort.descending { "DESC" } else { "ASC" }
                )
            })
            .collect();
        order.push("id ASC".to_string());

        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE {clause} ORDER BY {}",
            order.join(", ")
        );
        let mut stmt = self
            .tx
            .prepare(&sql)
            .map_err(sqlite_error("prepare job query"))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), row_to_job)
            .map_err(sqlite_error("query jobs"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(sqlite_error("read jobs"))
    }

    fn insert_application(
        &mut self,
        draft: &ApplicationDraft,
    ) -> Result<Application, StoreError> {
        self.tx
            .execute(
                "INSERT INTO applications (applicant_id, recruiter_id, job_id, status,
                    date_of_application, date_of_joining, sop)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)",
                params![
                    draft.applicant_id.0,
                    draft.recruiter_id.0,
                    draft.job_id.0,
                    draft.status,
                    draft.date_of_application,
                    draft.sop,
                ],
            )
            .map_err(sqlite_error("insert application"))?;

        Ok(Application {
            id: ApplicationId(self.tx.last_insert_rowid()),
            applicant_id: draft.applicant_id,
            recruiter_id: draft.recruiter_id,
            job_id: draft.job_id,
            status: draft.status,
            date_of_application: draft.date_of_application,
            date_of_joining: None,
            sop: draft.sop.clone(),
        })
    }

    fn find_application(
        &mut self,
        id: ApplicationId,
    ) -> Result<Option<Application>, StoreError> {
        self.tx
            .query_row(
                &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"),
                params![id.0],
                row_to_application,
            )
            .optional()
            .map_err(sqlite_error("find application"))
    }

    fn update_application(&mut self, application: &Application) -> Result<(), StoreError> {
        let updated = self
            .tx
            .execute(
                "UPDATE applications SET status = ?1, date_of_joining = ?2, sop = ?3
                 WHERE id = ?4",
                params![
                    application.status,
                    application.date_of_joining,
                    application.sop,
                    application.id.0,
                ],
            )
            .map_err(sqlite_error("update application"))?;
        if updated == 0 {
            return Err(StoreError::backend(
                "update application",
                format!("application {} does not exist", application.id),
            ));
        }
        Ok(())
    }

    fn count_applications(&mut self, filter: &ApplicationFilter) -> Result<u32, StoreError> {
        let (clause, values) = application_clause(filter);
        let count: u32 = self
            .tx
            .query_row(
                &format!("SELECT COUNT(*) FROM applications WHERE {clause}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )
            .map_err(sqlite_error("count applications"))?;
        Ok(count)
    }

    fn find_applications(
        &mut self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, StoreError> {
        self.find_applications_where(filter)
    }

    fn set_application_status(
        &mut self,
        filter: &ApplicationFilter,
        status: ApplicationStatus,
    ) -> Result<Vec<Application>, StoreError> {
        let mut matching = self.find_applications_where(filter)?;
        for application in &mut matching {
            self.tx
                .execute(
                    "UPDATE applications SET status = ?1 WHERE id = ?2",
                    params![status, application.id.0],
                )
                .map_err(sqlite_error("set application status"))?;
            application.status = status;
        }
        Ok(matching)
    }

    fn find_rating(
        &mut self,
        category: RatingCategory,
        sender_id: UserId,
        receiver_id: i64,
    ) -> Result<Option<Rating>, StoreError> {
        self.tx
            .query_row(
                "SELECT category, sender_id, receiver_id, value FROM ratings
                 WHERE category = ?1 AND sender_id = ?2 AND receiver_id = ?3",
                params![category, sender_id.0, receiver_id],
                |row| {
                    Ok(Rating {
                        category: row.get(0)?,
                        sender_id: UserId(row.get(1)?),
                        receiver_id: row.get(2)?,
                        value: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(sqlite_error("find rating"))
    }

    fn upsert_rating(&mut self, rating: &Rating) -> Result<(), StoreError> {
        self.tx
            .execute(
                "INSERT INTO ratings (category, sender_id, receiver_id, value)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(category, sender_id, receiver_id)
                 DO UPDATE SET value = excluded.value",
                params![
                    rating.category,
                    rating.sender_id.0,
                    rating.receiver_id,
                    rating.value,
                ],
            )
            .map_err(sqlite_error("upsert rating"))?;
        Ok(())
    }

    fn average_rating(
        &mut self,
        category: RatingCategory,
        receiver_id: i64,
    ) -> Result<Option<f64>, StoreError> {
        self.tx
            .query_row(
                "SELECT AVG(value) FROM ratings WHERE category = ?1 AND receiver_id = ?2",
                params![category, receiver_id],
                |row| row.get(0),
            )
            .map_err(sqlite_error("average rating"))
    }

    fn count_ratings(
        &mut self,
        category: RatingCategory,
        receiver_id: i64,
    ) -> Result<u32, StoreError> {
        self.tx
            .query_row(
                "SELECT COUNT(*) FROM ratings WHERE category = ?1 AND receiver_id = ?2",
                params![category, receiver_id],
                |row| row.get(0),
            )
            .map_err(sqlite_error("count ratings"))
    }
}

fn sqlite_error(context: &'static str) -> impl Fn(rusqlite::Error) -> StoreError {
    move |err| match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            StoreError::contention(context, err)
        }
        _ => StoreError::backend(context, err),
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn application_clause(filter: &ApplicationFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(id) = filter.applicant_id {
        clauses.push("applicant_id = ?".to_string());
        values.push(Value::Integer(id.0));
    }
    if let Some(id) = filter.recruiter_id {
        clauses.push("recruiter_id = ?".to_string());
        values.push(Value::Integer(id.0));
    }
    if let Some(id) = filter.job_id {
        clauses.push("job_id = ?".to_string());
        values.push(Value::Integer(id.0));
    }
    if let Some(id) = filter.excluding_id {
        clauses.push("id <> ?".to_string());
        values.push(Value::Integer(id.0));
    }

    let status_labels = |statuses: &[ApplicationStatus]| {
        statuses
            .iter()
            .map(|status| Value::Text(status.label().to_string()))
            .collect::<Vec<_>>()
    };
    match &filter.statuses {
        StatusSet::Any => {}
        StatusSet::Only(statuses) if statuses.is_empty() => clauses.push("0 = 1".to_string()),
        StatusSet::Only(statuses) => {
            clauses.push(format!("status IN ({})", placeholders(statuses.len())));
            values.extend(status_labels(statuses));
        }
        StatusSet::Excluding(statuses) if statuses.is_empty() => {}
        StatusSet::Excluding(statuses) => {
            clauses.push(format!("status NOT IN ({})", placeholders(statuses.len())));
            values.extend(status_labels(statuses));
        }
    }

    if clauses.is_empty() {
        ("1 = 1".to_string(), values)
    } else {
        (clauses.join(" AND "), values)
    }
}

fn join_skillsets(skillsets: &[String]) -> String {
    skillsets.join(";")
}

fn split_skillsets(raw: &str) -> Vec<String> {
    raw.split(';')
        .filter(|skill| !skill.is_empty())
        .map(str::to_string)
        .collect()
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role: row.get(3)?,
    })
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: JobId(row.get(0)?),
        owner_id: UserId(row.get(1)?),
        title: row.get(2)?,
        max_applicants: row.get(3)?,
        max_positions: row.get(4)?,
        active_applications: row.get(5)?,
        accepted_candidates: row.get(6)?,
        date_of_posting: row.get(7)?,
        deadline: row.get(8)?,
        skillsets: split_skillsets(&row.get::<_, String>(9)?),
        job_type: row.get(10)?,
        duration: row.get(11)?,
        salary: row.get(12)?,
        rating: row.get(13)?,
    })
}

fn row_to_application(row: &Row<'_>) -> rusqlite::Result<Application> {
    Ok(Application {
        id: ApplicationId(row.get(0)?),
        applicant_id: UserId(row.get(1)?),
        recruiter_id: UserId(row.get(2)?),
        job_id: JobId(row.get(3)?),
        status: row.get(4)?,
        date_of_application: row.get(5)?,
        date_of_joining: row.get(6)?,
        sop: row.get(7)?,
    })
}

fn parse_label<T>(value: ValueRef<'_>) -> FromSqlResult<T>
where
    T: std::str::FromStr<Err = PortalError>,
{
    value
        .as_str()?
        .parse()
        .map_err(|err: PortalError| FromSqlError::Other(Box::new(err)))
}

impl ToSql for ApplicationStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.label()))
    }
}

impl FromSql for ApplicationStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_label(value)
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.label()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_label(value)
    }
}

impl ToSql for RatingCategory {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.label()))
    }
}

impl FromSql for RatingCategory {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_label(value)
    }
}
