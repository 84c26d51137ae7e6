use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_auth::Role;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use thiserror::Error;

/// One employee work shift. `date_close` is unset while the shift is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: i64,
    pub employee_id: i64,
    pub outlet_id: i64,
    pub org_id: i64,
    pub date_open: DateTime<Utc>,
    pub date_close: Option<DateTime<Utc>>,
    pub cash_open: f64,
    pub cash_close: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Open,
    Closed,
}

impl Session {
    pub fn state(&self) -> SessionState {
        match self.date_close {
            Some(_) => SessionState::Closed,
            None => SessionState::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Employee {
    pub id: i64,
    pub org_id: i64,
    pub outlet_id: i64,
    pub name: String,
    pub role: Role,
    pub online: bool,
}

impl<'r> FromRow<'r, PgRow> for Employee {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        let role = role.parse::<Role>().map_err(|err| sqlx::Error::ColumnDecode {
            index: "role".to_string(),
            source: Box::new(err),
        })?;
        Ok(Self {
            id: row.try_get("id")?,
            org_id: row.try_get("org_id")?,
            outlet_id: row.try_get("outlet_id")?,
            name: row.try_get("name")?,
            role,
            online: row.try_get("online")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewSession {
    pub employee_id: i64,
    pub outlet_id: i64,
    pub org_id: i64,
    pub cash_open: f64,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record is referenced by other records: {0}")]
    ForeignKey(String),
    #[error("transient storage failure, retry the request: {0}")]
    Retryable(String),
    #[error("storage failure: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Retryable(_))
    }
}

const PG_FOREIGN_KEY_VIOLATION: &str = "23503";
const PG_SERIALIZATION_FAILURE: &str = "40001";
const PG_DEADLOCK_DETECTED: &str = "40P01";
pub(crate) const PG_UNIQUE_VIOLATION: &str = "23505";

pub(crate) fn pg_error_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|code| code.into_owned()),
        _ => None,
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match pg_error_code(&err).as_deref() {
            Some(PG_FOREIGN_KEY_VIOLATION) => return StorageError::ForeignKey(err.to_string()),
            Some(PG_SERIALIZATION_FAILURE | PG_DEADLOCK_DETECTED) => {
                return StorageError::Retryable(err.to_string())
            }
            _ => {}
        }

        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageError::Retryable(err.to_string())
            }
            other => StorageError::Backend(other.to_string()),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("employee {employee_id} already has an open session")]
    AlreadyOpen { employee_id: i64 },
    #[error("no open session for employee {employee_id}")]
    SessionNotFound { employee_id: i64 },
    #[error("employee {employee_id} not found")]
    EmployeeNotFound { employee_id: i64 },
    #[error("session {session_id} opened at {date_open}, it cannot close before that")]
    CloseBeforeOpen {
        session_id: i64,
        date_open: DateTime<Utc>,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<sqlx::Error> for SessionError {
    fn from(err: sqlx::Error) -> Self {
        SessionError::Storage(err.into())
    }
}

/// Storage for the shift state machine.
///
/// Implementations must make `open` and `close` atomic: the session row and
/// the employee's `online` flag change together or not at all, and two
/// concurrent `open` calls for one employee can never both succeed.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Opens a shift. Fails with `AlreadyOpen` if the employee has one, and
    /// with `EmployeeNotFound` if the employee is not in `org_id`.
    async fn open(&self, new: NewSession) -> SessionResult<Session>;

    /// Closes the employee's open shift and marks them offline. A
    /// `date_close` earlier than the shift's `date_open` is refused with
    /// `CloseBeforeOpen` and changes nothing.
    async fn close(
        &self,
        employee_id: i64,
        date_close: DateTime<Utc>,
        cash_close: f64,
    ) -> SessionResult<Session>;

    async fn has_open_session(&self, employee_id: i64) -> SessionResult<bool>;

    async fn current_for_employee(&self, employee_id: i64) -> SessionResult<Option<Session>>;

    /// Latest shift of an outlet (by id) that has been closed; `None` is not
    /// an error.
    async fn last_closed_for_outlet(&self, outlet_id: i64) -> SessionResult<Option<Session>>;

    /// Every shift of the organization, open and closed, newest first.
    async fn list_for_organization(&self, org_id: i64) -> SessionResult<Vec<Session>>;

    async fn find_employee(&self, employee_id: i64) -> SessionResult<Option<Employee>>;

    async fn outlet_in_organization(&self, outlet_id: i64, org_id: i64) -> SessionResult<bool>;
}
