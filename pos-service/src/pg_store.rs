use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, info};

use crate::sessions::{
    pg_error_code, Employee, NewSession, Session, SessionError, SessionResult, SessionStore,
    StorageError, PG_UNIQUE_VIOLATION,
};

const SESSION_COLUMNS: &str =
    "id, employee_id, outlet_id, org_id, date_open, date_close, cash_open, cash_close";

const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_sessions.sql",
    include_str!("../migrations/0001_sessions.sql"),
)];

/// Postgres-backed session store.
///
/// `open` and `close` run in one transaction each. The employee row is
/// locked `FOR UPDATE` first so concurrent shift changes for one employee
/// serialize; the partial unique index on open sessions backs this up.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn lock_employee(
        tx: &mut Transaction<'_, Postgres>,
        employee_id: i64,
        org_id: Option<i64>,
    ) -> SessionResult<()> {
        let locked = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM employees WHERE id = $1 AND ($2::BIGINT IS NULL OR org_id = $2) FOR UPDATE",
        )
        .bind(employee_id)
        .bind(org_id)
        .fetch_optional(&mut **tx)
        .await?;

        match locked {
            Some(_) => Ok(()),
            None => Err(SessionError::EmployeeNotFound { employee_id }),
        }
    }

    async fn set_online(
        tx: &mut Transaction<'_, Postgres>,
        employee_id: i64,
        online: bool,
    ) -> SessionResult<()> {
        let result = sqlx::query("UPDATE employees SET online = $2 WHERE id = $1")
            .bind(employee_id)
            .bind(online)
            .execute(&mut **tx)
            .await
            .map_err(|err| flag_write_failed(employee_id, err.to_string()))?;

        if result.rows_affected() != 1 {
            return Err(flag_write_failed(
                employee_id,
                format!("{} rows updated", result.rows_affected()),
            ));
        }
        Ok(())
    }
}

fn flag_write_failed(employee_id: i64, detail: String) -> SessionError {
    error!(employee_id, detail = %detail, "employee online flag update failed, rolling back");
    SessionError::Storage(StorageError::Retryable(format!(
        "failed to update online flag for employee {employee_id}: {detail}"
    )))
}

async fn commit(tx: Transaction<'_, Postgres>) -> SessionResult<()> {
    tx.commit()
        .await
        .map_err(|err| SessionError::Storage(StorageError::Retryable(err.to_string())))
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn open(&self, new: NewSession) -> SessionResult<Session> {
        let mut tx = self.pool.begin().await?;
        Self::lock_employee(&mut tx, new.employee_id, Some(new.org_id)).await?;

        let open = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM sessions WHERE employee_id = $1 AND date_close IS NULL LIMIT 1",
        )
        .bind(new.employee_id)
        .fetch_optional(&mut *tx)
        .await?;
        if open.is_some() {
            return Err(SessionError::AlreadyOpen {
                employee_id: new.employee_id,
            });
        }

        let session = sqlx::query_as::<_, Session>(&format!(
            "INSERT INTO sessions (employee_id, outlet_id, org_id, date_open, cash_open)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(new.employee_id)
        .bind(new.outlet_id)
        .bind(new.org_id)
        .bind(Utc::now())
        .bind(new.cash_open)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if pg_error_code(&err).as_deref() == Some(PG_UNIQUE_VIOLATION) {
                SessionError::AlreadyOpen {
                    employee_id: new.employee_id,
                }
            } else {
                SessionError::from(err)
            }
        })?;

        Self::set_online(&mut tx, new.employee_id, true).await?;
        commit(tx).await?;

        info!(
            session_id = session.id,
            employee_id = session.employee_id,
            outlet_id = session.outlet_id,
            org_id = session.org_id,
            "session opened"
        );
        Ok(session)
    }

    async fn close(
        &self,
        employee_id: i64,
        date_close: DateTime<Utc>,
        cash_close: f64,
    ) -> SessionResult<Session> {
        let mut tx = self.pool.begin().await?;
        Self::lock_employee(&mut tx, employee_id, None).await?;

        let open = sqlx::query_as::<_, Session>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE employee_id = $1 AND date_close IS NULL"
        ))
        .bind(employee_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(SessionError::SessionNotFound { employee_id })?;

        if date_close < open.date_open {
            return Err(SessionError::CloseBeforeOpen {
                session_id: open.id,
                date_open: open.date_open,
            });
        }

        let session = sqlx::query_as::<_, Session>(&format!(
            "UPDATE sessions SET date_close = $2, cash_close = $3
             WHERE id = $1
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(open.id)
        .bind(date_close)
        .bind(cash_close)
        .fetch_one(&mut *tx)
        .await?;

        Self::set_online(&mut tx, employee_id, false).await?;
        commit(tx).await?;

        info!(
            session_id = session.id,
            employee_id,
            outlet_id = session.outlet_id,
            "session closed"
        );
        Ok(session)
    }

    async fn has_open_session(&self, employee_id: i64) -> SessionResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM sessions WHERE employee_id = $1 AND date_close IS NULL)",
        )
        .bind(employee_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn current_for_employee(&self, employee_id: i64) -> SessionResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE employee_id = $1 AND date_close IS NULL"
        ))
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn last_closed_for_outlet(&self, outlet_id: i64) -> SessionResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE outlet_id = $1 AND date_close IS NOT NULL
             ORDER BY id DESC
             LIMIT 1"
        ))
        .bind(outlet_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn list_for_organization(&self, org_id: i64) -> SessionResult<Vec<Session>> {
        let sessions = sqlx::query_as::<_, Session>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE org_id = $1 ORDER BY id DESC"
        ))
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    async fn find_employee(&self, employee_id: i64) -> SessionResult<Option<Employee>> {
        let employee = sqlx::query_as::<_, Employee>(
            "SELECT id, org_id, outlet_id, name, role, online FROM employees WHERE id = $1",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(employee)
    }

    async fn outlet_in_organization(&self, outlet_id: i64, org_id: i64) -> SessionResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM outlets WHERE id = $1 AND org_id = $2)",
        )
        .bind(outlet_id)
        .bind(org_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

/// Applies the bundled schema. Statements are idempotent.
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    for (name, sql) in MIGRATIONS {
        for statement in sql.split(';') {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                continue;
            }
            sqlx::query(trimmed)
                .execute(pool)
                .await
                .map_err(|err| anyhow::anyhow!("migration {name} failed: {err}"))?;
        }
        info!(migration = name, "applied migration");
    }
    Ok(())
}
