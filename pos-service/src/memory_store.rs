use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_auth::Role;

use crate::sessions::{
    Employee, NewSession, Session, SessionError, SessionResult, SessionStore, StorageError,
};

#[derive(Default)]
struct State {
    next_session_id: i64,
    sessions: Vec<Session>,
    employees: HashMap<i64, Employee>,
    outlets: HashMap<i64, i64>,
}

/// Session store held in process memory. A single mutex covers every
/// check-and-write, which gives the same exclusivity the Postgres store gets
/// from its transaction.
#[derive(Default)]
pub struct InMemorySessionStore {
    state: Mutex<State>,
    fail_flag_writes: AtomicBool,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outlet(self, outlet_id: i64, org_id: i64) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.outlets.insert(outlet_id, org_id);
        }
        self
    }

    pub fn with_employee(
        self,
        employee_id: i64,
        org_id: i64,
        outlet_id: i64,
        name: &str,
        role: Role,
    ) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.outlets.entry(outlet_id).or_insert(org_id);
            state.employees.insert(
                employee_id,
                Employee {
                    id: employee_id,
                    org_id,
                    outlet_id,
                    name: name.to_string(),
                    role,
                    online: false,
                },
            );
        }
        self
    }

    /// Makes every following online-flag write fail, to exercise rollback.
    pub fn fail_flag_writes(&self, fail: bool) {
        self.fail_flag_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> SessionResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| SessionError::Storage(StorageError::Backend("session store lock poisoned".into())))
    }

    fn set_online(&self, state: &mut State, employee_id: i64, online: bool) -> SessionResult<()> {
        if self.fail_flag_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Storage(StorageError::Retryable(format!(
                "failed to update online flag for employee {employee_id}"
            ))));
        }
        let employee = state
            .employees
            .get_mut(&employee_id)
            .ok_or(SessionError::EmployeeNotFound { employee_id })?;
        employee.online = online;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn open(&self, new: NewSession) -> SessionResult<Session> {
        let mut state = self.lock()?;

        match state.employees.get(&new.employee_id) {
            Some(employee) if employee.org_id == new.org_id => {}
            _ => {
                return Err(SessionError::EmployeeNotFound {
                    employee_id: new.employee_id,
                })
            }
        }

        if state
            .sessions
            .iter()
            .any(|s| s.employee_id == new.employee_id && s.is_open())
        {
            return Err(SessionError::AlreadyOpen {
                employee_id: new.employee_id,
            });
        }

        // Flag first so a failure leaves nothing to roll back.
        self.set_online(&mut state, new.employee_id, true)?;

        state.next_session_id += 1;
        let session = Session {
            id: state.next_session_id,
            employee_id: new.employee_id,
            outlet_id: new.outlet_id,
            org_id: new.org_id,
            date_open: Utc::now(),
            date_close: None,
            cash_open: new.cash_open,
            cash_close: None,
        };
        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn close(
        &self,
        employee_id: i64,
        date_close: DateTime<Utc>,
        cash_close: f64,
    ) -> SessionResult<Session> {
        let mut state = self.lock()?;

        if !state.employees.contains_key(&employee_id) {
            return Err(SessionError::EmployeeNotFound { employee_id });
        }

        let index = state
            .sessions
            .iter()
            .position(|s| s.employee_id == employee_id && s.is_open())
            .ok_or(SessionError::SessionNotFound { employee_id })?;

        let open = &state.sessions[index];
        if date_close < open.date_open {
            return Err(SessionError::CloseBeforeOpen {
                session_id: open.id,
                date_open: open.date_open,
            });
        }

        self.set_online(&mut state, employee_id, false)?;

        let session = &mut state.sessions[index];
        session.date_close = Some(date_close);
        session.cash_close = Some(cash_close);
        Ok(session.clone())
    }

    async fn has_open_session(&self, employee_id: i64) -> SessionResult<bool> {
        Ok(self.current_for_employee(employee_id).await?.is_some())
    }

    async fn current_for_employee(&self, employee_id: i64) -> SessionResult<Option<Session>> {
        let state = self.lock()?;
        Ok(state
            .sessions
            .iter()
            .find(|s| s.employee_id == employee_id && s.is_open())
            .cloned())
    }

    async fn last_closed_for_outlet(&self, outlet_id: i64) -> SessionResult<Option<Session>> {
        let state = self.lock()?;
        Ok(state
            .sessions
            .iter()
            .filter(|s| s.outlet_id == outlet_id && !s.is_open())
            .max_by_key(|s| s.id)
            .cloned())
    }

    async fn list_for_organization(&self, org_id: i64) -> SessionResult<Vec<Session>> {
        let state = self.lock()?;
        let mut sessions: Vec<Session> = state
            .sessions
            .iter()
            .filter(|s| s.org_id == org_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(sessions)
    }

    async fn find_employee(&self, employee_id: i64) -> SessionResult<Option<Employee>> {
        let state = self.lock()?;
        Ok(state.employees.get(&employee_id).cloned())
    }

    async fn outlet_in_organization(&self, outlet_id: i64, org_id: i64) -> SessionResult<bool> {
        let state = self.lock()?;
        Ok(state.outlets.get(&outlet_id) == Some(&org_id))
    }
}
