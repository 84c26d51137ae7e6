mod support;

use std::sync::Arc;

use chrono::{Duration, Utc};
use pos_service::sessions::{NewSession, SessionState};
use pos_service::{InMemorySessionStore, SessionError, SessionStore};
use support::{seeded_store, CASHIER, DIRECTOR, ORG, OUTLET};

fn shift(employee_id: i64, cash_open: f64) -> NewSession {
    NewSession {
        employee_id,
        outlet_id: OUTLET,
        org_id: ORG,
        cash_open,
    }
}

#[tokio::test]
async fn open_then_close_walks_the_state_machine() {
    let store = seeded_store();

    let opened = store.open(shift(CASHIER, 100.0)).await.unwrap();
    assert_eq!(opened.state(), SessionState::Open);
    assert!(store.has_open_session(CASHIER).await.unwrap());
    assert!(store.find_employee(CASHIER).await.unwrap().unwrap().online);

    let err = store.open(shift(CASHIER, 100.0)).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyOpen { employee_id } if employee_id == CASHIER));
    assert_eq!(store.list_for_organization(ORG).await.unwrap().len(), 1);

    let closed_at = Utc::now();
    let closed = store.close(CASHIER, closed_at, 120.0).await.unwrap();
    assert_eq!(closed.id, opened.id);
    assert_eq!(closed.state(), SessionState::Closed);
    assert_eq!(closed.date_close, Some(closed_at));
    assert_eq!(closed.cash_close, Some(120.0));
    assert_eq!(closed.cash_open, 100.0);

    assert!(!store.has_open_session(CASHIER).await.unwrap());
    assert!(!store.find_employee(CASHIER).await.unwrap().unwrap().online);
}

#[tokio::test]
async fn close_without_open_session_fails() {
    let store = seeded_store();
    let err = store.close(CASHIER, Utc::now(), 1.0).await.unwrap_err();
    assert!(matches!(err, SessionError::SessionNotFound { .. }));

    store.open(shift(CASHIER, 1.0)).await.unwrap();
    store.close(CASHIER, Utc::now(), 1.0).await.unwrap();

    // closed sessions are never closed a second time
    let err = store.close(CASHIER, Utc::now(), 2.0).await.unwrap_err();
    assert!(matches!(err, SessionError::SessionNotFound { .. }));
    let sessions = store.list_for_organization(ORG).await.unwrap();
    assert_eq!(sessions[0].cash_close, Some(1.0));
}

#[tokio::test]
async fn unknown_employee_cannot_open() {
    let store = seeded_store();
    let err = store.open(shift(9_999, 1.0)).await.unwrap_err();
    assert!(matches!(err, SessionError::EmployeeNotFound { employee_id: 9_999 }));
}

#[tokio::test]
async fn concurrent_opens_admit_exactly_one() {
    let store: Arc<InMemorySessionStore> = Arc::new(seeded_store());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.open(shift(CASHIER, 10.0)).await
        }));
    }

    let mut opened = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => opened += 1,
            Err(SessionError::AlreadyOpen { .. }) => refused += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(opened, 1);
    assert_eq!(refused, 15);

    let open_sessions = store
        .list_for_organization(ORG)
        .await
        .unwrap()
        .into_iter()
        .filter(|s| s.is_open())
        .count();
    assert_eq!(open_sessions, 1);
}

#[tokio::test]
async fn employees_hold_independent_sessions() {
    let store = seeded_store();
    store.open(shift(CASHIER, 1.0)).await.unwrap();
    store.open(shift(DIRECTOR, 2.0)).await.unwrap();

    store.close(CASHIER, Utc::now(), 3.0).await.unwrap();
    assert!(!store.has_open_session(CASHIER).await.unwrap());
    assert!(store.has_open_session(DIRECTOR).await.unwrap());
}

#[tokio::test]
async fn last_closed_is_the_newest_closed_shift_of_the_outlet() {
    let store = seeded_store();
    assert!(store.last_closed_for_outlet(OUTLET).await.unwrap().is_none());

    let first = store.open(shift(CASHIER, 1.0)).await.unwrap();
    let second = store.open(shift(DIRECTOR, 1.0)).await.unwrap();
    assert!(second.id > first.id);

    // the newer shift closes first; the older one closes later
    store.close(DIRECTOR, Utc::now(), 70.0).await.unwrap();
    store
        .close(CASHIER, Utc::now() + Duration::hours(1), 50.0)
        .await
        .unwrap();

    let last = store.last_closed_for_outlet(OUTLET).await.unwrap().unwrap();
    assert_eq!(last.id, second.id);
    assert_eq!(last.cash_close, Some(70.0));

    // an open session does not count
    store.open(shift(CASHIER, 70.0)).await.unwrap();
    let last = store.last_closed_for_outlet(OUTLET).await.unwrap().unwrap();
    assert_eq!(last.id, second.id);
}

#[tokio::test]
async fn close_cannot_predate_open() {
    let store = seeded_store();
    let opened = store.open(shift(CASHIER, 10.0)).await.unwrap();

    let err = store
        .close(CASHIER, opened.date_open - Duration::seconds(1), 5.0)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::CloseBeforeOpen { session_id, .. } if session_id == opened.id));
    assert!(store.has_open_session(CASHIER).await.unwrap());
    assert!(store.find_employee(CASHIER).await.unwrap().unwrap().online);

    let closed = store.close(CASHIER, opened.date_open, 5.0).await.unwrap();
    assert_eq!(closed.date_close, Some(opened.date_open));
}
