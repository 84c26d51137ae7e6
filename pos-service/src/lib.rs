pub mod app;
pub mod config;
pub mod extract;
pub mod memory_store;
pub mod metrics;
pub mod pg_store;
pub mod session_handlers;
pub mod sessions;

pub use app::{build_router, AppState};
pub use memory_store::InMemorySessionStore;
pub use pg_store::PgSessionStore;
pub use sessions::{SessionError, SessionStore};
