//! # tokenward-database
//!
//! PostgreSQL connection management, migrations, and the durable stores the
//! token lifecycle depends on: session records and user identities. Each
//! store is a trait with a sqlx implementation and an in-memory one for
//! tests and single-process deployments.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use memory::{InMemoryIdentityProvider, InMemorySessionRepository};
pub use repositories::{
    IdentityProvider, PgIdentityProvider, PgSessionRepository, SessionOrder, SessionRepository,
    SessionSortKey,
};
