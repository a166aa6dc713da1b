//! Store traits and their PostgreSQL implementations.

pub mod identity;
pub mod session;

pub use identity::{IdentityProvider, PgIdentityProvider};
pub use session::{PgSessionRepository, SessionOrder, SessionRepository, SessionSortKey};
