//! In-process store implementations for tests and single-node deployments.

pub mod identity;
pub mod session;

pub use identity::InMemoryIdentityProvider;
pub use session::InMemorySessionRepository;
