//! # tokenward-entity
//!
//! Domain records for Tokenward. Session records map to database rows and
//! additionally derive `sqlx::FromRow`; identities are assembled by the
//! identity provider from whatever backs user storage.

pub mod session;
pub mod user;
