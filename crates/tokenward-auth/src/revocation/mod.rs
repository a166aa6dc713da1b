//! TTL-keyed revocation state: active-session markers, token deny/allow
//! lists, and the per-user password-change watermark.

pub mod store;

pub use store::{RevocationStore, RevokeOutcome};
