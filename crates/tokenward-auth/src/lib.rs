//! # tokenward-auth
//!
//! Issues, validates, rotates, and revokes access/refresh token pairs bound
//! to server-tracked sessions.
//!
//! ## Modules
//!
//! - `time`: clocks and the seconds/milliseconds boundary
//! - `jwt`: HS256 signing, verification, and untrusted inspection
//! - `revocation`: TTL-keyed session markers, token lists, and watermarks
//! - `session`: session registry, device metadata, expired-session sweeper
//! - `password`: Argon2id hashing and new-password policy
//! - `lifecycle`: the token lifecycle manager tying the above together

pub mod jwt;
pub mod lifecycle;
pub mod password;
pub mod revocation;
pub mod session;
pub mod time;

pub use jwt::{Claims, TokenCodec, TokenType};
pub use lifecycle::{LoginResult, TokenLifecycleManager};
pub use password::{PasswordHasher, PasswordValidator};
pub use revocation::{RevocationStore, RevokeOutcome};
pub use session::{RequestMeta, SessionCleanup, SessionRegistry};
pub use time::{Clock, ManualClock, SystemClock};
