//! Signed token encoding, verification, and untrusted inspection.

pub mod claims;
pub mod codec;

pub use claims::{ClaimSet, Claims, TokenType, UntrustedClaims};
pub use codec::{SignedToken, TokenCodec};
