//! Key builders for every revocation-store entry.
//!
//! Centralising key construction prevents typos and makes it easy
//! to find every key the application writes. Deployment-wide prefixes
//! are added by the Redis client, not here.

use std::fmt::Display;

/// Prefix of denylist keys.
pub const TOKEN_BLACKLIST_PREFIX: &str = "token_blacklist:";

/// Key marking a token identifier as revoked (denylist policy).
pub fn token_blacklist(jti: impl Display) -> String {
    format!("{TOKEN_BLACKLIST_PREFIX}{jti}")
}

/// Whether a key, once written, stays present until it expires.
///
/// Only denylist markers qualify: nothing deletes or lowers them. Allowlist
/// entries, session markers, and watermarks can all be withdrawn or
/// replaced by another process.
pub fn is_write_once(key: &str) -> bool {
    key.starts_with(TOKEN_BLACKLIST_PREFIX)
}

/// Key marking a token identifier as currently valid (allowlist policy).
pub fn token_whitelist(jti: impl Display) -> String {
    format!("token_whitelist:{jti}")
}

/// Key marking a session as permitted to authenticate.
pub fn active_session(session_id: impl Display) -> String {
    format!("active_session:{session_id}")
}

/// Key holding the Unix second before which a user's tokens are rejected.
pub fn token_iat_available(user_id: impl Display) -> String {
    format!("token_iat_available:{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(token_blacklist("abc"), "token_blacklist:abc");
        assert_eq!(token_whitelist("abc"), "token_whitelist:abc");
        assert_eq!(active_session("s1"), "active_session:s1");
        assert_eq!(token_iat_available("u1"), "token_iat_available:u1");
    }

    #[test]
    fn test_only_denylist_keys_are_write_once() {
        assert!(is_write_once(&token_blacklist("abc")));
        assert!(!is_write_once(&token_whitelist("abc")));
        assert!(!is_write_once(&active_session("s1")));
        assert!(!is_write_once(&token_iat_available("u1")));
    }
}
