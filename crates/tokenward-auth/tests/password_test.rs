//! Integration tests for credential login, password change, and
//! password-change invalidation.

mod helpers;

use std::time::Duration;

use tokenward_auth::RequestMeta;
use tokenward_cache::keys;
use tokenward_core::config::RevocationPolicy;
use tokenward_core::error::{AuthFailure, ErrorKind};
use tokenward_database::repositories::identity::IdentityProvider;
use tokenward_entity::user::{ExternalProfile, ExternalProvider, Registration};

use helpers::{PASSWORD, REFRESH_TTL, T0, T0_MS, TestApp, peek};

const NEW_PASSWORD: &str = "Velvet-Orbit-42-Lantern";

#[tokio::test]
async fn test_invalidate_older_tokens_supersedes_earlier_issuance() {
    for policy in [RevocationPolicy::Denylist, RevocationPolicy::Allowlist] {
        let app = TestApp::new(policy);
        let user = app.create_user("ada").await;
        let before = app.login(&user).await;

        app.advance(5);
        let watermark = app.manager.invalidate_older_tokens(user.id).await.unwrap();
        assert_eq!(watermark, T0_MS + 5_000);

        for token in [&before.access_token, &before.refresh_token] {
            let err = app.manager.authenticate(token).await.unwrap_err();
            assert_eq!(err.auth_failure(), Some(AuthFailure::TokenSuperseded));
        }
        let err = app.manager.rotate(&before.refresh_token).await.unwrap_err();
        assert_eq!(err.auth_failure(), Some(AuthFailure::TokenSuperseded));

        app.advance(1);
        let after = app.login(&user).await;
        assert!(app.manager.authenticate(&after.access_token).await.is_ok());
    }
}

#[tokio::test]
async fn test_token_issued_at_the_watermark_instant_is_honoured() {
    let app = TestApp::new(RevocationPolicy::Denylist);
    let user = app.create_user("ada").await;

    let watermark = app.manager.invalidate_older_tokens(user.id).await.unwrap();
    let pair = app.login(&user).await;
    let claims = peek(&pair.access_token);
    assert_eq!(claims.iat, T0);
    assert_eq!(claims.iat_ms, Some(watermark));
    assert!(app.manager.authenticate(&pair.access_token).await.is_ok());
}

#[tokio::test]
async fn test_token_issued_earlier_in_the_same_second_is_superseded() {
    let app = TestApp::new(RevocationPolicy::Denylist);
    let user = app.create_user("ada").await;

    let stolen = app.login(&user).await;
    app.advance_millis(200);
    app.manager.invalidate_older_tokens(user.id).await.unwrap();
    let fresh = app.login(&user).await;
    assert_eq!(peek(&stolen.access_token).iat, peek(&fresh.access_token).iat);

    let err = app
        .manager
        .authenticate(&stolen.access_token)
        .await
        .unwrap_err();
    assert_eq!(err.auth_failure(), Some(AuthFailure::TokenSuperseded));
    assert!(app.manager.authenticate(&fresh.access_token).await.is_ok());
}

#[tokio::test]
async fn test_changes_within_one_instant_still_move_watermark_forward() {
    let app = TestApp::new(RevocationPolicy::Denylist);
    let user = app.create_user("ada").await;

    let first = app.manager.invalidate_older_tokens(user.id).await.unwrap();
    let between = app.login(&user).await;
    let second = app.manager.invalidate_older_tokens(user.id).await.unwrap();
    assert!(second > first);

    let err = app
        .manager
        .authenticate(&between.access_token)
        .await
        .unwrap_err();
    assert_eq!(err.auth_failure(), Some(AuthFailure::TokenSuperseded));
}

#[tokio::test]
async fn test_watermark_outlives_every_token() {
    let app = TestApp::new(RevocationPolicy::Denylist);
    let user = app.create_user("ada").await;

    app.manager.invalidate_older_tokens(user.id).await.unwrap();
    assert_eq!(
        app.cache.ttl_of(&keys::token_iat_available(user.id)),
        Some(Duration::from_secs(REFRESH_TTL))
    );
}

#[tokio::test]
async fn test_sequential_changes_move_watermark_forward() {
    let app = TestApp::new(RevocationPolicy::Denylist);
    let user = app.create_user("ada").await;

    app.advance(10);
    let first = app.manager.invalidate_older_tokens(user.id).await.unwrap();
    app.advance(10);
    let between = app.login(&user).await;
    assert!(app.manager.authenticate(&between.access_token).await.is_ok());

    app.advance(10);
    let second = app.manager.invalidate_older_tokens(user.id).await.unwrap();
    assert!(second > first);

    let err = app
        .manager
        .authenticate(&between.access_token)
        .await
        .unwrap_err();
    assert_eq!(err.auth_failure(), Some(AuthFailure::TokenSuperseded));
}

#[tokio::test]
async fn test_watermark_never_moves_backwards() {
    let app = TestApp::new(RevocationPolicy::Denylist);
    let user = app.create_user("ada").await;

    app.advance(100);
    let later = app.manager.invalidate_older_tokens(user.id).await.unwrap();

    app.clock
        .set(chrono::DateTime::from_timestamp(T0 + 50, 0).unwrap());
    let again = app.manager.invalidate_older_tokens(user.id).await.unwrap();
    assert_eq!(again, later + 1);
}

#[tokio::test]
async fn test_login_with_password() {
    let app = TestApp::new(RevocationPolicy::Denylist);
    let user = app.create_user("ada").await;
    let meta = RequestMeta::with_user_agent("integration-test");

    let result = app
        .manager
        .login_with_password("ada", PASSWORD, &meta)
        .await
        .unwrap();
    assert_eq!(result.identity.id, user.id);
    assert!(
        app.manager
            .authenticate(&result.tokens.access_token)
            .await
            .is_ok()
    );

    for (username, password) in [("ada", "Wrong-Password-1"), ("nobody", PASSWORD)] {
        let err = app
            .manager
            .login_with_password(username, password, &meta)
            .await
            .unwrap_err();
        assert_eq!(err.auth_failure(), Some(AuthFailure::InvalidCredentials));
    }
}

#[tokio::test]
async fn test_passwordless_account_cannot_log_in_with_password() {
    let app = TestApp::new(RevocationPolicy::Denylist);
    app.create_passwordless_user("oauth-only").await;

    let err = app
        .manager
        .login_with_password("oauth-only", PASSWORD, &RequestMeta::default())
        .await
        .unwrap_err();
    assert_eq!(err.auth_failure(), Some(AuthFailure::InvalidCredentials));
}

#[tokio::test]
async fn test_change_password_invalidates_older_tokens() {
    let app = TestApp::new(RevocationPolicy::Denylist);
    let user = app.create_user("ada").await;
    let before = app.login(&user).await;

    app.advance(1);
    let watermark = app
        .manager
        .change_password(user.id, PASSWORD, NEW_PASSWORD)
        .await
        .unwrap();
    assert_eq!(watermark, T0_MS + 1_000);

    let err = app
        .manager
        .authenticate(&before.access_token)
        .await
        .unwrap_err();
    assert_eq!(err.auth_failure(), Some(AuthFailure::TokenSuperseded));

    let meta = RequestMeta::default();
    assert!(
        app.manager
            .login_with_password("ada", PASSWORD, &meta)
            .await
            .is_err()
    );
    let result = app
        .manager
        .login_with_password("ada", NEW_PASSWORD, &meta)
        .await
        .unwrap();
    assert!(
        app.manager
            .authenticate(&result.tokens.access_token)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_change_password_rejections() {
    let app = TestApp::new(RevocationPolicy::Denylist);
    let user = app.create_user("ada").await;

    let err = app
        .manager
        .change_password(user.id, "Not-The-Password-1", NEW_PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.auth_failure(), Some(AuthFailure::InvalidCredentials));

    let err = app
        .manager
        .change_password(user.id, PASSWORD, PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = app
        .manager
        .change_password(user.id, PASSWORD, "weak")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = app
        .manager
        .change_password(tokenward_core::types::UserId::new(), PASSWORD, NEW_PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    // Nothing was invalidated by the failed attempts.
    assert!(
        app.cache
            .ttl_of(&keys::token_iat_available(user.id))
            .is_none()
    );
}

#[tokio::test]
async fn test_login_external_creates_then_reuses_identity() {
    let app = TestApp::new(RevocationPolicy::Denylist);
    let profile = ExternalProfile {
        provider: ExternalProvider::Google,
        external_id: "google-123".into(),
        email: Some("grace@example.com".into()),
        full_name: "Grace Hopper".into(),
        avatar: None,
    };
    let meta = RequestMeta::default();

    let first = app.manager.login_external(&profile, &meta).await.unwrap();
    let second = app.manager.login_external(&profile, &meta).await.unwrap();
    assert_eq!(first.identity.id, second.identity.id);
    assert_eq!(first.identity.google_id.as_deref(), Some("google-123"));
    assert_ne!(first.tokens.session_id, second.tokens.session_id);
    assert_eq!(
        peek(&first.tokens.access_token).full_name.as_deref(),
        Some("Grace Hopper")
    );
}

#[tokio::test]
async fn test_login_external_links_existing_email() {
    let app = TestApp::new(RevocationPolicy::Denylist);
    let user = app.create_user("ada").await;
    let profile = ExternalProfile {
        provider: ExternalProvider::Facebook,
        external_id: "fb-77".into(),
        email: user.email.clone(),
        full_name: "Ada via Facebook".into(),
        avatar: None,
    };

    let result = app
        .manager
        .login_external(&profile, &RequestMeta::default())
        .await
        .unwrap();
    assert_eq!(result.identity.id, user.id);
    assert_eq!(result.identity.facebook_id.as_deref(), Some("fb-77"));
}

fn registration(email: &str, username: Option<&str>, password: &str) -> Registration {
    Registration {
        full_name: "Grace Hopper".into(),
        email: email.into(),
        username: username.map(str::to_string),
        password: password.into(),
    }
}

#[tokio::test]
async fn test_register_then_login_with_password() {
    let app = TestApp::new(RevocationPolicy::Denylist);

    let identity = app
        .manager
        .register(&registration("grace@example.com", Some("grace"), NEW_PASSWORD))
        .await
        .unwrap();
    assert_eq!(identity.email.as_deref(), Some("grace@example.com"));
    assert_eq!(identity.username.as_deref(), Some("grace"));
    assert_ne!(identity.password_hash.as_deref(), Some(NEW_PASSWORD));

    let result = app
        .manager
        .login_with_password("grace", NEW_PASSWORD, &RequestMeta::default())
        .await
        .unwrap();
    assert_eq!(result.identity.id, identity.id);
    assert!(
        app.manager
            .authenticate(&result.tokens.access_token)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_register_rejects_taken_email() {
    let app = TestApp::new(RevocationPolicy::Denylist);
    app.create_user("ada").await;

    let err = app
        .manager
        .register(&registration("ADA@example.com", None, NEW_PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(err.message, "Email already exists");
}

#[tokio::test]
async fn test_register_rejects_taken_username() {
    let app = TestApp::new(RevocationPolicy::Denylist);
    app.create_user("ada").await;

    let err = app
        .manager
        .register(&registration("other@example.com", Some("Ada"), NEW_PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(err.message, "Username already exists");
}

#[tokio::test]
async fn test_register_rejects_weak_password_and_missing_fields() {
    let app = TestApp::new(RevocationPolicy::Denylist);

    let err = app
        .manager
        .register(&registration("grace@example.com", Some("grace"), "short"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = app
        .manager
        .register(&registration("  ", Some("grace"), NEW_PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    assert!(
        !app.identities
            .exists_by_username("grace")
            .await
            .unwrap()
    );
}
