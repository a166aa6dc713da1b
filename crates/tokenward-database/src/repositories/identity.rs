//! Identity provider collaborator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::info;

use tokenward_core::error::{AppError, ErrorKind};
use tokenward_core::result::AppResult;
use tokenward_core::types::UserId;
use tokenward_entity::user::{ExternalProfile, Identity, Role};

/// Lookup and credential storage for user identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Find an identity by id.
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<Identity>>;

    /// Find an identity by username (case-insensitive).
    async fn find_by_username(&self, username: &str) -> AppResult<Option<Identity>>;

    /// Whether any identity uses this email (case-insensitive).
    async fn exists_by_email(&self, email: &str) -> AppResult<bool>;

    /// Whether any identity uses this username (case-insensitive).
    async fn exists_by_username(&self, username: &str) -> AppResult<bool>;

    /// Store a new identity. A username or email already in use is a
    /// conflict.
    async fn create(&self, identity: &Identity) -> AppResult<Identity>;

    /// Replace an identity's password hash.
    async fn update_password_hash(&self, id: UserId, hash: &str) -> AppResult<()>;

    /// Resolve an OAuth profile to an identity.
    ///
    /// Finds the account already linked to the provider id; otherwise links
    /// the account with the same email; otherwise creates a new account
    /// with the default role. Repeating the call yields the same identity.
    async fn upsert_external(&self, profile: &ExternalProfile) -> AppResult<Identity>;
}

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
struct IdentityRow {
    id: UserId,
    full_name: String,
    username: Option<String>,
    email: Option<String>,
    roles: Vec<String>,
    google_id: Option<String>,
    facebook_id: Option<String>,
    avatar: Option<String>,
    password_hash: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IdentityRow> for Identity {
    type Error = AppError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        let roles = row
            .roles
            .iter()
            .map(|r| r.parse::<Role>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id: row.id,
            full_name: row.full_name,
            username: row.username,
            email: row.email,
            roles,
            google_id: row.google_id,
            facebook_id: row.facebook_id,
            avatar: row.avatar,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_identity(row: Option<IdentityRow>) -> AppResult<Option<Identity>> {
    row.map(Identity::try_from).transpose()
}

/// PostgreSQL-backed identity provider over the `users` table.
#[derive(Debug, Clone)]
pub struct PgIdentityProvider {
    pool: PgPool,
}

impl PgIdentityProvider {
    /// Create a new identity provider.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find user by id", e)
            })?;
        into_identity(row)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT * FROM users WHERE LOWER(username) = LOWER($1)",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find user by username", e)
        })?;
        into_identity(row)
    }

    async fn exists_by_email(&self, email: &str) -> AppResult<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to check email existence", e)
            })
    }

    async fn exists_by_username(&self, username: &str) -> AppResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to check username existence", e)
        })
    }

    async fn create(&self, identity: &Identity) -> AppResult<Identity> {
        let roles: Vec<String> = identity
            .roles
            .iter()
            .map(|r| r.as_str().to_string())
            .collect();

        let row = sqlx::query_as::<_, IdentityRow>(
            r#"INSERT INTO users (id, full_name, username, email, roles, google_id, facebook_id,
                                  avatar, password_hash, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING *"#,
        )
        .bind(identity.id)
        .bind(&identity.full_name)
        .bind(&identity.username)
        .bind(&identity.email)
        .bind(roles)
        .bind(&identity.google_id)
        .bind(&identity.facebook_id)
        .bind(&identity.avatar)
        .bind(&identity.password_hash)
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                match db_err.constraint() {
                    Some("users_username_key") => {
                        return AppError::conflict("Username already exists");
                    }
                    Some("users_email_key") => {
                        return AppError::conflict("Email already exists");
                    }
                    _ => {}
                }
            }
            AppError::with_source(ErrorKind::Database, "Failed to create user", e)
        })?;

        Identity::try_from(row)
    }

    async fn update_password_hash(&self, id: UserId, hash: &str) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(hash)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to update password", e)
                })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("User {id} not found")));
        }
        Ok(())
    }

    async fn upsert_external(&self, profile: &ExternalProfile) -> AppResult<Identity> {
        let column = profile.provider.column();
        let db_err = |e: sqlx::Error| {
            AppError::with_source(ErrorKind::Database, "Failed to upsert user", e)
        };

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let linked = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT * FROM users WHERE {column} = $1"
        ))
        .bind(&profile.external_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        if let Some(row) = linked {
            tx.commit().await.map_err(db_err)?;
            return Identity::try_from(row);
        }

        if let Some(email) = profile.email.as_deref() {
            let by_email = sqlx::query_as::<_, IdentityRow>(&format!(
                "UPDATE users SET {column} = $2, avatar = COALESCE(avatar, $3), updated_at = NOW() \
                 WHERE LOWER(email) = LOWER($1) AND {column} IS NULL RETURNING *"
            ))
            .bind(email)
            .bind(&profile.external_id)
            .bind(&profile.avatar)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;

            if let Some(row) = by_email {
                tx.commit().await.map_err(db_err)?;
                info!(user_id = %row.id, provider = column, "Linked external account by email");
                return Identity::try_from(row);
            }
        }

        let created = sqlx::query_as::<_, IdentityRow>(&format!(
            "INSERT INTO users (id, full_name, email, avatar, roles, {column}) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT DO NOTHING RETURNING *"
        ))
        .bind(UserId::new())
        .bind(&profile.full_name)
        .bind(&profile.email)
        .bind(&profile.avatar)
        .bind(vec![Role::User.as_str().to_string()])
        .bind(&profile.external_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        match created {
            Some(row) => {
                info!(user_id = %row.id, provider = column, "Created account from external profile");
                Identity::try_from(row)
            }
            // A concurrent upsert won the insert; read its result.
            None => {
                let row = sqlx::query_as::<_, IdentityRow>(&format!(
                    "SELECT * FROM users WHERE {column} = $1"
                ))
                .bind(&profile.external_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
                into_identity(row)?.ok_or_else(|| {
                    AppError::conflict("External account conflicts with an existing user")
                })
            }
        }
    }
}
