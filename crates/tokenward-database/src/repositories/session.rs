//! Session record store.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use tokenward_core::error::{AppError, ErrorKind};
use tokenward_core::result::AppResult;
use tokenward_core::types::pagination::{PageRequest, PageResponse};
use tokenward_core::types::sorting::{SortDirection, SortField};
use tokenward_core::types::{SessionId, UserId};
use tokenward_entity::session::{CreateSession, Session, SessionFilter};

/// Columns sessions can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSortKey {
    /// Login time.
    CreatedAt,
    /// Last modification (refresh) time.
    UpdatedAt,
    /// Expiry time.
    ExpiresAt,
}

impl SessionSortKey {
    /// The SQL column backing this key.
    pub fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::ExpiresAt => "expires_at",
        }
    }

    /// Read the key's value from a record.
    pub fn value_of(&self, session: &Session) -> DateTime<Utc> {
        match self {
            Self::CreatedAt => session.created_at,
            Self::UpdatedAt => session.updated_at,
            Self::ExpiresAt => session.expires_at,
        }
    }
}

impl FromStr for SessionSortKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" | "createdAt" => Ok(Self::CreatedAt),
            "updated_at" | "updatedAt" => Ok(Self::UpdatedAt),
            "expires_at" | "expiresAt" => Ok(Self::ExpiresAt),
            other => Err(AppError::validation(format!(
                "Cannot sort sessions by '{other}'. Supported: created_at, updated_at, expires_at"
            ))),
        }
    }
}

/// A validated ordering for session listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOrder {
    /// Column to order by.
    pub key: SessionSortKey,
    /// Direction.
    pub direction: SortDirection,
}

impl Default for SessionOrder {
    /// Newest first.
    fn default() -> Self {
        Self {
            key: SessionSortKey::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl TryFrom<&SortField> for SessionOrder {
    type Error = AppError;

    fn try_from(sort: &SortField) -> Result<Self, Self::Error> {
        Ok(Self {
            key: sort.field.parse()?,
            direction: sort.direction,
        })
    }
}

/// Durable store of session records.
///
/// Reads take the caller's notion of `now` and never return a record whose
/// `expires_at` is at or before it, whether or not the sweeper has purged it
/// yet.
#[async_trait]
pub trait SessionRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a new session with a fresh id.
    async fn create(&self, data: &CreateSession, now: DateTime<Utc>) -> AppResult<Session>;

    /// Find a live session by id.
    async fn find_by_id(&self, id: SessionId, now: DateTime<Utc>) -> AppResult<Option<Session>>;

    /// Find the first live session matching a filter.
    async fn find_one(
        &self,
        filter: &SessionFilter,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Session>>;

    /// List live sessions matching a filter, one page at a time.
    async fn paginate(
        &self,
        filter: &SessionFilter,
        page: &PageRequest,
        order: SessionOrder,
        now: DateTime<Utc>,
    ) -> AppResult<PageResponse<Session>>;

    /// Move a live session's expiry forward. The stored value becomes
    /// `max(current, expires_at)`. Returns `None` if no live session matched.
    async fn update_expiry(
        &self,
        id: SessionId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Session>>;

    /// Delete a session. Returns `true` if a record was removed.
    async fn delete(&self, id: SessionId) -> AppResult<bool>;

    /// Delete every session of a user, returning the removed ids.
    async fn delete_by_user(&self, user_id: UserId) -> AppResult<Vec<SessionId>>;

    /// Purge records whose expiry is at or before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

/// PostgreSQL-backed session store.
#[derive(Debug, Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    /// Create a new session repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const LIVE_FILTER: &str = "($1::uuid IS NULL OR id = $1) \
     AND ($2::uuid IS NULL OR user_id = $2) \
     AND expires_at > $3";

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn create(&self, data: &CreateSession, now: DateTime<Utc>) -> AppResult<Session> {
        sqlx::query_as::<_, Session>(
            "INSERT INTO sessions (id, user_id, device_info, expires_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) RETURNING *",
        )
        .bind(SessionId::new())
        .bind(data.user_id)
        .bind(sqlx::types::Json(&data.device_info))
        .bind(data.expires_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create session", e))
    }

    async fn find_by_id(&self, id: SessionId, now: DateTime<Utc>) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1 AND expires_at > $2")
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find session", e))
    }

    async fn find_one(
        &self,
        filter: &SessionFilter,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>(&format!(
            "SELECT * FROM sessions WHERE {LIVE_FILTER} LIMIT 1"
        ))
        .bind(filter.id)
        .bind(filter.user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find session", e))
    }

    async fn paginate(
        &self,
        filter: &SessionFilter,
        page: &PageRequest,
        order: SessionOrder,
        now: DateTime<Utc>,
    ) -> AppResult<PageResponse<Session>> {
        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM sessions WHERE {LIVE_FILTER}"))
                .bind(filter.id)
                .bind(filter.user_id)
                .bind(now)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to count sessions", e)
                })?;

        // Column and direction come from closed enums, never from caller text.
        let sessions = sqlx::query_as::<_, Session>(&format!(
            "SELECT * FROM sessions WHERE {LIVE_FILTER} \
             ORDER BY {} {}, id ASC LIMIT $4 OFFSET $5",
            order.key.column(),
            order.direction.as_sql()
        ))
        .bind(filter.id)
        .bind(filter.user_id)
        .bind(now)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list sessions", e))?;

        Ok(PageResponse::new(
            sessions,
            page.page,
            page.page_size,
            total as u64,
        ))
    }

    async fn update_expiry(
        &self,
        id: SessionId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>(
            "UPDATE sessions SET expires_at = GREATEST(expires_at, $2), updated_at = $3 \
             WHERE id = $1 AND expires_at > $3 RETURNING *",
        )
        .bind(id)
        .bind(expires_at)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to extend session expiry", e)
        })
    }

    async fn delete(&self, id: SessionId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete session", e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_user(&self, user_id: UserId) -> AppResult<Vec<SessionId>> {
        sqlx::query_scalar::<_, SessionId>("DELETE FROM sessions WHERE user_id = $1 RETURNING id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete user sessions", e)
            })
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to purge expired sessions", e)
            })?;
        Ok(result.rows_affected())
    }
}
