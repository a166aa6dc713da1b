//! In-memory session store.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use tokenward_core::result::AppResult;
use tokenward_core::types::pagination::{PageRequest, PageResponse};
use tokenward_core::types::sorting::SortDirection;
use tokenward_core::types::{SessionId, UserId};
use tokenward_entity::session::{CreateSession, Session, SessionFilter};

use crate::repositories::session::{SessionOrder, SessionRepository};

/// Session store held in a map behind an async lock.
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionRepository {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store holds no records at all.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    fn live<'a>(
        sessions: &'a HashMap<SessionId, Session>,
        filter: &'a SessionFilter,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a Session> + 'a {
        sessions
            .values()
            .filter(move |s| filter.matches(s) && !s.is_expired_at(now))
    }
}

fn compare(order: SessionOrder, a: &Session, b: &Session) -> Ordering {
    let primary = order.key.value_of(a).cmp(&order.key.value_of(b));
    let primary = match order.direction {
        SortDirection::Asc => primary,
        SortDirection::Desc => primary.reverse(),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, data: &CreateSession, now: DateTime<Utc>) -> AppResult<Session> {
        let session = Session {
            id: SessionId::new(),
            user_id: data.user_id,
            device_info: data.device_info.clone(),
            expires_at: data.expires_at,
            created_at: now,
            updated_at: now,
        };
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_by_id(&self, id: SessionId, now: DateTime<Utc>) -> AppResult<Option<Session>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(&id)
            .filter(|s| !s.is_expired_at(now))
            .cloned())
    }

    async fn find_one(
        &self,
        filter: &SessionFilter,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(Self::live(&sessions, filter, now).next().cloned())
    }

    async fn paginate(
        &self,
        filter: &SessionFilter,
        page: &PageRequest,
        order: SessionOrder,
        now: DateTime<Utc>,
    ) -> AppResult<PageResponse<Session>> {
        let sessions = self.sessions.read().await;
        let mut matching: Vec<&Session> = Self::live(&sessions, filter, now).collect();
        matching.sort_by(|a, b| compare(order, a, b));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();

        Ok(PageResponse::new(items, page.page, page.page_size, total))
    }

    async fn update_expiry(
        &self,
        id: SessionId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Session>> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(&id).filter(|s| !s.is_expired_at(now)) else {
            return Ok(None);
        };
        session.expires_at = session.expires_at.max(expires_at);
        session.updated_at = now;
        Ok(Some(session.clone()))
    }

    async fn delete(&self, id: SessionId) -> AppResult<bool> {
        Ok(self.sessions.write().await.remove(&id).is_some())
    }

    async fn delete_by_user(&self, user_id: UserId) -> AppResult<Vec<SessionId>> {
        let mut sessions = self.sessions.write().await;
        let ids: Vec<SessionId> = sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.id)
            .collect();
        for id in &ids {
            sessions.remove(id);
        }
        Ok(ids)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::repositories::session::SessionSortKey;
    use tokenward_entity::session::DeviceInfo;

    fn new_session(user_id: UserId, expires_at: DateTime<Utc>) -> CreateSession {
        CreateSession {
            user_id,
            device_info: DeviceInfo::default(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_expired_records_are_invisible() {
        let repo = InMemorySessionRepository::new();
        let now = Utc::now();
        let session = repo
            .create(&new_session(UserId::new(), now + Duration::seconds(10)), now)
            .await
            .unwrap();

        assert!(repo.find_by_id(session.id, now).await.unwrap().is_some());
        let at_expiry = now + Duration::seconds(10);
        assert!(repo.find_by_id(session.id, at_expiry).await.unwrap().is_none());
        assert!(
            repo.update_expiry(session.id, at_expiry + Duration::hours(1), at_expiry)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_update_expiry_never_shortens() {
        let repo = InMemorySessionRepository::new();
        let now = Utc::now();
        let expires = now + Duration::hours(1);
        let session = repo
            .create(&new_session(UserId::new(), expires), now)
            .await
            .unwrap();

        let shorter = repo
            .update_expiry(session.id, now + Duration::minutes(5), now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(shorter.expires_at, expires);

        let longer = repo
            .update_expiry(session.id, expires + Duration::hours(1), now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(longer.expires_at, expires + Duration::hours(1));
    }

    #[tokio::test]
    async fn test_paginate_filters_and_orders() {
        let repo = InMemorySessionRepository::new();
        let user = UserId::new();
        let other = UserId::new();
        let base = Utc::now();

        for i in 0..5 {
            let at = base + Duration::seconds(i);
            repo.create(&new_session(user, at + Duration::days(1)), at)
                .await
                .unwrap();
        }
        repo.create(&new_session(other, base + Duration::days(1)), base)
            .await
            .unwrap();

        let page = repo
            .paginate(
                &SessionFilter::by_user(user),
                &PageRequest::new(1, 2),
                SessionOrder::default(),
                base + Duration::seconds(10),
            )
            .await
            .unwrap();
        assert_eq!(page.total_items, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 2);
        assert!(page.items[0].created_at > page.items[1].created_at);
        assert!(page.items.iter().all(|s| s.user_id == user));

        let oldest_first = repo
            .paginate(
                &SessionFilter::by_user(user),
                &PageRequest::new(1, 10),
                SessionOrder {
                    key: SessionSortKey::CreatedAt,
                    direction: SortDirection::Asc,
                },
                base + Duration::seconds(10),
            )
            .await
            .unwrap();
        assert_eq!(oldest_first.items[0].created_at, base);
    }

    #[tokio::test]
    async fn test_find_one_respects_owner() {
        let repo = InMemorySessionRepository::new();
        let now = Utc::now();
        let owner = UserId::new();
        let session = repo
            .create(&new_session(owner, now + Duration::hours(1)), now)
            .await
            .unwrap();

        let found = repo
            .find_one(&SessionFilter::owned(session.id, owner), now)
            .await
            .unwrap();
        assert_eq!(found.map(|s| s.id), Some(session.id));

        let stranger = repo
            .find_one(&SessionFilter::owned(session.id, UserId::new()), now)
            .await
            .unwrap();
        assert!(stranger.is_none());
    }

    #[tokio::test]
    async fn test_delete_expired_and_by_user() {
        let repo = InMemorySessionRepository::new();
        let now = Utc::now();
        let user = UserId::new();
        repo.create(&new_session(user, now - Duration::seconds(1)), now)
            .await
            .unwrap();
        repo.create(&new_session(user, now + Duration::hours(1)), now)
            .await
            .unwrap();
        repo.create(&new_session(UserId::new(), now + Duration::hours(1)), now)
            .await
            .unwrap();

        assert_eq!(repo.delete_expired(now).await.unwrap(), 1);
        assert_eq!(repo.delete_by_user(user).await.unwrap().len(), 1);
        assert_eq!(repo.len().await, 1);
    }
}
