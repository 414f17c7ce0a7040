//! In-process user store.
//!
//! Used when no `DATABASE_URL` is configured and by the test suite. All
//! operations take the same lock, so the verification match-and-update is a
//! single critical section just like the conditional `UPDATE` in Postgres.

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::repo::{StoreError, UserStore};
use crate::auth::repo_types::{
    ConsumeOutcome, NewUser, PendingToken, Role, User, UserChanges, UserStats,
};

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the record; the content store calls this inside its own lock.
    pub async fn remove(&self, id: Uuid) -> bool {
        let mut users = self.users.lock().await;
        let before = users.len();
        users.retain(|u| u.id != id);
        users.len() != before
    }
}

fn collides(users: &[User], id: Option<Uuid>, email: &str, username: &str) -> bool {
    users
        .iter()
        .filter(|u| Some(u.id) != id)
        .any(|u| u.email == email || u.username == username)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users
            .iter()
            .find(|u| u.email == email || u.username == username)
            .cloned())
    }

    async fn find_by_verification_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users
            .iter()
            .find(|u| u.verification_token.as_deref() == Some(token))
            .cloned())
    }

    async fn insert(&self, new: NewUser, password_hash: String) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        if collides(&users, None, &new.email, &new.username) {
            return Err(StoreError::Duplicate);
        }
        let now = OffsetDateTime::now_utc();
        let (verification_token, verification_token_expires) = match new.verification {
            Some(p) => (Some(p.token), Some(p.expires)),
            None => (None, None),
        };
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash,
            role: new.role,
            is_verified: new.is_verified,
            verification_token,
            verification_token_expires,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn persist(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        if collides(&users, Some(user.id), &user.email, &user.username) {
            return Err(StoreError::Duplicate);
        }
        let slot = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(StoreError::Missing)?;
        *slot = user.clone();
        Ok(())
    }

    async fn apply_changes(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        let current = users
            .iter()
            .find(|u| u.id == id)
            .ok_or(StoreError::Missing)?;
        let email = changes.email.as_deref().unwrap_or(&current.email);
        let username = changes.username.as_deref().unwrap_or(&current.username);
        if collides(&users, Some(id), email, username) {
            return Err(StoreError::Duplicate);
        }

        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::Missing)?;
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(is_verified) = changes.is_verified {
            user.is_verified = is_verified;
            if is_verified {
                user.verification_token = None;
                user.verification_token_expires = None;
            }
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn consume_verification_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut users = self.users.lock().await;
        let Some(user) = users
            .iter_mut()
            .find(|u| u.verification_token.as_deref() == Some(token))
        else {
            return Ok(ConsumeOutcome::NotFound);
        };

        if !user.has_pending_token(now) {
            return Ok(ConsumeOutcome::Expired);
        }

        user.is_verified = true;
        user.verification_token = None;
        user.verification_token_expires = None;
        user.updated_at = now;
        Ok(ConsumeOutcome::Verified(user.clone()))
    }

    async fn reissue_verification_token(
        &self,
        id: Uuid,
        pending: PendingToken,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.lock().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::Missing)?;
        if user.is_verified {
            return Ok(None);
        }
        user.verification_token = Some(pending.token);
        user.verification_token_expires = Some(pending.expires);
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn list_users(&self, limit: Option<i64>) -> Result<Vec<User>, StoreError> {
        let users = self.users.lock().await;
        let mut rows: Vec<User> = users.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            rows.truncate(limit.max(0) as usize);
        }
        Ok(rows)
    }

    async fn stats(&self) -> Result<UserStats, StoreError> {
        let users = self.users.lock().await;
        Ok(UserStats {
            total_users: users.len() as i64,
            verified_users: users.iter().filter(|u| u.is_verified).count() as i64,
            admin_users: users.iter().filter(|u| u.role == Role::Admin).count() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::PendingToken;
    use time::Duration;

    fn new_user(username: &str, email: &str, token: Option<PendingToken>) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password: "secret1".into(),
            role: Role::User,
            is_verified: false,
            verification: token,
        }
    }

    #[tokio::test]
    async fn create_hashes_password_and_rejects_duplicates() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("chef1", "a@b.com", None)).await.unwrap();
        assert_ne!(user.password_hash, "secret1");
        assert!(store.verify_password(&user, "secret1").unwrap());
        assert!(!store.verify_password(&user, "secret2").unwrap());

        let same_email = store.create(new_user("chef2", "a@b.com", None)).await;
        assert!(matches!(same_email, Err(StoreError::Duplicate)));
        let same_name = store.create(new_user("chef1", "c@d.com", None)).await;
        assert!(matches!(same_name, Err(StoreError::Duplicate)));
        store.create(new_user("chef3", "e@f.com", None)).await.unwrap();
    }

    #[tokio::test]
    async fn save_refreshes_updated_at() {
        let store = MemoryUserStore::new();
        let mut user = store.create(new_user("chef1", "a@b.com", None)).await.unwrap();
        let before = user.updated_at;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        user.role = Role::Admin;
        store.save(&mut user).await.unwrap();

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Admin);
        assert!(stored.updated_at > before);
        assert_eq!(stored.created_at, user.created_at);
    }

    #[tokio::test]
    async fn save_rejects_collision_with_other_user() {
        let store = MemoryUserStore::new();
        store.create(new_user("chef1", "a@b.com", None)).await.unwrap();
        let mut other = store.create(new_user("chef2", "c@d.com", None)).await.unwrap();
        other.email = "a@b.com".into();
        assert!(matches!(store.save(&mut other).await, Err(StoreError::Duplicate)));
    }

    #[tokio::test]
    async fn consume_distinguishes_live_expired_and_unknown() {
        let store = MemoryUserStore::new();
        let now = OffsetDateTime::now_utc();
        store
            .create(new_user(
                "live",
                "live@b.com",
                Some(PendingToken { token: "t-live".into(), expires: now + Duration::hours(1) }),
            ))
            .await
            .unwrap();
        store
            .create(new_user(
                "stale",
                "stale@b.com",
                Some(PendingToken { token: "t-stale".into(), expires: now - Duration::hours(1) }),
            ))
            .await
            .unwrap();

        let owner = store.find_by_verification_token("t-live").await.unwrap().unwrap();
        assert_eq!(owner.username, "live");

        assert!(matches!(
            store.consume_verification_token("t-stale", now).await.unwrap(),
            ConsumeOutcome::Expired
        ));
        assert!(matches!(
            store.consume_verification_token("nope", now).await.unwrap(),
            ConsumeOutcome::NotFound
        ));
        match store.consume_verification_token("t-live", now).await.unwrap() {
            ConsumeOutcome::Verified(u) => {
                assert!(u.is_verified);
                assert!(u.verification_token.is_none());
                assert!(u.verification_token_expires.is_none());
            }
            other => panic!("expected Verified, got {other:?}"),
        }
        assert!(matches!(
            store.consume_verification_token("t-live", now).await.unwrap(),
            ConsumeOutcome::NotFound
        ));
        assert!(store.find_by_verification_token("t-live").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stats_and_listing_order() {
        let store = MemoryUserStore::new();
        store.create(new_user("first", "1@b.com", None)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let mut second = store.create(new_user("second", "2@b.com", None)).await.unwrap();
        second.is_verified = true;
        second.role = Role::Admin;
        store.save(&mut second).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(
            stats,
            UserStats { total_users: 2, verified_users: 1, admin_users: 1 }
        );

        let listed = store.list_users(Some(1)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].username, "second");

        assert!(store.remove(second.id).await);
        assert!(!store.remove(second.id).await);
    }

    #[tokio::test]
    async fn reissue_only_touches_unverified_accounts() {
        let store = MemoryUserStore::new();
        let now = OffsetDateTime::now_utc();
        let user = store
            .create(new_user(
                "chef1",
                "a@b.com",
                Some(PendingToken { token: "t-1".into(), expires: now + Duration::hours(1) }),
            ))
            .await
            .unwrap();

        let fresh = PendingToken { token: "t-2".into(), expires: now + Duration::hours(1) };
        let issued = store
            .reissue_verification_token(user.id, fresh)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(issued.verification_token.as_deref(), Some("t-2"));

        store.consume_verification_token("t-2", now).await.unwrap();
        let late = PendingToken { token: "t-3".into(), expires: now + Duration::hours(1) };
        assert!(store
            .reissue_verification_token(user.id, late)
            .await
            .unwrap()
            .is_none());

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.is_verified);
        assert!(stored.verification_token.is_none());

        let ghost = PendingToken { token: "t-4".into(), expires: now + Duration::hours(1) };
        assert!(matches!(
            store.reissue_verification_token(Uuid::new_v4(), ghost).await,
            Err(StoreError::Missing)
        ));
    }

    #[tokio::test]
    async fn apply_changes_keeps_concurrent_verification() {
        let store = MemoryUserStore::new();
        let now = OffsetDateTime::now_utc();
        let user = store
            .create(new_user(
                "chef1",
                "a@b.com",
                Some(PendingToken { token: "t-1".into(), expires: now + Duration::hours(1) }),
            ))
            .await
            .unwrap();
        store.create(new_user("taken", "t@b.com", None)).await.unwrap();

        store.consume_verification_token("t-1", now).await.unwrap();
        let promoted = store
            .apply_changes(
                user.id,
                UserChanges {
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::Admin);
        assert!(promoted.is_verified);
        assert!(promoted.verification_token.is_none());

        let clash = store
            .apply_changes(
                user.id,
                UserChanges {
                    email: Some("t@b.com".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(clash, Err(StoreError::Duplicate)));
    }
}
