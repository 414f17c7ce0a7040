use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::password;
use crate::auth::repo_types::{
    ConsumeOutcome, NewUser, PendingToken, User, UserChanges, UserStats,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A username or email uniqueness constraint would be violated.
    #[error("username or email already taken")]
    Duplicate,
    #[error("user no longer exists")]
    Missing,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate,
            _ => StoreError::Backend(e.into()),
        }
    }
}

/// Persistence for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError>;
    async fn find_by_verification_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    /// Insert a record whose password has already been hashed.
    async fn insert(&self, new: NewUser, password_hash: String) -> Result<User, StoreError>;

    /// Write every mutable field of `user` back to the store.
    async fn persist(&self, user: &User) -> Result<(), StoreError>;

    /// Apply only the columns set in `changes`, leaving concurrent edits to
    /// other columns intact.
    async fn apply_changes(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError>;

    /// Match a live token and mark its owner verified in one conditional write.
    async fn consume_verification_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<ConsumeOutcome, StoreError>;

    /// Replace the pending token of an unverified account in one conditional
    /// write. `Ok(None)` means the account is already verified.
    async fn reissue_verification_token(
        &self,
        id: Uuid,
        pending: PendingToken,
    ) -> Result<Option<User>, StoreError>;

    /// Newest first; `None` lists everyone.
    async fn list_users(&self, limit: Option<i64>) -> Result<Vec<User>, StoreError>;
    async fn stats(&self) -> Result<UserStats, StoreError>;

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let hash = password::hash_password(&new.password)?;
        self.insert(new, hash).await
    }

    async fn save(&self, user: &mut User) -> Result<(), StoreError> {
        user.updated_at = OffsetDateTime::now_utc();
        self.persist(user).await
    }

    fn verify_password(&self, user: &User, plain: &str) -> Result<bool, StoreError> {
        Ok(password::verify_password(plain, &user.password_hash)?)
    }
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_verified,
                   verification_token, verification_token_expires, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_verified,
                   verification_token, verification_token_expires, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_verified,
                   verification_token, verification_token_expires, created_at, updated_at
            FROM users
            WHERE email = $1 OR username = $2
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_verification_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_verified,
                   verification_token, verification_token_expires, created_at, updated_at
            FROM users
            WHERE verification_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, new: NewUser, password_hash: String) -> Result<User, StoreError> {
        let (token, expires) = match new.verification {
            Some(p) => (Some(p.token), Some(p.expires)),
            None => (None, None),
        };
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, is_verified,
                               verification_token, verification_token_expires)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, username, email, password_hash, role, is_verified,
                      verification_token, verification_token_expires, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.email)
        .bind(&password_hash)
        .bind(new.role)
        .bind(new.is_verified)
        .bind(token)
        .bind(expires)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn persist(&self, user: &User) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET username = $2, email = $3, password_hash = $4, role = $5,
                   is_verified = $6, verification_token = $7,
                   verification_token_expires = $8, updated_at = $9
             WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.is_verified)
        .bind(&user.verification_token)
        .bind(user.verification_token_expires)
        .bind(user.updated_at)
        .execute(&self.db)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }

    async fn apply_changes(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET username = COALESCE($2, username),
                   email = COALESCE($3, email),
                   role = COALESCE($4, role),
                   is_verified = COALESCE($5, is_verified),
                   verification_token = CASE WHEN $5 THEN NULL ELSE verification_token END,
                   verification_token_expires =
                       CASE WHEN $5 THEN NULL ELSE verification_token_expires END,
                   updated_at = now()
             WHERE id = $1
            RETURNING id, username, email, password_hash, role, is_verified,
                      verification_token, verification_token_expires, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.username)
        .bind(changes.email)
        .bind(changes.role)
        .bind(changes.is_verified)
        .fetch_optional(&self.db)
        .await?;
        user.ok_or(StoreError::Missing)
    }

    async fn consume_verification_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<ConsumeOutcome, StoreError> {
        let verified = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET is_verified = TRUE, verification_token = NULL,
                   verification_token_expires = NULL, updated_at = $2
             WHERE verification_token = $1 AND verification_token_expires > $2
            RETURNING id, username, email, password_hash, role, is_verified,
                      verification_token, verification_token_expires, created_at, updated_at
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;

        if let Some(user) = verified {
            return Ok(ConsumeOutcome::Verified(user));
        }

        let stale = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(SELECT 1 FROM users WHERE verification_token = $1)"#,
        )
        .bind(token)
        .fetch_one(&self.db)
        .await?;

        Ok(if stale {
            ConsumeOutcome::Expired
        } else {
            ConsumeOutcome::NotFound
        })
    }

    async fn reissue_verification_token(
        &self,
        id: Uuid,
        pending: PendingToken,
    ) -> Result<Option<User>, StoreError> {
        let issued = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET verification_token = $2, verification_token_expires = $3, updated_at = now()
             WHERE id = $1 AND NOT is_verified
            RETURNING id, username, email, password_hash, role, is_verified,
                      verification_token, verification_token_expires, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&pending.token)
        .bind(pending.expires)
        .fetch_optional(&self.db)
        .await?;

        if issued.is_some() {
            return Ok(issued);
        }

        let exists =
            sqlx::query_scalar::<_, bool>(r#"SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)"#)
                .bind(id)
                .fetch_one(&self.db)
                .await?;
        if exists {
            Ok(None)
        } else {
            Err(StoreError::Missing)
        }
    }

    async fn list_users(&self, limit: Option<i64>) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_verified,
                   verification_token, verification_token_expires, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn stats(&self) -> Result<UserStats, StoreError> {
        let stats = sqlx::query_as::<_, UserStats>(
            r#"
            SELECT COUNT(*) AS total_users,
                   COUNT(*) FILTER (WHERE is_verified) AS verified_users,
                   COUNT(*) FILTER (WHERE role = 'admin') AS admin_users
            FROM users
            "#,
        )
        .fetch_one(&self.db)
        .await?;
        Ok(stats)
    }
}
