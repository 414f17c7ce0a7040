use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Coarse authorization tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String, // argon2 PHC string
    pub role: Role,
    pub is_verified: bool,
    pub verification_token: Option<String>,
    pub verification_token_expires: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// True while an unexpired verification token is outstanding.
    pub fn has_pending_token(&self, now: OffsetDateTime) -> bool {
        matches!(
            (&self.verification_token, self.verification_token_expires),
            (Some(_), Some(expires)) if expires > now
        )
    }
}

/// One-time email verification token with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToken {
    pub token: String,
    pub expires: OffsetDateTime,
}

/// Input to `UserStore::create`; the password is still plaintext here.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub is_verified: bool,
    pub verification: Option<PendingToken>,
}

/// Column-level edit applied in one write; `None` leaves the column as stored.
/// Setting `is_verified` to `true` also drops any pending token.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_verified: Option<bool>,
}

/// Outcome of a single conditional verification write.
#[derive(Debug)]
pub enum ConsumeOutcome {
    Verified(User),
    Expired,
    NotFound,
}

/// Aggregate counts for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct UserStats {
    pub total_users: i64,
    pub verified_users: i64,
    pub admin_users: i64,
}
