use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{Role, User};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            role: u.role,
            is_verified: u.is_verified,
            created_at: u.created_at,
        }
    }
}

/// Response returned after register or login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: PublicUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub message: String,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_response_is_flat_camel_case() {
        let response = AuthResponse {
            user: PublicUser {
                id: Uuid::new_v4(),
                username: "chef1".into(),
                email: "a@b.com".into(),
                role: Role::User,
                is_verified: false,
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            message: None,
            token: "t".into(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["username"], "chef1");
        assert_eq!(json["role"], "user");
        assert_eq!(json["isVerified"], false);
        assert_eq!(json["createdAt"], "1970-01-01T00:00:00Z");
        assert_eq!(json["token"], "t");
        assert!(json.get("message").is_none());
        assert!(json.get("passwordHash").is_none());
    }
}
