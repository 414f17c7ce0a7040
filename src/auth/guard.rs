use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::{
        jwt::JwtKeys,
        repo::UserStore,
        repo_types::{Role, User},
    },
    error::AppError,
    state::AppState,
};

/// Resolves a request's bearer token to a user and checks roles.
pub struct AccessGuard<'a> {
    keys: JwtKeys,
    users: &'a dyn UserStore,
}

impl<'a> AccessGuard<'a> {
    pub fn new(keys: JwtKeys, users: &'a dyn UserStore) -> Self {
        Self { keys, users }
    }

    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(JwtKeys::from_ref(state), state.users.as_ref())
    }

    /// Fails closed on a missing header, another scheme or a bad token.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Uuid, AppError> {
        let header = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthenticated)?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(AppError::Unauthenticated)?;

        self.keys.verify(token.trim()).map_err(|e| {
            warn!(error = %e, "rejected session token");
            AppError::Unauthenticated
        })
    }

    /// Loads the current record so role changes apply on the next request.
    pub async fn authorize(&self, user_id: Uuid, required: Role) -> Result<User, AppError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        if required == Role::Admin && user.role != Role::Admin {
            warn!(user_id = %user.id, "admin route denied");
            return Err(AppError::Forbidden);
        }
        Ok(user)
    }

    pub async fn check(&self, headers: &HeaderMap, required: Role) -> Result<User, AppError> {
        let user_id = self.authenticate(headers)?;
        self.authorize(user_id, required).await
    }
}

/// Any signed-in user whose account still exists.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AccessGuard::from_state(state)
            .check(&parts.headers, Role::User)
            .await?;
        Ok(AuthUser(user))
    }
}

/// A signed-in user whose stored role is `admin`.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AccessGuard::from_state(state)
            .check(&parts.headers, Role::Admin)
            .await?;
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::NewUser;
    use axum::http::HeaderValue;

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    async fn seeded(state: &AppState, role: Role) -> User {
        state
            .users
            .create(NewUser {
                username: "chef1".into(),
                email: "a@b.com".into(),
                password: "secret1".into(),
                role,
                is_verified: true,
                verification: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthenticated() {
        let fake = AppState::fake();
        let guard = AccessGuard::from_state(&fake.state);

        assert!(matches!(
            guard.authenticate(&HeaderMap::new()),
            Err(AppError::Unauthenticated)
        ));

        let mut basic = HeaderMap::new();
        basic.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(guard.authenticate(&basic), Err(AppError::Unauthenticated)));

        assert!(matches!(
            guard.authenticate(&bearer("garbage")),
            Err(AppError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn role_is_reread_per_request() {
        let fake = AppState::fake();
        let mut user = seeded(&fake.state, Role::Admin).await;
        let token = JwtKeys::from_ref(&fake.state).issue(user.id).unwrap();
        let guard = AccessGuard::from_state(&fake.state);

        guard.check(&bearer(&token), Role::Admin).await.unwrap();

        user.role = Role::User;
        fake.state.users.save(&mut user).await.unwrap();
        assert!(matches!(
            guard.check(&bearer(&token), Role::Admin).await,
            Err(AppError::Forbidden)
        ));
        guard.check(&bearer(&token), Role::User).await.unwrap();
    }

    #[tokio::test]
    async fn deleted_user_is_unauthenticated() {
        let fake = AppState::fake();
        let user = seeded(&fake.state, Role::User).await;
        let token = JwtKeys::from_ref(&fake.state).issue(user.id).unwrap();
        assert!(fake.users.remove(user.id).await);

        let guard = AccessGuard::from_state(&fake.state);
        assert!(matches!(
            guard.check(&bearer(&token), Role::User).await,
            Err(AppError::Unauthenticated)
        ));
    }
}
