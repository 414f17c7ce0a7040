//! Email verification tokens.
//!
//! An account is `Unverified` until a live token is consumed, then `Verified`
//! for good. Issuing a token overwrites any outstanding one, and consuming
//! clears it, so every token works at most once.

use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use crate::{
    auth::{
        repo::UserStore,
        repo_types::{ConsumeOutcome, PendingToken, User},
    },
    error::AppError,
    notify,
    state::AppState,
};

/// Raw token length before hex encoding.
const TOKEN_BYTES: usize = 32;

pub fn new_pending_token(ttl: Duration) -> PendingToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    PendingToken {
        token: hex::encode(bytes),
        expires: OffsetDateTime::now_utc() + ttl,
    }
}

pub fn pending_token(st: &AppState) -> PendingToken {
    new_pending_token(Duration::hours(st.config.verification_ttl_hours))
}

/// Replaces any outstanding token on `user` and mails the new one. The store
/// refuses the write once the account is verified, however stale `user` is.
pub async fn request_verification(st: &AppState, user: &User) -> Result<User, AppError> {
    let Some(user) = st
        .users
        .reissue_verification_token(user.id, pending_token(st))
        .await?
    else {
        warn!(user_id = %user.id, "verification requested for verified account");
        return Err(AppError::AlreadyVerified);
    };

    info!(user_id = %user.id, "verification token issued");
    send_verification_email(st, &user).await;
    Ok(user)
}

/// Mails the user's current token, if any.
pub async fn send_verification_email(st: &AppState, user: &User) {
    let Some(token) = user.verification_token.as_deref() else {
        return;
    };
    notify::deliver(
        "verification",
        &user.email,
        st.notify_timeout(),
        st.notifier
            .send_verification_email(&user.email, &user.username, token),
    )
    .await;
}

/// Marks the owner of `token` verified.
pub async fn consume(st: &AppState, token: &str) -> Result<User, AppError> {
    let outcome = st
        .users
        .consume_verification_token(token, OffsetDateTime::now_utc())
        .await?;

    let user = match outcome {
        ConsumeOutcome::Verified(user) => user,
        ConsumeOutcome::Expired => {
            warn!("verification token expired");
            return Err(AppError::TokenExpired);
        }
        ConsumeOutcome::NotFound => {
            warn!("verification token matches no account");
            return Err(AppError::TokenNotFound);
        }
    };

    info!(user_id = %user.id, email = %user.email, "email verified");
    notify::deliver(
        "welcome",
        &user.email,
        st.notify_timeout(),
        st.notifier.send_welcome_email(&user.email, &user.username),
    )
    .await;
    Ok(user)
}
