use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password,
        repo::UserStore,
        repo_types::{NewUser, Role, User},
        verification,
    },
    error::{AppError, FieldError},
    state::AppState,
};

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    // Compared against when the email is unknown, so both login failures cost one argon2 run.
    static ref DUMMY_HASH: Option<String> = password::hash_password("cookit-login-padding").ok();
}

fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn check_username(username: &str, errors: &mut Vec<FieldError>) {
    if username.chars().count() < MIN_USERNAME_LEN {
        errors.push(FieldError {
            field: "username",
            message: "Username must be at least 3 characters",
        });
    }
}

pub(crate) fn check_email(email: &str, errors: &mut Vec<FieldError>) {
    if !is_valid_email(email) {
        errors.push(FieldError {
            field: "email",
            message: "Please enter a valid email",
        });
    }
}

fn check_password(password: &str, errors: &mut Vec<FieldError>) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError {
            field: "password",
            message: "Password must be at least 6 characters",
        });
    }
}

pub(crate) fn into_result(errors: Vec<FieldError>) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Collects every violated rule for a new account.
pub(crate) fn validate_account(username: &str, email: &str, password: &str) -> Result<(), AppError> {
    let mut errors = Vec::new();
    check_username(username, &mut errors);
    check_email(email, &mut errors);
    check_password(password, &mut errors);
    into_result(errors)
}

/// Creates an unverified account, mails its verification token and returns
/// a session token right away.
pub async fn register(st: &AppState, req: RegisterRequest) -> Result<(User, String), AppError> {
    let username = req.username.trim().to_string();
    let email = normalize_email(&req.email);
    validate_account(&username, &email, &req.password)?;

    if st
        .users
        .find_by_email_or_username(&email, &username)
        .await?
        .is_some()
    {
        warn!(%email, %username, "registration collides with existing user");
        return Err(AppError::DuplicateIdentity);
    }

    let user = st
        .users
        .create(NewUser {
            username,
            email,
            password: req.password,
            role: Role::User,
            is_verified: false,
            verification: Some(verification::pending_token(st)),
        })
        .await?;

    verification::send_verification_email(st, &user).await;

    let token = JwtKeys::from_ref(st).issue(user.id)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((user, token))
}

pub async fn login(st: &AppState, req: LoginRequest) -> Result<(User, String), AppError> {
    let email = normalize_email(&req.email);
    let mut errors = Vec::new();
    check_email(&email, &mut errors);
    if req.password.is_empty() {
        errors.push(FieldError {
            field: "password",
            message: "Password is required",
        });
    }
    into_result(errors)?;

    let Some(user) = st.users.find_by_email(&email).await? else {
        // Result is irrelevant; the argon2 run keeps this path as slow as a wrong password.
        if let Some(hash) = DUMMY_HASH.as_deref() {
            let _timing_only = password::verify_password(&req.password, hash);
        }
        warn!(%email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !st.users.verify_password(&user, &req.password)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    if !user.is_verified {
        warn!(user_id = %user.id, "login before email verification");
        return Err(AppError::EmailNotVerified);
    }

    let token = JwtKeys::from_ref(st).issue(user.id)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((user, token))
}

pub async fn resend_verification(st: &AppState, email: &str) -> Result<(), AppError> {
    let email = normalize_email(email);
    let mut errors = Vec::new();
    check_email(&email, &mut errors);
    into_result(errors)?;

    let user = st
        .users
        .find_by_email(&email)
        .await?
        .ok_or(AppError::NotFound)?;

    if user.is_verified {
        return Err(AppError::AlreadyVerified);
    }

    verification::request_verification(st, &user).await?;
    Ok(())
}

pub async fn verify_email(st: &AppState, token: &str) -> Result<User, AppError> {
    verification::consume(st, token).await
}
