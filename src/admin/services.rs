use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    admin::dto::{CreateUserRequest, PlatformStats, UpdateUserRequest},
    auth::{
        repo::UserStore,
        repo_types::{NewUser, User, UserChanges},
        services::{check_email, check_username, into_result, normalize_email, validate_account},
        verification,
    },
    content::{ContentStore, DeletedContent, RecipeChanges, RecipeListing},
    error::{AppError, FieldError},
    state::AppState,
};

pub const RECENT_USERS: i64 = 5;
pub const RECENT_RECIPES: i64 = 5;

const MIN_TITLE_LEN: usize = 3;
const MIN_DESCRIPTION_LEN: usize = 10;

pub struct Overview {
    pub stats: PlatformStats,
    pub recent_users: Vec<User>,
    pub recent_recipes: Vec<RecipeListing>,
}

pub async fn list_users(st: &AppState) -> Result<Vec<User>, AppError> {
    Ok(st.users.list_users(None).await?)
}

pub async fn get_user(st: &AppState, id: Uuid) -> Result<User, AppError> {
    st.users.find_by_id(id).await?.ok_or(AppError::NotFound)
}

/// Creates an account on someone's behalf. Unverified accounts get a token
/// and an email; pre-verified ones get neither.
pub async fn create_user(st: &AppState, req: CreateUserRequest) -> Result<User, AppError> {
    let username = req.username.trim().to_string();
    let email = normalize_email(&req.email);
    validate_account(&username, &email, &req.password)?;

    if st
        .users
        .find_by_email_or_username(&email, &username)
        .await?
        .is_some()
    {
        return Err(AppError::DuplicateIdentity);
    }

    let is_verified = req.is_verified.unwrap_or(false);
    let user = st
        .users
        .create(NewUser {
            username,
            email,
            password: req.password,
            role: req.role.unwrap_or_default(),
            is_verified,
            verification: (!is_verified).then(|| verification::pending_token(st)),
        })
        .await?;

    verification::send_verification_email(st, &user).await;
    info!(user_id = %user.id, role = ?user.role, "user created by admin");
    Ok(user)
}

/// Writes only the fields present in `req`.
pub async fn update_user(
    st: &AppState,
    id: Uuid,
    req: UpdateUserRequest,
) -> Result<User, AppError> {
    let username = req.username.map(|u| u.trim().to_string());
    let email = req.email.as_deref().map(normalize_email);

    let mut errors = Vec::new();
    if let Some(username) = &username {
        check_username(username, &mut errors);
    }
    if let Some(email) = &email {
        check_email(email, &mut errors);
    }
    into_result(errors)?;

    let user = st
        .users
        .apply_changes(
            id,
            UserChanges {
                username,
                email,
                role: req.role,
                is_verified: req.is_verified,
            },
        )
        .await?;
    info!(user_id = %user.id, role = ?user.role, verified = user.is_verified, "user updated by admin");
    Ok(user)
}

/// Removes `id` and everything they authored. Admins cannot remove themselves.
pub async fn delete_user(
    st: &AppState,
    acting: &User,
    id: Uuid,
) -> Result<DeletedContent, AppError> {
    if id == acting.id {
        warn!(user_id = %acting.id, "admin attempted self-deletion");
        return Err(AppError::CannotDeleteSelf);
    }

    let deleted = st
        .content
        .delete_user_cascade(id)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(
        user_id = %id,
        by = %acting.id,
        recipes = deleted.recipes,
        comments = deleted.comments,
        "user deleted"
    );
    Ok(deleted)
}

pub async fn list_recipes(st: &AppState) -> Result<Vec<RecipeListing>, AppError> {
    Ok(st.content.list_recipes(None).await?)
}

fn validate_recipe(changes: &RecipeChanges) -> Result<(), AppError> {
    let mut errors = Vec::new();
    if matches!(&changes.title, Some(t) if t.trim().chars().count() < MIN_TITLE_LEN) {
        errors.push(FieldError {
            field: "title",
            message: "Title must be at least 3 characters long",
        });
    }
    if matches!(&changes.description, Some(d) if d.trim().chars().count() < MIN_DESCRIPTION_LEN) {
        errors.push(FieldError {
            field: "description",
            message: "Description must be at least 10 characters long",
        });
    }
    let blank = |items: &Option<Vec<String>>| {
        matches!(items, Some(v) if v.is_empty() || v.iter().any(|i| i.trim().is_empty()))
    };
    if blank(&changes.ingredients) {
        errors.push(FieldError {
            field: "ingredients",
            message: "Ingredients must be a non-empty list without blank entries",
        });
    }
    if blank(&changes.instructions) {
        errors.push(FieldError {
            field: "instructions",
            message: "Instructions must be a non-empty list without blank entries",
        });
    }
    if matches!(changes.prep_time, Some(m) if m < 1) {
        errors.push(FieldError {
            field: "prepTime",
            message: "Preparation time must be at least 1 minute",
        });
    }
    if matches!(changes.cook_time, Some(m) if m < 1) {
        errors.push(FieldError {
            field: "cookTime",
            message: "Cooking time must be at least 1 minute",
        });
    }
    if matches!(changes.servings, Some(n) if n < 1) {
        errors.push(FieldError {
            field: "servings",
            message: "Servings must be at least 1",
        });
    }
    into_result(errors)
}

pub async fn update_recipe(
    st: &AppState,
    id: Uuid,
    mut changes: RecipeChanges,
) -> Result<RecipeListing, AppError> {
    validate_recipe(&changes)?;
    changes.title = changes.title.map(|t| t.trim().to_string());

    let recipe = st
        .content
        .update_recipe(id, changes)
        .await?
        .ok_or(AppError::RecipeNotFound)?;
    info!(recipe_id = %id, "recipe updated by admin");
    Ok(recipe)
}

/// Returns how many comments went with the recipe.
pub async fn delete_recipe(st: &AppState, acting: &User, id: Uuid) -> Result<u64, AppError> {
    let comments = st
        .content
        .delete_recipe(id)
        .await?
        .ok_or(AppError::RecipeNotFound)?;
    info!(recipe_id = %id, by = %acting.id, comments, "recipe deleted by admin");
    Ok(comments)
}

pub async fn overview(st: &AppState) -> Result<Overview, AppError> {
    let counts = st.users.stats().await?;
    let total_recipes = st.content.count_recipes().await?;
    Ok(Overview {
        stats: PlatformStats {
            total_users: counts.total_users,
            verified_users: counts.verified_users,
            unverified_users: counts.total_users - counts.verified_users,
            admin_users: counts.admin_users,
            total_recipes,
        },
        recent_users: st.users.list_users(Some(RECENT_USERS)).await?,
        recent_recipes: st.content.list_recipes(Some(RECENT_RECIPES)).await?,
    })
}
