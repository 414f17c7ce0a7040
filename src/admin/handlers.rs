use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    admin::{
        dto::{
            CreateUserRequest, DeleteRecipeResponse, DeleteUserResponse, RecipeEnvelope,
            RecipeListResponse, RecipeView, StatsResponse, UpdateUserRequest, UserEnvelope,
            UserListResponse,
        },
        services,
    },
    auth::{dto::PublicUser, guard::AdminUser},
    content::RecipeChanges,
    error::AppError,
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users).post(create_user))
        .route(
            "/admin/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/admin/recipes", get(list_recipes))
        .route(
            "/admin/recipes/:id",
            put(update_recipe).delete(delete_recipe),
        )
        .route("/admin/stats", get(stats))
}

#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<UserListResponse>, AppError> {
    let users: Vec<PublicUser> = services::list_users(&state)
        .await?
        .iter()
        .map(PublicUser::from)
        .collect();
    Ok(Json(UserListResponse {
        count: users.len(),
        users,
    }))
}

#[instrument(skip(state, _admin))]
pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, AppError> {
    let user = services::get_user(&state, id).await?;
    Ok(Json(PublicUser::from(&user)))
}

#[instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserEnvelope>), AppError> {
    let user = services::create_user(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope {
            message: "User created successfully".into(),
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip(state, _admin, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserEnvelope>, AppError> {
    let user = services::update_user(&state, id, payload).await?;
    Ok(Json(UserEnvelope {
        message: "User updated successfully".into(),
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteUserResponse>, AppError> {
    let deleted = services::delete_user(&state, &admin, id).await?;
    Ok(Json(DeleteUserResponse {
        message: "User and their recipes deleted successfully".into(),
        deleted_recipes: deleted.recipes,
        deleted_comments: deleted.comments,
    }))
}

#[instrument(skip_all)]
pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<StatsResponse>, AppError> {
    let overview = services::overview(&state).await?;
    Ok(Json(StatsResponse {
        stats: overview.stats,
        recent_users: overview.recent_users.iter().map(PublicUser::from).collect(),
        recent_recipes: overview.recent_recipes.into_iter().map(RecipeView::from).collect(),
    }))
}

#[instrument(skip_all)]
pub async fn list_recipes(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<RecipeListResponse>, AppError> {
    let recipes: Vec<RecipeView> = services::list_recipes(&state)
        .await?
        .into_iter()
        .map(RecipeView::from)
        .collect();
    Ok(Json(RecipeListResponse {
        count: recipes.len(),
        recipes,
    }))
}

#[instrument(skip(state, _admin, payload))]
pub async fn update_recipe(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecipeChanges>,
) -> Result<Json<RecipeEnvelope>, AppError> {
    let recipe = services::update_recipe(&state, id, payload).await?;
    Ok(Json(RecipeEnvelope {
        message: "Recipe updated successfully".into(),
        recipe: RecipeView::from(recipe),
    }))
}

#[instrument(skip(state, admin))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteRecipeResponse>, AppError> {
    let deleted_comments = services::delete_recipe(&state, &admin, id).await?;
    Ok(Json(DeleteRecipeResponse {
        message: "Recipe deleted successfully".into(),
        deleted_comments,
    }))
}
