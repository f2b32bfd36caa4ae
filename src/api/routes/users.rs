//! User Routes
//!
//! CRUD endpoints for user records.
//!
//! - GET /api/users - List users (filters + limit/offset)
//! - POST /api/user - Create a user
//! - GET /api/user/:id - Get a user
//! - PUT /api/user/:id - Update a user
//! - DELETE /api/user/:id - Delete a user

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::ListUsersQuery;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::users::{NewUser, UpdateUser, User};

/// GET /api/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<Vec<User>>> {
    let filter = query.into_filter();
    tracing::debug!(limit = filter.limit, offset = filter.offset, "Listing users");

    let users = state.users.get_users(&filter).await?;
    Ok(Json(users))
}

/// POST /api/user
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let Json(new_user) = payload.map_err(invalid_payload)?;

    let user = state.users.new_user(new_user).await?;
    tracing::info!(user_id = %user.id, "Created user");

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/user/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.get_user(&id).await?))
}

/// PUT /api/user/:id
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUser>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let Json(update) = payload.map_err(invalid_payload)?;

    let user = state.users.update_user(&id, update).await?;
    Ok(Json(user))
}

/// DELETE /api/user/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.users.remove_user(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn invalid_payload(rejection: JsonRejection) -> ApiError {
    ApiError::Validation(format!("Invalid request payload: {}", rejection.body_text()))
}
