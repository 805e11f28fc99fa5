//! User management endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::AppResult;

use super::{auth::UserInfo, AuthenticatedUser};

/// List every non-administrator account
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Readers and librarians", body = Vec<UserInfo>),
        (status = 403, description = "Insufficient rights")
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<UserInfo>>> {
    claims.require_manage_users()?;

    let users = state.services.users.list_readers().await?;
    Ok(Json(users.into_iter().map(UserInfo::from).collect()))
}

/// Block an active user or unblock a blocked one
#[utoipa::path(
    post,
    path = "/users/{id}/block",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User with the new blocked flag", body = UserInfo),
        (status = 403, description = "Insufficient rights"),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn toggle_block(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<UserInfo>> {
    claims.require_manage_users()?;

    let user = state.services.users.toggle_block(id).await?;
    Ok(Json(user.into()))
}
