use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{NoticeResponse, UserFields};
use super::SyncError;
use super::repo_types::User;
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(show_user)
                .put(update_user)
                .patch(update_user)
                .delete(destroy_user),
        )
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, SyncError> {
    let users = state.users.list_and_reconcile().await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn show_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, SyncError> {
    Ok(Json(state.users.get_user(id).await?))
}

#[instrument(skip(state, fields))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(fields): Json<UserFields>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<User>), SyncError> {
    let user = state.users.create_user(fields).await?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/users/{}", user.id))],
        Json(user),
    ))
}

#[instrument(skip(state, fields))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(fields): Json<UserFields>,
) -> Result<Json<User>, SyncError> {
    Ok(Json(state.users.update_user(id, fields).await?))
}

#[instrument(skip(state))]
pub async fn destroy_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<NoticeResponse>, SyncError> {
    let notice = state.users.delete_user(id).await?;
    Ok(Json(NoticeResponse { notice }))
}
