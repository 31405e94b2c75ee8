use crate::state::AppState;
use axum::Router;

pub mod dto;
mod error;
pub mod handlers;
pub mod memory;
pub mod repo;
pub mod repo_types;
pub mod services;
mod validation;

pub use error::SyncError;
pub use services::UserSyncController;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::user_routes())
}
