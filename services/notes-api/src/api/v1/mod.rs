//! API v1 routes.

mod notes;
mod notifications;

use axum::Router;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/notes", notes::routes())
        .nest("/notifications", notifications::routes())
}
