//! Admin API: operator surface for incidents and the block lists.
//!
//! Status transitions and blacklist maintenance are deliberately human
//! actions; detectors never call these endpoints.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/incidents", get(list_incidents))
        .route("/admin/incidents/{id}/status", post(update_incident))
        .route("/admin/blocks", get(list_blocks))
        .route("/admin/blocks/{ip}", delete(unblock_ip))
        .route("/admin/blacklist", get(list_blacklist).post(add_blacklist))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
