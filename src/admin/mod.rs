//! Admin API.
//!
//! Served on its own listener; every route requires
//! `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::AppState;

pub use error::AdminError;

pub fn setup_admin_router(state: AppState) -> Router {
    let api_key: Arc<str> = Arc::from(state.config.admin.api_key.as_str());

    Router::new()
        .route("/admin/status", get(get_status))
        .route(
            "/admin/hotfixes",
            get(list_hotfixes).put(upsert_hotfixes).delete(delete_hotfix),
        )
        .route("/admin/hotfixes/import/{file}", post(import_hotfixes))
        .route("/admin/hotfixes/files", get(list_hotfix_files))
        .route("/admin/hotfixes/files/{file}", get(export_hotfix_file))
        .route("/admin/cache/invalidate", post(invalidate_cache))
        .route("/admin/cache/clear", post(clear_cache))
        .route("/admin/overrides", get(list_overrides))
        .route(
            "/admin/overrides/{*path}",
            put(set_override).delete(delete_override),
        )
        .layer(middleware::from_fn_with_state(api_key, admin_auth_middleware))
        .with_state(state)
}
