use crate::{
    AppState,
    handlers::{permissions, users},
};
use axum::{
    Router,
    routing::{patch, post, put},
};

/// Admin Router
///
/// User and permission administration. Mounted under `/api/admin`; each handler checks
/// `manage_users` or `manage_permissions` for the caller's organization.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /organizations/{org_id}/users
        .route("/organizations/{org_id}/users", post(users::create_user))
        // PATCH /organizations/{org_id}/users/{user_id}/manager
        // Re-parents a user; cycles are rejected.
        .route(
            "/organizations/{org_id}/users/{user_id}/manager",
            patch(users::set_manager),
        )
        // PUT /organizations/{org_id}/permissions/{role}
        .route(
            "/organizations/{org_id}/permissions/{role}",
            put(permissions::update_role_permissions),
        )
}
