use axum::{
    Json,
    extract::{Path, State},
};
use std::collections::HashMap;
use uuid::Uuid;

use super::{ensure_same_org, require_permission};
use crate::{
    AppState,
    access::{self, Permission, Role},
    auth::AuthUser,
    error::{AppError, Result},
    models::{RolePermissions, UpdateRolePermissionsRequest},
};

fn matrix_row(role: Role, overridden: Option<&[Permission]>) -> RolePermissions {
    RolePermissions {
        role,
        permissions: access::effective_permissions(role, overridden),
        customized: role != Role::Owner && overridden.is_some(),
    }
}

/// get_permission_matrix
///
/// The effective permission set of every role in the organization.
#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/permissions",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses((status = 200, description = "Role/permission matrix", body = [RolePermissions]))
)]
pub async fn get_permission_matrix(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Vec<RolePermissions>>> {
    ensure_same_org(&user, org_id)?;
    let overrides: HashMap<Role, Vec<Permission>> = state
        .repo
        .list_role_permissions(org_id)
        .await?
        .into_iter()
        .collect();

    let matrix = Role::ALL
        .iter()
        .map(|role| matrix_row(*role, overrides.get(role).map(Vec::as_slice)))
        .collect();
    Ok(Json(matrix))
}

/// update_role_permissions
///
/// [Admin Route] Replaces the organization's permission set for one role. The owner role
/// always holds every permission and cannot be edited.
#[utoipa::path(
    put,
    path = "/api/admin/organizations/{org_id}/permissions/{role}",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("role" = String, Path, description = "Role name, e.g. team_lead")
    ),
    request_body = UpdateRolePermissionsRequest,
    responses(
        (status = 200, description = "Updated row", body = RolePermissions),
        (status = 400, description = "Unknown role or owner role"),
        (status = 403, description = "Missing manage_permissions")
    )
)]
pub async fn update_role_permissions(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, role)): Path<(Uuid, String)>,
    Json(payload): Json<UpdateRolePermissionsRequest>,
) -> Result<Json<RolePermissions>> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManagePermissions).await?;

    let role: Role = role.parse().map_err(AppError::Validation)?;
    if role == Role::Owner {
        return Err(AppError::Validation(
            "owner permissions cannot be changed".into(),
        ));
    }

    let mut permissions = payload.permissions;
    permissions.sort();
    permissions.dedup();

    state
        .repo
        .set_role_permissions(org_id, role, &permissions)
        .await?;
    tracing::info!(%org_id, %role, count = permissions.len(), "role permissions replaced");

    Ok(Json(matrix_row(role, Some(&permissions))))
}
