use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::collections::HashSet;
use uuid::Uuid;

use super::{
    ensure_same_org, find_org_member, org_member, permissions_of, reporting_tree, require_permission,
};
use crate::{
    AppState,
    access::{Permission, Role},
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        CreateProcessRequest, CreateUserRequest, Organization, Process, UpdateManagerRequest,
        User, UserProfile,
    },
};

/// get_me
///
/// Profile of the caller with the permissions resolved for their role.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_me(user: AuthUser, State(state): State<AppState>) -> Result<Json<UserProfile>> {
    let record = state
        .repo
        .get_user(user.id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let permissions = permissions_of(&state.repo, &user).await?;

    Ok(Json(UserProfile {
        id: record.id,
        organization_id: record.organization_id,
        email: record.email,
        full_name: record.full_name,
        role: record.role,
        manager_id: record.manager_id,
        permissions,
    }))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Organization", body = Organization),
        (status = 403, description = "Not a member")
    )
)]
pub async fn get_organization(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Organization>> {
    ensure_same_org(&user, org_id)?;
    let org = state
        .repo
        .get_organization(org_id)
        .await?
        .ok_or_else(|| AppError::not_found("Organization"))?;
    Ok(Json(org))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/users",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses((status = 200, description = "Members of the organization", body = [User]))
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Vec<User>>> {
    ensure_same_org(&user, org_id)?;
    Ok(Json(state.repo.list_users(org_id).await?))
}

/// list_reports
///
/// Everyone reporting to `user_id`, directly or through intermediate managers. Callers may
/// always list their own reports; organization-wide roles may list anyone's.
#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/users/{user_id}/reports",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("user_id" = Uuid, Path, description = "Manager whose reports are listed")
    ),
    responses(
        (status = 200, description = "Direct and indirect reports", body = [User]),
        (status = 403, description = "Not allowed to view this user's reports")
    )
)]
pub async fn list_reports(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, manager_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<User>>> {
    ensure_same_org(&user, org_id)?;
    if manager_id != user.id && !user.role.sees_whole_organization() {
        return Err(AppError::forbidden("cannot view another user's reports"));
    }
    org_member(&state.repo, org_id, manager_id).await?;

    let tree = reporting_tree(&state.repo, org_id).await?;
    let reports: HashSet<Uuid> = tree.subordinates(manager_id).into_iter().collect();
    let users = state
        .repo
        .list_users(org_id)
        .await?
        .into_iter()
        .filter(|u| reports.contains(&u.id))
        .collect();
    Ok(Json(users))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/processes",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses((status = 200, description = "Processes", body = [Process]))
)]
pub async fn list_processes(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Vec<Process>>> {
    ensure_same_org(&user, org_id)?;
    Ok(Json(state.repo.list_processes(org_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/processes",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    request_body = CreateProcessRequest,
    responses(
        (status = 201, description = "Process created", body = Process),
        (status = 400, description = "Invalid payload")
    )
)]
pub async fn create_process(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateProcessRequest>,
) -> Result<(StatusCode, Json<Process>)> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageBatches).await?;
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("process name must not be empty".into()));
    }
    let process = state.repo.create_process(org_id, payload).await?;
    Ok((StatusCode::CREATED, Json(process)))
}

// --- Admin ---

/// create_user
///
/// [Admin Route] Adds a member to the organization. Only the owner may create owners or
/// admins; a manager, when given, must belong to the same organization.
#[utoipa::path(
    post,
    path = "/api/admin/organizations/{org_id}/users",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Not allowed"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn create_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageUsers).await?;

    if matches!(payload.role, Role::Owner | Role::Admin) && user.role != Role::Owner {
        return Err(AppError::forbidden(format!(
            "only the owner can create {} accounts",
            payload.role
        )));
    }
    if !payload.email.contains('@') {
        return Err(AppError::Validation("a valid email is required".into()));
    }
    if payload.full_name.trim().is_empty() {
        return Err(AppError::Validation("full name must not be empty".into()));
    }
    if let Some(manager_id) = payload.manager_id {
        if find_org_member(&state.repo, org_id, manager_id).await?.is_none() {
            return Err(AppError::Validation(
                "manager must belong to this organization".into(),
            ));
        }
    }

    let created = state.repo.create_user(org_id, payload).await?;
    tracing::info!(user_id = %created.id, role = %created.role, "user created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// set_manager
///
/// [Admin Route] Re-parents a user in the reporting hierarchy. Rejects changes that would
/// make a user their own (direct or indirect) manager.
#[utoipa::path(
    patch,
    path = "/api/admin/organizations/{org_id}/users/{user_id}/manager",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("user_id" = Uuid, Path, description = "User to re-parent")
    ),
    request_body = UpdateManagerRequest,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 400, description = "Would create a reporting cycle"),
        (status = 404, description = "User not found")
    )
)]
pub async fn set_manager(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, user_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateManagerRequest>,
) -> Result<Json<User>> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageUsers).await?;
    org_member(&state.repo, org_id, user_id).await?;

    if let Some(manager_id) = payload.manager_id {
        if manager_id == user_id {
            return Err(AppError::Validation("a user cannot manage themselves".into()));
        }
        if find_org_member(&state.repo, org_id, manager_id).await?.is_none() {
            return Err(AppError::Validation(
                "manager must belong to this organization".into(),
            ));
        }
        let tree = reporting_tree(&state.repo, org_id).await?;
        if tree.would_create_cycle(user_id, manager_id) {
            return Err(AppError::Validation(
                "this change would create a reporting cycle".into(),
            ));
        }
    }

    let updated = state
        .repo
        .set_user_manager(user_id, payload.manager_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(Json(updated))
}
