//! HTTP handlers, grouped by resource.
//!
//! Every organization-scoped handler first checks the path organization against the caller's,
//! then the permission it needs, then resource visibility. Resources of another organization
//! and batches the caller may not see are reported as 404.

use uuid::Uuid;

use crate::{
    access::{self, Permission, ReportingTree},
    auth::AuthUser,
    error::{AppError, Result},
    models::{Batch, User},
    repository::RepositoryState,
};

pub mod attendance;
pub mod audio;
pub mod batches;
pub mod evaluations;
pub mod permissions;
pub mod quizzes;
pub mod users;

pub(crate) fn ensure_same_org(user: &AuthUser, org_id: Uuid) -> Result<()> {
    if user.organization_id != org_id {
        return Err(AppError::forbidden("not a member of this organization"));
    }
    Ok(())
}

/// The caller's effective permissions, honouring the organization's override for their role.
pub(crate) async fn permissions_of(
    repo: &RepositoryState,
    user: &AuthUser,
) -> Result<Vec<Permission>> {
    let overridden = repo
        .get_role_permissions(user.organization_id, user.role)
        .await?;
    Ok(access::effective_permissions(user.role, overridden.as_deref()))
}

pub(crate) async fn has_permission(
    repo: &RepositoryState,
    user: &AuthUser,
    permission: Permission,
) -> Result<bool> {
    let overridden = repo
        .get_role_permissions(user.organization_id, user.role)
        .await?;
    Ok(access::has_permission(
        user.role,
        overridden.as_deref(),
        permission,
    ))
}

pub(crate) async fn require_permission(
    repo: &RepositoryState,
    user: &AuthUser,
    permission: Permission,
) -> Result<()> {
    if !has_permission(repo, user, permission).await? {
        tracing::debug!(user_id = %user.id, role = %user.role, ?permission, "permission denied");
        return Err(AppError::forbidden(format!(
            "missing permission '{}'",
            permission.as_str()
        )));
    }
    Ok(())
}

pub(crate) async fn reporting_tree(repo: &RepositoryState, org_id: Uuid) -> Result<ReportingTree> {
    Ok(ReportingTree::from_links(repo.manager_links(org_id).await?))
}

/// Loads a batch the caller is allowed to see.
pub(crate) async fn visible_batch(
    repo: &RepositoryState,
    user: &AuthUser,
    batch_id: Uuid,
) -> Result<Batch> {
    let batch = repo
        .get_batch(batch_id)
        .await?
        .filter(|b| b.organization_id == user.organization_id)
        .ok_or_else(|| AppError::not_found("Batch"))?;

    let tree = if user.role.sees_whole_organization() {
        ReportingTree::default()
    } else {
        reporting_tree(repo, user.organization_id).await?
    };

    if !access::can_view_batch(user.role, user.id, batch.trainer_id, &tree) {
        return Err(AppError::not_found("Batch"));
    }
    Ok(batch)
}

pub(crate) async fn find_org_member(
    repo: &RepositoryState,
    org_id: Uuid,
    user_id: Uuid,
) -> Result<Option<User>> {
    Ok(repo
        .get_user(user_id)
        .await?
        .filter(|u| u.organization_id == org_id))
}

/// Loads a user of the given organization.
pub(crate) async fn org_member(
    repo: &RepositoryState,
    org_id: Uuid,
    user_id: Uuid,
) -> Result<User> {
    find_org_member(repo, org_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}
