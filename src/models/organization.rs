use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::access::{Permission, Role};

/// Organization
///
/// The tenant. Every other record hangs off one organization.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// User
///
/// A member of an organization. `manager_id` is the self-referential reporting line
/// walked by the batch visibility rules.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub manager_id: Option<Uuid>,
    pub active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Process
///
/// A line of business (e.g. "Inbound Billing") that batches train for.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Process {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateProcessRequest {
    pub name: String,
    pub description: Option<String>,
}

/// CreateUserRequest
///
/// Admin payload for adding a member to the organization
/// (POST /admin/organizations/{org_id}/users).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateUserRequest {
    #[schema(example = "agent@callcenter.example")]
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub manager_id: Option<Uuid>,
}

/// UpdateManagerRequest
///
/// Re-parents a user in the reporting hierarchy. `null` detaches them.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateManagerRequest {
    pub manager_id: Option<Uuid>,
}

/// UserProfile
///
/// Output of GET /me: the caller's identity plus the permissions resolved for their role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub manager_id: Option<Uuid>,
    pub permissions: Vec<Permission>,
}

/// One row of the organization's role/permission matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RolePermissions {
    pub role: Role,
    pub permissions: Vec<Permission>,
    /// True when the organization has replaced the default set for this role.
    pub customized: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateRolePermissionsRequest {
    pub permissions: Vec<Permission>,
}
