use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Batch;

// --- Roles ---

/// Role
///
/// The canonical organizational role. Stored as the Postgres enum `user_role`.
/// Legacy spellings (`qualityassurance`, `quality_assurance`, `teamlead`) are accepted on input
/// and normalized here so that only one set of role names ever reaches the permission checks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Manager,
    #[serde(alias = "teamlead")]
    TeamLead,
    #[serde(alias = "qualityassurance", alias = "quality_assurance")]
    QualityAnalyst,
    Trainer,
    Advisor,
    Trainee,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Owner,
        Role::Admin,
        Role::Manager,
        Role::TeamLead,
        Role::QualityAnalyst,
        Role::Trainer,
        Role::Advisor,
        Role::Trainee,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::TeamLead => "team_lead",
            Role::QualityAnalyst => "quality_analyst",
            Role::Trainer => "trainer",
            Role::Advisor => "advisor",
            Role::Trainee => "trainee",
        }
    }

    /// Roles that see every batch of their organization.
    pub fn sees_whole_organization(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin | Role::Manager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "team_lead" | "teamlead" => Ok(Role::TeamLead),
            "quality_analyst" | "qualityassurance" | "quality_assurance" => {
                Ok(Role::QualityAnalyst)
            }
            "trainer" => Ok(Role::Trainer),
            "advisor" => Ok(Role::Advisor),
            "trainee" => Ok(Role::Trainee),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

// --- Permissions ---

/// Permission
///
/// A capability checked by handlers before mutating or reading protected resources.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageUsers,
    ManageBatches,
    ManageEvaluationTemplates,
    ConductEvaluations,
    ManageQuizzes,
    TakeQuizzes,
    MarkAttendance,
    RequestPhaseChanges,
    ApprovePhaseChanges,
    ManageAudio,
    ViewReports,
    ManagePermissions,
}

impl Permission {
    pub const ALL: [Permission; 12] = [
        Permission::ManageUsers,
        Permission::ManageBatches,
        Permission::ManageEvaluationTemplates,
        Permission::ConductEvaluations,
        Permission::ManageQuizzes,
        Permission::TakeQuizzes,
        Permission::MarkAttendance,
        Permission::RequestPhaseChanges,
        Permission::ApprovePhaseChanges,
        Permission::ManageAudio,
        Permission::ViewReports,
        Permission::ManagePermissions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageUsers => "manage_users",
            Permission::ManageBatches => "manage_batches",
            Permission::ManageEvaluationTemplates => "manage_evaluation_templates",
            Permission::ConductEvaluations => "conduct_evaluations",
            Permission::ManageQuizzes => "manage_quizzes",
            Permission::TakeQuizzes => "take_quizzes",
            Permission::MarkAttendance => "mark_attendance",
            Permission::RequestPhaseChanges => "request_phase_changes",
            Permission::ApprovePhaseChanges => "approve_phase_changes",
            Permission::ManageAudio => "manage_audio",
            Permission::ViewReports => "view_reports",
            Permission::ManagePermissions => "manage_permissions",
        }
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown permission '{s}'"))
    }
}

/// The permission set a role holds when the organization has not overridden it.
pub fn default_permissions(role: Role) -> Vec<Permission> {
    use Permission::*;
    match role {
        Role::Owner | Role::Admin => Permission::ALL.to_vec(),
        Role::Manager => Permission::ALL
            .iter()
            .copied()
            .filter(|p| *p != ManagePermissions)
            .collect(),
        Role::TeamLead => vec![
            ConductEvaluations,
            MarkAttendance,
            RequestPhaseChanges,
            ApprovePhaseChanges,
            ViewReports,
        ],
        Role::QualityAnalyst => vec![ConductEvaluations, ManageAudio, ViewReports],
        Role::Trainer => vec![
            ConductEvaluations,
            ManageQuizzes,
            MarkAttendance,
            RequestPhaseChanges,
            ViewReports,
        ],
        Role::Advisor => vec![ViewReports],
        Role::Trainee => vec![TakeQuizzes],
    }
}

/// Resolves a role's permissions, applying an organization override when one exists.
/// The owner role always holds every permission.
pub fn effective_permissions(role: Role, overridden: Option<&[Permission]>) -> Vec<Permission> {
    if role == Role::Owner {
        return Permission::ALL.to_vec();
    }
    let mut perms = match overridden {
        Some(list) => list.to_vec(),
        None => default_permissions(role),
    };
    perms.sort();
    perms.dedup();
    perms
}

pub fn has_permission(
    role: Role,
    overridden: Option<&[Permission]>,
    permission: Permission,
) -> bool {
    effective_permissions(role, overridden).contains(&permission)
}

/// Parses a stored `TEXT[]` permission list. Unknown entries are dropped with a warning
/// so that a stale row never locks the whole role out.
pub fn parse_permissions(raw: &[String]) -> Vec<Permission> {
    raw.iter()
        .filter_map(|s| match s.parse::<Permission>() {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!("ignoring stored permission: {}", e);
                None
            }
        })
        .collect()
}

// --- Reporting Hierarchy ---

/// ReportingTree
///
/// The organization's `user -> manager` relation, built once per request from the
/// `(user_id, manager_id)` links and then queried for transitive reporting lines.
#[derive(Debug, Clone, Default)]
pub struct ReportingTree {
    managers: HashMap<Uuid, Uuid>,
}

impl ReportingTree {
    pub fn from_links<I>(links: I) -> Self
    where
        I: IntoIterator<Item = (Uuid, Option<Uuid>)>,
    {
        let managers = links
            .into_iter()
            .filter_map(|(user, manager)| manager.map(|m| (user, m)))
            .collect();
        Self { managers }
    }

    pub fn manager_of(&self, user: Uuid) -> Option<Uuid> {
        self.managers.get(&user).copied()
    }

    /// Walks `subordinate`'s manager chain upward looking for `manager`.
    /// Terminates on cycles; a user never reports to themselves.
    pub fn reports_to(&self, subordinate: Uuid, manager: Uuid) -> bool {
        if subordinate == manager {
            return false;
        }
        let mut visited = HashSet::new();
        let mut current = subordinate;
        while let Some(next) = self.manager_of(current) {
            if next == manager {
                return true;
            }
            if !visited.insert(next) {
                return false;
            }
            current = next;
        }
        false
    }

    /// Every user whose chain reaches `manager`, at any depth.
    pub fn subordinates(&self, manager: Uuid) -> Vec<Uuid> {
        let mut out: Vec<Uuid> = self
            .managers
            .keys()
            .copied()
            .filter(|u| self.reports_to(*u, manager))
            .collect();
        out.sort();
        out
    }

    /// True if making `new_manager` the manager of `user` would close a loop.
    pub fn would_create_cycle(&self, user: Uuid, new_manager: Uuid) -> bool {
        user == new_manager || self.reports_to(new_manager, user)
    }
}

// --- Batch Visibility ---

/// can_view_batch
///
/// The single visibility predicate for batches. Both the single-batch fetch and the
/// list filter go through this function.
pub fn can_view_batch(
    role: Role,
    viewer_id: Uuid,
    trainer_id: Option<Uuid>,
    tree: &ReportingTree,
) -> bool {
    if role.sees_whole_organization() {
        return true;
    }
    let Some(trainer) = trainer_id else {
        return false;
    };
    match role {
        Role::Trainer => trainer == viewer_id,
        Role::TeamLead => trainer == viewer_id || tree.reports_to(trainer, viewer_id),
        _ => false,
    }
}

/// Filters a batch list down to what the viewer may see.
pub fn visible_batches(
    role: Role,
    viewer_id: Uuid,
    batches: Vec<Batch>,
    tree: &ReportingTree,
) -> Vec<Batch> {
    batches
        .into_iter()
        .filter(|b| can_view_batch(role, viewer_id, b.trainer_id, tree))
        .collect()
}
