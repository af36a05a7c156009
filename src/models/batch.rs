use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Lifecycle ---

/// BatchPhase
///
/// The fixed sequence every batch moves through. Declaration order is lifecycle order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    TS,
    ToSchema,
    sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "batch_phase", rename_all = "snake_case")]
pub enum BatchPhase {
    #[default]
    Planned,
    Induction,
    Training,
    Certification,
    Ojt,
    OjtCertification,
    Completed,
}

impl BatchPhase {
    pub const ALL: [BatchPhase; 7] = [
        BatchPhase::Planned,
        BatchPhase::Induction,
        BatchPhase::Training,
        BatchPhase::Certification,
        BatchPhase::Ojt,
        BatchPhase::OjtCertification,
        BatchPhase::Completed,
    ];

    /// The phase that follows this one, or `None` once completed.
    pub fn next(self) -> Option<BatchPhase> {
        let idx = BatchPhase::ALL.iter().position(|p| *p == self)?;
        BatchPhase::ALL.get(idx + 1).copied()
    }
}

/// Batch
///
/// A cohort of trainees (`organization_batches`). `trainer_id` drives visibility.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Batch {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub process_id: Option<Uuid>,
    pub trainer_id: Option<Uuid>,
    pub phase: BatchPhase,
    pub capacity: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateBatchRequest {
    #[schema(example = "Inbound Wave 12")]
    pub name: String,
    pub process_id: Option<Uuid>,
    pub trainer_id: Option<Uuid>,
    pub capacity: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// Starting phase; defaults to `planned`.
    pub phase: Option<BatchPhase>,
}

/// UserBatchProcess
///
/// Membership of a user in a batch for a given process. Unique per (user, batch, process).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct UserBatchProcess {
    pub id: Uuid,
    pub user_id: Uuid,
    pub batch_id: Uuid,
    pub process_id: Uuid,
    pub status: String,
    #[ts(type = "string")]
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AssignUserRequest {
    pub user_id: Uuid,
    pub process_id: Uuid,
}

// --- Phase Change Workflow ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// PhaseChangeRequest
///
/// A trainer's (or team lead's) request to advance a batch, pending review.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct PhaseChangeRequest {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub batch_id: Uuid,
    pub requested_by: Uuid,
    pub current_phase: BatchPhase,
    pub requested_phase: BatchPhase,
    pub justification: String,
    pub status: RequestStatus,
    pub reviewer_id: Option<Uuid>,
    pub reviewer_comments: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatePhaseChangeRequest {
    pub requested_phase: BatchPhase,
    pub justification: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ReviewPhaseChangeRequest {
    pub approve: bool,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct PhaseRequestFilter {
    pub status: Option<RequestStatus>,
}

/// Validated insert for a new phase change request.
#[derive(Debug, Clone)]
pub struct NewPhaseChangeRequest {
    pub organization_id: Uuid,
    pub batch_id: Uuid,
    pub requested_by: Uuid,
    pub current_phase: BatchPhase,
    pub requested_phase: BatchPhase,
    pub justification: String,
}

/// Reviewer decision applied to a pending request. On approval the batch moves from
/// `from_phase` to `to_phase` in the same transaction.
#[derive(Debug, Clone)]
pub struct PhaseChangeResolution {
    pub request_id: Uuid,
    pub batch_id: Uuid,
    pub reviewer_id: Uuid,
    pub status: RequestStatus,
    pub comments: Option<String>,
    pub from_phase: BatchPhase,
    pub to_phase: BatchPhase,
}

// --- Attendance ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "attendance_status", rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Leave,
}

/// Attendance
///
/// One trainee's status for one day in one batch. Unique per (trainee, date, batch).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Attendance {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub batch_id: Uuid,
    pub trainee_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub marked_by: Uuid,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MarkAttendanceRequest {
    pub trainee_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct AttendanceFilter {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub organization_id: Uuid,
    pub batch_id: Uuid,
    pub trainee_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub marked_by: Uuid,
}
