use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use super::{ensure_same_org, require_permission, visible_batch};
use crate::{
    AppState,
    access::Permission,
    auth::AuthUser,
    error::{AppError, Result},
    models::{Attendance, AttendanceFilter, MarkAttendanceRequest, NewAttendance},
};

/// mark_attendance
///
/// Records a trainee's status for a day. Marking the same (trainee, date, batch) again
/// overwrites the previous status.
#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/batches/{batch_id}/attendance",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID")
    ),
    request_body = MarkAttendanceRequest,
    responses(
        (status = 200, description = "Stored record", body = Attendance),
        (status = 400, description = "Trainee not assigned to the batch"),
        (status = 404, description = "Batch not found or not visible")
    )
)]
pub async fn mark_attendance(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, batch_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<MarkAttendanceRequest>,
) -> Result<Json<Attendance>> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::MarkAttendance).await?;
    visible_batch(&state.repo, &user, batch_id).await?;

    if !state
        .repo
        .is_assigned_to_batch(payload.trainee_id, batch_id)
        .await?
    {
        return Err(AppError::Validation(
            "trainee is not assigned to this batch".into(),
        ));
    }

    let record = state
        .repo
        .upsert_attendance(NewAttendance {
            organization_id: org_id,
            batch_id,
            trainee_id: payload.trainee_id,
            date: payload.date,
            status: payload.status,
            marked_by: user.id,
        })
        .await?;
    Ok(Json(record))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/batches/{batch_id}/attendance",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID"),
        AttendanceFilter
    ),
    responses((status = 200, description = "Attendance records", body = [Attendance]))
)]
pub async fn list_attendance(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, batch_id)): Path<(Uuid, Uuid)>,
    Query(filter): Query<AttendanceFilter>,
) -> Result<Json<Vec<Attendance>>> {
    ensure_same_org(&user, org_id)?;
    visible_batch(&state.repo, &user, batch_id).await?;
    Ok(Json(state.repo.list_attendance(batch_id, filter.date).await?))
}
