use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::collections::HashSet;
use uuid::Uuid;

use super::{
    ensure_same_org, find_org_member, reporting_tree, require_permission, visible_batch,
};
use crate::{
    AppState,
    access::{self, Permission, ReportingTree},
    auth::AuthUser,
    error::{AppError, Result},
    lifecycle,
    models::{
        AssignUserRequest, Batch, CreateBatchRequest, CreatePhaseChangeRequest,
        NewPhaseChangeRequest, PhaseChangeRequest, PhaseChangeResolution, PhaseRequestFilter,
        RequestStatus, ReviewPhaseChangeRequest, User, UserBatchProcess,
    },
};

async fn tree_for(state: &AppState, user: &AuthUser) -> Result<ReportingTree> {
    if user.role.sees_whole_organization() {
        return Ok(ReportingTree::default());
    }
    reporting_tree(&state.repo, user.organization_id).await
}

async fn ensure_process_in_org(state: &AppState, org_id: Uuid, process_id: Uuid) -> Result<()> {
    match state.repo.get_process(process_id).await? {
        Some(p) if p.organization_id == org_id => Ok(()),
        _ => Err(AppError::Validation(
            "process does not belong to this organization".into(),
        )),
    }
}

// --- Batches ---

/// list_batches
///
/// Batches of the organization filtered by the caller's visibility: organization-wide roles
/// see all, trainers their own, team leads their own plus those of trainers reporting to them.
#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/batches",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses((status = 200, description = "Visible batches", body = [Batch]))
)]
pub async fn list_batches(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Vec<Batch>>> {
    ensure_same_org(&user, org_id)?;
    let batches = state.repo.list_batches(org_id).await?;
    let tree = tree_for(&state, &user).await?;
    Ok(Json(access::visible_batches(
        user.role, user.id, batches, &tree,
    )))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/batches/{batch_id}",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "Batch", body = Batch),
        (status = 404, description = "Not found or not visible")
    )
)]
pub async fn get_batch(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, batch_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Batch>> {
    ensure_same_org(&user, org_id)?;
    Ok(Json(visible_batch(&state.repo, &user, batch_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/batches",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    request_body = CreateBatchRequest,
    responses(
        (status = 201, description = "Batch created", body = Batch),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Missing manage_batches")
    )
)]
pub async fn create_batch(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateBatchRequest>,
) -> Result<(StatusCode, Json<Batch>)> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageBatches).await?;

    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("batch name must not be empty".into()));
    }
    if payload.capacity < 1 {
        return Err(AppError::Validation("capacity must be at least 1".into()));
    }
    if payload.end_date.is_some_and(|end| end < payload.start_date) {
        return Err(AppError::Validation(
            "end date must not be before the start date".into(),
        ));
    }
    if let Some(trainer_id) = payload.trainer_id {
        if find_org_member(&state.repo, org_id, trainer_id).await?.is_none() {
            return Err(AppError::Validation(
                "trainer must belong to this organization".into(),
            ));
        }
    }
    if let Some(process_id) = payload.process_id {
        ensure_process_in_org(&state, org_id, process_id).await?;
    }

    let batch = state.repo.create_batch(org_id, payload).await?;
    tracing::info!(batch_id = %batch.id, phase = ?batch.phase, "batch created");
    Ok((StatusCode::CREATED, Json(batch)))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/batches/{batch_id}/trainees",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "Users assigned to the batch", body = [User]),
        (status = 404, description = "Not found or not visible")
    )
)]
pub async fn list_batch_trainees(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, batch_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<User>>> {
    ensure_same_org(&user, org_id)?;
    visible_batch(&state.repo, &user, batch_id).await?;
    Ok(Json(state.repo.list_batch_trainees(batch_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/batches/{batch_id}/assignments",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID")
    ),
    request_body = AssignUserRequest,
    responses(
        (status = 201, description = "User assigned", body = UserBatchProcess),
        (status = 409, description = "Already assigned")
    )
)]
pub async fn assign_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, batch_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<AssignUserRequest>,
) -> Result<(StatusCode, Json<UserBatchProcess>)> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageBatches).await?;
    visible_batch(&state.repo, &user, batch_id).await?;

    if find_org_member(&state.repo, org_id, payload.user_id)
        .await?
        .is_none()
    {
        return Err(AppError::Validation(
            "user does not belong to this organization".into(),
        ));
    }
    ensure_process_in_org(&state, org_id, payload.process_id).await?;

    let assignment = state.repo.assign_user_to_batch(batch_id, payload).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

// --- Phase Change Requests ---

/// request_phase_change
///
/// Raises a request to advance a batch to its next phase. Only one request per batch may be
/// pending at a time.
#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/batches/{batch_id}/phase-requests",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID")
    ),
    request_body = CreatePhaseChangeRequest,
    responses(
        (status = 201, description = "Request raised", body = PhaseChangeRequest),
        (status = 400, description = "Not the next phase"),
        (status = 409, description = "A request is already pending")
    )
)]
pub async fn request_phase_change(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, batch_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreatePhaseChangeRequest>,
) -> Result<(StatusCode, Json<PhaseChangeRequest>)> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::RequestPhaseChanges).await?;
    let batch = visible_batch(&state.repo, &user, batch_id).await?;

    lifecycle::validate_transition(batch.phase, payload.requested_phase)?;
    if payload.justification.trim().is_empty() {
        return Err(AppError::Validation("justification must not be empty".into()));
    }

    let request = state
        .repo
        .create_phase_change_request(NewPhaseChangeRequest {
            organization_id: org_id,
            batch_id,
            requested_by: user.id,
            current_phase: batch.phase,
            requested_phase: payload.requested_phase,
            justification: payload.justification.trim().to_string(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Requests for batches the caller can see, optionally filtered by status.
#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/phase-requests",
    params(("org_id" = Uuid, Path, description = "Organization ID"), PhaseRequestFilter),
    responses((status = 200, description = "Phase change requests", body = [PhaseChangeRequest]))
)]
pub async fn list_phase_requests(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(filter): Query<PhaseRequestFilter>,
) -> Result<Json<Vec<PhaseChangeRequest>>> {
    ensure_same_org(&user, org_id)?;

    let tree = tree_for(&state, &user).await?;
    let visible: HashSet<Uuid> = access::visible_batches(
        user.role,
        user.id,
        state.repo.list_batches(org_id).await?,
        &tree,
    )
    .into_iter()
    .map(|b| b.id)
    .collect();

    let requests = state
        .repo
        .list_phase_change_requests(org_id, filter.status)
        .await?
        .into_iter()
        .filter(|r| visible.contains(&r.batch_id))
        .collect();
    Ok(Json(requests))
}

/// review_phase_request
///
/// Approves or rejects a pending request. Reviewers cannot resolve their own requests, and an
/// approval fails if the batch moved since the request was raised.
#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/phase-requests/{request_id}/review",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("request_id" = Uuid, Path, description = "Phase change request ID")
    ),
    request_body = ReviewPhaseChangeRequest,
    responses(
        (status = 200, description = "Resolved request", body = PhaseChangeRequest),
        (status = 403, description = "Self-review or missing permission"),
        (status = 409, description = "Already resolved or stale")
    )
)]
pub async fn review_phase_request(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, request_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ReviewPhaseChangeRequest>,
) -> Result<Json<PhaseChangeRequest>> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ApprovePhaseChanges).await?;

    let request = state
        .repo
        .get_phase_change_request(request_id)
        .await?
        .filter(|r| r.organization_id == org_id)
        .ok_or_else(|| AppError::not_found("Phase change request"))?;
    let batch = visible_batch(&state.repo, &user, request.batch_id).await?;

    lifecycle::validate_review(&request, user.id, batch.phase, payload.approve)?;

    let status = if payload.approve {
        RequestStatus::Approved
    } else {
        RequestStatus::Rejected
    };
    let resolved = state
        .repo
        .resolve_phase_change_request(PhaseChangeResolution {
            request_id,
            batch_id: batch.id,
            reviewer_id: user.id,
            status,
            comments: payload.comments,
            from_phase: request.current_phase,
            to_phase: request.requested_phase,
        })
        .await?;

    tracing::info!(
        %request_id,
        batch_id = %batch.id,
        ?status,
        from = ?request.current_phase,
        to = ?request.requested_phase,
        "phase change request resolved"
    );
    Ok(Json(resolved))
}
