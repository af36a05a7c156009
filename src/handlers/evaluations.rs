use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::collections::HashMap;
use uuid::Uuid;

use super::{ensure_same_org, find_org_member, has_permission, require_permission, visible_batch};
use crate::{
    AppState,
    access::Permission,
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        CreateTemplateRequest, EvaluationDetail, EvaluationFilter, EvaluationOutcome,
        EvaluationResult, EvaluationTemplate, EvaluationTemplateDetail, EvaluationType,
        NewEvaluation, NewParameterScore, SubmitEvaluationRequest, TemplateStatus,
        UpdateTemplateStatusRequest,
    },
    scoring,
};

async fn template_in_org(
    state: &AppState,
    org_id: Uuid,
    template_id: Uuid,
) -> Result<EvaluationTemplateDetail> {
    state
        .repo
        .get_evaluation_template(template_id)
        .await?
        .filter(|t| t.template.organization_id == org_id)
        .ok_or_else(|| AppError::not_found("Evaluation template"))
}

// --- Templates ---

/// create_template
///
/// Creates a template together with its pillars and parameters. New templates start as
/// `draft` and must be activated before evaluations can be submitted against them.
#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/evaluation-templates",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    request_body = CreateTemplateRequest,
    responses(
        (status = 201, description = "Template created", body = EvaluationTemplateDetail),
        (status = 400, description = "Invalid template structure")
    )
)]
pub async fn create_template(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<EvaluationTemplateDetail>)> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageEvaluationTemplates).await?;
    scoring::validate_template(&payload).map_err(AppError::Validation)?;

    let detail = state
        .repo
        .create_evaluation_template(org_id, user.id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/evaluation-templates",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses((status = 200, description = "Templates", body = [EvaluationTemplate]))
)]
pub async fn list_templates(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Vec<EvaluationTemplate>>> {
    ensure_same_org(&user, org_id)?;
    Ok(Json(state.repo.list_evaluation_templates(org_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/evaluation-templates/{template_id}",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("template_id" = Uuid, Path, description = "Template ID")
    ),
    responses(
        (status = 200, description = "Template with pillars and parameters", body = EvaluationTemplateDetail),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_template(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, template_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<EvaluationTemplateDetail>> {
    ensure_same_org(&user, org_id)?;
    Ok(Json(template_in_org(&state, org_id, template_id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/organizations/{org_id}/evaluation-templates/{template_id}/status",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("template_id" = Uuid, Path, description = "Template ID")
    ),
    request_body = UpdateTemplateStatusRequest,
    responses((status = 200, description = "Updated template", body = EvaluationTemplate))
)]
pub async fn update_template_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, template_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateTemplateStatusRequest>,
) -> Result<Json<EvaluationTemplate>> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageEvaluationTemplates).await?;
    template_in_org(&state, org_id, template_id).await?;

    let template = state
        .repo
        .set_template_status(template_id, payload.status)
        .await?
        .ok_or_else(|| AppError::not_found("Evaluation template"))?;
    Ok(Json(template))
}

// --- Submissions ---

/// Resolves the allocation an audio evaluation closes. Standard evaluations carry none.
async fn audio_allocation(
    state: &AppState,
    user: &AuthUser,
    payload: &SubmitEvaluationRequest,
) -> Result<Option<Uuid>> {
    match (payload.evaluation_type, payload.audio_file_id) {
        (EvaluationType::Standard, None) => Ok(None),
        (EvaluationType::Standard, Some(_)) => Err(AppError::Validation(
            "audio_file_id is only valid for audio evaluations".into(),
        )),
        (EvaluationType::Audio, None) => Err(AppError::Validation(
            "audio evaluations require an audio_file_id".into(),
        )),
        (EvaluationType::Audio, Some(file_id)) => {
            let file = state
                .repo
                .get_audio_file(file_id)
                .await?
                .filter(|f| f.organization_id == user.organization_id)
                .ok_or_else(|| AppError::not_found("Audio file"))?;
            let allocation = state
                .repo
                .find_open_allocation(file.id, user.id)
                .await?
                .ok_or_else(|| AppError::forbidden("this recording is not allocated to you"))?;
            Ok(Some(allocation.id))
        }
    }
}

/// submit_evaluation
///
/// Scores a submission against its template and stores the result with one row per
/// parameter. The response carries the full score card including pillar scores and any
/// fatal failures.
#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/evaluations",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    request_body = SubmitEvaluationRequest,
    responses(
        (status = 201, description = "Evaluation stored", body = EvaluationOutcome),
        (status = 400, description = "Incomplete or invalid ratings"),
        (status = 403, description = "Missing permission or allocation")
    )
)]
pub async fn submit_evaluation(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<SubmitEvaluationRequest>,
) -> Result<(StatusCode, Json<EvaluationOutcome>)> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ConductEvaluations).await?;

    let template = template_in_org(&state, org_id, payload.template_id).await?;
    if template.template.status != TemplateStatus::Active {
        return Err(AppError::Validation(
            "only active templates accept evaluations".into(),
        ));
    }
    if find_org_member(&state.repo, org_id, payload.trainee_id)
        .await?
        .is_none()
    {
        return Err(AppError::Validation(
            "trainee does not belong to this organization".into(),
        ));
    }
    if let Some(batch_id) = payload.batch_id {
        visible_batch(&state.repo, &user, batch_id).await?;
    }
    let allocation_id = audio_allocation(&state, &user, &payload).await?;

    let score_card = scoring::score_evaluation(&template, &payload.scores)?;

    let normalized: HashMap<Uuid, Option<f64>> = score_card
        .parameters
        .iter()
        .map(|p| (p.parameter_id, p.normalized_score))
        .collect();
    let scores = payload
        .scores
        .into_iter()
        .map(|s| NewParameterScore {
            normalized_score: normalized.get(&s.parameter_id).copied().flatten(),
            parameter_id: s.parameter_id,
            score: s.score.trim().to_string(),
            comment: s.comment,
        })
        .collect();

    let evaluation = state
        .repo
        .save_evaluation(NewEvaluation {
            organization_id: org_id,
            template_id: payload.template_id,
            trainee_id: payload.trainee_id,
            batch_id: payload.batch_id,
            evaluator_id: user.id,
            evaluation_type: payload.evaluation_type,
            audio_file_id: payload.audio_file_id,
            allocation_id,
            final_score: score_card.final_score,
            passed: score_card.passed,
            fatal_failure: !score_card.fatal_failures.is_empty(),
            scores,
        })
        .await?;

    tracing::info!(
        evaluation_id = %evaluation.id,
        final_score = score_card.final_score,
        passed = score_card.passed,
        "evaluation submitted"
    );
    Ok((
        StatusCode::CREATED,
        Json(EvaluationOutcome {
            evaluation,
            score_card,
        }),
    ))
}

/// list_evaluations
///
/// Holders of `view_reports` see every evaluation of the organization (optionally for one
/// trainee); everyone else sees only evaluations of themselves.
#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/evaluations",
    params(("org_id" = Uuid, Path, description = "Organization ID"), EvaluationFilter),
    responses((status = 200, description = "Evaluations", body = [EvaluationResult]))
)]
pub async fn list_evaluations(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(filter): Query<EvaluationFilter>,
) -> Result<Json<Vec<EvaluationResult>>> {
    ensure_same_org(&user, org_id)?;
    let trainee_id = if has_permission(&state.repo, &user, Permission::ViewReports).await? {
        filter.trainee_id
    } else {
        Some(user.id)
    };
    Ok(Json(state.repo.list_evaluations(org_id, trainee_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/evaluations/{evaluation_id}",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("evaluation_id" = Uuid, Path, description = "Evaluation ID")
    ),
    responses(
        (status = 200, description = "Evaluation with parameter results", body = EvaluationDetail),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_evaluation(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, evaluation_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<EvaluationDetail>> {
    ensure_same_org(&user, org_id)?;
    let detail = state
        .repo
        .get_evaluation(evaluation_id)
        .await?
        .filter(|d| d.evaluation.organization_id == org_id)
        .ok_or_else(|| AppError::not_found("Evaluation"))?;

    let involved =
        detail.evaluation.trainee_id == user.id || detail.evaluation.evaluator_id == user.id;
    if !involved && !has_permission(&state.repo, &user, Permission::ViewReports).await? {
        return Err(AppError::not_found("Evaluation"));
    }
    Ok(Json(detail))
}
