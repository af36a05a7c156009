use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use super::{ensure_same_org, has_permission, require_permission, visible_batch};
use crate::{
    AppState,
    access::Permission,
    assessment,
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        CreateQuestionRequest, CreateQuizTemplateRequest, GenerateQuizRequest, NewQuiz,
        NewQuizAttempt, Question, QuestionFilter, QuestionView, Quiz, QuizAttempt,
        QuizAttemptDetail, QuizForTaking, QuizStatus, QuizTemplate, SubmitQuizAttemptRequest,
        UpdateQuizStatusRequest,
    },
};

async fn quiz_in_org(state: &AppState, org_id: Uuid, quiz_id: Uuid) -> Result<Quiz> {
    state
        .repo
        .get_quiz(quiz_id)
        .await?
        .filter(|q| q.organization_id == org_id)
        .ok_or_else(|| AppError::not_found("Quiz"))
}

async fn quiz_template_in_org(
    state: &AppState,
    org_id: Uuid,
    template_id: Uuid,
) -> Result<QuizTemplate> {
    state
        .repo
        .get_quiz_template(template_id)
        .await?
        .filter(|t| t.organization_id == org_id)
        .ok_or_else(|| AppError::not_found("Quiz template"))
}

// --- Question Bank ---

#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/questions",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    request_body = CreateQuestionRequest,
    responses(
        (status = 201, description = "Question added", body = Question),
        (status = 400, description = "Invalid question")
    )
)]
pub async fn create_question(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<(StatusCode, Json<Question>)> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageQuizzes).await?;
    assessment::validate_question(&payload)?;

    let question = state.repo.create_question(org_id, payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/questions",
    params(("org_id" = Uuid, Path, description = "Organization ID"), QuestionFilter),
    responses((status = 200, description = "Question bank", body = [Question]))
)]
pub async fn list_questions(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(filter): Query<QuestionFilter>,
) -> Result<Json<Vec<Question>>> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageQuizzes).await?;
    let questions = state
        .repo
        .list_questions(org_id, filter.category, filter.process_id)
        .await?;
    Ok(Json(questions))
}

// --- Templates ---

#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/quiz-templates",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    request_body = CreateQuizTemplateRequest,
    responses(
        (status = 201, description = "Template created", body = QuizTemplate),
        (status = 400, description = "Invalid template")
    )
)]
pub async fn create_quiz_template(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateQuizTemplateRequest>,
) -> Result<(StatusCode, Json<QuizTemplate>)> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageQuizzes).await?;
    assessment::validate_quiz_template(&payload)?;
    if let Some(batch_id) = payload.batch_id {
        visible_batch(&state.repo, &user, batch_id).await?;
    }

    let template = state
        .repo
        .create_quiz_template(org_id, user.id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(template)))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/quiz-templates",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses((status = 200, description = "Quiz templates", body = [QuizTemplate]))
)]
pub async fn list_quiz_templates(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Vec<QuizTemplate>>> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageQuizzes).await?;
    Ok(Json(state.repo.list_quiz_templates(org_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/quiz-templates/{template_id}",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("template_id" = Uuid, Path, description = "Quiz template ID")
    ),
    responses(
        (status = 200, description = "Quiz template", body = QuizTemplate),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_quiz_template(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, template_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<QuizTemplate>> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageQuizzes).await?;
    Ok(Json(quiz_template_in_org(&state, org_id, template_id).await?))
}

/// generate_quiz
///
/// Draws `question_count` distinct questions at random from the bank slice matching the
/// template's category and process, and stores them as a new active quiz.
#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/quiz-templates/{template_id}/quizzes",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("template_id" = Uuid, Path, description = "Quiz template ID")
    ),
    request_body = GenerateQuizRequest,
    responses(
        (status = 201, description = "Quiz generated", body = Quiz),
        (status = 400, description = "Not enough matching questions")
    )
)]
pub async fn generate_quiz(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, template_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<GenerateQuizRequest>,
) -> Result<(StatusCode, Json<Quiz>)> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageQuizzes).await?;
    let template = quiz_template_in_org(&state, org_id, template_id).await?;

    let batch_id = payload.batch_id.or(template.batch_id);
    if let Some(batch_id) = batch_id {
        visible_batch(&state.repo, &user, batch_id).await?;
    }

    let pool = state
        .repo
        .list_questions(org_id, template.category.clone(), template.process_id)
        .await?;
    let count = usize::try_from(template.question_count).unwrap_or(0);
    let question_ids = {
        let mut rng = rand::thread_rng();
        assessment::select_questions(&pool, count, &mut rng)?
    };

    let quiz = state
        .repo
        .create_quiz(NewQuiz {
            organization_id: org_id,
            template_id,
            batch_id,
            name: payload
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| template.name.clone()),
            question_ids,
            time_limit_minutes: template.time_limit_minutes,
            passing_score: template.passing_score,
            created_by: user.id,
        })
        .await?;
    tracing::info!(quiz_id = %quiz.id, questions = count, "quiz generated");
    Ok((StatusCode::CREATED, Json(quiz)))
}

// --- Quizzes ---

/// Checks the caller may sit a quiz. Quizzes tied to a batch are open to that batch's
/// members and to quiz managers.
async fn ensure_can_take(state: &AppState, user: &AuthUser, quiz: &Quiz) -> Result<()> {
    if has_permission(&state.repo, user, Permission::ManageQuizzes).await? {
        return Ok(());
    }
    // Non-members learn nothing about a batch quiz, not even that it exists.
    if let Some(batch_id) = quiz.batch_id {
        if !state.repo.is_assigned_to_batch(user.id, batch_id).await? {
            return Err(AppError::not_found("Quiz"));
        }
    }
    require_permission(&state.repo, user, Permission::TakeQuizzes).await
}

/// get_quiz
///
/// The quiz as presented to a taker. Correct answers are never included.
#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/quizzes/{quiz_id}",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("quiz_id" = Uuid, Path, description = "Quiz ID")
    ),
    responses(
        (status = 200, description = "Quiz without answers", body = QuizForTaking),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_quiz(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, quiz_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<QuizForTaking>> {
    ensure_same_org(&user, org_id)?;
    let quiz = quiz_in_org(&state, org_id, quiz_id).await?;
    ensure_can_take(&state, &user, &quiz).await?;

    let bank = state.repo.get_questions(&quiz.question_ids).await?;
    // Keep the draw order.
    let questions = quiz
        .question_ids
        .iter()
        .filter_map(|id| bank.iter().find(|q| q.id == *id))
        .map(QuestionView::from)
        .collect();

    Ok(Json(QuizForTaking {
        id: quiz.id,
        name: quiz.name,
        time_limit_minutes: quiz.time_limit_minutes,
        passing_score: quiz.passing_score,
        status: quiz.status,
        questions,
    }))
}

#[utoipa::path(
    patch,
    path = "/api/organizations/{org_id}/quizzes/{quiz_id}/status",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("quiz_id" = Uuid, Path, description = "Quiz ID")
    ),
    request_body = UpdateQuizStatusRequest,
    responses((status = 200, description = "Updated quiz", body = Quiz))
)]
pub async fn update_quiz_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, quiz_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateQuizStatusRequest>,
) -> Result<Json<Quiz>> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageQuizzes).await?;
    quiz_in_org(&state, org_id, quiz_id).await?;

    let quiz = state
        .repo
        .set_quiz_status(quiz_id, payload.status)
        .await?
        .ok_or_else(|| AppError::not_found("Quiz"))?;
    Ok(Json(quiz))
}

/// submit_attempt
///
/// Grades and stores an attempt. The score is the share of the quiz's questions answered
/// correctly, as a percentage.
#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/quizzes/{quiz_id}/attempts",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("quiz_id" = Uuid, Path, description = "Quiz ID")
    ),
    request_body = SubmitQuizAttemptRequest,
    responses(
        (status = 201, description = "Graded attempt", body = QuizAttemptDetail),
        (status = 400, description = "Answer to a question outside the quiz"),
        (status = 409, description = "Quiz is closed")
    )
)]
pub async fn submit_attempt(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, quiz_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SubmitQuizAttemptRequest>,
) -> Result<(StatusCode, Json<QuizAttemptDetail>)> {
    ensure_same_org(&user, org_id)?;
    let quiz = quiz_in_org(&state, org_id, quiz_id).await?;
    ensure_can_take(&state, &user, &quiz).await?;
    if quiz.status == QuizStatus::Closed {
        return Err(AppError::Conflict("quiz is closed".into()));
    }

    let questions = state.repo.get_questions(&quiz.question_ids).await?;
    let graded = assessment::grade_attempt(&quiz, &questions, &payload.answers)?;

    let detail = state
        .repo
        .save_quiz_attempt(NewQuizAttempt {
            quiz_id,
            user_id: user.id,
            score: graded.score,
            passed: graded.passed,
            answers: graded.answers,
        })
        .await?;
    tracing::info!(%quiz_id, user_id = %user.id, score = graded.score, "quiz attempt graded");
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Quiz managers see every attempt; other callers see their own.
#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/quizzes/{quiz_id}/attempts",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("quiz_id" = Uuid, Path, description = "Quiz ID")
    ),
    responses((status = 200, description = "Attempts", body = [QuizAttempt]))
)]
pub async fn list_attempts(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, quiz_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<QuizAttempt>>> {
    ensure_same_org(&user, org_id)?;
    quiz_in_org(&state, org_id, quiz_id).await?;

    let only = if has_permission(&state.repo, &user, Permission::ManageQuizzes).await? {
        None
    } else {
        Some(user.id)
    };
    Ok(Json(state.repo.list_quiz_attempts(quiz_id, only).await?))
}
