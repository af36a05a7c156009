use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Pure domain rules, no I/O.
pub mod access;
pub mod assessment;
pub mod lifecycle;
pub mod scoring;

// Services and plumbing.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod storage;

// Routers segregated by access level (public, authenticated, admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document aggregated from the `#[utoipa::path]` handlers and `ToSchema` payloads.
/// Served at `/api-docs/openapi.json` and rendered by Swagger UI at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::users::get_me, handlers::users::get_organization, handlers::users::list_users,
        handlers::users::list_reports, handlers::users::list_processes,
        handlers::users::create_process, handlers::users::create_user,
        handlers::users::set_manager,
        handlers::permissions::get_permission_matrix,
        handlers::permissions::update_role_permissions,
        handlers::batches::list_batches, handlers::batches::get_batch,
        handlers::batches::create_batch, handlers::batches::list_batch_trainees,
        handlers::batches::assign_user, handlers::batches::request_phase_change,
        handlers::batches::list_phase_requests, handlers::batches::review_phase_request,
        handlers::attendance::mark_attendance, handlers::attendance::list_attendance,
        handlers::evaluations::create_template, handlers::evaluations::list_templates,
        handlers::evaluations::get_template, handlers::evaluations::update_template_status,
        handlers::evaluations::submit_evaluation, handlers::evaluations::list_evaluations,
        handlers::evaluations::get_evaluation,
        handlers::quizzes::create_question, handlers::quizzes::list_questions,
        handlers::quizzes::create_quiz_template, handlers::quizzes::list_quiz_templates,
        handlers::quizzes::get_quiz_template, handlers::quizzes::generate_quiz,
        handlers::quizzes::get_quiz, handlers::quizzes::update_quiz_status,
        handlers::quizzes::submit_attempt, handlers::quizzes::list_attempts,
        handlers::audio::request_upload_url, handlers::audio::register_audio_file,
        handlers::audio::list_audio_files, handlers::audio::get_audio_url,
        handlers::audio::allocate_audio_file, handlers::audio::my_allocations,
    ),
    components(
        schemas(
            access::Role, access::Permission,
            models::Organization, models::User, models::Process, models::CreateProcessRequest,
            models::CreateUserRequest, models::UpdateManagerRequest, models::UserProfile,
            models::RolePermissions, models::UpdateRolePermissionsRequest,
            models::BatchPhase, models::Batch, models::CreateBatchRequest,
            models::UserBatchProcess, models::AssignUserRequest, models::RequestStatus,
            models::PhaseChangeRequest, models::CreatePhaseChangeRequest,
            models::ReviewPhaseChangeRequest, models::AttendanceStatus, models::Attendance,
            models::MarkAttendanceRequest,
            models::RatingType, models::TemplateStatus, models::EvaluationType,
            models::EvaluationTemplate, models::EvaluationPillar, models::EvaluationParameter,
            models::PillarDetail, models::EvaluationTemplateDetail,
            models::CreateParameterRequest, models::CreatePillarRequest,
            models::CreateTemplateRequest, models::UpdateTemplateStatusRequest,
            models::ParameterScoreInput, models::SubmitEvaluationRequest,
            models::EvaluationResult, models::EvaluationParameterResult,
            models::EvaluationDetail, models::EvaluationOutcome,
            scoring::ScoreCard, scoring::PillarScore, scoring::ParameterScore,
            models::QuestionType, models::Difficulty, models::QuizStatus, models::Question,
            models::CreateQuestionRequest, models::QuestionView, models::QuizTemplate,
            models::CreateQuizTemplateRequest, models::Quiz, models::UpdateQuizStatusRequest,
            models::GenerateQuizRequest, models::QuizForTaking, models::QuizAnswer,
            models::SubmitQuizAttemptRequest, models::QuizAttempt, models::QuizAttemptAnswer,
            models::QuizAttemptDetail,
            models::AudioStatus, models::AllocationStatus, models::AudioFile,
            models::AudioUploadUrlRequest, models::AudioUploadUrlResponse,
            models::RegisterAudioFileRequest, models::AudioFileUrlResponse,
            models::AudioFileAllocation, models::AllocateAudioRequest,
        )
    ),
    tags(
        (name = "lms-portal", description = "Contact-center training and quality API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single immutable container of shared services, cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// Object storage for call recordings.
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- FromRef Implementations ---
// Let extractors such as `AuthUser` pull individual services out of `AppState`.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless `AuthUser` can be extracted.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles routing, the auth layer and the observability stack around `state`.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // Admin routes share the authenticated layer; role checks happen in the handlers.
    let api = authenticated::authenticated_routes()
        .nest("/admin", admin::admin_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .nest("/api", api)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for every request, tagged with the `x-request-id` set by `SetRequestIdLayer` so all
/// log lines of one request correlate.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
