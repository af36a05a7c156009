use crate::{
    AppState,
    handlers::{attendance, audio, batches, evaluations, permissions, quizzes, users},
};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Authenticated Router
///
/// Everything a signed-in member can reach, mounted under `/api`. Organization-scoped paths
/// start with `/organizations/{org_id}`; the handlers reject any `org_id` other than the
/// caller's own.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Identity ---
        .route("/me", get(users::get_me))
        .route("/me/allocations", get(audio::my_allocations))
        // --- Organization & Users ---
        .route("/organizations/{org_id}", get(users::get_organization))
        .route("/organizations/{org_id}/users", get(users::list_users))
        .route(
            "/organizations/{org_id}/users/{user_id}/reports",
            get(users::list_reports),
        )
        .route(
            "/organizations/{org_id}/processes",
            get(users::list_processes).post(users::create_process),
        )
        .route(
            "/organizations/{org_id}/permissions",
            get(permissions::get_permission_matrix),
        )
        // --- Batches ---
        // List and get apply the hierarchical visibility filter.
        .route(
            "/organizations/{org_id}/batches",
            get(batches::list_batches).post(batches::create_batch),
        )
        .route(
            "/organizations/{org_id}/batches/{batch_id}",
            get(batches::get_batch),
        )
        .route(
            "/organizations/{org_id}/batches/{batch_id}/trainees",
            get(batches::list_batch_trainees),
        )
        .route(
            "/organizations/{org_id}/batches/{batch_id}/assignments",
            post(batches::assign_user),
        )
        .route(
            "/organizations/{org_id}/batches/{batch_id}/attendance",
            get(attendance::list_attendance).post(attendance::mark_attendance),
        )
        // --- Lifecycle ---
        .route(
            "/organizations/{org_id}/batches/{batch_id}/phase-requests",
            post(batches::request_phase_change),
        )
        .route(
            "/organizations/{org_id}/phase-requests",
            get(batches::list_phase_requests),
        )
        .route(
            "/organizations/{org_id}/phase-requests/{request_id}/review",
            post(batches::review_phase_request),
        )
        // --- Evaluations ---
        .route(
            "/organizations/{org_id}/evaluation-templates",
            get(evaluations::list_templates).post(evaluations::create_template),
        )
        .route(
            "/organizations/{org_id}/evaluation-templates/{template_id}",
            get(evaluations::get_template),
        )
        .route(
            "/organizations/{org_id}/evaluation-templates/{template_id}/status",
            patch(evaluations::update_template_status),
        )
        .route(
            "/organizations/{org_id}/evaluations",
            get(evaluations::list_evaluations).post(evaluations::submit_evaluation),
        )
        .route(
            "/organizations/{org_id}/evaluations/{evaluation_id}",
            get(evaluations::get_evaluation),
        )
        // --- Quizzes ---
        .route(
            "/organizations/{org_id}/questions",
            get(quizzes::list_questions).post(quizzes::create_question),
        )
        .route(
            "/organizations/{org_id}/quiz-templates",
            get(quizzes::list_quiz_templates).post(quizzes::create_quiz_template),
        )
        .route(
            "/organizations/{org_id}/quiz-templates/{template_id}",
            get(quizzes::get_quiz_template),
        )
        .route(
            "/organizations/{org_id}/quiz-templates/{template_id}/quizzes",
            post(quizzes::generate_quiz),
        )
        .route(
            "/organizations/{org_id}/quizzes/{quiz_id}",
            get(quizzes::get_quiz),
        )
        .route(
            "/organizations/{org_id}/quizzes/{quiz_id}/status",
            patch(quizzes::update_quiz_status),
        )
        .route(
            "/organizations/{org_id}/quizzes/{quiz_id}/attempts",
            get(quizzes::list_attempts).post(quizzes::submit_attempt),
        )
        // --- Audio ---
        // Upload goes straight to object storage via a presigned URL.
        .route(
            "/organizations/{org_id}/audio-files/upload-url",
            post(audio::request_upload_url),
        )
        .route(
            "/organizations/{org_id}/audio-files",
            get(audio::list_audio_files).post(audio::register_audio_file),
        )
        .route(
            "/organizations/{org_id}/audio-files/{file_id}/url",
            get(audio::get_audio_url),
        )
        .route(
            "/organizations/{org_id}/audio-files/{file_id}/allocations",
            post(audio::allocate_audio_file),
        )
}
