use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    access::{Permission, Role},
    error::Result,
    models::*,
};

mod postgres;

pub use postgres::PostgresRepository;

/// Repository
///
/// Abstract contract for all persistence. Handlers depend only on this trait, so tests can
/// substitute an in-memory implementation.
///
/// Lookups by id return `Ok(None)` when the row does not exist; tenant checks are the
/// caller's job. Unique-constraint violations surface as `AppError::Conflict`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Organizations & Users ---
    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn list_users(&self, org_id: Uuid) -> Result<Vec<User>>;
    async fn create_user(&self, org_id: Uuid, req: CreateUserRequest) -> Result<User>;
    async fn set_user_manager(&self, user_id: Uuid, manager_id: Option<Uuid>)
    -> Result<Option<User>>;
    /// Every `(user_id, manager_id)` pair of the organization, for building a `ReportingTree`.
    async fn manager_links(&self, org_id: Uuid) -> Result<Vec<(Uuid, Option<Uuid>)>>;

    async fn create_process(&self, org_id: Uuid, req: CreateProcessRequest) -> Result<Process>;
    async fn get_process(&self, id: Uuid) -> Result<Option<Process>>;
    async fn list_processes(&self, org_id: Uuid) -> Result<Vec<Process>>;

    // --- Permissions ---
    /// The organization's override for `role`, if one is stored.
    async fn get_role_permissions(&self, org_id: Uuid, role: Role)
    -> Result<Option<Vec<Permission>>>;
    async fn list_role_permissions(&self, org_id: Uuid) -> Result<Vec<(Role, Vec<Permission>)>>;
    async fn set_role_permissions(
        &self,
        org_id: Uuid,
        role: Role,
        permissions: &[Permission],
    ) -> Result<()>;

    // --- Batches ---
    async fn create_batch(&self, org_id: Uuid, req: CreateBatchRequest) -> Result<Batch>;
    async fn get_batch(&self, id: Uuid) -> Result<Option<Batch>>;
    async fn list_batches(&self, org_id: Uuid) -> Result<Vec<Batch>>;
    async fn assign_user_to_batch(
        &self,
        batch_id: Uuid,
        req: AssignUserRequest,
    ) -> Result<UserBatchProcess>;
    async fn list_batch_trainees(&self, batch_id: Uuid) -> Result<Vec<User>>;
    async fn is_assigned_to_batch(&self, user_id: Uuid, batch_id: Uuid) -> Result<bool>;

    // --- Phase Change Requests ---
    async fn create_phase_change_request(
        &self,
        req: NewPhaseChangeRequest,
    ) -> Result<PhaseChangeRequest>;
    async fn get_phase_change_request(&self, id: Uuid) -> Result<Option<PhaseChangeRequest>>;
    async fn list_phase_change_requests(
        &self,
        org_id: Uuid,
        status: Option<RequestStatus>,
    ) -> Result<Vec<PhaseChangeRequest>>;
    /// Records the decision and, when approved, moves the batch. Fails with `Conflict` if
    /// the request is no longer pending or the batch left `from_phase` in the meantime.
    async fn resolve_phase_change_request(
        &self,
        resolution: PhaseChangeResolution,
    ) -> Result<PhaseChangeRequest>;

    // --- Attendance ---
    /// Inserts or updates the record keyed by (trainee, date, batch).
    async fn upsert_attendance(&self, record: NewAttendance) -> Result<Attendance>;
    async fn list_attendance(&self, batch_id: Uuid, date: Option<NaiveDate>)
    -> Result<Vec<Attendance>>;

    // --- Evaluation Templates ---
    async fn create_evaluation_template(
        &self,
        org_id: Uuid,
        created_by: Uuid,
        req: CreateTemplateRequest,
    ) -> Result<EvaluationTemplateDetail>;
    async fn get_evaluation_template(&self, id: Uuid) -> Result<Option<EvaluationTemplateDetail>>;
    async fn list_evaluation_templates(&self, org_id: Uuid) -> Result<Vec<EvaluationTemplate>>;
    async fn set_template_status(
        &self,
        id: Uuid,
        status: TemplateStatus,
    ) -> Result<Option<EvaluationTemplate>>;

    // --- Evaluations ---
    async fn save_evaluation(&self, evaluation: NewEvaluation) -> Result<EvaluationResult>;
    async fn get_evaluation(&self, id: Uuid) -> Result<Option<EvaluationDetail>>;
    async fn list_evaluations(
        &self,
        org_id: Uuid,
        trainee_id: Option<Uuid>,
    ) -> Result<Vec<EvaluationResult>>;

    // --- Question Bank & Quizzes ---
    async fn create_question(&self, org_id: Uuid, req: CreateQuestionRequest) -> Result<Question>;
    /// `None` filters match any value.
    async fn list_questions(
        &self,
        org_id: Uuid,
        category: Option<String>,
        process_id: Option<Uuid>,
    ) -> Result<Vec<Question>>;
    async fn get_questions(&self, ids: &[Uuid]) -> Result<Vec<Question>>;

    async fn create_quiz_template(
        &self,
        org_id: Uuid,
        created_by: Uuid,
        req: CreateQuizTemplateRequest,
    ) -> Result<QuizTemplate>;
    async fn get_quiz_template(&self, id: Uuid) -> Result<Option<QuizTemplate>>;
    async fn list_quiz_templates(&self, org_id: Uuid) -> Result<Vec<QuizTemplate>>;

    async fn create_quiz(&self, quiz: NewQuiz) -> Result<Quiz>;
    async fn get_quiz(&self, id: Uuid) -> Result<Option<Quiz>>;
    async fn set_quiz_status(&self, id: Uuid, status: QuizStatus) -> Result<Option<Quiz>>;
    async fn save_quiz_attempt(&self, attempt: NewQuizAttempt) -> Result<QuizAttemptDetail>;
    /// Attempts of a quiz, optionally restricted to one user.
    async fn list_quiz_attempts(
        &self,
        quiz_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<Vec<QuizAttempt>>;

    // --- Audio ---
    async fn create_audio_file(
        &self,
        org_id: Uuid,
        uploaded_by: Uuid,
        req: RegisterAudioFileRequest,
    ) -> Result<AudioFile>;
    async fn get_audio_file(&self, id: Uuid) -> Result<Option<AudioFile>>;
    async fn list_audio_files(
        &self,
        org_id: Uuid,
        status: Option<AudioStatus>,
    ) -> Result<Vec<AudioFile>>;
    /// Creates the allocation and marks the file `allocated`.
    async fn allocate_audio_file(&self, allocation: NewAllocation) -> Result<AudioFileAllocation>;
    async fn list_allocations_for(&self, quality_analyst_id: Uuid)
    -> Result<Vec<AudioFileAllocation>>;
    /// The analyst's allocation for the file that has not been evaluated yet.
    async fn find_open_allocation(
        &self,
        audio_file_id: Uuid,
        quality_analyst_id: Uuid,
    ) -> Result<Option<AudioFileAllocation>>;
}

/// RepositoryState
///
/// Shared handle to the persistence layer held in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;
