use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::Repository;
use crate::{
    access::{Permission, Role, parse_permissions},
    error::{AppError, Result},
    models::*,
};

/// PostgresRepository
///
/// The `Repository` backed by PostgreSQL. All queries are runtime-checked
/// (`query_as::<_, T>`) against the schema in `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn permission_names(permissions: &[Permission]) -> Vec<String> {
    permissions.iter().map(|p| p.as_str().to_string()).collect()
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- Organizations & Users ---

    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>> {
        let org = sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(org)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self, org_id: Uuid) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE organization_id = $1 ORDER BY full_name",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// create_user
    ///
    /// Inserts the membership record. Identity (credentials) is managed by the external
    /// provider; the id generated here is the one the provider's `sub` claim must carry.
    async fn create_user(&self, org_id: Uuid, req: CreateUserRequest) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, organization_id, email, full_name, role, manager_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(req.email.trim().to_lowercase())
        .bind(req.full_name.trim())
        .bind(req.role)
        .bind(req.manager_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, "a user with this email already exists"))
    }

    async fn set_user_manager(
        &self,
        user_id: Uuid,
        manager_id: Option<Uuid>,
    ) -> Result<Option<User>> {
        let user =
            sqlx::query_as::<_, User>("UPDATE users SET manager_id = $2 WHERE id = $1 RETURNING *")
                .bind(user_id)
                .bind(manager_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn manager_links(&self, org_id: Uuid) -> Result<Vec<(Uuid, Option<Uuid>)>> {
        let links = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
            "SELECT id, manager_id FROM users WHERE organization_id = $1",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    async fn create_process(&self, org_id: Uuid, req: CreateProcessRequest) -> Result<Process> {
        let process = sqlx::query_as::<_, Process>(
            r#"
            INSERT INTO processes (id, organization_id, name, description)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(req.name)
        .bind(req.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(process)
    }

    async fn get_process(&self, id: Uuid) -> Result<Option<Process>> {
        let process = sqlx::query_as::<_, Process>("SELECT * FROM processes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(process)
    }

    async fn list_processes(&self, org_id: Uuid) -> Result<Vec<Process>> {
        let processes = sqlx::query_as::<_, Process>(
            "SELECT * FROM processes WHERE organization_id = $1 ORDER BY name",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(processes)
    }

    // --- Permissions ---

    async fn get_role_permissions(
        &self,
        org_id: Uuid,
        role: Role,
    ) -> Result<Option<Vec<Permission>>> {
        let stored = sqlx::query_scalar::<_, Vec<String>>(
            "SELECT permissions FROM role_permissions WHERE organization_id = $1 AND role = $2",
        )
        .bind(org_id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;
        Ok(stored.map(|raw| parse_permissions(&raw)))
    }

    async fn list_role_permissions(&self, org_id: Uuid) -> Result<Vec<(Role, Vec<Permission>)>> {
        let rows = sqlx::query_as::<_, (Role, Vec<String>)>(
            "SELECT role, permissions FROM role_permissions WHERE organization_id = $1",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(role, raw)| (role, parse_permissions(&raw)))
            .collect())
    }

    async fn set_role_permissions(
        &self,
        org_id: Uuid,
        role: Role,
        permissions: &[Permission],
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (organization_id, role, permissions)
            VALUES ($1, $2, $3)
            ON CONFLICT (organization_id, role) DO UPDATE SET permissions = EXCLUDED.permissions
            "#,
        )
        .bind(org_id)
        .bind(role)
        .bind(permission_names(permissions))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- Batches ---

    async fn create_batch(&self, org_id: Uuid, req: CreateBatchRequest) -> Result<Batch> {
        let batch = sqlx::query_as::<_, Batch>(
            r#"
            INSERT INTO organization_batches
                (id, organization_id, name, process_id, trainer_id, phase, capacity, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(req.name.trim())
        .bind(req.process_id)
        .bind(req.trainer_id)
        .bind(req.phase.unwrap_or_default())
        .bind(req.capacity)
        .bind(req.start_date)
        .bind(req.end_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(batch)
    }

    async fn get_batch(&self, id: Uuid) -> Result<Option<Batch>> {
        let batch =
            sqlx::query_as::<_, Batch>("SELECT * FROM organization_batches WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(batch)
    }

    async fn list_batches(&self, org_id: Uuid) -> Result<Vec<Batch>> {
        let batches = sqlx::query_as::<_, Batch>(
            "SELECT * FROM organization_batches WHERE organization_id = $1 ORDER BY start_date DESC, name",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(batches)
    }

    async fn assign_user_to_batch(
        &self,
        batch_id: Uuid,
        req: AssignUserRequest,
    ) -> Result<UserBatchProcess> {
        sqlx::query_as::<_, UserBatchProcess>(
            r#"
            INSERT INTO user_batch_processes (id, user_id, batch_id, process_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.user_id)
        .bind(batch_id)
        .bind(req.process_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, "user is already assigned to this batch and process"))
    }

    async fn list_batch_trainees(&self, batch_id: Uuid) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT DISTINCT u.*
            FROM users u
            JOIN user_batch_processes ubp ON ubp.user_id = u.id
            WHERE ubp.batch_id = $1
            ORDER BY u.full_name
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn is_assigned_to_batch(&self, user_id: Uuid, batch_id: Uuid) -> Result<bool> {
        let assigned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM user_batch_processes WHERE user_id = $1 AND batch_id = $2)",
        )
        .bind(user_id)
        .bind(batch_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(assigned)
    }

    // --- Phase Change Requests ---

    /// The partial unique index `one_pending_request_per_batch` turns a second pending
    /// request into a conflict.
    async fn create_phase_change_request(
        &self,
        req: NewPhaseChangeRequest,
    ) -> Result<PhaseChangeRequest> {
        sqlx::query_as::<_, PhaseChangeRequest>(
            r#"
            INSERT INTO batch_phase_change_requests
                (id, organization_id, batch_id, requested_by, current_phase, requested_phase, justification)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.organization_id)
        .bind(req.batch_id)
        .bind(req.requested_by)
        .bind(req.current_phase)
        .bind(req.requested_phase)
        .bind(req.justification)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, "batch already has a pending phase change request"))
    }

    async fn get_phase_change_request(&self, id: Uuid) -> Result<Option<PhaseChangeRequest>> {
        let request = sqlx::query_as::<_, PhaseChangeRequest>(
            "SELECT * FROM batch_phase_change_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    async fn list_phase_change_requests(
        &self,
        org_id: Uuid,
        status: Option<RequestStatus>,
    ) -> Result<Vec<PhaseChangeRequest>> {
        let requests = sqlx::query_as::<_, PhaseChangeRequest>(
            r#"
            SELECT * FROM batch_phase_change_requests
            WHERE organization_id = $1
              AND ($2::request_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(org_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    /// resolve_phase_change_request
    ///
    /// Runs in one transaction. The `status = 'pending'` and `phase = from_phase` guards make
    /// concurrent reviews race-safe: the loser affects no rows and gets a conflict.
    async fn resolve_phase_change_request(
        &self,
        resolution: PhaseChangeResolution,
    ) -> Result<PhaseChangeRequest> {
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, PhaseChangeRequest>(
            r#"
            UPDATE batch_phase_change_requests
            SET status = $2, reviewer_id = $3, reviewer_comments = $4, resolved_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(resolution.request_id)
        .bind(resolution.status)
        .bind(resolution.reviewer_id)
        .bind(resolution.comments)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Conflict("request is no longer pending".into()))?;

        if resolution.status == RequestStatus::Approved {
            let moved = sqlx::query(
                "UPDATE organization_batches SET phase = $2 WHERE id = $1 AND phase = $3",
            )
            .bind(resolution.batch_id)
            .bind(resolution.to_phase)
            .bind(resolution.from_phase)
            .execute(&mut *tx)
            .await?;

            if moved.rows_affected() == 0 {
                return Err(AppError::Conflict(
                    "batch phase changed since the request was raised".into(),
                ));
            }
        }

        tx.commit().await?;
        Ok(request)
    }

    // --- Attendance ---

    async fn upsert_attendance(&self, record: NewAttendance) -> Result<Attendance> {
        let attendance = sqlx::query_as::<_, Attendance>(
            r#"
            INSERT INTO attendance (id, organization_id, batch_id, trainee_id, date, status, marked_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (trainee_id, date, batch_id) DO UPDATE
                SET status = EXCLUDED.status,
                    marked_by = EXCLUDED.marked_by,
                    updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.organization_id)
        .bind(record.batch_id)
        .bind(record.trainee_id)
        .bind(record.date)
        .bind(record.status)
        .bind(record.marked_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(attendance)
    }

    async fn list_attendance(
        &self,
        batch_id: Uuid,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Attendance>> {
        let rows = sqlx::query_as::<_, Attendance>(
            r#"
            SELECT * FROM attendance
            WHERE batch_id = $1 AND ($2::date IS NULL OR date = $2)
            ORDER BY date DESC, trainee_id
            "#,
        )
        .bind(batch_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // --- Evaluation Templates ---

    /// Inserts the template and its whole pillar/parameter tree in one transaction.
    /// `order_index` follows the request order.
    async fn create_evaluation_template(
        &self,
        org_id: Uuid,
        created_by: Uuid,
        req: CreateTemplateRequest,
    ) -> Result<EvaluationTemplateDetail> {
        let mut tx = self.pool.begin().await?;

        let template = sqlx::query_as::<_, EvaluationTemplate>(
            r#"
            INSERT INTO evaluation_templates (id, organization_id, name, description, passing_score, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(req.name.trim())
        .bind(req.description)
        .bind(req.passing_score)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        let mut pillars = Vec::with_capacity(req.pillars.len());
        for (pillar_idx, pillar_req) in req.pillars.into_iter().enumerate() {
            let pillar = sqlx::query_as::<_, EvaluationPillar>(
                r#"
                INSERT INTO evaluation_pillars (id, template_id, name, weightage, order_index)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(template.id)
            .bind(pillar_req.name.trim())
            .bind(pillar_req.weightage)
            .bind(pillar_idx as i32)
            .fetch_one(&mut *tx)
            .await?;

            let mut parameters = Vec::with_capacity(pillar_req.parameters.len());
            for (param_idx, param) in pillar_req.parameters.into_iter().enumerate() {
                let parameter = sqlx::query_as::<_, EvaluationParameter>(
                    r#"
                    INSERT INTO evaluation_parameters
                        (id, pillar_id, name, guidelines, rating_type, weightage, weightage_enabled, is_fatal, order_index)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(pillar.id)
                .bind(param.name.trim())
                .bind(param.guidelines)
                .bind(param.rating_type)
                .bind(param.weightage)
                .bind(param.weightage_enabled)
                .bind(param.is_fatal)
                .bind(param_idx as i32)
                .fetch_one(&mut *tx)
                .await?;
                parameters.push(parameter);
            }

            pillars.push(PillarDetail { pillar, parameters });
        }

        tx.commit().await?;
        Ok(EvaluationTemplateDetail { template, pillars })
    }

    async fn get_evaluation_template(&self, id: Uuid) -> Result<Option<EvaluationTemplateDetail>> {
        let Some(template) = sqlx::query_as::<_, EvaluationTemplate>(
            "SELECT * FROM evaluation_templates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let pillars = sqlx::query_as::<_, EvaluationPillar>(
            "SELECT * FROM evaluation_pillars WHERE template_id = $1 ORDER BY order_index",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let pillar_ids: Vec<Uuid> = pillars.iter().map(|p| p.id).collect();
        let parameters = sqlx::query_as::<_, EvaluationParameter>(
            "SELECT * FROM evaluation_parameters WHERE pillar_id = ANY($1) ORDER BY order_index",
        )
        .bind(&pillar_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_pillar: HashMap<Uuid, Vec<EvaluationParameter>> = HashMap::new();
        for param in parameters {
            by_pillar.entry(param.pillar_id).or_default().push(param);
        }

        let pillars = pillars
            .into_iter()
            .map(|pillar| PillarDetail {
                parameters: by_pillar.remove(&pillar.id).unwrap_or_default(),
                pillar,
            })
            .collect();

        Ok(Some(EvaluationTemplateDetail { template, pillars }))
    }

    async fn list_evaluation_templates(&self, org_id: Uuid) -> Result<Vec<EvaluationTemplate>> {
        let templates = sqlx::query_as::<_, EvaluationTemplate>(
            "SELECT * FROM evaluation_templates WHERE organization_id = $1 ORDER BY created_at DESC",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(templates)
    }

    async fn set_template_status(
        &self,
        id: Uuid,
        status: TemplateStatus,
    ) -> Result<Option<EvaluationTemplate>> {
        let template = sqlx::query_as::<_, EvaluationTemplate>(
            "UPDATE evaluation_templates SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(template)
    }

    // --- Evaluations ---

    /// save_evaluation
    ///
    /// Writes the result and its parameter rows in one transaction. For audio evaluations the
    /// allocation is closed in the same transaction; an allocation that was closed
    /// concurrently aborts the whole submission.
    async fn save_evaluation(&self, evaluation: NewEvaluation) -> Result<EvaluationResult> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query_as::<_, EvaluationResult>(
            r#"
            INSERT INTO evaluations
                (id, organization_id, template_id, trainee_id, batch_id, evaluator_id,
                 evaluation_type, audio_file_id, final_score, passed, fatal_failure)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(evaluation.organization_id)
        .bind(evaluation.template_id)
        .bind(evaluation.trainee_id)
        .bind(evaluation.batch_id)
        .bind(evaluation.evaluator_id)
        .bind(evaluation.evaluation_type)
        .bind(evaluation.audio_file_id)
        .bind(evaluation.final_score)
        .bind(evaluation.passed)
        .bind(evaluation.fatal_failure)
        .fetch_one(&mut *tx)
        .await?;

        for score in evaluation.scores {
            sqlx::query(
                r#"
                INSERT INTO evaluation_scores (id, evaluation_id, parameter_id, score, normalized_score, comment)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(result.id)
            .bind(score.parameter_id)
            .bind(score.score)
            .bind(score.normalized_score)
            .bind(score.comment)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(allocation_id) = evaluation.allocation_id {
            let closed = sqlx::query(
                r#"
                UPDATE audio_file_allocations
                SET status = 'evaluated', evaluation_id = $2
                WHERE id = $1 AND status <> 'evaluated'
                "#,
            )
            .bind(allocation_id)
            .bind(result.id)
            .execute(&mut *tx)
            .await?;

            if closed.rows_affected() == 0 {
                return Err(AppError::Conflict(
                    "audio allocation has already been evaluated".into(),
                ));
            }

            sqlx::query("UPDATE audio_files SET status = 'evaluated' WHERE id = $1")
                .bind(evaluation.audio_file_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(result)
    }

    async fn get_evaluation(&self, id: Uuid) -> Result<Option<EvaluationDetail>> {
        let Some(evaluation) =
            sqlx::query_as::<_, EvaluationResult>("SELECT * FROM evaluations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let scores = sqlx::query_as::<_, EvaluationParameterResult>(
            "SELECT * FROM evaluation_scores WHERE evaluation_id = $1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(EvaluationDetail { evaluation, scores }))
    }

    async fn list_evaluations(
        &self,
        org_id: Uuid,
        trainee_id: Option<Uuid>,
    ) -> Result<Vec<EvaluationResult>> {
        let rows = sqlx::query_as::<_, EvaluationResult>(
            r#"
            SELECT * FROM evaluations
            WHERE organization_id = $1 AND ($2::uuid IS NULL OR trainee_id = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(org_id)
        .bind(trainee_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // --- Question Bank & Quizzes ---

    async fn create_question(&self, org_id: Uuid, req: CreateQuestionRequest) -> Result<Question> {
        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions
                (id, organization_id, process_id, question, question_type, options, correct_answer, category, difficulty)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(req.process_id)
        .bind(req.question.trim())
        .bind(req.question_type)
        .bind(req.options)
        .bind(req.correct_answer.trim())
        .bind(req.category)
        .bind(req.difficulty)
        .fetch_one(&self.pool)
        .await?;
        Ok(question)
    }

    async fn list_questions(
        &self,
        org_id: Uuid,
        category: Option<String>,
        process_id: Option<Uuid>,
    ) -> Result<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT * FROM questions
            WHERE organization_id = $1
              AND ($2::text IS NULL OR category = $2)
              AND ($3::uuid IS NULL OR process_id = $3)
            ORDER BY created_at
            "#,
        )
        .bind(org_id)
        .bind(category)
        .bind(process_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    async fn get_questions(&self, ids: &[Uuid]) -> Result<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(questions)
    }

    async fn create_quiz_template(
        &self,
        org_id: Uuid,
        created_by: Uuid,
        req: CreateQuizTemplateRequest,
    ) -> Result<QuizTemplate> {
        let template = sqlx::query_as::<_, QuizTemplate>(
            r#"
            INSERT INTO quiz_templates
                (id, organization_id, name, description, time_limit_minutes, question_count,
                 passing_score, category, process_id, batch_id, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(req.name.trim())
        .bind(req.description)
        .bind(req.time_limit_minutes)
        .bind(req.question_count)
        .bind(req.passing_score)
        .bind(req.category)
        .bind(req.process_id)
        .bind(req.batch_id)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(template)
    }

    async fn get_quiz_template(&self, id: Uuid) -> Result<Option<QuizTemplate>> {
        let template =
            sqlx::query_as::<_, QuizTemplate>("SELECT * FROM quiz_templates WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(template)
    }

    async fn list_quiz_templates(&self, org_id: Uuid) -> Result<Vec<QuizTemplate>> {
        let templates = sqlx::query_as::<_, QuizTemplate>(
            "SELECT * FROM quiz_templates WHERE organization_id = $1 ORDER BY created_at DESC",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(templates)
    }

    async fn create_quiz(&self, quiz: NewQuiz) -> Result<Quiz> {
        let quiz = sqlx::query_as::<_, Quiz>(
            r#"
            INSERT INTO quizzes
                (id, organization_id, template_id, batch_id, name, question_ids,
                 time_limit_minutes, passing_score, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(quiz.organization_id)
        .bind(quiz.template_id)
        .bind(quiz.batch_id)
        .bind(quiz.name)
        .bind(quiz.question_ids)
        .bind(quiz.time_limit_minutes)
        .bind(quiz.passing_score)
        .bind(quiz.created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(quiz)
    }

    async fn get_quiz(&self, id: Uuid) -> Result<Option<Quiz>> {
        let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(quiz)
    }

    async fn set_quiz_status(&self, id: Uuid, status: QuizStatus) -> Result<Option<Quiz>> {
        let quiz =
            sqlx::query_as::<_, Quiz>("UPDATE quizzes SET status = $2 WHERE id = $1 RETURNING *")
                .bind(id)
                .bind(status)
                .fetch_optional(&self.pool)
                .await?;
        Ok(quiz)
    }

    async fn save_quiz_attempt(&self, attempt: NewQuizAttempt) -> Result<QuizAttemptDetail> {
        let mut tx = self.pool.begin().await?;

        let stored = sqlx::query_as::<_, QuizAttempt>(
            r#"
            INSERT INTO quiz_attempts (id, quiz_id, user_id, score, passed)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(attempt.quiz_id)
        .bind(attempt.user_id)
        .bind(attempt.score)
        .bind(attempt.passed)
        .fetch_one(&mut *tx)
        .await?;

        for answer in &attempt.answers {
            sqlx::query(
                r#"
                INSERT INTO quiz_attempt_answers (attempt_id, question_id, answer, correct)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(stored.id)
            .bind(answer.question_id)
            .bind(&answer.answer)
            .bind(answer.correct)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(QuizAttemptDetail {
            attempt: stored,
            answers: attempt.answers,
        })
    }

    async fn list_quiz_attempts(
        &self,
        quiz_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<Vec<QuizAttempt>> {
        let attempts = sqlx::query_as::<_, QuizAttempt>(
            r#"
            SELECT * FROM quiz_attempts
            WHERE quiz_id = $1 AND ($2::uuid IS NULL OR user_id = $2)
            ORDER BY completed_at DESC
            "#,
        )
        .bind(quiz_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    // --- Audio ---

    async fn create_audio_file(
        &self,
        org_id: Uuid,
        uploaded_by: Uuid,
        req: RegisterAudioFileRequest,
    ) -> Result<AudioFile> {
        sqlx::query_as::<_, AudioFile>(
            r#"
            INSERT INTO audio_files
                (id, organization_id, filename, storage_key, language, duration_seconds, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(req.filename)
        .bind(req.storage_key)
        .bind(req.language)
        .bind(req.duration_seconds)
        .bind(uploaded_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, "this recording is already registered"))
    }

    async fn get_audio_file(&self, id: Uuid) -> Result<Option<AudioFile>> {
        let file = sqlx::query_as::<_, AudioFile>("SELECT * FROM audio_files WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    async fn list_audio_files(
        &self,
        org_id: Uuid,
        status: Option<AudioStatus>,
    ) -> Result<Vec<AudioFile>> {
        let files = sqlx::query_as::<_, AudioFile>(
            r#"
            SELECT * FROM audio_files
            WHERE organization_id = $1 AND ($2::audio_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(org_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    async fn allocate_audio_file(&self, allocation: NewAllocation) -> Result<AudioFileAllocation> {
        let mut tx = self.pool.begin().await?;

        let stored = sqlx::query_as::<_, AudioFileAllocation>(
            r#"
            INSERT INTO audio_file_allocations (id, audio_file_id, quality_analyst_id, allocated_by, due_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(allocation.audio_file_id)
        .bind(allocation.quality_analyst_id)
        .bind(allocation.allocated_by)
        .bind(allocation.due_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_insert(e, "recording already has an open allocation"))?;

        sqlx::query("UPDATE audio_files SET status = 'allocated' WHERE id = $1")
            .bind(allocation.audio_file_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn list_allocations_for(
        &self,
        quality_analyst_id: Uuid,
    ) -> Result<Vec<AudioFileAllocation>> {
        let rows = sqlx::query_as::<_, AudioFileAllocation>(
            r#"
            SELECT * FROM audio_file_allocations
            WHERE quality_analyst_id = $1
            ORDER BY due_date NULLS LAST, created_at
            "#,
        )
        .bind(quality_analyst_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_open_allocation(
        &self,
        audio_file_id: Uuid,
        quality_analyst_id: Uuid,
    ) -> Result<Option<AudioFileAllocation>> {
        let row = sqlx::query_as::<_, AudioFileAllocation>(
            r#"
            SELECT * FROM audio_file_allocations
            WHERE audio_file_id = $1 AND quality_analyst_id = $2 AND status <> 'evaluated'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(audio_file_id)
        .bind(quality_analyst_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
