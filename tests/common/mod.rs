#![allow(dead_code)]

use async_trait::async_trait;
use axum::{http::StatusCode, response::IntoResponse};
use chrono::{NaiveDate, Utc};
use lms_portal::{
    AppState,
    access::{Permission, Role},
    auth::AuthUser,
    config::AppConfig,
    error::{AppError, Result},
    models::*,
    repository::{Repository, RepositoryState},
    storage::{MockStorageService, StorageState},
};
use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use uuid::Uuid;

// --- In-memory repository ---

#[derive(Default)]
struct Store {
    organizations: HashMap<Uuid, Organization>,
    users: HashMap<Uuid, User>,
    processes: Vec<Process>,
    role_permissions: HashMap<(Uuid, Role), Vec<Permission>>,
    batches: HashMap<Uuid, Batch>,
    assignments: Vec<UserBatchProcess>,
    phase_requests: Vec<PhaseChangeRequest>,
    attendance: Vec<Attendance>,
    templates: HashMap<Uuid, EvaluationTemplateDetail>,
    evaluations: Vec<EvaluationDetail>,
    questions: Vec<Question>,
    quiz_templates: Vec<QuizTemplate>,
    quizzes: Vec<Quiz>,
    attempts: Vec<QuizAttemptDetail>,
    audio_files: Vec<AudioFile>,
    allocations: Vec<AudioFileAllocation>,
}

/// Stateful stand-in for `PostgresRepository`. Mirrors its conflict semantics so handler
/// flows can be exercised end to end without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
    /// When set, `get_user` fails like a dropped connection.
    pub fail_user_lookup: AtomicBool,
}

impl InMemoryRepository {
    fn with<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        let mut store = self.store.lock().unwrap();
        f(&mut store)
    }

    // --- Seeding helpers ---

    pub fn add_org(&self, name: &str) -> Organization {
        let org = Organization {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.with(|s| s.organizations.insert(org.id, org.clone()));
        org
    }

    pub fn add_user(&self, org_id: Uuid, role: Role, manager_id: Option<Uuid>) -> User {
        let id = Uuid::new_v4();
        let user = User {
            id,
            organization_id: org_id,
            email: format!("{id}@callcenter.example"),
            full_name: format!("{role} {}", &id.to_string()[..8]),
            role,
            manager_id,
            active: true,
            created_at: Utc::now(),
        };
        self.with(|s| s.users.insert(id, user.clone()));
        user
    }

    pub fn deactivate(&self, user_id: Uuid) {
        self.with(|s| {
            if let Some(u) = s.users.get_mut(&user_id) {
                u.active = false;
            }
        });
    }

    pub fn add_process(&self, org_id: Uuid, name: &str) -> Process {
        let process = Process {
            id: Uuid::new_v4(),
            organization_id: org_id,
            name: name.to_string(),
            description: None,
        };
        self.with(|s| s.processes.push(process.clone()));
        process
    }

    pub fn add_batch(&self, org_id: Uuid, trainer_id: Option<Uuid>, phase: BatchPhase) -> Batch {
        let batch = Batch {
            id: Uuid::new_v4(),
            organization_id: org_id,
            name: format!("Wave {}", &Uuid::new_v4().to_string()[..4]),
            process_id: None,
            trainer_id,
            phase,
            capacity: 20,
            start_date: date(2025, 1, 6),
            end_date: None,
            created_at: Utc::now(),
        };
        self.with(|s| s.batches.insert(batch.id, batch.clone()));
        batch
    }

    pub fn batch(&self, id: Uuid) -> Batch {
        self.with(|s| s.batches[&id].clone())
    }

    pub fn set_batch_phase(&self, id: Uuid, phase: BatchPhase) {
        self.with(|s| {
            if let Some(b) = s.batches.get_mut(&id) {
                b.phase = phase;
            }
        });
    }

    pub fn assign(&self, user_id: Uuid, batch_id: Uuid, process_id: Uuid) {
        self.with(|s| {
            s.assignments.push(UserBatchProcess {
                id: Uuid::new_v4(),
                user_id,
                batch_id,
                process_id,
                status: "active".to_string(),
                joined_at: Utc::now(),
            })
        });
    }

    pub fn add_template(
        &self,
        org_id: Uuid,
        created_by: Uuid,
        req: CreateTemplateRequest,
        status: TemplateStatus,
    ) -> EvaluationTemplateDetail {
        let detail = build_template(org_id, created_by, req, status);
        self.with(|s| s.templates.insert(detail.template.id, detail.clone()));
        detail
    }

    pub fn add_question(&self, org_id: Uuid, category: &str, answer: &str) -> Question {
        let question = Question {
            id: Uuid::new_v4(),
            organization_id: org_id,
            process_id: None,
            question: format!("What is the answer ({answer})?"),
            question_type: QuestionType::ShortAnswer,
            options: vec![],
            correct_answer: answer.to_string(),
            category: Some(category.to_string()),
            difficulty: Difficulty::Medium,
            created_at: Utc::now(),
        };
        self.with(|s| s.questions.push(question.clone()));
        question
    }

    pub fn add_audio_file(&self, org_id: Uuid, uploaded_by: Uuid) -> AudioFile {
        let id = Uuid::new_v4();
        let file = AudioFile {
            id,
            organization_id: org_id,
            filename: "call.mp3".to_string(),
            storage_key: format!("audio/{org_id}/{id}.mp3"),
            language: "en".to_string(),
            duration_seconds: Some(300),
            status: AudioStatus::Pending,
            uploaded_by,
            created_at: Utc::now(),
        };
        self.with(|s| s.audio_files.push(file.clone()));
        file
    }

    pub fn audio_file(&self, id: Uuid) -> AudioFile {
        self.with(|s| s.audio_files.iter().find(|f| f.id == id).cloned().unwrap())
    }

    pub fn allocations(&self) -> Vec<AudioFileAllocation> {
        self.with(|s| s.allocations.clone())
    }

    pub fn stored_evaluations(&self) -> Vec<EvaluationDetail> {
        self.with(|s| s.evaluations.clone())
    }
}

/// Builds the stored form of a template request, assigning ids and `order_index` in input order.
pub fn build_template(
    org_id: Uuid,
    created_by: Uuid,
    req: CreateTemplateRequest,
    status: TemplateStatus,
) -> EvaluationTemplateDetail {
    let template = EvaluationTemplate {
        id: Uuid::new_v4(),
        organization_id: org_id,
        name: req.name,
        description: req.description,
        passing_score: req.passing_score,
        status,
        created_by,
        created_at: Utc::now(),
    };
    let pillars = req
        .pillars
        .into_iter()
        .enumerate()
        .map(|(pi, p)| {
            let pillar = EvaluationPillar {
                id: Uuid::new_v4(),
                template_id: template.id,
                name: p.name,
                weightage: p.weightage,
                order_index: pi as i32,
            };
            let parameters = p
                .parameters
                .into_iter()
                .enumerate()
                .map(|(qi, q)| EvaluationParameter {
                    id: Uuid::new_v4(),
                    pillar_id: pillar.id,
                    name: q.name,
                    guidelines: q.guidelines,
                    rating_type: q.rating_type,
                    weightage: q.weightage,
                    weightage_enabled: q.weightage_enabled,
                    is_fatal: q.is_fatal,
                    order_index: qi as i32,
                })
                .collect();
            PillarDetail { pillar, parameters }
        })
        .collect();
    EvaluationTemplateDetail { template, pillars }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>> {
        Ok(self.with(|s| s.organizations.get(&id).cloned()))
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        if self.fail_user_lookup.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.with(|s| s.users.get(&id).cloned()))
    }

    async fn list_users(&self, org_id: Uuid) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.with(|s| {
            s.users
                .values()
                .filter(|u| u.organization_id == org_id)
                .cloned()
                .collect()
        });
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(users)
    }

    async fn create_user(&self, org_id: Uuid, req: CreateUserRequest) -> Result<User> {
        self.with(|s| {
            if s.users.values().any(|u| u.email == req.email) {
                return Err(AppError::Conflict("email is already in use".into()));
            }
            let user = User {
                id: Uuid::new_v4(),
                organization_id: org_id,
                email: req.email,
                full_name: req.full_name,
                role: req.role,
                manager_id: req.manager_id,
                active: true,
                created_at: Utc::now(),
            };
            s.users.insert(user.id, user.clone());
            Ok(user)
        })
    }

    async fn set_user_manager(
        &self,
        user_id: Uuid,
        manager_id: Option<Uuid>,
    ) -> Result<Option<User>> {
        Ok(self.with(|s| {
            s.users.get_mut(&user_id).map(|u| {
                u.manager_id = manager_id;
                u.clone()
            })
        }))
    }

    async fn manager_links(&self, org_id: Uuid) -> Result<Vec<(Uuid, Option<Uuid>)>> {
        Ok(self.with(|s| {
            s.users
                .values()
                .filter(|u| u.organization_id == org_id)
                .map(|u| (u.id, u.manager_id))
                .collect()
        }))
    }

    async fn create_process(&self, org_id: Uuid, req: CreateProcessRequest) -> Result<Process> {
        let process = Process {
            id: Uuid::new_v4(),
            organization_id: org_id,
            name: req.name,
            description: req.description,
        };
        self.with(|s| s.processes.push(process.clone()));
        Ok(process)
    }

    async fn get_process(&self, id: Uuid) -> Result<Option<Process>> {
        Ok(self.with(|s| s.processes.iter().find(|p| p.id == id).cloned()))
    }

    async fn list_processes(&self, org_id: Uuid) -> Result<Vec<Process>> {
        Ok(self.with(|s| {
            s.processes
                .iter()
                .filter(|p| p.organization_id == org_id)
                .cloned()
                .collect()
        }))
    }

    async fn get_role_permissions(
        &self,
        org_id: Uuid,
        role: Role,
    ) -> Result<Option<Vec<Permission>>> {
        Ok(self.with(|s| s.role_permissions.get(&(org_id, role)).cloned()))
    }

    async fn list_role_permissions(&self, org_id: Uuid) -> Result<Vec<(Role, Vec<Permission>)>> {
        Ok(self.with(|s| {
            s.role_permissions
                .iter()
                .filter(|((org, _), _)| *org == org_id)
                .map(|((_, role), perms)| (*role, perms.clone()))
                .collect()
        }))
    }

    async fn set_role_permissions(
        &self,
        org_id: Uuid,
        role: Role,
        permissions: &[Permission],
    ) -> Result<()> {
        self.with(|s| {
            s.role_permissions
                .insert((org_id, role), permissions.to_vec())
        });
        Ok(())
    }

    async fn create_batch(&self, org_id: Uuid, req: CreateBatchRequest) -> Result<Batch> {
        let batch = Batch {
            id: Uuid::new_v4(),
            organization_id: org_id,
            name: req.name,
            process_id: req.process_id,
            trainer_id: req.trainer_id,
            phase: req.phase.unwrap_or_default(),
            capacity: req.capacity,
            start_date: req.start_date,
            end_date: req.end_date,
            created_at: Utc::now(),
        };
        self.with(|s| s.batches.insert(batch.id, batch.clone()));
        Ok(batch)
    }

    async fn get_batch(&self, id: Uuid) -> Result<Option<Batch>> {
        Ok(self.with(|s| s.batches.get(&id).cloned()))
    }

    async fn list_batches(&self, org_id: Uuid) -> Result<Vec<Batch>> {
        Ok(self.with(|s| {
            s.batches
                .values()
                .filter(|b| b.organization_id == org_id)
                .cloned()
                .collect()
        }))
    }

    async fn assign_user_to_batch(
        &self,
        batch_id: Uuid,
        req: AssignUserRequest,
    ) -> Result<UserBatchProcess> {
        self.with(|s| {
            let exists = s.assignments.iter().any(|a| {
                a.user_id == req.user_id && a.batch_id == batch_id && a.process_id == req.process_id
            });
            if exists {
                return Err(AppError::Conflict(
                    "user is already assigned to this batch and process".into(),
                ));
            }
            let assignment = UserBatchProcess {
                id: Uuid::new_v4(),
                user_id: req.user_id,
                batch_id,
                process_id: req.process_id,
                status: "active".to_string(),
                joined_at: Utc::now(),
            };
            s.assignments.push(assignment.clone());
            Ok(assignment)
        })
    }

    async fn list_batch_trainees(&self, batch_id: Uuid) -> Result<Vec<User>> {
        Ok(self.with(|s| {
            let mut users: Vec<User> = s
                .users
                .values()
                .filter(|u| {
                    s.assignments
                        .iter()
                        .any(|a| a.batch_id == batch_id && a.user_id == u.id)
                })
                .cloned()
                .collect();
            users.sort_by(|a, b| a.full_name.cmp(&b.full_name));
            users
        }))
    }

    async fn is_assigned_to_batch(&self, user_id: Uuid, batch_id: Uuid) -> Result<bool> {
        Ok(self.with(|s| {
            s.assignments
                .iter()
                .any(|a| a.user_id == user_id && a.batch_id == batch_id)
        }))
    }

    async fn create_phase_change_request(
        &self,
        req: NewPhaseChangeRequest,
    ) -> Result<PhaseChangeRequest> {
        self.with(|s| {
            let pending = s
                .phase_requests
                .iter()
                .any(|r| r.batch_id == req.batch_id && r.status == RequestStatus::Pending);
            if pending {
                return Err(AppError::Conflict(
                    "batch already has a pending phase change request".into(),
                ));
            }
            let request = PhaseChangeRequest {
                id: Uuid::new_v4(),
                organization_id: req.organization_id,
                batch_id: req.batch_id,
                requested_by: req.requested_by,
                current_phase: req.current_phase,
                requested_phase: req.requested_phase,
                justification: req.justification,
                status: RequestStatus::Pending,
                reviewer_id: None,
                reviewer_comments: None,
                created_at: Utc::now(),
                resolved_at: None,
            };
            s.phase_requests.push(request.clone());
            Ok(request)
        })
    }

    async fn get_phase_change_request(&self, id: Uuid) -> Result<Option<PhaseChangeRequest>> {
        Ok(self.with(|s| s.phase_requests.iter().find(|r| r.id == id).cloned()))
    }

    async fn list_phase_change_requests(
        &self,
        org_id: Uuid,
        status: Option<RequestStatus>,
    ) -> Result<Vec<PhaseChangeRequest>> {
        Ok(self.with(|s| {
            s.phase_requests
                .iter()
                .rev()
                .filter(|r| r.organization_id == org_id)
                .filter(|r| status.is_none_or(|st| r.status == st))
                .cloned()
                .collect()
        }))
    }

    async fn resolve_phase_change_request(
        &self,
        resolution: PhaseChangeResolution,
    ) -> Result<PhaseChangeRequest> {
        self.with(|s| {
            let idx = s
                .phase_requests
                .iter()
                .position(|r| r.id == resolution.request_id && r.status == RequestStatus::Pending)
                .ok_or_else(|| AppError::Conflict("request is no longer pending".into()))?;

            if resolution.status == RequestStatus::Approved {
                let batch = s
                    .batches
                    .get_mut(&resolution.batch_id)
                    .filter(|b| b.phase == resolution.from_phase)
                    .ok_or_else(|| {
                        AppError::Conflict(
                            "batch phase changed since the request was raised".into(),
                        )
                    })?;
                batch.phase = resolution.to_phase;
            }

            let request = &mut s.phase_requests[idx];
            request.status = resolution.status;
            request.reviewer_id = Some(resolution.reviewer_id);
            request.reviewer_comments = resolution.comments;
            request.resolved_at = Some(Utc::now());
            Ok(request.clone())
        })
    }

    async fn upsert_attendance(&self, record: NewAttendance) -> Result<Attendance> {
        Ok(self.with(|s| {
            if let Some(existing) = s.attendance.iter_mut().find(|a| {
                a.trainee_id == record.trainee_id
                    && a.date == record.date
                    && a.batch_id == record.batch_id
            }) {
                existing.status = record.status;
                existing.marked_by = record.marked_by;
                existing.updated_at = Utc::now();
                return existing.clone();
            }
            let row = Attendance {
                id: Uuid::new_v4(),
                organization_id: record.organization_id,
                batch_id: record.batch_id,
                trainee_id: record.trainee_id,
                date: record.date,
                status: record.status,
                marked_by: record.marked_by,
                updated_at: Utc::now(),
            };
            s.attendance.push(row.clone());
            row
        }))
    }

    async fn list_attendance(
        &self,
        batch_id: Uuid,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Attendance>> {
        Ok(self.with(|s| {
            s.attendance
                .iter()
                .filter(|a| a.batch_id == batch_id && date.is_none_or(|d| a.date == d))
                .cloned()
                .collect()
        }))
    }

    async fn create_evaluation_template(
        &self,
        org_id: Uuid,
        created_by: Uuid,
        req: CreateTemplateRequest,
    ) -> Result<EvaluationTemplateDetail> {
        Ok(self.add_template(org_id, created_by, req, TemplateStatus::Draft))
    }

    async fn get_evaluation_template(&self, id: Uuid) -> Result<Option<EvaluationTemplateDetail>> {
        Ok(self.with(|s| s.templates.get(&id).cloned()))
    }

    async fn list_evaluation_templates(&self, org_id: Uuid) -> Result<Vec<EvaluationTemplate>> {
        Ok(self.with(|s| {
            s.templates
                .values()
                .filter(|t| t.template.organization_id == org_id)
                .map(|t| t.template.clone())
                .collect()
        }))
    }

    async fn set_template_status(
        &self,
        id: Uuid,
        status: TemplateStatus,
    ) -> Result<Option<EvaluationTemplate>> {
        Ok(self.with(|s| {
            s.templates.get_mut(&id).map(|t| {
                t.template.status = status;
                t.template.clone()
            })
        }))
    }

    async fn save_evaluation(&self, evaluation: NewEvaluation) -> Result<EvaluationResult> {
        self.with(|s| {
            let id = Uuid::new_v4();
            if let Some(allocation_id) = evaluation.allocation_id {
                let allocation = s
                    .allocations
                    .iter_mut()
                    .find(|a| a.id == allocation_id && a.status != AllocationStatus::Evaluated)
                    .ok_or_else(|| {
                        AppError::Conflict("recording has already been evaluated".into())
                    })?;
                allocation.status = AllocationStatus::Evaluated;
                allocation.evaluation_id = Some(id);
                let file_id = allocation.audio_file_id;
                if let Some(file) = s.audio_files.iter_mut().find(|f| f.id == file_id) {
                    file.status = AudioStatus::Evaluated;
                }
            }

            let result = EvaluationResult {
                id,
                organization_id: evaluation.organization_id,
                template_id: evaluation.template_id,
                trainee_id: evaluation.trainee_id,
                batch_id: evaluation.batch_id,
                evaluator_id: evaluation.evaluator_id,
                evaluation_type: evaluation.evaluation_type,
                audio_file_id: evaluation.audio_file_id,
                final_score: evaluation.final_score,
                passed: evaluation.passed,
                fatal_failure: evaluation.fatal_failure,
                created_at: Utc::now(),
            };
            let scores = evaluation
                .scores
                .into_iter()
                .map(|p| EvaluationParameterResult {
                    id: Uuid::new_v4(),
                    evaluation_id: id,
                    parameter_id: p.parameter_id,
                    score: p.score,
                    normalized_score: p.normalized_score,
                    comment: p.comment,
                })
                .collect();
            s.evaluations.push(EvaluationDetail {
                evaluation: result.clone(),
                scores,
            });
            Ok(result)
        })
    }

    async fn get_evaluation(&self, id: Uuid) -> Result<Option<EvaluationDetail>> {
        Ok(self.with(|s| s.evaluations.iter().find(|e| e.evaluation.id == id).cloned()))
    }

    async fn list_evaluations(
        &self,
        org_id: Uuid,
        trainee_id: Option<Uuid>,
    ) -> Result<Vec<EvaluationResult>> {
        Ok(self.with(|s| {
            s.evaluations
                .iter()
                .rev()
                .map(|e| &e.evaluation)
                .filter(|e| e.organization_id == org_id)
                .filter(|e| trainee_id.is_none_or(|t| e.trainee_id == t))
                .cloned()
                .collect()
        }))
    }

    async fn create_question(&self, org_id: Uuid, req: CreateQuestionRequest) -> Result<Question> {
        let question = Question {
            id: Uuid::new_v4(),
            organization_id: org_id,
            process_id: req.process_id,
            question: req.question,
            question_type: req.question_type,
            options: req.options,
            correct_answer: req.correct_answer,
            category: req.category,
            difficulty: req.difficulty,
            created_at: Utc::now(),
        };
        self.with(|s| s.questions.push(question.clone()));
        Ok(question)
    }

    async fn list_questions(
        &self,
        org_id: Uuid,
        category: Option<String>,
        process_id: Option<Uuid>,
    ) -> Result<Vec<Question>> {
        Ok(self.with(|s| {
            s.questions
                .iter()
                .filter(|q| q.organization_id == org_id)
                .filter(|q| category.is_none() || q.category == category)
                .filter(|q| process_id.is_none() || q.process_id == process_id)
                .cloned()
                .collect()
        }))
    }

    async fn get_questions(&self, ids: &[Uuid]) -> Result<Vec<Question>> {
        Ok(self.with(|s| {
            s.questions
                .iter()
                .filter(|q| ids.contains(&q.id))
                .cloned()
                .collect()
        }))
    }

    async fn create_quiz_template(
        &self,
        org_id: Uuid,
        created_by: Uuid,
        req: CreateQuizTemplateRequest,
    ) -> Result<QuizTemplate> {
        let template = QuizTemplate {
            id: Uuid::new_v4(),
            organization_id: org_id,
            name: req.name,
            description: req.description,
            time_limit_minutes: req.time_limit_minutes,
            question_count: req.question_count,
            passing_score: req.passing_score,
            category: req.category,
            process_id: req.process_id,
            batch_id: req.batch_id,
            created_by,
            created_at: Utc::now(),
        };
        self.with(|s| s.quiz_templates.push(template.clone()));
        Ok(template)
    }

    async fn get_quiz_template(&self, id: Uuid) -> Result<Option<QuizTemplate>> {
        Ok(self.with(|s| s.quiz_templates.iter().find(|t| t.id == id).cloned()))
    }

    async fn list_quiz_templates(&self, org_id: Uuid) -> Result<Vec<QuizTemplate>> {
        Ok(self.with(|s| {
            s.quiz_templates
                .iter()
                .filter(|t| t.organization_id == org_id)
                .cloned()
                .collect()
        }))
    }

    async fn create_quiz(&self, quiz: NewQuiz) -> Result<Quiz> {
        let quiz = Quiz {
            id: Uuid::new_v4(),
            organization_id: quiz.organization_id,
            template_id: quiz.template_id,
            batch_id: quiz.batch_id,
            name: quiz.name,
            question_ids: quiz.question_ids,
            time_limit_minutes: quiz.time_limit_minutes,
            passing_score: quiz.passing_score,
            status: QuizStatus::Active,
            created_by: quiz.created_by,
            created_at: Utc::now(),
        };
        self.with(|s| s.quizzes.push(quiz.clone()));
        Ok(quiz)
    }

    async fn get_quiz(&self, id: Uuid) -> Result<Option<Quiz>> {
        Ok(self.with(|s| s.quizzes.iter().find(|q| q.id == id).cloned()))
    }

    async fn set_quiz_status(&self, id: Uuid, status: QuizStatus) -> Result<Option<Quiz>> {
        Ok(self.with(|s| {
            s.quizzes.iter_mut().find(|q| q.id == id).map(|q| {
                q.status = status;
                q.clone()
            })
        }))
    }

    async fn save_quiz_attempt(&self, attempt: NewQuizAttempt) -> Result<QuizAttemptDetail> {
        let detail = QuizAttemptDetail {
            attempt: QuizAttempt {
                id: Uuid::new_v4(),
                quiz_id: attempt.quiz_id,
                user_id: attempt.user_id,
                score: attempt.score,
                passed: attempt.passed,
                completed_at: Utc::now(),
            },
            answers: attempt.answers,
        };
        self.with(|s| s.attempts.push(detail.clone()));
        Ok(detail)
    }

    async fn list_quiz_attempts(
        &self,
        quiz_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<Vec<QuizAttempt>> {
        Ok(self.with(|s| {
            s.attempts
                .iter()
                .map(|a| &a.attempt)
                .filter(|a| a.quiz_id == quiz_id && user_id.is_none_or(|u| a.user_id == u))
                .cloned()
                .collect()
        }))
    }

    async fn create_audio_file(
        &self,
        org_id: Uuid,
        uploaded_by: Uuid,
        req: RegisterAudioFileRequest,
    ) -> Result<AudioFile> {
        self.with(|s| {
            if s.audio_files.iter().any(|f| f.storage_key == req.storage_key) {
                return Err(AppError::Conflict(
                    "recording is already registered".into(),
                ));
            }
            let file = AudioFile {
                id: Uuid::new_v4(),
                organization_id: org_id,
                filename: req.filename,
                storage_key: req.storage_key,
                language: req.language,
                duration_seconds: req.duration_seconds,
                status: AudioStatus::Pending,
                uploaded_by,
                created_at: Utc::now(),
            };
            s.audio_files.push(file.clone());
            Ok(file)
        })
    }

    async fn get_audio_file(&self, id: Uuid) -> Result<Option<AudioFile>> {
        Ok(self.with(|s| s.audio_files.iter().find(|f| f.id == id).cloned()))
    }

    async fn list_audio_files(
        &self,
        org_id: Uuid,
        status: Option<AudioStatus>,
    ) -> Result<Vec<AudioFile>> {
        Ok(self.with(|s| {
            s.audio_files
                .iter()
                .filter(|f| f.organization_id == org_id && status.is_none_or(|st| f.status == st))
                .cloned()
                .collect()
        }))
    }

    async fn allocate_audio_file(&self, allocation: NewAllocation) -> Result<AudioFileAllocation> {
        self.with(|s| {
            let open = s.allocations.iter().any(|a| {
                a.audio_file_id == allocation.audio_file_id
                    && a.status != AllocationStatus::Evaluated
            });
            if open {
                return Err(AppError::Conflict(
                    "recording already has an open allocation".into(),
                ));
            }
            let row = AudioFileAllocation {
                id: Uuid::new_v4(),
                audio_file_id: allocation.audio_file_id,
                quality_analyst_id: allocation.quality_analyst_id,
                allocated_by: allocation.allocated_by,
                due_date: allocation.due_date,
                status: AllocationStatus::Allocated,
                evaluation_id: None,
                created_at: Utc::now(),
            };
            if let Some(file) = s
                .audio_files
                .iter_mut()
                .find(|f| f.id == allocation.audio_file_id)
            {
                file.status = AudioStatus::Allocated;
            }
            s.allocations.push(row.clone());
            Ok(row)
        })
    }

    async fn list_allocations_for(
        &self,
        quality_analyst_id: Uuid,
    ) -> Result<Vec<AudioFileAllocation>> {
        Ok(self.with(|s| {
            s.allocations
                .iter()
                .filter(|a| a.quality_analyst_id == quality_analyst_id)
                .cloned()
                .collect()
        }))
    }

    async fn find_open_allocation(
        &self,
        audio_file_id: Uuid,
        quality_analyst_id: Uuid,
    ) -> Result<Option<AudioFileAllocation>> {
        Ok(self.with(|s| {
            s.allocations
                .iter()
                .rev()
                .find(|a| {
                    a.audio_file_id == audio_file_id
                        && a.quality_analyst_id == quality_analyst_id
                        && a.status != AllocationStatus::Evaluated
                })
                .cloned()
        }))
    }
}

// --- Fixtures ---

/// One organization with an in-memory repository and mock storage behind an `AppState`.
pub struct TestOrg {
    pub repo: Arc<InMemoryRepository>,
    pub state: AppState,
    pub org: Organization,
}

impl TestOrg {
    pub fn new() -> Self {
        Self::with_storage(MockStorageService::new())
    }

    pub fn with_storage(storage: MockStorageService) -> Self {
        let repo = Arc::new(InMemoryRepository::default());
        let org = repo.add_org("Acme Contact Center");
        let state = AppState {
            repo: repo.clone() as RepositoryState,
            storage: Arc::new(storage) as StorageState,
            config: AppConfig::default(),
        };
        Self { repo, state, org }
    }

    pub fn id(&self) -> Uuid {
        self.org.id
    }

    /// Adds a member and returns the identity the auth extractor would produce for them.
    pub fn member(&self, role: Role, manager_id: Option<Uuid>) -> AuthUser {
        AuthUser::from(&self.repo.add_user(self.org.id, role, manager_id))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// --- Template builders ---

pub fn param(name: &str, rating_type: RatingType, weightage: f64) -> CreateParameterRequest {
    CreateParameterRequest {
        name: name.to_string(),
        guidelines: None,
        rating_type,
        weightage,
        weightage_enabled: true,
        is_fatal: false,
    }
}

pub fn fatal(mut p: CreateParameterRequest) -> CreateParameterRequest {
    p.is_fatal = true;
    p
}

pub fn unweighted(mut p: CreateParameterRequest) -> CreateParameterRequest {
    p.weightage_enabled = false;
    p
}

pub fn pillar(
    name: &str,
    weightage: f64,
    parameters: Vec<CreateParameterRequest>,
) -> CreatePillarRequest {
    CreatePillarRequest {
        name: name.to_string(),
        weightage,
        parameters,
    }
}

pub fn template_request(
    passing_score: f64,
    pillars: Vec<CreatePillarRequest>,
) -> CreateTemplateRequest {
    CreateTemplateRequest {
        name: "Call Quality".to_string(),
        description: None,
        passing_score,
        pillars,
    }
}

/// A rating for the `index`-th parameter of `detail`, in template order.
pub fn rate(detail: &EvaluationTemplateDetail, index: usize, score: &str) -> ParameterScoreInput {
    let parameter = detail.parameters().nth(index).unwrap();
    ParameterScoreInput {
        parameter_id: parameter.id,
        score: score.to_string(),
        comment: None,
    }
}

// --- Response helpers ---

pub fn status_of(err: AppError) -> StatusCode {
    err.into_response().status()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
