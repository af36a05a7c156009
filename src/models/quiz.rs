use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "question_type", rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "difficulty", rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "quiz_status", rename_all = "snake_case")]
pub enum QuizStatus {
    #[default]
    Active,
    Closed,
}

// --- Question Bank ---

/// Question
///
/// A bank entry. `correct_answer` never leaves the server on the quiz-taking path.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Question {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub process_id: Option<Uuid>,
    pub question: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub category: Option<String>,
    pub difficulty: Difficulty,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateQuestionRequest {
    pub question: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: String,
    pub category: Option<String>,
    pub process_id: Option<Uuid>,
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct QuestionFilter {
    pub category: Option<String>,
    pub process_id: Option<Uuid>,
}

/// A question as shown to the quiz taker.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct QuestionView {
    pub id: Uuid,
    pub question: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            question: q.question.clone(),
            question_type: q.question_type,
            options: q.options.clone(),
        }
    }
}

// --- Templates & Quizzes ---

/// QuizTemplate
///
/// Recipe for generating quizzes: how many questions to draw from which slice of the bank.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct QuizTemplate {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub time_limit_minutes: i32,
    pub question_count: i32,
    pub passing_score: f64,
    pub category: Option<String>,
    pub process_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub created_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateQuizTemplateRequest {
    pub name: String,
    pub description: Option<String>,
    #[schema(example = 30)]
    pub time_limit_minutes: i32,
    #[schema(example = 10)]
    pub question_count: i32,
    #[schema(example = 70.0)]
    pub passing_score: f64,
    pub category: Option<String>,
    pub process_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
}

/// Quiz
///
/// A concrete quiz drawn from a template. `question_ids` keeps the draw order.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Quiz {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub template_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub name: String,
    pub question_ids: Vec<Uuid>,
    pub time_limit_minutes: i32,
    pub passing_score: f64,
    pub status: QuizStatus,
    pub created_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Opens or closes a quiz. Closed quizzes reject new attempts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateQuizStatusRequest {
    pub status: QuizStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct GenerateQuizRequest {
    pub name: Option<String>,
    pub batch_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct QuizForTaking {
    pub id: Uuid,
    pub name: String,
    pub time_limit_minutes: i32,
    pub passing_score: f64,
    pub status: QuizStatus,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub organization_id: Uuid,
    pub template_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub name: String,
    pub question_ids: Vec<Uuid>,
    pub time_limit_minutes: i32,
    pub passing_score: f64,
    pub created_by: Uuid,
}

// --- Attempts ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct QuizAnswer {
    pub question_id: Uuid,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SubmitQuizAttemptRequest {
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub user_id: Uuid,
    pub score: f64,
    pub passed: bool,
    #[ts(type = "string")]
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct QuizAttemptAnswer {
    pub question_id: Uuid,
    pub answer: String,
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct QuizAttemptDetail {
    pub attempt: QuizAttempt,
    pub answers: Vec<QuizAttemptAnswer>,
}

#[derive(Debug, Clone)]
pub struct NewQuizAttempt {
    pub quiz_id: Uuid,
    pub user_id: Uuid,
    pub score: f64,
    pub passed: bool,
    pub answers: Vec<QuizAttemptAnswer>,
}
