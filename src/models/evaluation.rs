use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::scoring::ScoreCard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "rating_type", rename_all = "snake_case")]
pub enum RatingType {
    YesNoNa,
    Numeric,
    Custom,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "template_status", rename_all = "snake_case")]
pub enum TemplateStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "evaluation_type", rename_all = "snake_case")]
pub enum EvaluationType {
    #[default]
    Standard,
    Audio,
}

// --- Template Tree ---

/// EvaluationTemplate
///
/// Root of the scoring tree: template -> pillars -> parameters.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct EvaluationTemplate {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Minimum aggregate (0-100) required to pass.
    pub passing_score: f64,
    pub status: TemplateStatus,
    pub created_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct EvaluationPillar {
    pub id: Uuid,
    pub template_id: Uuid,
    pub name: String,
    pub weightage: f64,
    pub order_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct EvaluationParameter {
    pub id: Uuid,
    pub pillar_id: Uuid,
    pub name: String,
    pub guidelines: Option<String>,
    pub rating_type: RatingType,
    pub weightage: f64,
    /// Parameters with weightage disabled must still be rated but do not count toward the
    /// aggregate.
    pub weightage_enabled: bool,
    pub is_fatal: bool,
    pub order_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PillarDetail {
    pub pillar: EvaluationPillar,
    pub parameters: Vec<EvaluationParameter>,
}

/// A template with its full pillar/parameter tree, ordered by `order_index`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EvaluationTemplateDetail {
    pub template: EvaluationTemplate,
    pub pillars: Vec<PillarDetail>,
}

impl EvaluationTemplateDetail {
    pub fn parameters(&self) -> impl Iterator<Item = &EvaluationParameter> {
        self.pillars.iter().flat_map(|p| p.parameters.iter())
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateParameterRequest {
    pub name: String,
    pub guidelines: Option<String>,
    pub rating_type: RatingType,
    pub weightage: f64,
    #[serde(default = "default_true")]
    pub weightage_enabled: bool,
    #[serde(default)]
    pub is_fatal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatePillarRequest {
    pub name: String,
    pub weightage: f64,
    pub parameters: Vec<CreateParameterRequest>,
}

/// CreateTemplateRequest
///
/// Creates a template together with its whole pillar/parameter tree in one call.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateTemplateRequest {
    #[schema(example = "Call Quality v3")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = 80.0)]
    pub passing_score: f64,
    pub pillars: Vec<CreatePillarRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateTemplateStatusRequest {
    pub status: TemplateStatus,
}

// --- Submissions & Results ---

/// One rating as entered by the evaluator: `yes` / `no` / `na`, or a number.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ParameterScoreInput {
    pub parameter_id: Uuid,
    #[schema(example = "yes")]
    pub score: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SubmitEvaluationRequest {
    pub template_id: Uuid,
    pub trainee_id: Uuid,
    pub batch_id: Option<Uuid>,
    #[serde(default)]
    pub evaluation_type: EvaluationType,
    pub audio_file_id: Option<Uuid>,
    pub scores: Vec<ParameterScoreInput>,
}

/// EvaluationResult
///
/// The persisted outcome of one evaluation (`evaluations` table).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct EvaluationResult {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub template_id: Uuid,
    pub trainee_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub evaluator_id: Uuid,
    pub evaluation_type: EvaluationType,
    pub audio_file_id: Option<Uuid>,
    pub final_score: f64,
    pub passed: bool,
    pub fatal_failure: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct EvaluationParameterResult {
    pub id: Uuid,
    pub evaluation_id: Uuid,
    pub parameter_id: Uuid,
    pub score: String,
    /// `None` for N/A ratings.
    pub normalized_score: Option<f64>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EvaluationDetail {
    pub evaluation: EvaluationResult,
    pub scores: Vec<EvaluationParameterResult>,
}

/// Response of a successful submission: what was stored plus the full score breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EvaluationOutcome {
    pub evaluation: EvaluationResult,
    pub score_card: ScoreCard,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct EvaluationFilter {
    pub trainee_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewParameterScore {
    pub parameter_id: Uuid,
    pub score: String,
    pub normalized_score: Option<f64>,
    pub comment: Option<String>,
}

/// Scored evaluation ready to persist. When `allocation_id` is set, the allocation and its
/// audio file are marked evaluated in the same transaction.
#[derive(Debug, Clone)]
pub struct NewEvaluation {
    pub organization_id: Uuid,
    pub template_id: Uuid,
    pub trainee_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub evaluator_id: Uuid,
    pub evaluation_type: EvaluationType,
    pub audio_file_id: Option<Uuid>,
    pub allocation_id: Option<Uuid>,
    pub final_score: f64,
    pub passed: bool,
    pub fatal_failure: bool,
    pub scores: Vec<NewParameterScore>,
}
