//! Weighted evaluation scoring.
//!
//! A template is a tree of pillars holding parameters. Each submitted rating is normalized
//! (`yes` -> 100, `no` -> 0, numeric/custom -> raw value, `na` -> excluded) and the aggregate is
//!
//! ```text
//! sum(weightage * normalized) / sum(weightage)
//! ```
//!
//! over every parameter whose weightage is enabled and whose rating is not N/A. An empty
//! denominator yields 0. A fatal parameter rated `no` (or 0) fails the evaluation regardless
//! of the aggregate, but never changes the aggregate itself.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CreateTemplateRequest, EvaluationParameter, EvaluationTemplateDetail, ParameterScoreInput,
    RatingType,
};

/// Upper bound of the numeric rating scale.
pub const NUMERIC_SCALE_MAX: f64 = 5.0;

const YES_SCORE: f64 = 100.0;
const NO_SCORE: f64 = 0.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("parameter '{name}' has not been rated")]
    MissingRating { parameter_id: Uuid, name: String },

    #[error("parameter {0} was rated more than once")]
    DuplicateRating(Uuid),

    #[error("parameter {0} does not belong to this template")]
    UnknownParameter(Uuid),

    #[error("invalid rating '{value}' for parameter '{name}': {reason}")]
    InvalidRating {
        parameter_id: Uuid,
        name: String,
        value: String,
        reason: &'static str,
    },
}

impl From<ScoringError> for AppError {
    fn from(err: ScoringError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// A parsed rating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rating {
    Scored(f64),
    NotApplicable,
}

impl Rating {
    pub fn value(&self) -> Option<f64> {
        match self {
            Rating::Scored(v) => Some(*v),
            Rating::NotApplicable => None,
        }
    }
}

/// Parses a raw rating string according to the parameter's rating type.
/// `na` / `n/a` is accepted for every rating type.
pub fn parse_rating(rating_type: RatingType, raw: &str) -> Result<Rating, &'static str> {
    let value = raw.trim().to_ascii_lowercase();
    if matches!(value.as_str(), "na" | "n/a") {
        return Ok(Rating::NotApplicable);
    }

    match rating_type {
        RatingType::YesNoNa => match value.as_str() {
            "yes" => Ok(Rating::Scored(YES_SCORE)),
            "no" => Ok(Rating::Scored(NO_SCORE)),
            _ => Err("expected yes, no or na"),
        },
        RatingType::Numeric => {
            let n = parse_number(&value)?;
            if !(0.0..=NUMERIC_SCALE_MAX).contains(&n) {
                return Err("numeric rating must be between 0 and 5");
            }
            Ok(Rating::Scored(n))
        }
        RatingType::Custom => {
            let n = parse_number(&value)?;
            if n < 0.0 {
                return Err("custom rating must not be negative");
            }
            Ok(Rating::Scored(n))
        }
    }
}

fn parse_number(value: &str) -> Result<f64, &'static str> {
    value
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or("expected a number")
}

// --- Score Card ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ParameterScore {
    pub parameter_id: Uuid,
    pub pillar_id: Uuid,
    /// `None` when rated N/A.
    pub normalized_score: Option<f64>,
    /// Whether this parameter contributed to the aggregate.
    pub counted: bool,
    pub fatal_failure: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PillarScore {
    pub pillar_id: Uuid,
    pub name: String,
    pub score: f64,
}

/// ScoreCard
///
/// The full breakdown returned with every submitted evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ScoreCard {
    pub final_score: f64,
    pub passing_score: f64,
    pub passed_by_score: bool,
    pub fatal_failures: Vec<Uuid>,
    pub passed: bool,
    pub pillars: Vec<PillarScore>,
    pub parameters: Vec<ParameterScore>,
}

/// Accumulates `sum(w * s)` and `sum(w)`.
#[derive(Default)]
struct WeightedSum {
    numerator: f64,
    denominator: f64,
}

impl WeightedSum {
    fn add(&mut self, weight: f64, score: f64) {
        self.numerator += weight * score;
        self.denominator += weight;
    }

    fn average(&self) -> f64 {
        if self.denominator > 0.0 {
            self.numerator / self.denominator
        } else {
            0.0
        }
    }
}

fn is_fatal_failure(param: &EvaluationParameter, rating: Rating) -> bool {
    param.is_fatal && rating == Rating::Scored(0.0)
}

/// score_evaluation
///
/// Validates that every parameter of the template carries exactly one well-formed rating,
/// then computes the aggregate, pillar breakdown and pass/fail.
pub fn score_evaluation(
    template: &EvaluationTemplateDetail,
    scores: &[ParameterScoreInput],
) -> Result<ScoreCard, ScoringError> {
    let params: HashMap<Uuid, &EvaluationParameter> =
        template.parameters().map(|p| (p.id, p)).collect();

    let mut ratings: HashMap<Uuid, Rating> = HashMap::with_capacity(scores.len());
    for input in scores {
        let param = params
            .get(&input.parameter_id)
            .ok_or(ScoringError::UnknownParameter(input.parameter_id))?;
        if ratings.contains_key(&param.id) {
            return Err(ScoringError::DuplicateRating(param.id));
        }
        let rating =
            parse_rating(param.rating_type, &input.score).map_err(|reason| {
                ScoringError::InvalidRating {
                    parameter_id: param.id,
                    name: param.name.clone(),
                    value: input.score.clone(),
                    reason,
                }
            })?;
        ratings.insert(param.id, rating);
    }

    let mut overall = WeightedSum::default();
    let mut pillars = Vec::with_capacity(template.pillars.len());
    let mut parameters = Vec::with_capacity(params.len());
    let mut fatal_failures = Vec::new();

    for detail in &template.pillars {
        let mut pillar_sum = WeightedSum::default();

        for param in &detail.parameters {
            let rating = *ratings
                .get(&param.id)
                .ok_or_else(|| ScoringError::MissingRating {
                    parameter_id: param.id,
                    name: param.name.clone(),
                })?;

            let counted = param.weightage_enabled && rating.value().is_some();
            if let (true, Some(score)) = (counted, rating.value()) {
                overall.add(param.weightage, score);
                pillar_sum.add(param.weightage, score);
            }

            let fatal = is_fatal_failure(param, rating);
            if fatal {
                fatal_failures.push(param.id);
            }

            parameters.push(ParameterScore {
                parameter_id: param.id,
                pillar_id: detail.pillar.id,
                normalized_score: rating.value(),
                counted,
                fatal_failure: fatal,
            });
        }

        pillars.push(PillarScore {
            pillar_id: detail.pillar.id,
            name: detail.pillar.name.clone(),
            score: pillar_sum.average(),
        });
    }

    let final_score = overall.average();
    let passing_score = template.template.passing_score;
    let passed_by_score = final_score >= passing_score;

    Ok(ScoreCard {
        final_score,
        passing_score,
        passed_by_score,
        passed: passed_by_score && fatal_failures.is_empty(),
        fatal_failures,
        pillars,
        parameters,
    })
}

fn check_percentage(what: &str, value: f64) -> Result<(), String> {
    if !(0.0..=100.0).contains(&value) {
        return Err(format!("{what} must be between 0 and 100"));
    }
    Ok(())
}

/// Structural checks applied when a template is created: a non-empty name, percentages in
/// range, and at least one pillar holding at least one parameter. Weightage sums are not
/// required to reach 100.
pub fn validate_template(req: &CreateTemplateRequest) -> Result<(), String> {
    if req.name.trim().is_empty() {
        return Err("template name must not be empty".into());
    }
    check_percentage("passing score", req.passing_score)?;
    if req.pillars.is_empty() {
        return Err("template needs at least one pillar".into());
    }
    for pillar in &req.pillars {
        if pillar.name.trim().is_empty() {
            return Err("pillar name must not be empty".into());
        }
        check_percentage(&format!("weightage of pillar '{}'", pillar.name), pillar.weightage)?;
        if pillar.parameters.is_empty() {
            return Err(format!("pillar '{}' has no parameters", pillar.name));
        }
        for param in &pillar.parameters {
            if param.name.trim().is_empty() {
                return Err(format!("pillar '{}' has an unnamed parameter", pillar.name));
            }
            check_percentage(&format!("weightage of parameter '{}'", param.name), param.weightage)?;
        }
    }
    Ok(())
}
