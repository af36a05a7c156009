//! Quiz generation and grading.

use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CreateQuestionRequest, CreateQuizTemplateRequest, Question, QuestionType, Quiz, QuizAnswer,
    QuizAttemptAnswer,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssessmentError {
    #[error("template needs {needed} questions but only {available} match")]
    NotEnoughQuestions { needed: usize, available: usize },

    #[error("question {0} is not part of this quiz")]
    UnknownQuestion(Uuid),

    #[error("question {0} was answered more than once")]
    DuplicateAnswer(Uuid),

    #[error("{0}")]
    InvalidQuestion(String),

    #[error("{0}")]
    InvalidTemplate(String),
}

impl From<AssessmentError> for AppError {
    fn from(err: AssessmentError) -> Self {
        AppError::Validation(err.to_string())
    }
}

pub fn validate_question(req: &CreateQuestionRequest) -> Result<(), AssessmentError> {
    let invalid = |msg: &str| Err(AssessmentError::InvalidQuestion(msg.to_string()));

    if req.question.trim().is_empty() {
        return invalid("question text must not be empty");
    }
    if req.correct_answer.trim().is_empty() {
        return invalid("correct answer must not be empty");
    }
    match req.question_type {
        QuestionType::MultipleChoice => {
            if req.options.len() < 2 {
                return invalid("multiple choice questions need at least two options");
            }
            if !req
                .options
                .iter()
                .any(|o| answer_matches(o, &req.correct_answer))
            {
                return invalid("correct answer must be one of the options");
            }
        }
        QuestionType::TrueFalse => {
            let answer = req.correct_answer.trim().to_ascii_lowercase();
            if answer != "true" && answer != "false" {
                return invalid("true/false questions must be answered 'true' or 'false'");
            }
        }
        QuestionType::ShortAnswer => {}
    }
    Ok(())
}

pub fn validate_quiz_template(req: &CreateQuizTemplateRequest) -> Result<(), AssessmentError> {
    let invalid = |msg: &str| Err(AssessmentError::InvalidTemplate(msg.to_string()));

    if req.name.trim().is_empty() {
        return invalid("template name must not be empty");
    }
    if req.question_count < 1 {
        return invalid("question count must be at least 1");
    }
    if req.time_limit_minutes < 1 {
        return invalid("time limit must be at least one minute");
    }
    if !(0.0..=100.0).contains(&req.passing_score) {
        return invalid("passing score must be between 0 and 100");
    }
    Ok(())
}

/// Draws `count` distinct questions at random from `pool`, returning their ids in draw order.
pub fn select_questions<R: Rng + ?Sized>(
    pool: &[Question],
    count: usize,
    rng: &mut R,
) -> Result<Vec<Uuid>, AssessmentError> {
    if pool.len() < count {
        return Err(AssessmentError::NotEnoughQuestions {
            needed: count,
            available: pool.len(),
        });
    }
    Ok(pool.choose_multiple(rng, count).map(|q| q.id).collect())
}

/// Trimmed, case-insensitive comparison.
pub fn answer_matches(expected: &str, given: &str) -> bool {
    expected.trim().to_lowercase() == given.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradedAttempt {
    pub score: f64,
    pub passed: bool,
    pub answers: Vec<QuizAttemptAnswer>,
}

/// grade_attempt
///
/// Scores an attempt as `correct * 100 / questions in quiz`. Unanswered questions count as
/// wrong and are recorded with an empty answer. Questions missing from `questions` (deleted
/// from the bank since the draw) cannot be answered correctly.
pub fn grade_attempt(
    quiz: &Quiz,
    questions: &[Question],
    answers: &[QuizAnswer],
) -> Result<GradedAttempt, AssessmentError> {
    let in_quiz: HashSet<Uuid> = quiz.question_ids.iter().copied().collect();
    let mut given: HashMap<Uuid, &str> = HashMap::with_capacity(answers.len());
    for a in answers {
        if !in_quiz.contains(&a.question_id) {
            return Err(AssessmentError::UnknownQuestion(a.question_id));
        }
        if given.insert(a.question_id, a.answer.as_str()).is_some() {
            return Err(AssessmentError::DuplicateAnswer(a.question_id));
        }
    }

    let bank: HashMap<Uuid, &Question> = questions.iter().map(|q| (q.id, q)).collect();

    let graded: Vec<QuizAttemptAnswer> = quiz
        .question_ids
        .iter()
        .map(|qid| {
            let answer = given.get(qid).copied().unwrap_or_default();
            let correct = !answer.trim().is_empty()
                && bank
                    .get(qid)
                    .is_some_and(|q| answer_matches(&q.correct_answer, answer));
            QuizAttemptAnswer {
                question_id: *qid,
                answer: answer.to_string(),
                correct,
            }
        })
        .collect();

    let total = graded.len();
    let correct = graded.iter().filter(|a| a.correct).count();
    let score = if total == 0 {
        0.0
    } else {
        correct as f64 * 100.0 / total as f64
    };

    Ok(GradedAttempt {
        score,
        passed: score >= quiz.passing_score,
        answers: graded,
    })
}
