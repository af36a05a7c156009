mod common;

use axum::http::StatusCode;
use common::*;
use lms_portal::{
    error::AppError,
    models::{EvaluationTemplateDetail, ParameterScoreInput, RatingType, TemplateStatus},
    scoring::{self, Rating, ScoringError},
};
use proptest::prelude::*;
use uuid::Uuid;

fn build(req: lms_portal::models::CreateTemplateRequest) -> EvaluationTemplateDetail {
    build_template(Uuid::new_v4(), Uuid::new_v4(), req, TemplateStatus::Active)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Two pillars: "Opening" (greeting 50, tone 50) and "Compliance" (verification 100, fatal).
fn call_quality() -> EvaluationTemplateDetail {
    build(template_request(
        80.0,
        vec![
            pillar(
                "Opening",
                40.0,
                vec![
                    param("Greeting", RatingType::YesNoNa, 50.0),
                    param("Tone", RatingType::Numeric, 50.0),
                ],
            ),
            pillar(
                "Compliance",
                60.0,
                vec![fatal(param("Verification", RatingType::YesNoNa, 100.0))],
            ),
        ],
    ))
}

// --- Rating parsing ---

#[test]
fn test_parse_rating_yes_no_na() {
    assert_eq!(
        scoring::parse_rating(RatingType::YesNoNa, "yes"),
        Ok(Rating::Scored(100.0))
    );
    assert_eq!(
        scoring::parse_rating(RatingType::YesNoNa, " NO "),
        Ok(Rating::Scored(0.0))
    );
    assert_eq!(
        scoring::parse_rating(RatingType::YesNoNa, "N/A"),
        Ok(Rating::NotApplicable)
    );
    assert!(scoring::parse_rating(RatingType::YesNoNa, "maybe").is_err());
}

#[test]
fn test_parse_rating_numeric_scale() {
    assert_eq!(
        scoring::parse_rating(RatingType::Numeric, "4"),
        Ok(Rating::Scored(4.0))
    );
    assert_eq!(
        scoring::parse_rating(RatingType::Numeric, "na"),
        Ok(Rating::NotApplicable)
    );
    assert!(scoring::parse_rating(RatingType::Numeric, "6").is_err());
    assert!(scoring::parse_rating(RatingType::Numeric, "-1").is_err());
    assert!(scoring::parse_rating(RatingType::Numeric, "yes").is_err());
    assert!(scoring::parse_rating(RatingType::Numeric, "NaN").is_err());
}

#[test]
fn test_parse_rating_custom_accepts_any_non_negative_number() {
    assert_eq!(
        scoring::parse_rating(RatingType::Custom, "12.5"),
        Ok(Rating::Scored(12.5))
    );
    assert!(scoring::parse_rating(RatingType::Custom, "-0.5").is_err());
}

// --- Aggregation ---

#[test]
fn test_all_yes_scores_full_marks() {
    let t = call_quality();
    let card = scoring::score_evaluation(
        &t,
        &[rate(&t, 0, "yes"), rate(&t, 1, "5"), rate(&t, 2, "yes")],
    )
    .unwrap();

    // (50*100 + 50*5 + 100*100) / 200
    assert!(close(card.final_score, 76.25));
    assert!(!card.passed_by_score);
    assert!(!card.passed);
    assert!(card.fatal_failures.is_empty());
}

#[test]
fn test_weighted_average_over_yes_no() {
    let t = build(template_request(
        50.0,
        vec![pillar(
            "Soft skills",
            100.0,
            vec![
                param("Empathy", RatingType::YesNoNa, 75.0),
                param("Closing", RatingType::YesNoNa, 25.0),
            ],
        )],
    ));

    let card =
        scoring::score_evaluation(&t, &[rate(&t, 0, "yes"), rate(&t, 1, "no")]).unwrap();

    assert!(close(card.final_score, 75.0));
    assert!(card.passed);
    assert_eq!(card.pillars.len(), 1);
    assert!(close(card.pillars[0].score, 75.0));
}

#[test]
fn test_na_ratings_leave_the_denominator() {
    let t = build(template_request(
        80.0,
        vec![pillar(
            "Soft skills",
            100.0,
            vec![
                param("Empathy", RatingType::YesNoNa, 50.0),
                param("Upsell", RatingType::YesNoNa, 50.0),
            ],
        )],
    ));

    let card =
        scoring::score_evaluation(&t, &[rate(&t, 0, "yes"), rate(&t, 1, "na")]).unwrap();

    assert!(close(card.final_score, 100.0));
    assert!(card.passed);
    let upsell = &card.parameters[1];
    assert_eq!(upsell.normalized_score, None);
    assert!(!upsell.counted);
}

#[test]
fn test_everything_na_scores_zero() {
    let t = build(template_request(
        10.0,
        vec![pillar(
            "Soft skills",
            100.0,
            vec![param("Empathy", RatingType::YesNoNa, 100.0)],
        )],
    ));

    let card = scoring::score_evaluation(&t, &[rate(&t, 0, "na")]).unwrap();

    assert!(close(card.final_score, 0.0));
    assert!(!card.passed);
}

#[test]
fn test_disabled_weightage_is_rated_but_not_counted() {
    let t = build(template_request(
        80.0,
        vec![pillar(
            "Process",
            100.0,
            vec![
                param("Hold procedure", RatingType::YesNoNa, 50.0),
                unweighted(param("Notes quality", RatingType::YesNoNa, 50.0)),
            ],
        )],
    ));

    let card =
        scoring::score_evaluation(&t, &[rate(&t, 0, "yes"), rate(&t, 1, "no")]).unwrap();
    assert!(close(card.final_score, 100.0));
    assert_eq!(card.parameters[1].normalized_score, Some(0.0));
    assert!(!card.parameters[1].counted);

    // Still mandatory.
    let err = scoring::score_evaluation(&t, &[rate(&t, 0, "yes")]).unwrap_err();
    assert!(matches!(err, ScoringError::MissingRating { .. }));
}

#[test]
fn test_pillar_breakdown_follows_template_order() {
    let t = call_quality();
    let card = scoring::score_evaluation(
        &t,
        &[rate(&t, 2, "yes"), rate(&t, 1, "3"), rate(&t, 0, "no")],
    )
    .unwrap();

    let names: Vec<&str> = card.pillars.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Opening", "Compliance"]);
    // Opening: (50*0 + 50*3) / 100
    assert!(close(card.pillars[0].score, 1.5));
    assert!(close(card.pillars[1].score, 100.0));
}

#[test]
fn test_score_equal_to_passing_score_passes() {
    let t = build(template_request(
        50.0,
        vec![pillar(
            "Soft skills",
            100.0,
            vec![
                param("Empathy", RatingType::YesNoNa, 50.0),
                param("Closing", RatingType::YesNoNa, 50.0),
            ],
        )],
    ));

    let card =
        scoring::score_evaluation(&t, &[rate(&t, 0, "yes"), rate(&t, 1, "no")]).unwrap();

    assert_eq!(card.final_score, 50.0);
    assert!(card.passed_by_score);
    assert!(card.passed);
}

#[test]
fn test_flipping_one_rating_moves_the_aggregate_by_its_weight_share() {
    let weights = [20.0, 30.0, 50.0];
    let t = build(template_request(
        0.0,
        vec![pillar(
            "Call flow",
            100.0,
            vec![
                param("Greeting", RatingType::YesNoNa, weights[0]),
                param("Probing", RatingType::YesNoNa, weights[1]),
                param("Resolution", RatingType::YesNoNa, weights[2]),
            ],
        )],
    ));
    let total: f64 = weights.iter().sum();

    for flipped in 0..weights.len() {
        let ratings = |flip: bool| -> Vec<_> {
            (0..weights.len())
                .map(|i| rate(&t, i, if flip && i == flipped { "yes" } else { "no" }))
                .collect()
        };
        let before = scoring::score_evaluation(&t, &ratings(false)).unwrap();
        let after = scoring::score_evaluation(&t, &ratings(true)).unwrap();

        let delta = after.final_score - before.final_score;
        assert!(close(delta, 100.0 * weights[flipped] / total), "parameter {flipped}");
    }
}

// --- Fatal parameters ---

#[test]
fn test_fatal_no_fails_regardless_of_score() {
    let t = build(template_request(
        80.0,
        vec![pillar(
            "Compliance",
            100.0,
            vec![
                param("Script adherence", RatingType::YesNoNa, 90.0),
                fatal(param("Identity check", RatingType::YesNoNa, 10.0)),
            ],
        )],
    ));

    let card =
        scoring::score_evaluation(&t, &[rate(&t, 0, "yes"), rate(&t, 1, "no")]).unwrap();

    assert!(close(card.final_score, 90.0), "the aggregate is not zeroed");
    assert!(card.passed_by_score);
    assert!(!card.passed);
    assert_eq!(card.fatal_failures, vec![t.pillars[0].parameters[1].id]);
    assert!(card.parameters[1].fatal_failure);
}

#[test]
fn test_fatal_numeric_zero_fails_but_na_does_not() {
    let t = build(template_request(
        0.0,
        vec![pillar(
            "Compliance",
            100.0,
            vec![fatal(param("Disclosure", RatingType::Numeric, 100.0))],
        )],
    ));

    let zero = scoring::score_evaluation(&t, &[rate(&t, 0, "0")]).unwrap();
    assert!(!zero.passed);
    assert_eq!(zero.fatal_failures.len(), 1);

    let na = scoring::score_evaluation(&t, &[rate(&t, 0, "na")]).unwrap();
    assert!(na.fatal_failures.is_empty());
    assert!(na.passed);
}

// --- Submission validation ---

#[test]
fn test_unknown_and_duplicate_ratings_are_rejected() {
    let t = call_quality();
    let stranger = ParameterScoreInput {
        parameter_id: Uuid::new_v4(),
        score: "yes".into(),
        comment: None,
    };

    let err = scoring::score_evaluation(&t, &[stranger.clone()]).unwrap_err();
    assert_eq!(err, ScoringError::UnknownParameter(stranger.parameter_id));

    let err = scoring::score_evaluation(
        &t,
        &[rate(&t, 0, "yes"), rate(&t, 0, "no"), rate(&t, 1, "3"), rate(&t, 2, "yes")],
    )
    .unwrap_err();
    assert_eq!(err, ScoringError::DuplicateRating(t.pillars[0].parameters[0].id));
}

#[test]
fn test_invalid_rating_names_the_parameter() {
    let t = call_quality();
    let err = scoring::score_evaluation(
        &t,
        &[rate(&t, 0, "yes"), rate(&t, 1, "9"), rate(&t, 2, "yes")],
    )
    .unwrap_err();

    assert!(err.to_string().contains("Tone"));
    assert_eq!(AppError::from(err).status(), StatusCode::BAD_REQUEST);
}

// --- Template validation ---

#[test]
fn test_validate_template_accepts_partial_weightage() {
    let req = template_request(
        70.0,
        vec![pillar(
            "Opening",
            30.0,
            vec![param("Greeting", RatingType::YesNoNa, 20.0)],
        )],
    );
    assert!(scoring::validate_template(&req).is_ok());
}

#[test]
fn test_validate_template_rejects_bad_structure() {
    let mut no_pillars = template_request(70.0, vec![]);
    assert!(scoring::validate_template(&no_pillars).is_err());

    no_pillars.pillars.push(pillar("Empty", 10.0, vec![]));
    let err = scoring::validate_template(&no_pillars).unwrap_err();
    assert!(err.contains("Empty"));

    let out_of_range = template_request(
        120.0,
        vec![pillar("P", 10.0, vec![param("x", RatingType::YesNoNa, 10.0)])],
    );
    assert!(scoring::validate_template(&out_of_range).is_err());

    let negative_weight = template_request(
        50.0,
        vec![pillar("P", 10.0, vec![param("x", RatingType::YesNoNa, -1.0)])],
    );
    assert!(scoring::validate_template(&negative_weight).is_err());

    let mut unnamed = template_request(
        50.0,
        vec![pillar("P", 10.0, vec![param("x", RatingType::YesNoNa, 1.0)])],
    );
    unnamed.name = "  ".into();
    assert!(scoring::validate_template(&unnamed).is_err());
}

// --- Properties ---

fn yes_no_na() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("yes"), Just("no"), Just("na")]
}

proptest! {
    #[test]
    fn prop_final_score_matches_weighted_mean(
        rows in prop::collection::vec((0.0f64..=100.0, yes_no_na()), 1..12)
    ) {
        let params = rows
            .iter()
            .enumerate()
            .map(|(i, (w, _))| param(&format!("p{i}"), RatingType::YesNoNa, *w))
            .collect();
        let t = build(template_request(50.0, vec![pillar("All", 100.0, params)]));
        let inputs: Vec<_> = rows
            .iter()
            .enumerate()
            .map(|(i, (_, r))| rate(&t, i, r))
            .collect();

        let card = scoring::score_evaluation(&t, &inputs).unwrap();

        let (num, den) = rows.iter().fold((0.0, 0.0), |(n, d), (w, r)| match *r {
            "yes" => (n + w * 100.0, d + w),
            "no" => (n, d + w),
            _ => (n, d),
        });
        let expected = if den > 0.0 { num / den } else { 0.0 };

        prop_assert!((card.final_score - expected).abs() < 1e-6);
        prop_assert!((0.0..=100.0 + 1e-9).contains(&card.final_score));
        prop_assert_eq!(card.passed, card.final_score >= 50.0);
    }
}
