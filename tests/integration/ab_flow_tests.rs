//! Эксперименты с индексами: оценка до и после, решение по записям

use super::common::*;
use queryeval::ab::{AbOutcome, AbRule, ExperimentSide, TrackedMetric};
use queryeval::{
    AbPolicy, AbSide, Error, EvaluationConfig, EvaluationRecord, EvaluationRequest, Evaluator,
};

async fn evaluate_with(plan_json: String, config: EvaluationConfig) -> EvaluationRecord {
    let mut evaluator = Evaluator::new(executor_with_plan(plan_json), config).unwrap();
    evaluator
        .evaluate(
            &EvaluationRequest::new(holdings_query(HOLDINGS_SQL))
                .with_baseline(holdings_query(HOLDINGS_SQL)),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_index_accepted_from_saved_records() {
    let before = evaluate_with(scan_plan("Seq Scan", 500.0, 1000), quiet_config()).await;
    let after = evaluate_with(scan_plan("Index Scan", 20.0, 10), quiet_config()).await;

    let dir = tempfile::tempdir().unwrap();
    let before_path = dir.path().join("before.json");
    let after_path = dir.path().join("after.json");
    before.write_json(&before_path).unwrap();
    after.write_json(&after_path).unwrap();

    let before = EvaluationRecord::read_json(&before_path).unwrap();
    let after = EvaluationRecord::read_json(&after_path).unwrap();
    let decision = AbPolicy::default()
        .decide(&AbSide::from_record(&before), &AbSide::from_record(&after))
        .unwrap();

    assert!(decision.accepted());
    assert_eq!(
        decision.rule,
        AbRule::Accepted {
            improved: TrackedMetric::Reads
        }
    );
    let reads = decision
        .deltas
        .iter()
        .find(|d| d.metric == TrackedMetric::Reads)
        .unwrap();
    assert_eq!(reads.before, 1000.0);
    assert_eq!(reads.after, 10.0);
}

#[tokio::test]
async fn test_cost_regression_rejects_index() {
    let before = evaluate_with(scan_plan("Seq Scan", 500.0, 1000), quiet_config()).await;
    let after = evaluate_with(scan_plan("Index Scan", 560.0, 10), quiet_config()).await;

    let decision = AbPolicy::default()
        .decide(&AbSide::from_record(&before), &AbSide::from_record(&after))
        .unwrap();

    assert_eq!(decision.outcome, AbOutcome::Reject);
    assert_eq!(
        decision.rule,
        AbRule::Regression {
            metric: TrackedMetric::Cost
        }
    );
    assert_eq!(decision.rule_text, "regression>10%: cost");
}

#[tokio::test]
async fn test_non_equivalent_side_rejects_index() {
    let before = evaluate_with(scan_plan("Seq Scan", 500.0, 1000), quiet_config()).await;

    let mut evaluator =
        Evaluator::new(executor_with_plan(scan_plan("Index Scan", 20.0, 10)), quiet_config())
            .unwrap();
    let after = evaluator
        .evaluate(
            &EvaluationRequest::new(holdings_query(HOLDINGS_DESC_SQL))
                .with_baseline(holdings_query(HOLDINGS_SQL)),
        )
        .await
        .unwrap();

    let decision = AbPolicy::default()
        .decide(&AbSide::from_record(&before), &AbSide::from_record(&after))
        .unwrap();
    assert!(!decision.accepted());
    assert_eq!(
        decision.rule,
        AbRule::FunctionalFailure {
            side: ExperimentSide::After
        }
    );
}

#[tokio::test]
async fn test_mismatched_settings_are_rejected() {
    let before = evaluate_with(scan_plan("Seq Scan", 500.0, 1000), quiet_config()).await;
    let after = evaluate_with(
        scan_plan("Index Scan", 20.0, 10),
        EvaluationConfig {
            timeout_seconds: 30,
            ..quiet_config()
        },
    )
    .await;

    let result =
        AbPolicy::default().decide(&AbSide::from_record(&before), &AbSide::from_record(&after));
    assert!(matches!(result, Err(Error::Configuration { .. })));
}
